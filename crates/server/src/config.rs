use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// SQLite URL. Unset keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Unknown usernames log in as the first user instead of failing.
    pub demo_login: bool,
    pub advisor_base_url: Option<String>,
    pub advisor_api_key: Option<String>,
    pub advisor_model: String,
    pub advisor_timeout_secs: u64,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: non_empty("DATABASE_URL"),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "development-secret-change-in-production".to_string()),
            demo_login: flag(non_empty("DEMO_LOGIN"), true),
            advisor_base_url: non_empty("ADVISOR_BASE_URL"),
            advisor_api_key: non_empty("ADVISOR_API_KEY"),
            advisor_model: non_empty("ADVISOR_MODEL")
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            advisor_timeout_secs: env::var("ADVISOR_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            jwt_secret: "development-secret-change-in-production".to_string(),
            demo_login: true,
            advisor_base_url: None,
            advisor_api_key: None,
            advisor_model: "gemini-2.5-flash".to_string(),
            advisor_timeout_secs: 10,
        }
    }
}
