// Per-login view state, advanced by a pure reducer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    db::models::{Project, Role, User},
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Dashboard,
    Projects,
    Crops,
    Investments,
    Market,
    Farmers,
}

impl View {
    /// Views that only make sense while acting as a farmer.
    pub fn requires_farmer(self) -> bool {
        matches!(self, View::Projects | View::Crops | View::Investments)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_user: Option<User>,
    pub active_role: Role,
    pub active_project: Option<Project>,
    pub active_view: View,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_user: None,
            active_role: Role::Farmer,
            active_project: None,
            active_view: View::Dashboard,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    LoggedIn(User),
    RoleSelected(Role),
    ProjectSelected(String),
    ViewSelected(View),
    /// Fresh copy of every user after a mutation anywhere in the store.
    DataRefreshed(Vec<User>),
    LoggedOut,
}

fn first_project(user: &User, role: Role) -> Option<Project> {
    if role != Role::Farmer {
        return None;
    }
    user.projects.first().cloned()
}

/// Transition function for the session. Events that don't apply to the
/// current state leave it unchanged.
pub fn reduce(state: SessionState, event: SessionEvent) -> SessionState {
    match event {
        SessionEvent::LoggedIn(user) => {
            let active_role = if user.has_role(Role::Farmer) {
                Role::Farmer
            } else {
                user.roles.first().copied().unwrap_or(Role::Farmer)
            };
            SessionState {
                active_project: first_project(&user, active_role),
                active_role,
                active_view: View::Dashboard,
                current_user: Some(user),
            }
        }

        SessionEvent::RoleSelected(role) => {
            let Some(user) = state.current_user.as_ref() else {
                return state;
            };
            if !user.has_role(role) {
                return state;
            }
            let active_project = first_project(user, role);
            let active_view = if role != Role::Farmer && state.active_view.requires_farmer() {
                View::Dashboard
            } else {
                state.active_view
            };
            SessionState {
                active_role: role,
                active_project,
                active_view,
                ..state
            }
        }

        SessionEvent::ProjectSelected(project_id) => {
            if state.active_role != Role::Farmer {
                return state;
            }
            let project = state
                .current_user
                .as_ref()
                .and_then(|u| u.project(&project_id))
                .cloned();
            match project {
                Some(project) => SessionState {
                    active_project: Some(project),
                    ..state
                },
                None => state,
            }
        }

        SessionEvent::ViewSelected(view) => {
            if state.current_user.is_none()
                || (view.requires_farmer() && state.active_role != Role::Farmer)
            {
                return state;
            }
            SessionState {
                active_view: view,
                ..state
            }
        }

        SessionEvent::DataRefreshed(users) => {
            let Some(current) = state.current_user.as_ref() else {
                return state;
            };
            let Some(user) = users.into_iter().find(|u| u.id == current.id) else {
                return state;
            };

            let active_project = if state.active_role == Role::Farmer {
                state
                    .active_project
                    .as_ref()
                    .and_then(|p| user.project(&p.id))
                    .or_else(|| user.projects.first())
                    .cloned()
            } else {
                None
            };

            SessionState {
                current_user: Some(user),
                active_project,
                ..state
            }
        }

        SessionEvent::LoggedOut => SessionState::default(),
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolves a typed username against the known users. With `demo_mode` an
/// unmatched name logs in as the first user instead of failing.
pub fn resolve_login(users: &[User], username: &str, demo_mode: bool) -> Result<User> {
    let wanted = normalize(username);
    if wanted.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }

    if let Some(user) = users.iter().find(|u| normalize(&u.name) == wanted) {
        return Ok(user.clone());
    }

    if demo_mode {
        if let Some(user) = users.first() {
            tracing::info!(username, fallback = %user.name, "Unknown user, using demo account");
            return Ok(user.clone());
        }
    }

    Err(AppError::NotFound(format!("User {username} not found")))
}

struct LiveSession {
    state: SessionState,
    /// Same instant as the token's `exp`.
    expires_at: DateTime<Utc>,
}

impl LiveSession {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Live sessions keyed by session id. A session lives as long as its token;
/// expired entries are dropped on every login and refresh.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, LiveSession>>>,
}

fn evict_expired(sessions: &mut HashMap<String, LiveSession>, now: DateTime<Utc>) {
    let before = sessions.len();
    sessions.retain(|_, session| session.is_live(now));
    let evicted = before - sessions.len();
    if evicted > 0 {
        tracing::debug!(evicted, remaining = sessions.len(), "Evicted expired sessions");
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(
        &self,
        session_id: &str,
        user: User,
        expires_at: DateTime<Utc>,
    ) -> SessionState {
        let state = reduce(SessionState::default(), SessionEvent::LoggedIn(user));
        let mut sessions = self.sessions.write().await;
        evict_expired(&mut sessions, Utc::now());
        sessions.insert(
            session_id.to_string(),
            LiveSession {
                state: state.clone(),
                expires_at,
            },
        );
        state
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionState> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .filter(|session| session.is_live(Utc::now()))
            .map(|session| session.state.clone())
            .ok_or(AppError::Unauthorized)
    }

    pub async fn dispatch(&self, session_id: &str, event: SessionEvent) -> Result<SessionState> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .filter(|session| session.is_live(Utc::now()))
            .ok_or(AppError::Unauthorized)?;
        session.state = reduce(std::mem::take(&mut session.state), event);
        Ok(session.state.clone())
    }

    /// Applies a data refresh to every live session.
    pub async fn refresh_all(&self, users: &[User]) {
        let mut sessions = self.sessions.write().await;
        evict_expired(&mut sessions, Utc::now());
        for session in sessions.values_mut() {
            session.state = reduce(
                std::mem::take(&mut session.state),
                SessionEvent::DataRefreshed(users.to_vec()),
            );
        }
    }

    /// Removes the session and returns its final, logged-out state.
    pub async fn close(&self, session_id: &str) -> Option<SessionState> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|session| reduce(session.state, SessionEvent::LoggedOut))
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::db::seed;

    fn user(id: &str) -> User {
        seed::demo()
            .users
            .into_iter()
            .find(|u| u.id == id)
            .unwrap()
    }

    fn logged_in(id: &str) -> SessionState {
        reduce(SessionState::default(), SessionEvent::LoggedIn(user(id)))
    }

    #[test]
    fn login_selects_farmer_role_and_first_project() {
        let state = logged_in("user1");
        assert_eq!(state.active_role, Role::Farmer);
        assert_eq!(state.active_project.unwrap().id, "proj1");
        assert_eq!(state.active_view, View::Dashboard);

        let seller_only = logged_in("user4");
        assert_eq!(seller_only.active_role, Role::Seller);
        assert!(seller_only.active_project.is_none());
    }

    #[test]
    fn role_switch_resets_active_project() {
        let state = reduce(logged_in("user1"), SessionEvent::ProjectSelected("proj2".into()));
        assert_eq!(state.active_project.as_ref().unwrap().id, "proj2");

        let state = reduce(state, SessionEvent::RoleSelected(Role::Seller));
        assert_eq!(state.active_role, Role::Seller);
        assert!(state.active_project.is_none());

        let state = reduce(state, SessionEvent::RoleSelected(Role::Farmer));
        assert_eq!(state.active_project.unwrap().id, "proj1");
    }

    #[test]
    fn role_not_held_is_ignored() {
        let before = logged_in("user2");
        let after = reduce(before.clone(), SessionEvent::RoleSelected(Role::Seller));
        assert_eq!(before, after);
    }

    #[test]
    fn leaving_farmer_role_leaves_farmer_views() {
        let state = reduce(logged_in("user1"), SessionEvent::ViewSelected(View::Crops));
        assert_eq!(state.active_view, View::Crops);

        let state = reduce(state, SessionEvent::RoleSelected(Role::Seller));
        assert_eq!(state.active_view, View::Dashboard);

        let state = reduce(state, SessionEvent::ViewSelected(View::Investments));
        assert_eq!(state.active_view, View::Dashboard);

        let state = reduce(state, SessionEvent::ViewSelected(View::Market));
        assert_eq!(state.active_view, View::Market);
    }

    #[test]
    fn selecting_foreign_project_is_ignored() {
        let before = logged_in("user1");
        let after = reduce(before.clone(), SessionEvent::ProjectSelected("proj3".into()));
        assert_eq!(before, after);
    }

    #[test]
    fn refresh_keeps_active_project_by_id() {
        let state = reduce(logged_in("user1"), SessionEvent::ProjectSelected("proj2".into()));

        let mut users = seed::demo().users;
        users[0].projects[1].name = "Renamed Orchard".into();
        let state = reduce(state, SessionEvent::DataRefreshed(users));

        let project = state.active_project.unwrap();
        assert_eq!(project.id, "proj2");
        assert_eq!(project.name, "Renamed Orchard");
    }

    #[test]
    fn refresh_falls_back_when_project_disappears() {
        let state = reduce(logged_in("user1"), SessionEvent::ProjectSelected("proj2".into()));

        let mut users = seed::demo().users;
        users[0].projects.truncate(1);
        let state = reduce(state, SessionEvent::DataRefreshed(users.clone()));
        assert_eq!(state.active_project.as_ref().unwrap().id, "proj1");

        users[0].projects.clear();
        let state = reduce(state, SessionEvent::DataRefreshed(users));
        assert!(state.active_project.is_none());
    }

    #[test]
    fn logout_restores_initial_state() {
        let state = reduce(logged_in("user3"), SessionEvent::ViewSelected(View::Market));
        assert_eq!(reduce(state, SessionEvent::LoggedOut), SessionState::default());
    }

    #[test]
    fn login_matches_names_loosely() {
        let users = seed::demo().users;
        assert_eq!(resolve_login(&users, "fatoudiop", false).unwrap().id, "user2");
        assert_eq!(resolve_login(&users, "  MOUSSA sow ", false).unwrap().id, "user3");
    }

    #[test]
    fn unknown_login_depends_on_demo_mode() {
        let users = seed::demo().users;
        assert_eq!(resolve_login(&users, "stranger", true).unwrap().id, "user1");
        assert!(matches!(
            resolve_login(&users, "stranger", false),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            resolve_login(&users, "   ", true),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn registry_applies_refresh_to_every_session() {
        let registry = SessionRegistry::new();
        let expires_at = Utc::now() + Duration::days(7);
        registry.open("a", user("user1"), expires_at).await;
        registry.open("b", user("user2"), expires_at).await;

        let mut users = seed::demo().users;
        users[1].name = "Fatou Diop Sarr".into();
        registry.refresh_all(&users).await;

        let b = registry.get("b").await.unwrap();
        assert_eq!(b.current_user.unwrap().name, "Fatou Diop Sarr");

        assert_eq!(registry.close("a").await, Some(SessionState::default()));
        assert_eq!(registry.close("a").await, None);
        assert!(matches!(registry.get("a").await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn expired_sessions_are_evicted() {
        let registry = SessionRegistry::new();
        let now = Utc::now();
        registry
            .open("stale", user("user1"), now - Duration::minutes(1))
            .await;
        assert_eq!(registry.open_count().await, 1);
        assert!(matches!(registry.get("stale").await, Err(AppError::Unauthorized)));
        assert!(matches!(
            registry.dispatch("stale", SessionEvent::ViewSelected(View::Market)).await,
            Err(AppError::Unauthorized)
        ));

        // Logging in someone else sweeps the stale entry
        registry
            .open("fresh", user("user2"), now + Duration::days(7))
            .await;
        assert_eq!(registry.open_count().await, 1);
        assert!(registry.get("fresh").await.is_ok());

        registry
            .open("late", user("user3"), now + Duration::milliseconds(1))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        registry.refresh_all(&seed::demo().users).await;
        assert_eq!(registry.open_count().await, 1);
        assert!(matches!(registry.get("late").await, Err(AppError::Unauthorized)));
    }
}
