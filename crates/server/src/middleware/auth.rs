use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{routes::auth::Claims, AppState};

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub session_id: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // Tokens outlive server restarts; the session does not.
    if state.sessions.get(&token_data.claims.sid).await.is_err() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user = AuthUser {
        id: token_data.claims.sub,
        session_id: token_data.claims.sid,
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

// Extractor for getting the authenticated user from request extensions
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
