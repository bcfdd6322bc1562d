pub mod auth;
pub mod dashboard;
pub mod listings;
pub mod projects;
pub mod session;
pub mod users;

#[cfg(test)]
mod tests;

use crate::{handlers::ws::MarketEvent, AppState};

/// Announces a committed mutation and pushes fresh data into every open
/// session. The mutation already succeeded, so a failed re-read only logs.
pub(crate) async fn refresh_after_mutation(state: &AppState, event: MarketEvent) {
    state.events.publish(event);

    match state.farms.list_users().await {
        Ok(users) => state.sessions.refresh_all(&users).await,
        Err(err) => tracing::warn!(error = %err, "Failed to refresh sessions"),
    }
}
