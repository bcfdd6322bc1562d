// WebSocket feed of marketplace changes. Clients use it as a refresh trigger
// and re-fetch listings or projects when an event arrives.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    #[serde(rename_all = "camelCase")]
    ListingCreated { harvest_id: String, farmer_id: String },
    #[serde(rename_all = "camelCase")]
    ListingSold { harvest_id: String, buyer_id: String },
    #[serde(rename_all = "camelCase")]
    ProjectCreated { project_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    CropUpdated { project_id: String, crop_id: String },
    #[serde(rename_all = "camelCase")]
    InvestmentAdded { project_id: String, investment_id: String },
}

#[derive(Clone)]
pub struct EventFeed {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn publish(&self, event: MarketEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<MarketEvent>) {
    let (sender, mut receiver) = socket.split();

    // Sender wrapped in Arc<Mutex> for sharing
    let sender = Arc::new(Mutex::new(sender));
    let sender_clone = sender.clone();

    // Task to forward feed events to this client
    let forward_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event feed subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            let mut sender = sender_clone.lock().await;
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // The feed is one-way; only answer pings and watch for close
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Close(_) => break,
            Message::Ping(data) => {
                let mut sender = sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    forward_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let feed = EventFeed::new();
        let mut rx = feed.subscribe();

        feed.publish(MarketEvent::ListingSold {
            harvest_id: "harvest2".into(),
            buyer_id: "user4".into(),
        });

        let event = rx.recv().await.unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "listing_sold");
        assert_eq!(json["harvestId"], "harvest2");
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        EventFeed::new().publish(MarketEvent::ProjectCreated {
            project_id: "p".into(),
            user_id: "u".into(),
        });
    }
}
