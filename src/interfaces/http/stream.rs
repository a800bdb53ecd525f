use crate::application::alerts::{AlertFilter, BusMessage};
use crate::domain::alert::AlertKind;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StreamQuery {
    symbol: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// `WS /alerts/stream`: upgrades and forwards alerts as JSON text frames.
/// Unknown filter values are rejected before the upgrade.
pub async fn alerts_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let kind = query
        .kind
        .as_deref()
        .and_then(|raw| AlertKind::from_str(raw).ok());

    let filter = AlertFilter {
        symbol: query.symbol.clone(),
        kind,
        min_priority: None,
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: AlertFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.bus.subscribe(filter).await;
    let subscriber_id = subscription.id;
    debug!("AlertStream: client {} connected", subscriber_id);

    loop {
        tokio::select! {
            message = subscription.recv() => {
                let frame = match message {
                    Some(BusMessage::Alert(alert)) => match serde_json::to_string(&alert) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("AlertStream: failed to encode alert: {}", e);
                            continue;
                        }
                    },
                    Some(BusMessage::Dropped { count }) => {
                        json!({ "type": "DROPPED", "count": count }).to_string()
                    }
                    // Bus shut down and queue drained.
                    None => break,
                };

                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Pings are answered by axum; other client frames are ignored.
                    _ => {}
                }
            }
        }
    }

    state.bus.unsubscribe(subscriber_id).await;
    debug!("AlertStream: client {} disconnected", subscriber_id);
}
