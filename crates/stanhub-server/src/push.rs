//! Server → browser status channel over WebSocket.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use stanhub_bus::BroadcastBus;

/// Accepts WebSocket upgrades on any path.
pub fn push_router(bus: Arc<BroadcastBus>) -> Router {
    Router::new().fallback(upgrade_handler).with_state(bus)
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(bus): State<Arc<BroadcastBus>>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, bus))
}

/// Forwards bus messages to `socket` until either side goes away. Inbound
/// frames are read only to notice the close.
async fn relay(socket: WebSocket, bus: Arc<BroadcastBus>) {
    let mut subscription = bus.subscribe().await;
    let id = subscription.id;
    tracing::info!(subscriber = %id, "push client connected");

    let (mut sink, mut inbound) = socket.split();
    loop {
        tokio::select! {
            outgoing = subscription.receiver.recv() => {
                let Some(text) = outgoing else { break };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(subscriber = %id, error = %e, "push send failed");
                    break;
                }
            }
            incoming = inbound.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    bus.unsubscribe(id).await;
    tracing::info!(subscriber = %id, "push client disconnected");
}
