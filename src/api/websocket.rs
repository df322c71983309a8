use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{
    api::handler::AppState,
    events::{BotEvent, BotStatus, EventBroadcaster},
};

/// Live panel feed: current status first, then every bot event
/// GET /ws
pub async fn event_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_event_stream(socket, state.events, state.bot.status()))
}

async fn handle_event_stream(socket: WebSocket, events: EventBroadcaster, initial: BotStatus) {
    // subscribe before the first send so nothing published in between is lost
    let mut rx = events.subscribe();
    let (mut sender, mut receiver) = socket.split();
    debug!("📡 Panel connected ({} subscriber(s))", events.subscriber_count());

    if send_event(&mut sender, &BotEvent::StatusUpdate(initial))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Panel client lagging, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
        }
    }

    debug!("📡 Panel disconnected");
}

async fn send_event<S>(sender: &mut S, event: &BotEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(event).map_err(|_| ())?;
    sender.send(Message::Text(json)).await.map_err(|_| ())
}
