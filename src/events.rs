use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Panel event channel capacity
const BROADCAST_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

/// Bot status snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub is_running: bool,
    pub cursor: usize,
    pub accounts: usize,
    pub cycles_completed: u64,
}

/// Event streamed to panel clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BotEvent {
    StatusUpdate(BotStatus),
    Log {
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of bot events to any number of websocket clients
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn status(&self, status: BotStatus) {
        let _ = self.tx.send(BotEvent::StatusUpdate(status));
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        debug!("📡 Broadcast log ({:?}): {}", level, message);
        let _ = self.tx.send(BotEvent::Log {
            level,
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_broadcast() {
        let events = EventBroadcaster::new();
        let mut rx = events.subscribe();

        events.log(LogLevel::Success, "swept");

        match rx.recv().await.unwrap() {
            BotEvent::Log { level, message, .. } => {
                assert_eq!(level, LogLevel::Success);
                assert_eq!(message, "swept");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_status_event_serializes_with_tag() {
        let event = BotEvent::StatusUpdate(BotStatus {
            is_running: true,
            cursor: 2,
            accounts: 5,
            cycles_completed: 1,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "statusUpdate");
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["cyclesCompleted"], 1);
    }

    #[test]
    fn test_send_without_subscribers_is_silent() {
        let events = EventBroadcaster::new();
        assert_eq!(events.subscriber_count(), 0);
        events.log(LogLevel::Info, "nobody listening");
    }
}
