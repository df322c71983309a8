// Operator notifications
pub mod telegram;

pub use telegram::TelegramNotifier;

/// Fire-and-forget message sink. Delivery failures are logged by the
/// implementation and never reach the caller.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: String);
}
