//! Defines an abstraction over the event sending mechanism.

use tokio::sync::mpsc::UnboundedSender;

use super::events::UserEvent;

/// A trait that abstracts the sending of user events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: UserEvent);
}

/// Hosts that consume events from a channel (the CLI, tests, embedders).
impl EventProxy for UnboundedSender<UserEvent> {
    fn send_event(&self, event: UserEvent) {
        // A closed receiver means the host is gone; nothing left to notify.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to send event to host: {}", e);
        }
    }
}
