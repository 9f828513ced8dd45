use crate::domain::{Navigator, Notification, Notifier, Severity};
use crossbeam_channel::Sender;

/// Messages the request layer posts to a UI event loop.
#[derive(Debug, PartialEq, Eq)]
pub enum AppMessage {
    Notify(Notification),
    RedirectToLogin,
}

/// Notifier and navigator that forward into the UI's message channel.
#[derive(Clone)]
pub struct AppChannel {
    message_tx: Sender<AppMessage>,
}

impl AppChannel {
    pub fn new(message_tx: Sender<AppMessage>) -> Self {
        Self { message_tx }
    }
}

impl Notifier for AppChannel {
    fn notify(&self, message: &str, severity: Severity) {
        let notification = Notification {
            message: message.to_string(),
            severity,
        };
        if self.message_tx.send(AppMessage::Notify(notification)).is_err() {
            tracing::warn!("UI channel closed, dropped notification: {}", message);
        }
    }
}

impl Navigator for AppChannel {
    fn redirect_to_login(&self) {
        if self.message_tx.send(AppMessage::RedirectToLogin).is_err() {
            tracing::warn!("UI channel closed, dropped login redirect");
        }
    }
}
