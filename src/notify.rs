//! User-facing outcome notifications
//!
//! The sync layer decides when to notify and with which outcome; how the
//! message is shown is up to the [`Notifier`] implementation. The TUI drains a
//! [`ChannelNotifier`] into its toast line, one-shot subcommands print through
//! [`ConsoleNotifier`].

use tokio::sync::mpsc;

/// Receives success/failure outcomes, fire-and-forget
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// A single outcome message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == NotificationKind::Failure
    }
}

/// Forwards notifications over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiver its messages arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify_success(&self, message: &str) {
        // Receiver gone means nobody is displaying notifications anymore
        let _ = self.tx.send(Notification::success(message));
    }

    fn notify_failure(&self, message: &str) {
        let _ = self.tx.send(Notification::failure(message));
    }
}

/// Prints outcomes to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify_success(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn notify_failure(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}
