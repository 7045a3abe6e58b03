//! User-facing error notifications.

use std::cell::RefCell;

/// Receives human-readable failure reports.
pub trait Notifier {
    fn show_error(&self, title: &str, message: &str);
}

/// Forwards notifications to the `log` facade.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_error(&self, title: &str, message: &str) {
        log::error!("{title}: {message}");
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Keeps notifications in memory so callers can surface them later.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.borrow().is_empty()
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, title: &str, message: &str) {
        self.notifications.borrow_mut().push(Notification {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}
