//! Transient user-facing notifications.

use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Neutral information (e.g. redirecting).
    Info,
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
}

/// A toast-style message shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Identifier, unique within one checkout session.
    pub id: u64,
    /// Severity.
    pub level: NotificationLevel,
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(
        id: u64,
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id,
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}
