use std::time::Duration;

use super::ConnectionStatus;
use super::Model;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Non-blocking user-facing notice. Every failure shown to the user goes
/// through one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn info(title: &str, description: &str) -> Notification {
        return Notification {
            level: NotificationLevel::Info,
            title: title.to_string(),
            description: description.to_string(),
        };
    }

    pub fn error(title: &str, description: &str) -> Notification {
        return Notification {
            level: NotificationLevel::Error,
            title: title.to_string(),
            description: description.to_string(),
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ConnectionChanged(ConnectionStatus),
    GenerationProgress { id: String, delta: String },
    GenerationFinished { id: String, elapsed: Duration },
    ModelsLoaded(Vec<Model>),
    Notify(Notification),
}
