#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

use std::sync::Arc;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        return *self == ConnectionStatus::Connected;
    }
}

/// Process-wide connection status. Cloning shares the same value; observers
/// follow changes through `subscribe`.
#[derive(Clone)]
pub struct ConnectionState {
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl Default for ConnectionState {
    fn default() -> ConnectionState {
        let (tx, _rx) = watch::channel(ConnectionStatus::default());
        return ConnectionState { tx: Arc::new(tx) };
    }
}

impl ConnectionState {
    #[cfg(test)]
    pub fn get(&self) -> ConnectionStatus {
        return *self.tx.borrow();
    }

    /// Returns true when the status actually changed.
    pub fn set(&self, status: ConnectionStatus) -> bool {
        return self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(from = %current, to = %status, "connection status changed");
            *current = status;
            return true;
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        return self.tx.subscribe();
    }
}
