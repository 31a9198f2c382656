#[cfg(test)]
#[path = "connection_monitor_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::models::ConnectionState;
use crate::domain::models::ConnectionStatus;
use crate::domain::models::Event;
use crate::domain::models::Notification;
use crate::domain::models::SharedBackend;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Keeps the shared connection status in line with the server's liveness.
#[derive(Clone)]
pub struct ConnectionMonitor {
    backend: SharedBackend,
    connection: ConnectionState,
    tx: mpsc::UnboundedSender<Event>,
}

impl ConnectionMonitor {
    pub fn new(
        backend: SharedBackend,
        connection: ConnectionState,
        tx: mpsc::UnboundedSender<Event>,
    ) -> ConnectionMonitor {
        return ConnectionMonitor {
            backend,
            connection,
            tx,
        };
    }

    /// Explicit connect: one probe, with the status moving through
    /// `connecting` first.
    pub async fn connect(&self) -> Result<()> {
        self.connection.set(ConnectionStatus::Connecting);

        if let Err(err) = self.backend.health_check().await {
            self.connection.set(ConnectionStatus::Connecting);
            let _ = self.tx.send(Event::Notify(Notification::error(
                "Error",
                "Failed to connect to the server",
            )));
            return Err(err);
        }

        self.connection.set(ConnectionStatus::Connected);
        return Ok(());
    }

    pub async fn poll_once(&self) -> ConnectionStatus {
        let status = match self.backend.health_check().await {
            Ok(_) => ConnectionStatus::Connected,
            Err(err) => {
                tracing::debug!(error = ?err, "Liveness probe failed");
                ConnectionStatus::Connecting
            }
        };

        self.connection.set(status);
        return status;
    }

    /// Probes every `every` until `cancel` fires. Status changes from any
    /// source are forwarded as `Event::ConnectionChanged`.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        let mut changes = self.connection.subscribe();
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Connection monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                res = changes.changed() => {
                    if res.is_err() {
                        return;
                    }
                    let status = *changes.borrow_and_update();
                    if self.tx.send(Event::ConnectionChanged(status)).is_err() {
                        return;
                    }
                }
            }
        }
    }
}
