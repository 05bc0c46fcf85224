// src/core/emitter.rs

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::core::models::UpdateEvent;

/// Delivers update events back to the session that started a job.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Queues one event for the origin. Never fails: once the origin is gone
    /// the event is dropped.
    async fn send(&self, event: UpdateEvent);

    /// False once the origin session has disconnected.
    fn is_connected(&self) -> bool;

    /// Resolves when the origin session disconnects.
    async fn closed(&self);
}

/// The per-connection end of a client session.
///
/// Every socket gets its own channel, so a handle can only ever reach the
/// session it was created for. Clones share the channel, and events sent
/// through one clone arrive in the order they were sent.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: mpsc::Sender<UpdateEvent>,
}

impl SessionHandle {
    /// Creates a session and the receiver its writer task drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<UpdateEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { id: Uuid::new_v4(), sender }, receiver)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait]
impl Emitter for SessionHandle {
    async fn send(&self, event: UpdateEvent) {
        if self.sender.send(event).await.is_err() {
            debug!(session = %self.id, "Session closed, dropping event.");
        }
    }

    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn closed(&self) {
        self.sender.closed().await
    }
}
