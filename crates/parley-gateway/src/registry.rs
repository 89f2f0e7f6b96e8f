use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use parley_types::events::OutboundFrame;

/// Failure to hand a frame to a live connection. Never fatal to a relay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection {0} is closed")]
    Closed(Uuid),

    #[error("connection {0} outbound queue is full")]
    Full(Uuid),
}

/// Routing handle for one live connection.
///
/// Cloning is cheap; every clone routes to the same socket writer. The
/// writer task owns the receiving half and watches [`ConnectionHandle::closed`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: Uuid,
    tx: mpsc::Sender<OutboundFrame>,
    shutdown: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle with an outbound queue of `capacity` frames.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            conn_id: Uuid::new_v4(),
            tx,
            shutdown: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue a frame for this connection without waiting.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), SendError> {
        if self.shutdown.is_cancelled() {
            return Err(SendError::Closed(self.conn_id));
        }
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(self.conn_id),
            TrySendError::Closed(_) => SendError::Closed(self.conn_id),
        })
    }

    /// Ask the owning task to shut this connection down.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    fn same_connection(&self, other: &ConnectionHandle) -> bool {
        self.conn_id == other.conn_id
    }
}

/// Live connections keyed by user id. At most one entry per user.
///
/// Backed by a sharded map: operations on the same user id are serialized,
/// operations on different ids only contend when they hash to one shard.
/// No shard lock is held outside these methods.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<DashMap<i64, ConnectionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` as the live connection for `user_id`.
    ///
    /// A previously registered handle is closed and returned.
    pub fn register(&self, user_id: i64, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let conn_id = handle.conn_id;
        let previous = self.inner.insert(user_id, handle);

        if let Some(prev) = &previous {
            info!(
                "User {} connection {} superseded by {}",
                user_id, prev.conn_id, conn_id
            );
            prev.close();
        } else {
            debug!("User {} registered connection {}", user_id, conn_id);
        }
        previous
    }

    /// Remove the entry for `user_id`, but only if it is still `handle`.
    /// Returns whether an entry was removed.
    pub fn unregister(&self, user_id: i64, handle: &ConnectionHandle) -> bool {
        let removed = self
            .inner
            .remove_if(&user_id, |_, current| current.same_connection(handle))
            .is_some();

        if removed {
            debug!("User {} unregistered connection {}", user_id, handle.conn_id);
        } else {
            debug!(
                "User {} stale unregister for connection {} ignored",
                user_id, handle.conn_id
            );
        }
        removed
    }

    /// Clone out the live handle for `user_id`, if any.
    pub fn get(&self, user_id: i64) -> Option<ConnectionHandle> {
        self.inner.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.inner.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
