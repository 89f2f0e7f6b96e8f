use std::sync::Arc;

use tracing::{debug, error, warn};

use parley_db::{MessageStore, StoreError};
use parley_types::events::{DeliveryPayload, OutboundFrame};
use parley_types::models::Message;

use crate::registry::{Registry, SendError};

/// Persists inbound messages and forwards them to live connections.
#[derive(Clone)]
pub struct Relay {
    store: Arc<dyn MessageStore>,
    registry: Registry,
}

/// Outcome of one best-effort send.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    NotConnected,
    Failed(SendError),
}

impl Relay {
    pub fn new(store: Arc<dyn MessageStore>, registry: Registry) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Persist a message, then forward it to the receiver and echo it to the sender.
    ///
    /// Fails only if persistence fails, in which case nothing is sent.
    /// Delivery is best-effort: send failures are logged and the persisted
    /// message is returned regardless.
    pub async fn relay(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: String,
    ) -> Result<Message, StoreError> {
        // Run the blocking DB insert off the async runtime
        let store = self.store.clone();
        let message = tokio::task::spawn_blocking(move || {
            store.record_message(sender_id, receiver_id, &content)
        })
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::Persistence(format!("store task failed: {}", e))
        })??;

        let payload = DeliveryPayload::from(&message);

        let to_receiver = self.deliver(receiver_id, &payload);
        // A note to self goes out once
        let to_sender = if sender_id == receiver_id {
            Delivery::Sent
        } else {
            self.deliver(sender_id, &payload)
        };

        debug!(
            "Relayed message {} ({} -> {}): receiver {:?}, echo {:?}",
            message.id, sender_id, receiver_id, to_receiver, to_sender
        );
        Ok(message)
    }

    /// Best-effort send of `payload` to `user_id`'s live connection.
    pub fn deliver(&self, user_id: i64, payload: &DeliveryPayload) -> Delivery {
        // Clone the handle out so no shard lock is held while sending
        let Some(handle) = self.registry.get(user_id) else {
            return Delivery::NotConnected;
        };

        match handle.send(OutboundFrame::Message(payload.clone())) {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                warn!("Delivery of message {} to user {} failed: {}", payload.id, user_id, e);
                Delivery::Failed(e)
            }
        }
    }
}
