//! Event Bus (§4.E): per-app subscription tracking and wallet-event fan-out.
//!
//! Grounded on `daemon/src/ipc/event.rs::EventBroadcaster`, generalized from
//! an unconditional `tokio::sync::broadcast` fan-out to one gated by each
//! record's own `registered_events` set.

use serde_json::Value;

use crate::model::{ApplicationRecord, RpcResponse};
use crate::registry::Registry;

/// Idempotent: returns `true` only if `event` was not already subscribed.
pub async fn subscribe(record: &ApplicationRecord, event: &str) -> bool {
    record.registered_events.lock().await.insert(event.to_string())
}

/// Idempotent: returns `true` only if `event` was actually subscribed.
pub async fn unsubscribe(record: &ApplicationRecord, event: &str) -> bool {
    record.registered_events.lock().await.remove(event)
}

/// Deliver one wallet event to every live session whose record subscribes
/// to it. Runs on whatever thread the wallet callback fires on (§5).
pub async fn publish(registry: &Registry, event: &str, value: Value) {
    for (session, record) in registry.list().await {
        let subscribed = record.registered_events.lock().await.contains(event);
        if subscribed {
            let notification = RpcResponse::notification(event, value.clone());
            let _ = session.send(&notification).await;
        }
    }
}
