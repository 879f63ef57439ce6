//! Application Registry (§4.B): the shared map from a live session to its
//! admitted application record, with uniqueness enforced on application id.
//!
//! Grounded on `apps/daemon/src/policy/mcp_trust.rs::TrustDatabase` (a small
//! mutex/map-guarded registry with simple accessor methods) combined with
//! `daemon/src/policy/approval.rs::ApprovalRouter`'s removal-signals-waiters
//! pattern, here applied to `ApplicationRecord::on_close`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::model::ApplicationRecord;
use crate::session::Session;

struct Entry {
    session: Arc<Session>,
    record: Arc<ApplicationRecord>,
}

/// Keyed by the lowercased application id (Invariant 1: ids are unique
/// case-insensitively).
#[derive(Default)]
pub struct Registry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new record. Fails if an entry with the same id (case
    /// insensitive) already exists.
    pub async fn insert(&self, session: Arc<Session>, record: Arc<ApplicationRecord>) -> Result<(), &'static str> {
        let key = record.id.to_lowercase();
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&key) {
            return Err("App ID is already used");
        }
        info!(app_id = %record.id, name = %record.name, "application admitted");
        entries.insert(key, Entry { session, record });
        Ok(())
    }

    pub async fn has_id(&self, id: &str) -> bool {
        self.entries.lock().await.contains_key(&id.to_lowercase())
    }

    /// Snapshot of every live (session, record) pair. Used by the Event Bus
    /// fan-out and by `shutdown_all`.
    pub async fn list(&self) -> Vec<(Arc<Session>, Arc<ApplicationRecord>)> {
        self.entries
            .lock()
            .await
            .values()
            .map(|e| (e.session.clone(), e.record.clone()))
            .collect()
    }

    /// Remove one record by id: signal any outstanding prompt, then close
    /// its session. Idempotent — removing an absent id is a no-op.
    pub async fn remove_by_id(&self, id: &str) {
        let removed = self.entries.lock().await.remove(&id.to_lowercase());
        if let Some(entry) = removed {
            entry.record.signal_close();
            entry.session.close().await;
            info!(app_id = %id, "application removed");
        }
    }

    /// Remove and tear down every live entry — the registry-side half of
    /// server shutdown (§4.G, §5).
    pub async fn shutdown_all(&self) {
        let drained: Vec<Entry> = self.entries.lock().await.drain().map(|(_, v)| v).collect();
        for entry in drained {
            entry.record.signal_close();
            entry.session.close().await;
        }
    }
}
