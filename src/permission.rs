//! Permission Engine (§4.C): evaluates, caches, and normalizes per-app
//! method permissions, serializing every user prompt through one global
//! mutex so only one modal dialog is ever outstanding.
//!
//! Grounded on `daemon/src/policy/approval.rs::ApprovalRouter` — a
//! single-flight human-decision pattern — generalized from "any number of
//! concurrent pending approvals, polled" to "exactly one outstanding prompt,
//! blocking", which is what §4.C/§5 require.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::GatewayConfig;
use crate::model::{ApplicationRecord, Permission};
use crate::wallet::Prompter;

/// Serializes every admission and permission prompt across all applications.
/// Held for the duration of exactly one user interaction (§4.C, §5).
pub struct PermissionEngine {
    prompt_lock: Mutex<()>,
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionEngine {
    pub fn new() -> Self {
        Self {
            prompt_lock: Mutex::new(()),
        }
    }

    /// Acquire the single global prompt slot, mark `record` as requesting,
    /// and hold it for the duration of `body`. Centralizes the
    /// is_requesting bookkeeping so every caller (admission, permission
    /// evaluation) gets the same invariant for free.
    async fn with_prompt_slot<F, T>(&self, record: &ApplicationRecord, body: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let guard = self.prompt_lock.lock().await;
        record.is_requesting.store(true, std::sync::atomic::Ordering::SeqCst);
        let result = body.await;
        record.is_requesting.store(false, std::sync::atomic::Ordering::SeqCst);
        drop(guard);
        result
    }

    /// Evaluate the permission for one `(record, method)` call (§4.C steps
    /// 1-4). Returns `None` if the session closed while a prompt for it was
    /// outstanding — the caller must not send a response in that case.
    pub async fn evaluate(
        &self,
        record: &Arc<ApplicationRecord>,
        config: &GatewayConfig,
        prompter: &dyn Prompter,
        method: &str,
        params: &Value,
    ) -> Option<Permission> {
        {
            let stored = record.permissions.lock().await;
            if let Some(&existing) = stored.get(method) {
                if existing != Permission::Ask {
                    return Some(existing);
                }
            }
        }

        let decision = self
            .with_prompt_slot(record, async {
                tokio::select! {
                    biased;
                    _ = record.on_close.notified() => None,
                    decision = prompter.ask_permission(record, method, params) => Some(decision),
                }
            })
            .await?;

        self.maybe_store(record, config, method, decision).await;
        Some(decision)
    }

    /// Step 3 of §4.C: persist `AlwaysDeny` unconditionally, `AlwaysAllow`
    /// only if the method is storable; `Allow`/`Deny`/`Ask` are never
    /// written (Invariant 2).
    async fn maybe_store(&self, record: &ApplicationRecord, config: &GatewayConfig, method: &str, decision: Permission) {
        let should_store = match decision {
            Permission::AlwaysDeny => true,
            Permission::AlwaysAllow => config.can_store(method),
            _ => false,
        };
        if should_store {
            record.permissions.lock().await.insert(method.to_string(), decision);
        }
    }

    /// Run `app_handler` under the same single-flight prompt slot used for
    /// permission checks (§4.F treats admission as just another prompt).
    /// Returns `None` if the session closed mid-prompt (§9 Open Question).
    pub async fn ask_admission(&self, record: &Arc<ApplicationRecord>, prompter: &dyn Prompter) -> Option<bool> {
        self.with_prompt_slot(record, async {
            tokio::select! {
                biased;
                _ = record.on_close.notified() => None,
                accepted = prompter.ask_admission(record) => Some(accepted),
            }
        })
        .await
    }
}

/// `normalize(key) = lowercase(strip('_', key))` (§4.C, §9).
pub fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Admission-time-only sanity filter (§4.C): group requested permission
/// keys by their normalized form; if two keys in the same group map to
/// different permission values, drop the whole group rather than guess
/// which one the application "meant".
pub fn drop_conflicting_groups(permissions: HashMap<String, Permission>) -> HashMap<String, Permission> {
    let mut groups: HashMap<String, Vec<(String, Permission)>> = HashMap::new();
    for (key, value) in permissions {
        groups.entry(normalize(&key)).or_default().push((key, value));
    }

    let mut result = HashMap::new();
    for (_, entries) in groups {
        let first_value = entries[0].1;
        let conflicting = entries.iter().any(|(_, v)| *v != first_value);
        if conflicting {
            continue;
        }
        for (key, value) in entries {
            result.insert(key, value);
        }
    }
    result
}
