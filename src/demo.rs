//! In-memory/test doubles for the four trait seams §1 declares out of scope
//! (`WalletSigner`, `DaemonClient`, `MethodRegistry`, `Prompter`).
//!
//! A concrete wallet binary supplies its own real implementations; these
//! exist so the gateway is independently runnable and testable without one
//! (§1, §4.G "Testing"). `src/main.rs` wires them up for standalone use;
//! `tests/` reaches for the same types to drive end-to-end scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::model::{ApplicationRecord, Permission};
use crate::wallet::{DaemonClient, MethodRegistry, Prompter, WalletSigner};

/// Accepts every signature as valid and reports every address as on-network
/// — standing in for real key material and network membership checks.
pub struct AcceptAllSigner {
    pub address: String,
}

impl Default for AcceptAllSigner {
    fn default() -> Self {
        Self {
            address: "demo1qqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq".to_string(),
        }
    }
}

#[async_trait]
impl WalletSigner for AcceptAllSigner {
    async fn verify_signature(&self, _message: &[u8], _signature: &[u8]) -> anyhow::Result<Option<String>> {
        Ok(Some(self.address.clone()))
    }

    async fn is_on_network(&self, _address: &str) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn sign_data(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    async fn check_signature(&self, signed: &[u8]) -> anyhow::Result<(String, Vec<u8>)> {
        Ok((self.address.clone(), signed.to_vec()))
    }
}

/// Reports permanently offline — the daemon proxy has nothing real to reach.
#[derive(Default)]
pub struct OfflineDaemon;

#[async_trait]
impl DaemonClient for OfflineDaemon {
    async fn is_online(&self) -> bool {
        false
    }

    async fn endpoint(&self) -> Option<String> {
        None
    }

    async fn call(&self, _method: &str, _params: Value) -> anyhow::Result<Value> {
        anyhow::bail!("no daemon configured")
    }
}

/// A handful of fake wallet-native methods (`GetAddress`, `GetBalance`) so
/// the gateway has something to dispatch to out of the box. Real wallet
/// binaries replace this with their actual method table.
pub struct StubNativeMethods {
    address: String,
}

impl StubNativeMethods {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into() }
    }
}

impl Default for StubNativeMethods {
    fn default() -> Self {
        Self::new(AcceptAllSigner::default().address)
    }
}

#[async_trait]
impl MethodRegistry for StubNativeMethods {
    fn is_bound(&self, method: &str) -> bool {
        matches!(method, "GetAddress" | "GetBalance")
    }

    async fn invoke(&self, _record: &ApplicationRecord, method: &str, _params: Value) -> anyhow::Result<Value> {
        match method {
            "GetAddress" => Ok(Value::String(self.address.clone())),
            "GetBalance" => Ok(serde_json::json!({ "balance": 0 })),
            other => anyhow::bail!("unbound method: {other}"),
        }
    }
}

/// Auto-accepts every admission and every permission prompt, logging what it
/// decided — a stand-in for the host UI's modal dialog.
#[derive(Default)]
pub struct AutoAcceptPrompter;

#[async_trait]
impl Prompter for AutoAcceptPrompter {
    async fn ask_admission(&self, record: &ApplicationRecord) -> bool {
        tracing::info!(app_id = %record.id, name = %record.name, "auto-accepting admission (demo prompter)");
        true
    }

    async fn ask_permission(&self, record: &ApplicationRecord, method: &str, _params: &Value) -> Permission {
        tracing::info!(app_id = %record.id, %method, "auto-allowing permission (demo prompter)");
        Permission::Allow
    }
}

/// A scripted prompter for tests: returns a fixed queue of permission
/// decisions in order, falling back to `Permission::Deny` once exhausted,
/// and a fixed admission answer.
pub struct ScriptedPrompter {
    admission: bool,
    decisions: Mutex<Vec<Permission>>,
}

impl ScriptedPrompter {
    pub fn new(admission: bool, decisions: Vec<Permission>) -> Arc<Self> {
        Arc::new(Self {
            admission,
            decisions: Mutex::new(decisions),
        })
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask_admission(&self, _record: &ApplicationRecord) -> bool {
        self.admission
    }

    async fn ask_permission(&self, _record: &ApplicationRecord, _method: &str, _params: &Value) -> Permission {
        let mut queue = self.decisions.lock().await;
        if queue.is_empty() {
            Permission::Deny
        } else {
            queue.remove(0)
        }
    }
}

/// A `MethodRegistry` whose bound set and results are supplied as a fixed
/// table — useful for exercising the dispatcher without a real wallet.
pub struct TableMethods {
    table: HashMap<String, Value>,
}

impl TableMethods {
    pub fn new(table: HashMap<String, Value>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl MethodRegistry for TableMethods {
    fn is_bound(&self, method: &str) -> bool {
        self.table.contains_key(method)
    }

    async fn invoke(&self, _record: &ApplicationRecord, method: &str, _params: Value) -> anyhow::Result<Value> {
        self.table.get(method).cloned().ok_or_else(|| anyhow::anyhow!("unbound method: {method}"))
    }
}
