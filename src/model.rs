//! Wire and server-side types shared across the gateway: the application
//! descriptor clients present on connect, the permission lattice, and the
//! server-side record created once an application is admitted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::rate_limit::TokenBucket;

/// Maximum byte length of `name`, `description`, and `url` fields.
pub const MAX_STRING_LEN: usize = 255;
/// Maximum byte length of a signature.
pub const MAX_SIGNATURE_LEN: usize = 512;
/// Maximum number of requested permission entries.
pub const MAX_PERMISSIONS: usize = 255;

/// Identity descriptor a dApp presents as the first frame after connecting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub url: String,
    /// Raw signature bytes, base64 or hex depending on transport convention;
    /// we treat it as an opaque byte string handed to `WalletSigner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
    #[serde(default)]
    pub permissions: HashMap<String, Permission>,
}

/// Closed permission lattice. `Allow`/`Deny` are one-shot; the `Always*`
/// variants are the only ones ever persisted in an `ApplicationRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Permission {
    Ask,
    Allow,
    Deny,
    AlwaysAllow,
    AlwaysDeny,
}

impl Permission {
    /// True iff this value authorizes the call (`Allow` or `AlwaysAllow`).
    pub fn is_positive(self) -> bool {
        matches!(self, Permission::Allow | Permission::AlwaysAllow)
    }

    /// True iff this value is eligible for persistence — only the sticky
    /// variants are ever written into `ApplicationRecord::permissions`.
    pub fn is_persistable(self) -> bool {
        matches!(self, Permission::AlwaysAllow | Permission::AlwaysDeny)
    }
}

/// Server-side record created on successful admission (§3).
///
/// The registry is the sole owner; sessions look records up by id rather than
/// holding a strong reference, so a record's lifetime tracks `Registry`
/// membership exactly (§9 "back-reference between record and session").
pub struct ApplicationRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub permissions: Mutex<HashMap<String, Permission>>,
    pub registered_events: Mutex<HashSet<String>>,
    /// Fired exactly once, by whichever teardown path reaches this record
    /// first while `is_requesting` is true (§3 Lifecycles).
    pub on_close: Notify,
    pub is_requesting: AtomicBool,
    pub limiter: TokenBucket,
}

impl ApplicationRecord {
    pub fn new(descriptor: &ApplicationDescriptor, permissions: HashMap<String, Permission>) -> Arc<Self> {
        Arc::new(Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            url: descriptor.url.clone(),
            permissions: Mutex::new(permissions),
            registered_events: Mutex::new(HashSet::new()),
            on_close: Notify::new(),
            is_requesting: AtomicBool::new(false),
            limiter: TokenBucket::new(10.0, 20.0),
        })
    }

    /// Signal any prompt currently blocked on this record's `on_close`,
    /// but only once — repeated teardown paths (close, shutdown, removal)
    /// may all race to call this for the same record.
    pub fn signal_close(&self) {
        if self.is_requesting.load(Ordering::SeqCst) {
            self.on_close.notify_waiters();
        }
    }
}

/// A single JSON-RPC 2.0 request, as received after a session is admitted.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A single JSON-RPC 2.0 response, sent back for exactly one request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorBody {
    pub code: i32,
    pub message: String,
}

impl RpcResponse {
    pub fn ok(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: serde_json::Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// An unsolicited event notification — `id` is always empty per §6.
    pub fn notification(event: &str, value: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: serde_json::Value::String(String::new()),
            result: Some(serde_json::json!({ "event": event, "value": value })),
            error: None,
        }
    }
}

/// First server → client frame, sent once admission concludes (§6).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationResponse {
    pub message: String,
    pub accepted: bool,
}
