//! Trait seams for the collaborators this crate consumes but does not
//! implement (§1 Out of scope): the wallet primitive, the upstream daemon
//! RPC, the bound native method handlers, and the host UI prompt surface.
//!
//! Mirrors the teacher's `session::runner::Runner` pattern: an `#[async_trait]`
//! interface the core dispatches against, with the concrete implementation
//! supplied by whatever binary wires the gateway up.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{ApplicationRecord, Permission};

/// Signing, verification, and address-identity operations backed by the
/// wallet's private key material. The gateway never sees a private key;
/// it only calls through this trait.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Verify that `signature` is a valid signature over `message` and
    /// return the signer's address if so.
    async fn verify_signature(&self, message: &[u8], signature: &[u8]) -> anyhow::Result<Option<String>>;

    /// True iff `address` belongs to the wallet's configured native network
    /// (e.g. mainnet vs. testnet).
    async fn is_on_network(&self, address: &str) -> anyhow::Result<bool>;

    /// Sign an arbitrary payload with the wallet's key, for the `SignData`
    /// built-in method (§6).
    async fn sign_data(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Recover the signer address and original message for the
    /// `CheckSignature` built-in method (§6).
    async fn check_signature(&self, signed: &[u8]) -> anyhow::Result<(String, Vec<u8>)>;
}

/// Upstream node RPC, reached by proxy for daemon-prefixed methods (§4.D).
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// True iff the daemon connection is currently up.
    async fn is_online(&self) -> bool;

    /// The daemon's own endpoint, for the `GetDaemon` built-in method (§6).
    /// `None` when not connected.
    async fn endpoint(&self) -> Option<String>;

    /// Relay one JSON-RPC call to the daemon and return its `result` value.
    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value>;
}

/// The set of wallet-native JSON-RPC methods bound locally (address,
/// balance, transfer, etc.) — implemented by the wallet binary, not here.
#[async_trait]
pub trait MethodRegistry: Send + Sync {
    /// True iff `method` is a bound local method (used by `HasMethod`, §6,
    /// and by the dispatcher to distinguish `METHOD_NOT_FOUND` from a
    /// permission check, §4.D).
    fn is_bound(&self, method: &str) -> bool;

    /// Invoke a bound method with the calling application's record.
    async fn invoke(&self, record: &ApplicationRecord, method: &str, params: Value) -> anyhow::Result<Value>;
}

/// The host UI surface: a single modal dialog the user answers, mediated by
/// the single global prompt mutex (§4.C, §5).
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask the user to accept or reject a new application connection.
    async fn ask_admission(&self, record: &ApplicationRecord) -> bool;

    /// Ask the user to decide a permission for one method call.
    async fn ask_permission(&self, record: &ApplicationRecord, method: &str, params: &Value) -> Permission;
}
