//! Built-in JSON-RPC methods the core exposes independent of wallet-native
//! methods (§6): `HasMethod`, `Subscribe`, `Unsubscribe`, `SignData`,
//! `CheckSignature`, `GetDaemon`.
//!
//! These go through the same permission gate as any other bound method
//! (hence their presence on the `no_store` default list) so they are
//! implemented as a `MethodRegistry` decorator wrapping the wallet's own
//! native-method registry, the way the teacher layers its `Runner` trait
//! (`daemon/src/session/runner.rs`) around a concrete backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::events;
use crate::model::ApplicationRecord;
use crate::wallet::{DaemonClient, MethodRegistry, WalletSigner};

pub const HAS_METHOD: &str = "HasMethod";
pub const SUBSCRIBE: &str = "Subscribe";
pub const UNSUBSCRIBE: &str = "Unsubscribe";
pub const SIGN_DATA: &str = "SignData";
pub const CHECK_SIGNATURE: &str = "CheckSignature";
pub const GET_DAEMON: &str = "GetDaemon";

const BUILTIN_NAMES: &[&str] = &[HAS_METHOD, SUBSCRIBE, UNSUBSCRIBE, SIGN_DATA, CHECK_SIGNATURE, GET_DAEMON];

pub struct CoreMethods {
    native: std::sync::Arc<dyn MethodRegistry>,
    signer: std::sync::Arc<dyn WalletSigner>,
    daemon: std::sync::Arc<dyn DaemonClient>,
}

impl CoreMethods {
    pub fn new(native: std::sync::Arc<dyn MethodRegistry>, signer: std::sync::Arc<dyn WalletSigner>, daemon: std::sync::Arc<dyn DaemonClient>) -> Self {
        Self { native, signer, daemon }
    }
}

#[async_trait]
impl MethodRegistry for CoreMethods {
    fn is_bound(&self, method: &str) -> bool {
        BUILTIN_NAMES.contains(&method) || self.native.is_bound(method)
    }

    async fn invoke(&self, record: &ApplicationRecord, method: &str, params: Value) -> anyhow::Result<Value> {
        match method {
            HAS_METHOD => {
                let name = params.get("name").and_then(Value::as_str).ok_or_else(|| anyhow::anyhow!("missing name"))?;
                Ok(Value::Bool(self.is_bound(name)))
            }
            SUBSCRIBE => {
                let event = params.get("event").and_then(Value::as_str).ok_or_else(|| anyhow::anyhow!("missing event"))?;
                Ok(Value::Bool(events::subscribe(record, event).await))
            }
            UNSUBSCRIBE => {
                let event = params.get("event").and_then(Value::as_str).ok_or_else(|| anyhow::anyhow!("missing event"))?;
                Ok(Value::Bool(events::unsubscribe(record, event).await))
            }
            SIGN_DATA => {
                let raw = params.as_str().ok_or_else(|| anyhow::anyhow!("expected hex byte string"))?;
                let data = hex::decode(raw)?;
                let signature = self.signer.sign_data(&data).await?;
                Ok(serde_json::json!({ "signature": hex::encode(signature) }))
            }
            CHECK_SIGNATURE => {
                let raw = params.as_str().ok_or_else(|| anyhow::anyhow!("expected hex byte string"))?;
                let signed = hex::decode(raw)?;
                let (signer, message) = self.signer.check_signature(&signed).await?;
                Ok(serde_json::json!({ "signer": signer, "message": hex::encode(message) }))
            }
            GET_DAEMON => match self.daemon.endpoint().await {
                Some(endpoint) => Ok(serde_json::json!({ "endpoint": endpoint })),
                None => Err(anyhow::anyhow!("daemon not connected")),
            },
            _ => self.native.invoke(record, method, params).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NoNativeMethods;

    #[async_trait]
    impl MethodRegistry for NoNativeMethods {
        fn is_bound(&self, _method: &str) -> bool {
            false
        }
        async fn invoke(&self, _record: &ApplicationRecord, _method: &str, _params: Value) -> anyhow::Result<Value> {
            anyhow::bail!("unbound")
        }
    }

    struct EchoSigner;

    #[async_trait]
    impl WalletSigner for EchoSigner {
        async fn verify_signature(&self, _message: &[u8], _signature: &[u8]) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
        async fn is_on_network(&self, _address: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn sign_data(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok(data.to_vec())
        }
        async fn check_signature(&self, signed: &[u8]) -> anyhow::Result<(String, Vec<u8>)> {
            Ok(("wallet-address".to_string(), signed.to_vec()))
        }
    }

    struct DisconnectedDaemon;

    #[async_trait]
    impl DaemonClient for DisconnectedDaemon {
        async fn is_online(&self) -> bool {
            false
        }
        async fn endpoint(&self) -> Option<String> {
            None
        }
        async fn call(&self, _method: &str, _params: Value) -> anyhow::Result<Value> {
            anyhow::bail!("offline")
        }
    }

    fn descriptor_record() -> std::sync::Arc<ApplicationRecord> {
        ApplicationRecord::new(
            &crate::model::ApplicationDescriptor {
                id: "a".repeat(64),
                name: "app".to_string(),
                description: "desc".to_string(),
                url: String::new(),
                signature: None,
                permissions: HashMap::new(),
            },
            HashMap::new(),
        )
    }

    fn methods() -> CoreMethods {
        CoreMethods::new(Arc::new(NoNativeMethods), Arc::new(EchoSigner), Arc::new(DisconnectedDaemon))
    }

    #[tokio::test]
    async fn has_method_reports_builtin_names_as_bound() {
        let m = methods();
        let record = descriptor_record();
        let result = m.invoke(&record, HAS_METHOD, serde_json::json!({ "name": "SignData" })).await.unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[tokio::test]
    async fn check_signature_of_sign_data_round_trips() {
        let m = methods();
        let record = descriptor_record();
        let message = hex::encode(b"hello");
        let signed = m.invoke(&record, SIGN_DATA, Value::String(message)).await.unwrap();
        let signature_hex = signed["signature"].as_str().unwrap().to_string();

        let checked = m.invoke(&record, CHECK_SIGNATURE, Value::String(signature_hex)).await.unwrap();
        assert_eq!(checked["signer"], "wallet-address");
        assert_eq!(hex::decode(checked["message"].as_str().unwrap()).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_daemon_errors_when_not_connected() {
        let m = methods();
        let record = descriptor_record();
        assert!(m.invoke(&record, GET_DAEMON, Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_go_through_events_module() {
        let m = methods();
        let record = descriptor_record();
        let subscribed = m.invoke(&record, SUBSCRIBE, serde_json::json!({ "event": "NewBalance" })).await.unwrap();
        assert_eq!(subscribed, Value::Bool(true));
        let unsubscribed = m.invoke(&record, UNSUBSCRIBE, serde_json::json!({ "event": "NewBalance" })).await.unwrap();
        assert_eq!(unsubscribed, Value::Bool(true));
    }
}
