//! Admission Controller (§4.F): validates the first frame from a freshly
//! upgraded websocket, verifies its signature, normalizes any requested
//! permissions, and asks the user whether to accept the connection.
//!
//! Grounded on the teacher's `ipc::handle_connection` auth-challenge-first-
//! frame pattern (`daemon/src/ipc/mod.rs`), generalized from a single bearer
//! token comparison to full descriptor parsing, signature verification, and
//! permission normalization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::model::{ApplicationDescriptor, ApplicationRecord, AuthorizationResponse, Permission, MAX_PERMISSIONS, MAX_SIGNATURE_LEN, MAX_STRING_LEN};
use crate::permission::{self, PermissionEngine};
use crate::registry::Registry;
use crate::session::Session;
use crate::wallet::{MethodRegistry, Prompter, WalletSigner};

/// Drive one session from socket-upgrade through admission. Returns the new
/// `ApplicationRecord` on acceptance, or `None` if the session was rejected
/// or closed for any reason — there is nothing further for the caller to do
/// in the `None` case.
#[allow(clippy::too_many_arguments)]
pub async fn admit(
    session: Arc<Session>,
    registry: &Registry,
    engine: &PermissionEngine,
    config: &GatewayConfig,
    signer: &dyn WalletSigner,
    methods: &dyn MethodRegistry,
    prompter: &dyn Prompter,
    origin: Option<String>,
    shutdown: &AtomicBool,
) -> Option<Arc<ApplicationRecord>> {
    let raw = match session.read().await {
        Ok(Some(text)) => text,
        _ => {
            session.close().await;
            return None;
        }
    };

    let mut descriptor: ApplicationDescriptor = match serde_json::from_str(&raw) {
        Ok(d) => d,
        Err(_) => {
            reject(&session, "Invalid app data format").await;
            return None;
        }
    };

    if registry.has_id(&descriptor.id).await {
        reject(&session, "App ID is already used").await;
        return None;
    }

    if let Err(message) = validate_descriptor(&mut descriptor, origin.as_deref()) {
        reject(&session, message).await;
        return None;
    }

    if let Some(signature) = descriptor.signature.clone() {
        match verify_descriptor_signature(signer, &descriptor.id, &signature).await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                reject(&session, "Invalid application signature").await;
                return None;
            }
        }
    } else if !descriptor.permissions.is_empty() {
        reject(&session, "Application is requesting permissions without signature").await;
        return None;
    }

    let permissions = if config.force_ask {
        HashMap::new()
    } else {
        normalize_permissions(descriptor.permissions.clone(), config, methods)
    };

    let record = ApplicationRecord::new(&descriptor, permissions);

    match engine.ask_admission(&record, prompter).await {
        // Server shut down while this prompt was outstanding: drop the
        // record silently, no admission response (§7, §9 Open Question).
        None => {
            session.close().await;
            None
        }
        Some(true) => {
            if registry.insert(session.clone(), record.clone()).await.is_err() {
                reject(&session, "App ID is already used").await;
                return None;
            }
            // The registry's own shutdown path only reaches records already
            // inserted; a connection that raced insert against a shutdown
            // landing in between needs this separate check so it isn't left
            // registered after the server has otherwise torn everything down
            // (§9 Open Question).
            if shutdown.load(Ordering::SeqCst) {
                registry.remove_by_id(&record.id).await;
                return None;
            }
            accept(&session).await;
            Some(record)
        }
        Some(false) => {
            reject(&session, "User has rejected connection request").await;
            None
        }
    }
}

async fn verify_descriptor_signature(signer: &dyn WalletSigner, id: &str, signature: &[u8]) -> anyhow::Result<bool> {
    let signer_address = match signer.verify_signature(id.as_bytes(), signature).await? {
        Some(address) => address,
        None => return Ok(false),
    };
    signer.is_on_network(&signer_address).await
}

async fn accept(session: &Session) {
    send_authorization(session, true, "User has authorized the application").await;
}

async fn reject(session: &Session, message: &str) {
    send_authorization(session, false, message).await;
    session.close().await;
}

async fn send_authorization(session: &Session, accepted: bool, message: &str) {
    let response = AuthorizationResponse {
        message: message.to_string(),
        accepted,
    };
    if let Ok(text) = serde_json::to_string(&response) {
        let _ = session.send_raw(text).await;
    }
}

/// Field-level validation from §3, including the Origin back-fill/equality
/// rule for `url`. Mutates `descriptor.url` in place on back-fill.
fn validate_descriptor(descriptor: &mut ApplicationDescriptor, origin: Option<&str>) -> Result<(), &'static str> {
    if !is_lowercase_hex64(&descriptor.id) {
        return Err("Invalid app data format");
    }
    if !is_valid_ascii_field(&descriptor.name) || !is_valid_ascii_field(&descriptor.description) {
        return Err("Invalid app data format");
    }

    if let Some(origin) = origin {
        if descriptor.url.is_empty() {
            descriptor.url = origin.to_string();
        } else if descriptor.url != origin {
            return Err("Invalid app data format");
        }
    }

    if !descriptor.url.is_empty() {
        if descriptor.url.len() > MAX_STRING_LEN {
            return Err("Invalid app data format");
        }
        if !descriptor.url.starts_with("http://") && !descriptor.url.starts_with("https://") {
            return Err("Invalid app data format");
        }
    }

    if let Some(signature) = &descriptor.signature {
        if signature.len() > MAX_SIGNATURE_LEN {
            return Err("Invalid app data format");
        }
    }

    if descriptor.permissions.len() > MAX_PERMISSIONS {
        return Err("Invalid app data format");
    }

    Ok(())
}

fn is_lowercase_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn is_valid_ascii_field(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_STRING_LEN && s.is_ascii()
}

/// §4.F filter order (i)-(v), reusing the engine's normalized-conflict
/// check (§4.C) as the final step.
fn normalize_permissions(permissions: HashMap<String, Permission>, config: &GatewayConfig, methods: &dyn MethodRegistry) -> HashMap<String, Permission> {
    let filtered: HashMap<String, Permission> = permissions
        .into_iter()
        .filter(|(key, _)| !key.starts_with(&config.daemon_prefix))
        .filter(|(_, value)| !matches!(value, Permission::Allow | Permission::Deny))
        .filter(|(key, _)| methods.is_bound(key))
        .filter(|(key, value)| !(*value == Permission::AlwaysAllow && !config.can_store(key)))
        .collect();
    permission::drop_conflicting_groups(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::session_pair;
    use async_trait::async_trait;
    use serde_json::Value;

    struct AcceptingSigner {
        on_network: bool,
    }

    #[async_trait]
    impl WalletSigner for AcceptingSigner {
        async fn verify_signature(&self, message: &[u8], _signature: &[u8]) -> anyhow::Result<Option<String>> {
            let _ = message;
            Ok(Some("addr1".to_string()))
        }
        async fn is_on_network(&self, _address: &str) -> anyhow::Result<bool> {
            Ok(self.on_network)
        }
        async fn sign_data(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok(data.to_vec())
        }
        async fn check_signature(&self, signed: &[u8]) -> anyhow::Result<(String, Vec<u8>)> {
            Ok(("addr1".to_string(), signed.to_vec()))
        }
    }

    struct AllBoundMethods;

    #[async_trait]
    impl MethodRegistry for AllBoundMethods {
        fn is_bound(&self, _method: &str) -> bool {
            true
        }
        async fn invoke(&self, _record: &ApplicationRecord, _method: &str, _params: Value) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    struct FixedPrompter {
        accept: bool,
    }

    #[async_trait]
    impl Prompter for FixedPrompter {
        async fn ask_admission(&self, _record: &ApplicationRecord) -> bool {
            self.accept
        }
        async fn ask_permission(&self, _record: &ApplicationRecord, _method: &str, _params: &Value) -> Permission {
            Permission::Ask
        }
    }

    fn valid_id() -> String {
        "7".repeat(64)
    }

    fn descriptor(id: &str) -> ApplicationDescriptor {
        ApplicationDescriptor {
            id: id.to_string(),
            name: "demo".to_string(),
            description: "a demo app".to_string(),
            url: String::new(),
            signature: None,
            permissions: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn accepts_valid_descriptor_with_no_signature_or_permissions() {
        let id = valid_id();
        let frame = serde_json::to_string(&descriptor(&id)).unwrap();
        let (session, transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let registry = Registry::new();
        let engine = PermissionEngine::new();
        let config = GatewayConfig::default_with_ask();
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: true };

        admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &AtomicBool::new(false)).await;

        assert!(registry.has_id(&id).await);
        let outbound = transport.outbound_snapshot();
        assert_eq!(outbound.len(), 1);
        assert!(outbound[0].contains("\"accepted\":true"));
    }

    #[tokio::test]
    async fn rejects_duplicate_id() {
        let id = valid_id();
        let registry = Registry::new();
        let (existing_session, _t) = session_pair(vec![]);
        registry.insert(Arc::new(existing_session), ApplicationRecord::new(&descriptor(&id), HashMap::new())).await.unwrap();

        let frame = serde_json::to_string(&descriptor(&id)).unwrap();
        let (session, transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let engine = PermissionEngine::new();
        let config = GatewayConfig::default_with_ask();
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: true };

        admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &AtomicBool::new(false)).await;

        let outbound = transport.outbound_snapshot();
        assert!(outbound[0].contains("App ID is already used"));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn rejects_permissions_without_signature() {
        let id = valid_id();
        let mut d = descriptor(&id);
        d.permissions.insert("GetAddress".to_string(), Permission::AlwaysAllow);
        let frame = serde_json::to_string(&d).unwrap();
        let (session, transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let registry = Registry::new();
        let engine = PermissionEngine::new();
        let config = GatewayConfig::default_with_ask();
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: true };

        admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &AtomicBool::new(false)).await;

        let outbound = transport.outbound_snapshot();
        assert!(outbound[0].contains("Application is requesting permissions without signature"));
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn rejection_by_user_closes_session() {
        let id = valid_id();
        let frame = serde_json::to_string(&descriptor(&id)).unwrap();
        let (session, transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let registry = Registry::new();
        let engine = PermissionEngine::new();
        let config = GatewayConfig::default_with_ask();
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: false };

        admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &AtomicBool::new(false)).await;

        assert!(!registry.has_id(&id).await);
        assert!(session.is_closed());
        let outbound = transport.outbound_snapshot();
        assert!(outbound[0].contains("User has rejected connection request"));
    }

    #[tokio::test]
    async fn force_ask_discards_requested_permissions() {
        let id = valid_id();
        let mut d = descriptor(&id);
        d.signature = Some(vec![1, 2, 3]);
        d.permissions.insert("GetAddress".to_string(), Permission::AlwaysAllow);
        let frame = serde_json::to_string(&d).unwrap();
        let (session, _transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let registry = Registry::new();
        let engine = PermissionEngine::new();
        let mut config = GatewayConfig::default_with_ask();
        config.force_ask = true;
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: true };

        admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &AtomicBool::new(false)).await;

        assert!(registry.has_id(&id).await);
    }

    #[test]
    fn normalize_permissions_applies_filter_order() {
        let config = GatewayConfig::default_with_ask();
        let methods = AllBoundMethods;
        let mut perms = HashMap::new();
        perms.insert("DERO.GetInfo".to_string(), Permission::AlwaysAllow);
        perms.insert("SomeMethod".to_string(), Permission::Allow);
        perms.insert("SignData".to_string(), Permission::AlwaysAllow);
        perms.insert("GetAddress".to_string(), Permission::AlwaysAllow);

        let result = normalize_permissions(perms, &config, &methods);
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("GetAddress"), Some(&Permission::AlwaysAllow));
    }

    #[test]
    fn url_backfills_from_origin_when_empty() {
        let mut d = descriptor(&valid_id());
        validate_descriptor(&mut d, Some("https://example.com")).unwrap();
        assert_eq!(d.url, "https://example.com");
    }

    #[test]
    fn url_mismatch_with_origin_is_rejected() {
        let mut d = descriptor(&valid_id());
        d.url = "https://other.example".to_string();
        assert!(validate_descriptor(&mut d, Some("https://example.com")).is_err());
    }

    #[test]
    fn non_hex_id_is_rejected() {
        let mut d = descriptor("not-a-valid-id");
        assert!(validate_descriptor(&mut d, None).is_err());
    }

    #[tokio::test]
    async fn accept_after_shutdown_drops_record_silently() {
        let id = valid_id();
        let frame = serde_json::to_string(&descriptor(&id)).unwrap();
        let (session, transport) = session_pair(vec![frame]);
        let session = Arc::new(session);
        let registry = Registry::new();
        let engine = PermissionEngine::new();
        let config = GatewayConfig::default_with_ask();
        let signer = AcceptingSigner { on_network: true };
        let methods = AllBoundMethods;
        let prompter = FixedPrompter { accept: true };
        let shutdown = AtomicBool::new(true);

        let record = admit(session.clone(), &registry, &engine, &config, &signer, &methods, &prompter, None, &shutdown).await;

        assert!(record.is_none());
        assert!(!registry.has_id(&id).await);
        assert!(session.is_closed());
        // No authorization response at all — the drop is silent (§9 Open Question).
        assert!(transport.outbound_snapshot().is_empty());
    }
}
