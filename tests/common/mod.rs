//! Shared fixtures for the end-to-end integration suite (§8 "End-to-end
//! scenarios"): an in-memory websocket double plus a full `GatewayState`
//! builder wired with scripted collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::Value;
use xswd_gateway::config::GatewayConfig;
use xswd_gateway::demo::{AcceptAllSigner, OfflineDaemon, ScriptedPrompter, TableMethods};
use xswd_gateway::model::{ApplicationDescriptor, Permission};
use xswd_gateway::session::{Session, WsSink, WsSource};
use xswd_gateway::wallet::{MethodRegistry, Prompter, WalletSigner};
use xswd_gateway::GatewayState;

/// In-memory stand-in for a real socket: `inbound` is fed by the test,
/// `outbound` records every frame the gateway wrote back.
#[derive(Clone)]
pub struct MemoryTransport {
    pub inbound: Arc<StdMutex<VecDeque<String>>>,
    pub outbound: Arc<StdMutex<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new(inbound: Vec<String>) -> Self {
        Self {
            inbound: Arc::new(StdMutex::new(inbound.into())),
            outbound: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn push_inbound(&self, frame: String) {
        self.inbound.lock().unwrap().push_back(frame);
    }

    pub fn outbound_snapshot(&self) -> Vec<String> {
        self.outbound.lock().unwrap().clone()
    }
}

#[async_trait]
impl WsSource for MemoryTransport {
    async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        Ok(self.inbound.lock().unwrap().pop_front())
    }
}

#[async_trait]
impl WsSink for MemoryTransport {
    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        self.outbound.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn session_pair(inbound: Vec<String>) -> (Arc<Session>, MemoryTransport) {
    let transport = MemoryTransport::new(inbound);
    let session = Arc::new(Session::new(Box::new(transport.clone()), Box::new(transport.clone())));
    (session, transport)
}

pub fn valid_descriptor(id: &str) -> ApplicationDescriptor {
    ApplicationDescriptor {
        id: id.to_string(),
        name: "demo dApp".to_string(),
        description: "an integration-test dApp".to_string(),
        url: String::new(),
        signature: None,
        permissions: HashMap::new(),
    }
}

pub fn hex_id(byte: u8) -> String {
    hex::encode([byte; 32])
}

/// Build a full `GatewayState` for an integration test, with the wallet and
/// daemon doubles fixed and the method table / prompter supplied by the
/// caller so each scenario can script its own permission answers.
pub fn build_state(methods: HashMap<String, Value>, prompter: Arc<dyn Prompter>) -> GatewayState {
    let config = GatewayConfig::default_with_ask();
    let signer: Arc<dyn WalletSigner> = Arc::new(AcceptAllSigner::default());
    let daemon = Arc::new(OfflineDaemon);
    let native: Arc<dyn MethodRegistry> = Arc::new(TableMethods::new(methods));
    GatewayState::new(config, signer, daemon, native, prompter)
}

pub fn allow_once_prompter() -> Arc<ScriptedPrompter> {
    ScriptedPrompter::new(true, vec![Permission::Allow])
}
