//! Wallet-side authorization gateway: brokers JSON-RPC between untrusted
//! dApps and a local wallet over a websocket, gating every call through a
//! per-application permission table backed by a single-flight user prompt.

pub mod admission;
pub mod builtins;
pub mod config;
pub mod demo;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod model;
pub mod permission;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod session;
pub mod wallet;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::builtins::CoreMethods;
use crate::config::GatewayConfig;
use crate::dispatcher::DispatcherHandle;
use crate::permission::PermissionEngine;
use crate::registry::Registry;
use crate::wallet::{DaemonClient, MethodRegistry, Prompter, WalletSigner};

/// Everything a connection task needs, bundled once at startup and shared
/// by `Arc` clone — the analogue of the teacher's `AppContext`
/// (`daemon/src/lib.rs`).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<Registry>,
    pub permission_engine: Arc<PermissionEngine>,
    pub signer: Arc<dyn WalletSigner>,
    pub daemon: Arc<dyn DaemonClient>,
    pub methods: Arc<dyn MethodRegistry>,
    pub prompter: Arc<dyn Prompter>,
    pub dispatcher: DispatcherHandle,
    /// Set once by `server::run` on shutdown. Admission consults this after
    /// `app_handler` returns to implement §9's "accepted after shutdown"
    /// race: the registry's own `shutdown_all` only reaches records already
    /// inserted, so a connection still mid-admission needs this separate
    /// signal to know the server is going away.
    pub shutdown: Arc<AtomicBool>,
}

impl GatewayState {
    /// Wire up a fresh gateway: wraps `native_methods` in the built-in
    /// method layer (§6) and spawns the single central dispatch worker
    /// (§5) that every session's reader loop submits jobs to.
    pub fn new(config: GatewayConfig, signer: Arc<dyn WalletSigner>, daemon: Arc<dyn DaemonClient>, native_methods: Arc<dyn MethodRegistry>, prompter: Arc<dyn Prompter>) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(Registry::new());
        let permission_engine = Arc::new(PermissionEngine::new());
        let methods: Arc<dyn MethodRegistry> = Arc::new(CoreMethods::new(native_methods, signer.clone(), daemon.clone()));

        let dispatcher = DispatcherHandle::spawn(config.clone(), permission_engine.clone(), methods.clone(), daemon.clone(), prompter.clone());

        Self {
            config,
            registry,
            permission_engine,
            signer,
            daemon,
            methods,
            prompter,
            dispatcher,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }
}
