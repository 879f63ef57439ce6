//! Standalone entry point: parses CLI flags, sets up logging, wires the
//! default in-memory collaborators (§1, `xswd_gateway::demo`), and serves
//! until a shutdown signal arrives.
//!
//! A real wallet binary would supply its own `WalletSigner`/`DaemonClient`/
//! `MethodRegistry`/`Prompter` and call `xswd_gateway::server::run` directly
//! instead of using this binary; this `main.rs` exists so the gateway is
//! runnable and inspectable on its own, the way the teacher's `main.rs`
//! wires `tracing_subscriber` + `clap::Parser` around its own daemon.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use xswd_gateway::config::{CliArgs, GatewayConfig};
use xswd_gateway::demo::{AcceptAllSigner, AutoAcceptPrompter, OfflineDaemon, StubNativeMethods};
use xswd_gateway::server;
use xswd_gateway::GatewayState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = GatewayConfig::from_args(args);

    tracing_subscriber::fmt().with_env_filter(config.log_level.clone()).compact().init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "xswd gateway starting");

    let signer = Arc::new(AcceptAllSigner::default());
    let address = signer.address.clone();
    let state = GatewayState::new(
        config,
        signer,
        Arc::new(OfflineDaemon),
        Arc::new(StubNativeMethods::new(address)),
        Arc::new(AutoAcceptPrompter),
    );

    server::run(state).await
}
