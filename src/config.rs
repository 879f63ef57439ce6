//! Gateway configuration, built from CLI flags with a default layer (§6).
//!
//! Mirrors `DaemonConfig::new` in the teacher: CLI/env values passed as
//! `Some(..)` take priority, falling back to the constructor-level defaults.
//! Unlike the teacher, there is no `config.toml` layer or hot-reload watcher
//! — this spec has no configuration surface that changes at runtime.

use clap::Parser;

pub const DEFAULT_PORT: u16 = 44326;
pub const WS_PATH: &str = "/xswd";

/// `no_store` defaults for `NewXSWDServer` (§6): methods whose `AlwaysAllow`
/// decision is never persisted, because re-prompting is cheap or the
/// decision is inherently per-call (signing, connectivity checks).
pub const DEFAULT_NO_STORE: &[&str] = &[
    "Subscribe",
    "SignData",
    "CheckSignature",
    "GetDaemon",
    "query_key",
    "QueryKey",
];

#[derive(Debug, Clone, Parser)]
#[command(name = "xswd-gateway", about = "Wallet-side dApp authorization gateway")]
pub struct CliArgs {
    /// WebSocket listen port.
    #[arg(long, env = "XSWD_PORT")]
    pub port: Option<u16>,

    /// Bind address for the TCP listener.
    #[arg(long, env = "XSWD_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Always prompt for permissions on admission, discarding any requested
    /// permission map from the descriptor (§4.F).
    #[arg(long)]
    pub force_ask: bool,

    /// Prefix identifying daemon-proxied methods (§4.D).
    #[arg(long, env = "XSWD_DAEMON_PREFIX")]
    pub daemon_prefix: Option<String>,

    /// `tracing` `EnvFilter` directive, e.g. "info" or "debug,xswd_gateway=trace".
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub bind_address: String,
    pub force_ask: bool,
    pub no_store: Vec<String>,
    pub daemon_prefix: String,
    pub log_level: String,
}

impl GatewayConfig {
    /// The source's default constructor: `force_ask = true`.
    pub fn default_with_ask() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            force_ask: true,
            no_store: DEFAULT_NO_STORE.iter().map(|s| s.to_string()).collect(),
            daemon_prefix: "DERO.".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// The source's port constructor: `force_ask = false`, matching §6's
    /// documented asymmetry between the two constructors.
    pub fn with_port(port: u16) -> Self {
        Self {
            force_ask: false,
            ..Self::default_with_ask().with_port_value(port)
        }
    }

    fn with_port_value(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Fold CLI/env overrides (highest priority) onto the default layer.
    pub fn from_args(args: CliArgs) -> Self {
        let mut cfg = Self::default_with_ask();
        if let Some(port) = args.port {
            cfg.port = port;
        }
        if let Some(bind) = args.bind_address {
            cfg.bind_address = bind;
        }
        if args.force_ask {
            cfg.force_ask = true;
        }
        if let Some(prefix) = args.daemon_prefix {
            cfg.daemon_prefix = prefix;
        }
        if let Some(log) = args.log_level {
            cfg.log_level = log;
        }
        cfg
    }

    pub fn can_store(&self, method: &str) -> bool {
        !self.no_store.iter().any(|m| m == method)
    }
}
