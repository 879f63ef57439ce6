//! Request Dispatcher (§4.D): per-session reader loop plus the single
//! central worker that serially drains every session's requests, which is
//! what keeps at most one permission prompt outstanding at a time (§5).
//!
//! Grounded on the teacher's `ipc::mod::handle_connection`/`dispatch` split
//! (`daemon/src/ipc/mod.rs`) — a per-connection reader feeding a shared
//! dispatch point — generalized from one big method-name `match` to
//! permission-gated bound-method invocation plus daemon proxying.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::model::{ApplicationRecord, Permission, RpcRequest, RpcResponse};
use crate::permission::PermissionEngine;
use crate::registry::Registry;
use crate::session::Session;
use crate::wallet::{DaemonClient, MethodRegistry, Prompter};

struct Job {
    session: Arc<Session>,
    record: Arc<ApplicationRecord>,
    request: RpcRequest,
}

/// Handle to the single central dispatch worker. Cloning shares the same
/// worker — there is exactly one per running gateway.
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: mpsc::Sender<Job>,
}

impl DispatcherHandle {
    /// Spawn the worker and return a handle sessions can submit jobs to.
    pub fn spawn(config: Arc<GatewayConfig>, engine: Arc<PermissionEngine>, methods: Arc<dyn MethodRegistry>, daemon: Arc<dyn DaemonClient>, prompter: Arc<dyn Prompter>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(256);
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                process_job(job, &config, &engine, methods.as_ref(), daemon.as_ref(), prompter.as_ref()).await;
            }
        });
        Self { sender }
    }

    async fn submit(&self, job: Job) {
        let _ = self.sender.send(job).await;
    }
}

/// One session's reader loop (§4.D steps 1-4). Runs until the socket closes,
/// a read error occurs, the rate limiter empties, or the record is no
/// longer registered.
pub async fn run_session(session: Arc<Session>, record: Arc<ApplicationRecord>, registry: Arc<Registry>, dispatcher: DispatcherHandle) {
    loop {
        if !record.limiter.try_acquire() {
            send_error(&session, Value::Null, GatewayError::RateLimitExceeded).await;
            // Give jobs already handed to the dispatcher worker a chance to
            // finish before the registry drops this session out from under them.
            tokio::task::yield_now().await;
            registry.remove_by_id(&record.id).await;
            return;
        }

        if !registry.has_id(&record.id).await {
            return;
        }

        let text = match session.read().await {
            Ok(Some(text)) => text,
            Ok(None) | Err(_) => {
                tokio::task::yield_now().await;
                registry.remove_by_id(&record.id).await;
                return;
            }
        };

        match parse_frame(&text) {
            FrameOutcome::Single(request) => {
                dispatcher
                    .submit(Job {
                        session: session.clone(),
                        record: record.clone(),
                        request,
                    })
                    .await;
            }
            FrameOutcome::Batch => {
                send_error(&session, Value::Null, GatewayError::ParseError).await;
            }
            FrameOutcome::Invalid => {
                send_error(&session, Value::Null, GatewayError::ParseError).await;
            }
        }
    }
}

enum FrameOutcome {
    Single(RpcRequest),
    /// Well-formed JSON array: rejected unconditionally (§9 Open Question).
    Batch,
    Invalid,
}

fn parse_frame(text: &str) -> FrameOutcome {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(_)) => FrameOutcome::Batch,
        Ok(value) => match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => FrameOutcome::Single(request),
            Err(_) => FrameOutcome::Invalid,
        },
        Err(_) => FrameOutcome::Invalid,
    }
}

/// The central loop's per-request logic (§4.D). Runs serially for every
/// session, which is what bounds outstanding prompts to one at a time.
async fn process_job(job: Job, config: &GatewayConfig, engine: &PermissionEngine, methods: &dyn MethodRegistry, daemon: &dyn DaemonClient, prompter: &dyn Prompter) {
    let Job { session, record, request } = job;
    let method = request.method.as_str();
    let id = request.id.clone();

    if method.starts_with(&config.daemon_prefix) && !methods.is_bound(method) {
        return dispatch_to_daemon(&session, daemon, id, method, request.params).await;
    }

    if !methods.is_bound(method) {
        return send_error(&session, id, GatewayError::MethodNotFound(method.to_string())).await;
    }

    let decision = engine.evaluate(&record, config, prompter, method, &request.params).await;
    let Some(decision) = decision else {
        // Session closed while this permission prompt was outstanding;
        // there is no one left to answer.
        return;
    };

    if decision.is_positive() {
        match methods.invoke(&record, method, request.params).await {
            Ok(result) => {
                let _ = session.send(&RpcResponse::ok(id, result)).await;
            }
            Err(e) => send_error(&session, id, GatewayError::HandlerFailed(e)).await,
        }
        return;
    }

    let err = match decision {
        Permission::AlwaysDeny => GatewayError::PermissionAlwaysDenied,
        _ => GatewayError::PermissionDenied,
    };
    send_error(&session, id, err).await;
}

async fn dispatch_to_daemon(session: &Session, daemon: &dyn DaemonClient, id: Value, method: &str, params: Value) {
    if !daemon.is_online().await {
        return send_error(session, id, GatewayError::DaemonOffline).await;
    }
    match daemon.call(method, params).await {
        Ok(result) => {
            let _ = session.send(&RpcResponse::ok(id, result)).await;
        }
        Err(e) => send_error(session, id, GatewayError::DaemonError(e.to_string())).await,
    }
}

async fn send_error(session: &Session, id: Value, err: GatewayError) {
    let response = RpcResponse::err(id, err.code(), err.message());
    let _ = session.send(&response).await;
}
