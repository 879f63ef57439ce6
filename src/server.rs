//! Transport & Runtime Shell (§4.G): TCP listener, websocket upgrade,
//! per-connection task spawn, and graceful shutdown.
//!
//! Grounded on the teacher's `ipc::run`/`ipc::make_shutdown_future`
//! (`daemon/src/ipc/mod.rs`) — a `tokio::select!` race between the accept
//! loop and a signal future, tearing the registry down on the way out.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use crate::admission;
use crate::dispatcher;
use crate::session::Session;
use crate::GatewayState;

/// Bind and serve until a shutdown signal arrives, then tear every live
/// session down.
pub async fn run(state: GatewayState) -> anyhow::Result<()> {
    let listener = TcpListener::bind((state.config.bind_address.as_str(), state.config.port)).await?;
    tracing::info!(bind = %state.config.bind_address, port = state.config.port, "gateway listening");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, draining connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, state).await {
                                tracing::warn!(err = %e, %peer, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(err = %e, "accept failed"),
                }
            }
        }
    }

    state.shutdown.store(true, std::sync::atomic::Ordering::SeqCst);
    state.registry.shutdown_all().await;
    Ok(())
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: GatewayState) -> anyhow::Result<()> {
    let origin_slot: Arc<StdMutex<Option<String>>> = Arc::new(StdMutex::new(None));
    let origin_slot_cb = origin_slot.clone();
    let capture_origin = move |request: &Request, response: Response| {
        if let Some(value) = request.headers().get("Origin") {
            if let Ok(text) = value.to_str() {
                *origin_slot_cb.lock().expect("origin mutex poisoned") = Some(text.to_string());
            }
        }
        Ok(response)
    };

    let ws = tokio_tungstenite::accept_hdr_async(stream, capture_origin).await?;
    let origin = origin_slot.lock().expect("origin mutex poisoned").clone();

    let session = Arc::new(Session::from_tungstenite(ws));
    tracing::debug!(%peer, "session upgraded, awaiting descriptor");

    let record = admission::admit(
        session.clone(),
        &state.registry,
        &state.permission_engine,
        &state.config,
        state.signer.as_ref(),
        state.methods.as_ref(),
        state.prompter.as_ref(),
        origin,
        &state.shutdown,
    )
    .await;

    let Some(record) = record else {
        return Ok(());
    };

    tracing::info!(app_id = %record.id, %peer, "application admitted, entering operating state");
    dispatcher::run_session(session, record, state.registry.clone(), state.dispatcher.clone()).await;
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
