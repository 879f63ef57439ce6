//! Session Connection (§4.A): one websocket, with independent send- and
//! receive-side mutexes so a frame is never interleaved with another while
//! reads and writes still proceed concurrently.
//!
//! Generalizes the teacher's `handle_connection` (`daemon/src/ipc/mod.rs`),
//! which calls `ws.split()` into a `SinkExt`/`StreamExt` pair and drives them
//! from one `tokio::select!` loop. Here the split halves are owned by the
//! `Session` type itself, behind a small transport trait so the engine can be
//! exercised against an in-memory double in tests (§4.G "Testing").

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::model::RpcResponse;

/// The receive half of a transport: yields text frames until the peer
/// closes or errors.
#[async_trait]
pub trait WsSource: Send {
    /// `Ok(None)` means the peer closed cleanly; `Err` is a read error.
    async fn recv(&mut self) -> anyhow::Result<Option<String>>;
}

/// The send half of a transport: writes whole text frames atomically.
#[async_trait]
pub trait WsSink: Send {
    async fn send(&mut self, text: String) -> anyhow::Result<()>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
impl WsSource for futures_util::stream::SplitStream<WebSocketStream<TcpStream>> {
    async fn recv(&mut self) -> anyhow::Result<Option<String>> {
        loop {
            match self.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl WsSink for futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message> {
    async fn send(&mut self, text: String) -> anyhow::Result<()> {
        SinkExt::send(self, Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        let _ = SinkExt::close(self).await;
        Ok(())
    }
}

/// One admitted or admitting websocket connection.
///
/// `close()` is idempotent and fatal: once called, subsequent `send`/`read`
/// calls observe the closed state and fail rather than touching the socket.
pub struct Session {
    sink: Mutex<Box<dyn WsSink>>,
    source: Mutex<Box<dyn WsSource>>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(sink: Box<dyn WsSink>, source: Box<dyn WsSource>) -> Self {
        Self {
            sink: Mutex::new(sink),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_tungstenite(ws: WebSocketStream<TcpStream>) -> Self {
        let (sink, source) = ws.split();
        Self::new(Box::new(sink), Box::new(source))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Serialize and write one frame. A no-op error if the session is closed.
    pub async fn send(&self, frame: &RpcResponse) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("session closed");
        }
        let text = serde_json::to_string(frame)?;
        let mut sink = self.sink.lock().await;
        sink.send(text).await
    }

    /// Write a raw, already-serialized frame (used for the authorization
    /// response and for event notifications, which are not `RpcResponse`
    /// for the admission case).
    pub async fn send_raw(&self, text: String) -> anyhow::Result<()> {
        if self.is_closed() {
            anyhow::bail!("session closed");
        }
        let mut sink = self.sink.lock().await;
        sink.send(text).await
    }

    /// Block for the next text frame. `Ok(None)` means the peer closed.
    pub async fn read(&self) -> anyhow::Result<Option<String>> {
        if self.is_closed() {
            return Ok(None);
        }
        let mut source = self.source.lock().await;
        source.recv().await
    }

    /// Idempotent close — safe to call from the reader loop, the shutdown
    /// path, and the registry's removal path concurrently.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sink = self.sink.lock().await;
        let _ = sink.close().await;
    }
}
