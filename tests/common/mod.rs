//! Shared helpers for integration tests.
//!
//! - Scripted local WebSocket endpoint
//! - Snapshot waiting with timeouts
//! - Logging initialization

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use code_doctor::{Session, SessionSnapshot};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Backoff base used by tests so reconnects happen quickly.
pub const FAST_RETRY: Duration = Duration::from_millis(20);

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockEndpoint
// ============================================================================

/// Local stand-in for the review endpoint.
pub struct MockEndpoint {
    listener: TcpListener,
    url: String,
}

impl MockEndpoint {
    /// Binds to a random localhost port.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            url: format!("ws://127.0.0.1:{port}"),
        })
    }

    /// Returns the `ws://` URL clients should dial.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accepts the next client and completes the WebSocket upgrade.
    pub async fn accept(&self) -> Result<ClientConn> {
        let (stream, _) = timeout(WAIT, self.listener.accept())
            .await
            .context("no client connected in time")??;
        let ws = accept_async(stream).await?;
        Ok(ClientConn { ws })
    }

    /// Returns `true` if a client connects within `wait`.
    pub async fn connects_within(&self, wait: Duration) -> bool {
        timeout(wait, self.listener.accept()).await.is_ok()
    }
}

// ============================================================================
// ClientConn
// ============================================================================

/// Server side of one accepted client connection.
pub struct ClientConn {
    ws: WebSocketStream<TcpStream>,
}

impl ClientConn {
    /// Receives the next text frame as JSON.
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            let message = timeout(WAIT, self.ws.next())
                .await
                .context("no frame in time")?
                .ok_or_else(|| anyhow!("client went away"))??;

            if let Message::Text(text) = message {
                return Ok(serde_json::from_str(text.as_str())?);
            }
        }
    }

    /// Sends one raw text frame.
    pub async fn send_raw(&mut self, frame: &str) -> Result<()> {
        self.ws.send(Message::Text(frame.to_owned().into())).await?;
        Ok(())
    }

    /// Writes raw bytes to the socket, bypassing WebSocket framing.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ws.get_mut().write_all(bytes).await?;
        Ok(())
    }

    /// Sends one JSON frame.
    pub async fn send_json(&mut self, value: Value) -> Result<()> {
        self.send_raw(&value.to_string()).await
    }

    /// Sends several JSON frames in order.
    pub async fn send_all(&mut self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        for value in values {
            self.send_json(value).await?;
        }
        Ok(())
    }

    /// Closes the connection from the server side.
    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }

    /// Waits until the client closes or drops the connection.
    pub async fn expect_closed(mut self) -> Result<()> {
        loop {
            match timeout(WAIT, self.ws.next())
                .await
                .context("client did not close in time")?
            {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Ok(()),
                Some(Ok(_)) => {}
            }
        }
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Waits until the session's snapshot satisfies `predicate`.
pub async fn wait_until(
    session: &Session,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> Result<SessionSnapshot> {
    let mut rx: watch::Receiver<SessionSnapshot> = session.subscribe();
    let snapshot = timeout(WAIT, rx.wait_for(predicate))
        .await
        .context("condition not reached in time")??
        .clone();
    Ok(snapshot)
}

/// Starts a session against `endpoint` with fast retries.
pub async fn start_session(endpoint: &MockEndpoint) -> Result<Session> {
    init_logging();
    let session = Session::builder()
        .url(endpoint.url())
        .base_delay(FAST_RETRY)
        .max_delay(FAST_RETRY * 4)
        .connect()
        .await?;
    Ok(session)
}
