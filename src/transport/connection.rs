//! WebSocket connection and its I/O loop.
//!
//! One [`Connection`] wraps one dialled transport. Everything the transport
//! reports is forwarded, tagged with the connection's [`Epoch`], as a
//! [`TransportEvent`] on a channel owned by the
//! [`Controller`](super::Controller).
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming text frames from the endpoint
//! - Outgoing frames from the session
//! - Transport errors (reported as [`Error::WebSocket`], then the read side
//!   is parked until the controller closes the transport)
//! - Exactly one [`TransportEventKind::Closed`] when the loop exits
//!
//! Dropping the [`Connection`] handle closes the transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Epoch;

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the WebSocket stream.
type WsSink = SplitSink<WsStream, Message>;

/// Sender side of the transport event channel.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened to the transport of one epoch.
#[derive(Debug)]
pub struct TransportEvent {
    /// Connection attempt the event belongs to.
    pub epoch: Epoch,
    /// What happened.
    pub kind: TransportEventKind,
}

/// Kinds of transport events.
#[derive(Debug)]
pub enum TransportEventKind {
    /// Handshake completed; the handle is now live.
    Opened(Connection),
    /// A text frame arrived.
    Frame(String),
    /// The transport reported an error.
    Error(Error),
    /// The transport is gone (or never came up).
    Closed,
}

impl TransportEvent {
    #[inline]
    fn new(epoch: Epoch, kind: TransportEventKind) -> Self {
        Self { epoch, kind }
    }
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a text frame.
    Send(String),
    /// Close the transport.
    Close,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one live WebSocket transport.
pub struct Connection {
    /// Connection attempt this transport belongs to.
    epoch: Epoch,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("epoch", &self.epoch)
            .field("closed", &self.command_tx.is_closed())
            .finish()
    }
}

impl Connection {
    /// Dials `url` in the background.
    ///
    /// Reports [`TransportEventKind::Opened`] on success, followed by the
    /// transport's frames. If the handshake fails it reports an
    /// [`Error::Connection`] followed by [`TransportEventKind::Closed`].
    pub(crate) fn dial(url: Url, epoch: Epoch, events: TransportEventSender) {
        tokio::spawn(async move {
            debug!(%epoch, %url, "Dialling endpoint");

            match connect_async(url.as_str()).await {
                Ok((ws_stream, _response)) => {
                    info!(%epoch, "WebSocket connection established");
                    Self::start(ws_stream, epoch, events);
                }
                Err(e) => {
                    let error = Error::connection(format!("{url}: {e}"));
                    warn!(%epoch, %error, "Connection attempt failed");
                    let _ = events.send(TransportEvent::new(
                        epoch,
                        TransportEventKind::Error(error),
                    ));
                    let _ = events.send(TransportEvent::new(epoch, TransportEventKind::Closed));
                }
            }
        });
    }

    /// Hands the handle to the controller, then spawns the event loop.
    ///
    /// The `Opened` event is queued before the loop can forward any frame.
    fn start(ws_stream: WsStream, epoch: Epoch, events: TransportEventSender) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connection = Self { epoch, command_tx };

        if events
            .send(TransportEvent::new(
                epoch,
                TransportEventKind::Opened(connection),
            ))
            .is_err()
        {
            debug!(%epoch, "Controller gone before open");
            return;
        }

        tokio::spawn(Self::run_event_loop(ws_stream, command_rx, epoch, events));
    }

    /// Returns the epoch of this transport.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Queues a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has exited.
    pub fn send(&self, frame: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the event loop to close the transport.
    pub fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Close);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        epoch: Epoch,
        events: TransportEventSender,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut errored = false;

        loop {
            tokio::select! {
                // Incoming frames from the endpoint
                message = ws_read.next(), if !errored => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(%epoch, len = text.len(), "Frame received");
                            let event = TransportEvent::new(
                                epoch,
                                TransportEventKind::Frame(text.as_str().to_owned()),
                            );
                            if events.send(event).is_err() {
                                debug!(%epoch, "Controller gone");
                                let _ = ws_write.close().await;
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(%epoch, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(%epoch, error = %e, "WebSocket error");
                            errored = true;
                            let event = TransportEvent::new(
                                epoch,
                                TransportEventKind::Error(Error::from(e)),
                            );
                            if events.send(event).is_err() {
                                break;
                            }
                        }

                        None => {
                            debug!(%epoch, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the controller
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(frame)) => {
                            Self::handle_send(frame, &mut ws_write, epoch).await;
                        }

                        Some(ConnectionCommand::Close) => {
                            debug!(%epoch, "Close command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!(%epoch, "Connection handle dropped");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        let _ = events.send(TransportEvent::new(epoch, TransportEventKind::Closed));
        debug!(%epoch, "Event loop terminated");
    }

    /// Writes one frame to the socket.
    ///
    /// A failed write is not reported here: the read side observes the
    /// broken transport and takes the closure path.
    async fn handle_send(frame: String, ws_write: &mut WsSink, epoch: Epoch) {
        if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
            warn!(%epoch, error = %e, "Failed to send frame");
            return;
        }
        trace!(%epoch, "Frame sent");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const WAIT: Duration = Duration::from_secs(5);

    async fn bind() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url");
        (listener, url)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_dial_refused_reports_error_then_closed() {
        let (listener, url) = bind().await;
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        Connection::dial(url, Epoch::FIRST, tx);

        let event = next_event(&mut rx).await;
        assert_eq!(event.epoch, Epoch::FIRST);
        match event.kind {
            TransportEventKind::Error(error) => {
                assert!(matches!(error, Error::Connection { .. }));
                assert!(error.is_recoverable());
            }
            other => panic!("expected Error, got {other:?}"),
        }

        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Closed));
    }

    #[tokio::test]
    async fn test_frames_round_trip_then_close() {
        let (listener, url) = bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        Connection::dial(url, Epoch::FIRST, tx);

        let (stream, _) = listener.accept().await.expect("accept");
        let mut server = accept_async(stream).await.expect("upgrade");

        let TransportEventKind::Opened(connection) = next_event(&mut rx).await.kind else {
            panic!("expected Opened");
        };
        assert_eq!(connection.epoch(), Epoch::FIRST);

        connection.send("hello".into()).expect("send");
        let received = server.next().await.expect("frame").expect("ok");
        assert_eq!(received.into_text().expect("text").as_str(), "hello");

        server
            .send(Message::Text(r#"{"status":"END"}"#.into()))
            .await
            .expect("server send");
        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Frame(ref f) if f.contains("END")));

        connection.close();
        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Closed));
    }

    #[tokio::test]
    async fn test_remote_close_reports_closed_once() {
        let (listener, url) = bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        Connection::dial(url, Epoch::FIRST, tx);

        let (stream, _) = listener.accept().await.expect("accept");
        let mut server = accept_async(stream).await.expect("upgrade");
        let _connection = match next_event(&mut rx).await.kind {
            TransportEventKind::Opened(c) => c,
            other => panic!("expected Opened, got {other:?}"),
        };

        server.close(None).await.expect("server close");

        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Closed));
        // Loop has exited: either nothing more arrives or the channel closes.
        let after = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(matches!(after, Err(_) | Ok(None)));
    }

    #[tokio::test]
    async fn test_protocol_error_parks_until_closed() {
        let (listener, url) = bind().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        Connection::dial(url, Epoch::FIRST, tx);

        let (stream, _) = listener.accept().await.expect("accept");
        let mut server = accept_async(stream).await.expect("upgrade");
        let connection = match next_event(&mut rx).await.kind {
            TransportEventKind::Opened(c) => c,
            other => panic!("expected Opened, got {other:?}"),
        };

        // FIN + reserved opcode 0x3, empty payload.
        server.get_mut().write_all(&[0x83, 0x00]).await.expect("raw write");

        match next_event(&mut rx).await.kind {
            TransportEventKind::Error(error) => {
                assert!(matches!(error, Error::WebSocket(_)));
                assert!(error.is_connection_error());
            }
            other => panic!("expected Error, got {other:?}"),
        }

        // Reads stay parked until the owner closes the transport.
        let quiet = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(quiet.is_err());

        connection.close();
        let event = next_event(&mut rx).await;
        assert!(matches!(event.kind, TransportEventKind::Closed));
    }
}
