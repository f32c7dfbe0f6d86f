//! Connection lifecycle controller.
//!
//! Owns the single logical connection: the [`Lifecycle`] state machine, the
//! one live [`Connection`] and the one pending retry timer. Transport events
//! go in through [`Controller::handle`]; what the session needs to know comes
//! out as a [`ControllerOutput`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, TimerId};

use super::connection::{Connection, TransportEvent, TransportEventKind, TransportEventSender};
use super::lifecycle::{ConnectionState, Lifecycle, ReadyKind};
use super::backoff::{Backoff, MAX_DELAY_LIMIT};

// ============================================================================
// ControllerOutput
// ============================================================================

/// What the controller reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerOutput {
    /// The connection is open and accepts sends.
    Ready(ReadyKind),
    /// A frame arrived on the live transport.
    Frame(String),
    /// The live transport closed.
    Closed {
        /// Delay until the next attempt, `None` after shutdown.
        retry_in: Option<Duration>,
    },
}

// ============================================================================
// PendingRetry
// ============================================================================

/// The armed reconnect timer.
#[derive(Debug, Clone, Copy)]
struct PendingRetry {
    timer: TimerId,
    deadline: Instant,
}

// ============================================================================
// Controller
// ============================================================================

/// Drives one logical connection through its lifecycle.
#[derive(Debug)]
pub struct Controller {
    /// Endpoint to dial.
    url: Url,
    /// Pure state machine.
    lifecycle: Lifecycle,
    /// Live transport, present only while its epoch is current.
    connection: Option<Connection>,
    /// Armed retry timer.
    retry: Option<PendingRetry>,
    /// Handed to every dialled transport.
    events_tx: TransportEventSender,
}

impl Controller {
    /// Creates the controller and dials the first connection immediately.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// Returns the controller and the receiver its transports report to;
    /// every event from that receiver must be passed to [`Self::handle`].
    #[must_use]
    pub fn start(url: Url, backoff: Backoff) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let lifecycle = Lifecycle::new(backoff);

        let controller = Self {
            url,
            lifecycle,
            connection: None,
            retry: None,
            events_tx,
        };
        controller.dial(controller.lifecycle.epoch());

        (controller, events_rx)
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Returns `true` if the connection accepts sends.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lifecycle.check_send().is_ok()
    }

    /// Returns the retry counter.
    #[inline]
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.lifecycle.retry_count()
    }

    /// Returns the armed retry timer and when it fires.
    #[inline]
    #[must_use]
    pub fn retry_deadline(&self) -> Option<(TimerId, Instant)> {
        self.retry.map(|r| (r.timer, r.deadline))
    }

    /// Sends an encoded request frame.
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] unless the state is `OPEN`
    /// - [`Error::ConnectionClosed`] if the transport loop already exited
    pub fn send(&self, frame: String) -> Result<()> {
        let epoch = self.lifecycle.check_send()?;
        let connection = self
            .connection
            .as_ref()
            .filter(|c| c.epoch() == epoch)
            .ok_or(Error::ConnectionClosed)?;

        connection.send(frame)
    }

    /// Applies one transport event.
    pub fn handle(&mut self, event: TransportEvent) -> Option<ControllerOutput> {
        let TransportEvent { epoch, kind } = event;

        match kind {
            TransportEventKind::Opened(connection) => match self.lifecycle.on_open(epoch) {
                Some(kind) => {
                    info!(%epoch, ?kind, "Session connected");
                    self.connection = Some(connection);
                    Some(ControllerOutput::Ready(kind))
                }
                None => {
                    connection.close();
                    None
                }
            },

            TransportEventKind::Frame(frame) => {
                if self.lifecycle.is_current(epoch) && self.state() == ConnectionState::Open {
                    Some(ControllerOutput::Frame(frame))
                } else {
                    trace!(%epoch, "Dropping frame from stale transport");
                    None
                }
            }

            TransportEventKind::Error(error) => {
                if let Some(epoch) = self.lifecycle.on_error(epoch) {
                    warn!(
                        %epoch,
                        %error,
                        recoverable = error.is_recoverable(),
                        "Transport error, closing"
                    );
                    self.close_transport(epoch);
                }
                None
            }

            TransportEventKind::Closed => {
                if !self.lifecycle.is_current(epoch) || self.state() == ConnectionState::Closed {
                    trace!(%epoch, "Ignoring stale close");
                    return None;
                }

                self.connection = None;
                let retry = self.lifecycle.on_closed(epoch);

                if let Some(retry) = retry {
                    self.retry = Some(PendingRetry {
                        timer: retry.timer,
                        deadline: Instant::now() + retry.delay.min(MAX_DELAY_LIMIT),
                    });
                }

                info!(%epoch, retry = retry.is_some(), "Session disconnected");
                Some(ControllerOutput::Closed {
                    retry_in: retry.map(|r| r.delay),
                })
            }
        }
    }

    /// Handles an elapsed retry timer by dialling a new transport.
    pub fn on_retry_elapsed(&mut self, timer: TimerId) {
        if self.retry.is_some_and(|r| r.timer == timer) {
            self.retry = None;
        }

        if let Some(epoch) = self.lifecycle.on_retry_elapsed(timer) {
            self.dial(epoch);
        }
    }

    /// Stops reconnecting and closes the live transport.
    ///
    /// Idempotent. The state is `CLOSED` from here on and later transport
    /// events are ignored.
    pub fn shutdown(&mut self) {
        self.retry = None;

        if let Some(epoch) = self.lifecycle.shutdown() {
            self.close_transport(epoch);
        }

        info!("Session shut down");
    }

    /// Dials a new transport for `epoch`.
    fn dial(&self, epoch: Epoch) {
        Connection::dial(self.url.clone(), epoch, self.events_tx.clone());
    }

    /// Closes the live transport if it belongs to `epoch`.
    fn close_transport(&self, epoch: Epoch) {
        match &self.connection {
            Some(connection) if connection.epoch() == epoch => connection.close(),
            _ => debug!(%epoch, "No live transport to close"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::time::{sleep_until, timeout};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{WebSocketStream, accept_async};

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(10), Duration::from_millis(40))
    }

    async fn bind() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}")).expect("url");
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
        let (stream, _) = timeout(WAIT, listener.accept())
            .await
            .expect("client in time")
            .expect("accept");
        accept_async(stream).await.expect("upgrade")
    }

    /// Feeds events and timers to the controller until it reports something.
    async fn next_output(
        controller: &mut Controller,
        rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> ControllerOutput {
        let run = async {
            loop {
                let retry = controller.retry_deadline();
                tokio::select! {
                    Some(event) = rx.recv() => {
                        if let Some(output) = controller.handle(event) {
                            return output;
                        }
                    }
                    timer = async {
                        match retry {
                            Some((timer, deadline)) => {
                                sleep_until(deadline).await;
                                timer
                            }
                            None => std::future::pending().await,
                        }
                    } => controller.on_retry_elapsed(timer),
                }
            }
        };
        timeout(WAIT, run).await.expect("output in time")
    }

    #[tokio::test]
    async fn test_open_send_and_receive() {
        let (listener, url) = bind().await;
        let (mut controller, mut rx) = Controller::start(url, fast_backoff());
        assert_eq!(controller.state(), ConnectionState::Connecting);
        assert!(matches!(
            controller.send("early".into()),
            Err(Error::NotReady { .. })
        ));

        let mut server = accept(&listener).await;
        assert_eq!(
            next_output(&mut controller, &mut rx).await,
            ControllerOutput::Ready(ReadyKind::Welcome)
        );
        assert!(controller.is_open());

        controller.send("ping".into()).expect("send");
        let frame = server.next().await.expect("frame").expect("ok");
        assert_eq!(frame.into_text().expect("text").as_str(), "ping");

        server
            .send(Message::Text(r#"{"status":"PENDING"}"#.into()))
            .await
            .expect("server send");
        assert_eq!(
            next_output(&mut controller, &mut rx).await,
            ControllerOutput::Frame(r#"{"status":"PENDING"}"#.into())
        );
    }

    #[tokio::test]
    async fn test_reconnects_after_remote_close() {
        let (listener, url) = bind().await;
        let (mut controller, mut rx) = Controller::start(url, fast_backoff());

        let mut server = accept(&listener).await;
        next_output(&mut controller, &mut rx).await;

        server.close(None).await.expect("close");
        assert_eq!(
            next_output(&mut controller, &mut rx).await,
            ControllerOutput::Closed {
                retry_in: Some(Duration::from_millis(10))
            }
        );
        assert_eq!(controller.retry_count(), 1);

        let _server = accept(&listener).await;
        assert_eq!(
            next_output(&mut controller, &mut rx).await,
            ControllerOutput::Ready(ReadyKind::Reconnected)
        );
        assert_eq!(controller.retry_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_connects_back_off() {
        let (listener, url) = bind().await;
        drop(listener);
        let (mut controller, mut rx) = Controller::start(url, fast_backoff());

        let mut delays = Vec::new();
        for _ in 0..3 {
            match next_output(&mut controller, &mut rx).await {
                ControllerOutput::Closed { retry_in } => delays.push(retry_in.expect("retry")),
                other => panic!("unexpected {other:?}"),
            }
        }

        let expected: Vec<Duration> = [10, 20, 40].map(Duration::from_millis).to_vec();
        assert_eq!(delays, expected);
    }

    #[tokio::test]
    async fn test_huge_delay_is_clamped() {
        let (listener, url) = bind().await;
        drop(listener);
        let backoff = Backoff::new(Duration::MAX, Duration::MAX);
        let (mut controller, mut rx) = Controller::start(url, backoff);

        assert_eq!(
            next_output(&mut controller, &mut rx).await,
            ControllerOutput::Closed {
                retry_in: Some(Duration::MAX)
            }
        );

        let (_, deadline) = controller.retry_deadline().expect("armed");
        assert!(deadline <= Instant::now() + MAX_DELAY_LIMIT);
    }

    #[tokio::test]
    async fn test_shutdown_closes_without_retry() {
        let (listener, url) = bind().await;
        let (mut controller, mut rx) = Controller::start(url, fast_backoff());

        let mut server = accept(&listener).await;
        next_output(&mut controller, &mut rx).await;

        controller.shutdown();
        assert_eq!(controller.state(), ConnectionState::Closed);
        assert!(!controller.is_open());
        assert!(controller.retry_deadline().is_none());

        // Server observes the close handshake.
        let closing = server.next().await;
        assert!(matches!(closing, Some(Ok(Message::Close(_))) | None));
    }
}
