//! WebSocket connection and event loop.
//!
//! This module handles the single duplex connection to the target,
//! including command/reply correlation and event dispatch.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the target (replies, events), strictly in
//!   arrival order
//! - Outgoing command frames queued by [`Connection::send`]
//! - Lifecycle transitions published on a watch channel
//!
//! Callers awaiting a reply suspend on their own completion; the loop never
//! waits for them.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──► Open ──► Closing ──► Closed
//!      │           │          │
//!      └───────────┴──────────┴─────► Failed
//! ```
//!
//! Whatever the exit path, the loop closes the socket once, fails every
//! pending command with [`Error::ConnectionClosed`] and drops all event
//! handlers.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, SubscriptionId};
use crate::options::SessionOptions;
use crate::protocol::{Command, Event, Inbound, Request};

use super::correlation::CorrelationTable;
use super::dispatcher::EventDispatcher;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    ///
    /// [`Connection::connect`] finishes the handshake before it returns a
    /// handle, so a handle never reports this state.
    Connecting,
    /// Accepting commands and dispatching events.
    Open,
    /// Close requested locally; socket shutting down.
    Closing,
    /// Ended cleanly.
    Closed,
    /// Ended on a transport error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` for [`Closed`](Self::Closed) and [`Failed`](Self::Failed).
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

// ============================================================================
// CommandSink
// ============================================================================

/// Anything that can issue a command and await its correlated result.
///
/// Implemented by [`Connection`]; consumers that issue follow-up commands
/// depend on this trait rather than the concrete connection.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Sends a command and waits for its result.
    async fn send_command(&self, command: Command) -> Result<Value>;
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a serialized command frame.
    Send { id: CommandId, text: String },
    /// Close the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to one target.
///
/// Handles command correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the same
/// socket, correlation table and dispatcher.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation table (shared with event loop).
    correlation: Arc<Mutex<CorrelationTable>>,
    /// Event dispatcher (shared with event loop).
    dispatcher: Arc<EventDispatcher>,
    /// Lifecycle state published by the event loop.
    state: watch::Receiver<ConnectionState>,
    /// Default per-command timeout.
    command_timeout: Duration,
}

impl Connection {
    /// Opens a WebSocket connection to `ws_url`.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if `ws_url` is not a valid WebSocket URL
    /// - [`Error::Config`] if the subprotocol is not a valid header value
    /// - [`Error::Connection`] if the handshake fails or times out
    pub async fn connect(ws_url: &str, options: &SessionOptions) -> Result<Self> {
        let mut request = ws_url.into_client_request()?;
        if let Some(protocol) = &options.subprotocol {
            let value = HeaderValue::from_str(protocol)
                .map_err(|e| Error::config(format!("invalid subprotocol: {e}")))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }

        debug!(%ws_url, "Connecting to target");

        let (ws_stream, _response) = timeout(options.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "handshake timed out after {}ms",
                    options.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        info!(%ws_url, "Connected to target");

        Ok(Self::spawn(ws_stream, options))
    }

    /// Spawns the event loop over an established stream.
    ///
    /// The handshake is already done, so the state starts at `Open`.
    fn spawn<S>(ws_stream: WebSocketStream<S>, options: &SessionOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationTable::new()));
        let dispatcher = Arc::new(EventDispatcher::new());

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&dispatcher),
            state_tx,
        ));

        Self {
            command_tx,
            correlation,
            dispatcher,
            state: state_rx,
            command_timeout: options.command_timeout,
        }
    }

    /// Registers an event handler for events named `kind`.
    pub fn on<F>(&self, kind: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler)
    }

    /// Removes an event handler.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.dispatcher.off(id)
    }

    /// Returns the event dispatcher.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Sends a command and waits for its result with the default timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is not open or ends
    ///   before the reply arrives
    /// - [`Error::Protocol`] if the target replies with an error
    /// - [`Error::RequestTimeout`] if no reply arrives within the timeout
    pub async fn send(&self, command: Command) -> Result<Value> {
        self.send_with_timeout(command, self.command_timeout).await
    }

    /// Sends a command and waits for its result with a custom timeout.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_with_timeout(
        &self,
        command: Command,
        command_timeout: Duration,
    ) -> Result<Value> {
        if self.state() != ConnectionState::Open {
            return Err(Error::ConnectionClosed);
        }

        let method = command.method().to_string();

        // Register before the frame is queued so a fast reply always finds it.
        let (id, response_rx) = self.correlation.lock().register(&method)?;

        let text = match to_string(&Request::new(id, command)) {
            Ok(text) => text,
            Err(e) => {
                self.correlation.lock().remove(id);
                return Err(Error::Json(e));
            }
        };

        if self
            .command_tx
            .send(ConnectionCommand::Send { id, text })
            .is_err()
        {
            self.correlation.lock().remove(id);
            return Err(Error::ConnectionClosed);
        }

        trace!(%id, %method, "Command queued");

        match timeout(command_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.correlation.lock().remove(id);
                warn!(%id, %method, "Command timed out");
                Err(Error::request_timeout(
                    id,
                    method,
                    saturating_millis(command_timeout),
                ))
            }
        }
    }

    /// Returns the number of pending commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Waits until the connection reaches a terminal state.
    pub async fn closed(&self) -> ConnectionState {
        let mut state = self.state.clone();
        let terminal = match state.wait_for(|s| s.is_terminal()).await {
            Ok(terminal) => Some(*terminal),
            Err(_) => None,
        };
        terminal.unwrap_or_else(|| *state.borrow())
    }

    /// Closes the connection and waits for the event loop to finish.
    ///
    /// Safe to call more than once and from any clone.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` for API stability.
    pub async fn close(&self) -> Result<()> {
        if self.command_tx.send(ConnectionCommand::Shutdown).is_err() {
            trace!("Event loop already stopped");
        }

        let state = self.closed().await;
        debug!(?state, "Connection closed");
        Ok(())
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationTable>>,
        dispatcher: Arc<EventDispatcher>,
        state_tx: watch::Sender<ConnectionState>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let final_state = loop {
            tokio::select! {
                // Incoming frames from target
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) =
                                Self::handle_incoming_message(&text, &correlation, &dispatcher)
                            {
                                error!(error = %e, "Inbound frame rejected");
                                break ConnectionState::Failed;
                            }
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by target");
                            break ConnectionState::Closed;
                        }

                        Some(Ok(Message::Binary(data))) => {
                            warn!(len = data.len(), "Ignoring binary frame");
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break ConnectionState::Failed;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break ConnectionState::Closed;
                        }

                        // Ignore Ping, Pong, raw frames
                        _ => {}
                    }
                }

                // Command frames from callers
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { id, text }) => {
                            if !Self::handle_send_command(id, text, &mut ws_write, &correlation).await {
                                break ConnectionState::Failed;
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown requested");
                            state_tx.send_replace(ConnectionState::Closing);
                            break ConnectionState::Closed;
                        }

                        None => {
                            debug!("All connection handles dropped");
                            break ConnectionState::Closed;
                        }
                    }
                }
            }
        };

        // Single close point for every exit path.
        if let Err(e) = ws_write.close().await {
            trace!(error = %e, "Socket close after loop exit");
        }

        correlation.lock().close();
        dispatcher.clear();
        state_tx.send_replace(final_state);

        debug!(state = ?final_state, "Event loop terminated");
    }

    /// Handles an incoming text frame from the target.
    ///
    /// Returns an error only for frames that are not JSON.
    fn handle_incoming_message(
        text: &str,
        correlation: &Mutex<CorrelationTable>,
        dispatcher: &EventDispatcher,
    ) -> Result<()> {
        match Inbound::parse(text)? {
            Inbound::Reply(response) => {
                trace!(id = %response.id, "Reply received");
                correlation.lock().resolve(response);
            }

            Inbound::Event(event) => {
                trace!(method = %event.method, "Event received");
                dispatcher.dispatch(&event);
            }

            Inbound::Unrecognized(value) => {
                warn!(frame = %value, "Unrecognized inbound frame");
            }
        }

        Ok(())
    }

    /// Writes a command frame.
    ///
    /// Returns `false` if the socket could not be written.
    async fn handle_send_command<S>(
        id: CommandId,
        text: String,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        correlation: &Mutex<CorrelationTable>,
    ) -> bool
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
            error!(%id, error = %e, "Failed to write command frame");
            correlation
                .lock()
                .fail(id, Error::connection(e.to_string()));
            return false;
        }

        trace!(%id, "Command sent");
        true
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl CommandSink for Connection {
    async fn send_command(&self, command: Command) -> Result<Value> {
        self.send(command).await
    }
}

// ============================================================================
// Tests
// ============================================================================
