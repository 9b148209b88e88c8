//! Connection manager implementation.
//!
//! Owns the single socket handle, the connection status and the target URL,
//! and turns transport notifications into broker broadcasts.
//!
//! # Lifecycle
//!
//! ```text
//! open_connection ──► socket created ──► Open ──► CONNECTED ──► OPENED
//!                                   └──► Error ─► DISCONNECTED ► ERROR
//! Close ──► DISCONNECTED ──► CLOSED ──► (reconnect armed) RECONNECTING
//!                                        └── after delay: reopen same URL
//! ```
//!
//! With reconnect enabled and no attempt limit, an unreachable endpoint is
//! retried every `reconnect_delay` forever. Set
//! [`ConnectionOptions::with_max_reconnect_attempts`] to bound it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::broker::{Broker, Subscription};
use crate::error::{Error, Result};
use crate::identifiers::{RequestId, RequestIdGenerator};
use crate::protocol::{BrokerEvent, Channel, Envelope, MessageEvent, Payload};
use crate::transport::{
    EventHandler, OpenRequest, Socket, Transport, TransportEvent, TungsteniteTransport,
};

use super::options::{ConnectionOptions, ReplyMode};
use super::status::ConnectionStatus;

// ============================================================================
// Constants
// ============================================================================

/// Maximum correlated requests awaiting a reply.
const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to reply channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Payload>>>;

/// Settle-once sender shared between the listeners of one operation.
type Deferred<T> = Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>;

fn deferred<T>() -> (Deferred<T>, oneshot::Receiver<Result<T>>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

fn settle<T>(deferred: &Deferred<T>, result: Result<T>) {
    if let Some(tx) = deferred.lock().take() {
        let _ = tx.send(result);
    }
}

// ============================================================================
// State
// ============================================================================

/// Mutable connection state.
#[derive(Default)]
struct State {
    /// Active socket handle. `None` before the first open and after close.
    socket: Option<Arc<dyn Socket>>,
    /// Target URL, kept for reconnection.
    url: Option<Url>,
    /// Options of the latest open attempt.
    options: Option<ConnectionOptions>,
    status: ConnectionStatus,
    /// Identifies the active socket; notifications from older ones are dropped.
    generation: u64,
    /// Whether the next close schedules a reconnect.
    reconnect_armed: bool,
    /// Consecutive reconnects since the last successful open.
    reconnect_attempts: u32,
    /// Reconnect task: the timer, then the open attempt it starts.
    reconnect_task: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    broker: Broker,
    state: Mutex<State>,
    correlation: Arc<Mutex<CorrelationMap>>,
    request_ids: RequestIdGenerator,
}

// ============================================================================
// Pending Operations
// ============================================================================

/// An open attempt awaiting `OPENED`, `ERROR` or `CLOSED`.
struct PendingOpen {
    rx: oneshot::Receiver<Result<()>>,
    _subscription: Subscription,
}

impl PendingOpen {
    async fn wait(self) -> Result<()> {
        self.rx.await?
    }
}

/// A correlated request awaiting its reply.
///
/// Dropping it removes the correlation entry if the reply never came.
struct PendingRequest {
    request_id: RequestId,
    rx: oneshot::Receiver<Result<Payload>>,
    correlation: Arc<Mutex<CorrelationMap>>,
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.correlation.lock().remove(&self.request_id).is_some() {
            debug!(request_id = %self.request_id, "Removed abandoned correlation");
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Client-side manager for a single WebSocket endpoint.
///
/// Cloning yields another handle to the same connection.
///
/// # Example
///
/// ```no_run
/// use ws_relay::{ConnectionManager, ConnectionOptions, ReplyMode, Result};
///
/// # async fn example() -> Result<()> {
/// let manager = ConnectionManager::new();
/// manager
///     .open_connection(
///         ConnectionOptions::new("ws://127.0.0.1:9000")
///             .with_reconnect_on_close(true)
///             .with_reply_mode(ReplyMode::NextMessage),
///     )
///     .await?;
///
/// let reply = manager.send_message("Hello WebSocket", true).await?;
/// println!("{reply:?}");
///
/// manager.close_connection().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ConnectionManager - Constructors
// ============================================================================

impl ConnectionManager {
    /// Creates a manager using the tokio-tungstenite transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(TungsteniteTransport::new()))
    }

    /// Creates a manager on top of a custom transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                broker: Broker::new(),
                state: Mutex::new(State::default()),
                correlation: Arc::new(Mutex::new(CorrelationMap::default())),
                request_ids: RequestIdGenerator::new(),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the current connection status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    /// Returns `true` if the transport last reported open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns the URL of the latest open attempt.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        self.inner.state.lock().url.clone()
    }

    /// Returns the number of correlated requests awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.lock().len()
    }

    /// Returns the broker lifecycle and message events are broadcast on.
    #[inline]
    #[must_use]
    pub fn broker(&self) -> &Broker {
        &self.inner.broker
    }
}

// ============================================================================
// ConnectionManager - Lifecycle
// ============================================================================

impl ConnectionManager {
    /// Opens the connection.
    ///
    /// Resolves when the transport reports open. A pending reconnect timer
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the options are invalid
    /// - [`Error::AlreadyConnected`] if a socket handle is still active
    /// - [`Error::ConnectFailed`] if the transport reports an error first
    /// - [`Error::ConnectionClosed`] if the transport closes before opening
    pub async fn open_connection(&self, options: ConnectionOptions) -> Result<()> {
        let url = options.validate()?;
        let pending = self.inner.start_open(url, options)?;
        pending.wait().await
    }

    /// Closes the connection.
    ///
    /// Disarms reconnect and cancels a pending reconnect timer before asking
    /// the transport to close, then returns without waiting for the close
    /// handshake. The status turns `DISCONNECTED` when the transport reports
    /// the close.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if there is neither a socket handle
    /// nor a pending reconnect.
    pub async fn close_connection(&self) -> Result<()> {
        self.inner.close()
    }
}

// ============================================================================
// ConnectionManager - Messaging
// ============================================================================

impl ConnectionManager {
    /// Sends a message, optionally waiting for a response.
    ///
    /// Without waiting, the payload is written unmodified and `Ok(None)` is
    /// returned once the write is queued. When waiting, the reply is matched
    /// according to the connection's [`ReplyMode`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no socket handle exists
    /// - [`Error::SendFailed`] if the transport reports an error while waiting
    /// - [`Error::ConnectionClosed`] if the socket closes before a
    ///   correlated reply arrives
    pub async fn send_message(
        &self,
        payload: impl Into<Payload>,
        wait_for_response: bool,
    ) -> Result<Option<Payload>> {
        let payload = payload.into();

        if !wait_for_response {
            self.inner.socket()?.send(payload)?;
            return Ok(None);
        }

        let reply = match self.inner.reply_mode() {
            ReplyMode::Correlated => self.request(payload).await?,
            ReplyMode::NextMessage => self.send_awaiting_next(payload).await?,
        };

        Ok(Some(reply))
    }

    /// Sends a message without waiting for anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no socket handle exists.
    pub fn send(&self, payload: impl Into<Payload>) -> Result<()> {
        self.inner.socket()?.send(payload.into())
    }

    /// Sends a correlated request and waits for the matching reply.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no socket handle exists
    /// - [`Error::Protocol`] if too many requests are pending
    /// - [`Error::SendFailed`] / [`Error::ConnectionClosed`] as for
    ///   [`send_message`](Self::send_message)
    pub async fn request(&self, payload: impl Into<Payload>) -> Result<Payload> {
        let mut pending = self.inner.start_request(payload.into())?;

        (&mut pending.rx).await?
    }

    /// Sends a correlated request and waits at most `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTimeout`] if no reply arrives in time, or any
    /// error of [`request`](Self::request).
    pub async fn request_with_timeout(
        &self,
        payload: impl Into<Payload>,
        request_timeout: Duration,
    ) -> Result<Payload> {
        let mut pending = self.inner.start_request(payload.into())?;
        let request_id = pending.request_id;

        match timeout(request_timeout, &mut pending.rx).await {
            Ok(received) => received?,
            Err(_) => Err(Error::request_timeout(
                request_id,
                millis(request_timeout),
            )),
        }
    }

    /// Writes the payload unmodified and resolves with the next inbound
    /// message, whatever caused it.
    async fn send_awaiting_next(&self, payload: Payload) -> Result<Payload> {
        let socket = self.inner.socket()?;
        let broker = &self.inner.broker;
        let (tx, rx) = deferred();

        let mut subscription = Subscription::new(broker);
        {
            let tx = Arc::clone(&tx);
            subscription.push(broker.once(Channel::Message, move |event| {
                if let BrokerEvent::Message(message) = event {
                    settle(&tx, Ok(message.data.clone()));
                }
            }));
        }
        {
            let tx = Arc::clone(&tx);
            subscription.push(broker.once(Channel::Error, move |event| {
                if let BrokerEvent::Error(error) = event {
                    settle(&tx, Err(Error::send_failed(error.data.clone())));
                }
            }));
        }

        socket.send(payload)?;

        rx.await?
    }
}

// ============================================================================
// Inner - Open / Close
// ============================================================================

impl Inner {
    fn socket(&self) -> Result<Arc<dyn Socket>> {
        self.state
            .lock()
            .socket
            .clone()
            .ok_or(Error::NotConnected)
    }

    fn reply_mode(&self) -> ReplyMode {
        self.state
            .lock()
            .options
            .as_ref()
            .map(|options| options.reply_mode)
            .unwrap_or_default()
    }

    /// Caller-initiated open.
    fn start_open(self: &Arc<Self>, url: Url, options: ConnectionOptions) -> Result<PendingOpen> {
        let mut state = self.state.lock();

        if state.socket.is_none()
            && let Some(task) = state.reconnect_task.take()
        {
            task.abort();
            debug!("Pending reconnect superseded by explicit open");
        }

        self.open_locked(&mut state, url, options)
    }

    /// Creates the socket and the listeners that settle the open attempt.
    ///
    /// The transport must not invoke the handler from inside `open`.
    fn open_locked(
        self: &Arc<Self>,
        state: &mut State,
        url: Url,
        options: ConnectionOptions,
    ) -> Result<PendingOpen> {
        if state.socket.is_some() {
            let active = state.url.as_ref().unwrap_or(&url);
            return Err(Error::already_connected(active.as_str()));
        }

        let (tx, rx) = deferred();
        let mut subscription = Subscription::new(&self.broker);
        {
            let tx = Arc::clone(&tx);
            subscription.push(self.broker.once(Channel::Opened, move |_| settle(&tx, Ok(()))));
        }
        {
            let tx = Arc::clone(&tx);
            let target = url.to_string();
            subscription.push(self.broker.once(Channel::Error, move |event| {
                let message = match event {
                    BrokerEvent::Error(error) => error.data.clone(),
                    _ => String::new(),
                };
                settle(&tx, Err(Error::connect_failed(target.as_str(), message)));
            }));
        }
        {
            let tx = Arc::clone(&tx);
            subscription.push(self.broker.once(Channel::Closed, move |_| {
                settle(&tx, Err(Error::ConnectionClosed));
            }));
        }

        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(self);
        let handler: EventHandler = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_transport_event(generation, event);
            }
        });

        let request = OpenRequest {
            url: url.clone(),
            binary_type: options.binary_type.unwrap_or_default(),
        };
        let socket = self.transport.open(request, handler)?;

        debug!(%url, generation, reconnect = options.reconnect_on_close, "Opening WebSocket");

        state.socket = Some(Arc::from(socket));
        state.reconnect_armed = options.reconnect_on_close;
        state.url = Some(url);
        state.options = Some(options);

        Ok(PendingOpen {
            rx,
            _subscription: subscription,
        })
    }

    fn close(&self) -> Result<()> {
        let (socket, cancelled) = {
            let mut state = self.state.lock();
            state.reconnect_armed = false;

            // The handle is kept while a reconnect attempt is in flight.
            let cancelled = state
                .reconnect_task
                .take()
                .filter(|task| !task.is_finished());
            let socket = state.socket.take();

            if socket.is_none() && cancelled.is_none() {
                return Err(Error::NotConnected);
            }

            // No transport is left to report the close.
            if socket.is_none() {
                state.status = ConnectionStatus::Disconnected;
            }

            (socket, cancelled)
        };

        if let Some(task) = cancelled {
            task.abort();
            debug!("Pending reconnect cancelled");
        }

        if let Some(socket) = socket {
            info!("Closing WebSocket");
            socket.close();
        }

        Ok(())
    }
}

// ============================================================================
// Inner - Transport Events
// ============================================================================

impl Inner {
    /// Translates a transport notification: status, then broadcast, then
    /// correlation and reconnect bookkeeping.
    fn handle_transport_event(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        let event = {
            let mut state = self.state.lock();

            if state.generation != generation {
                trace!(
                    generation,
                    current = state.generation,
                    "Ignoring notification from superseded socket"
                );
                return;
            }

            match event {
                TransportEvent::Open => {
                    state.status = ConnectionStatus::Connected;
                    state.reconnect_attempts = 0;
                    info!(url = ?state.url.as_ref().map(Url::as_str), "WebSocket connected");
                    BrokerEvent::Opened
                }

                TransportEvent::Message(message) => {
                    trace!(len = message.data.len(), "WebSocket message");
                    BrokerEvent::Message(message)
                }

                TransportEvent::Error(error) => {
                    state.status = ConnectionStatus::Disconnected;
                    warn!(error = %error, "WebSocket error");
                    BrokerEvent::Error(error)
                }

                TransportEvent::Close => {
                    state.status = ConnectionStatus::Disconnected;
                    state.socket = None;
                    info!("WebSocket closed");
                    BrokerEvent::Closed
                }
            }
        };

        self.broker.broadcast(&event);

        match &event {
            BrokerEvent::Message(message) => self.resolve_reply(message),
            BrokerEvent::Error(error) => {
                self.fail_pending_requests(|| Error::send_failed(error.data.clone()));
            }
            BrokerEvent::Closed => {
                self.fail_pending_requests(|| Error::ConnectionClosed);
                self.schedule_reconnect(generation);
            }
            BrokerEvent::Opened => {}
        }
    }

    /// Resolves the waiter whose ID the inbound envelope echoes.
    fn resolve_reply(&self, message: &MessageEvent) {
        let Some(envelope) = Envelope::parse(&message.data) else {
            return;
        };

        let request_id = envelope.id;
        let Some(tx) = self.correlation.lock().remove(&request_id) else {
            debug!(%request_id, "Reply for unknown request");
            return;
        };

        let _ = tx.send(envelope.into_payload());
        trace!(%request_id, "Reply correlated");
    }

    fn fail_pending_requests(&self, make_error: impl Fn() -> Error) {
        let pending: Vec<_> = self.correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(make_error()));
        }

        if count > 0 {
            debug!(count, "Failed pending requests");
        }
    }

    fn start_request(&self, payload: Payload) -> Result<PendingRequest> {
        let socket = self.socket()?;

        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let request_id = self.request_ids.next_id();
        let frame = Envelope::wrap(request_id, &payload).to_payload()?;

        let (response_tx, rx) = oneshot::channel();
        self.correlation.lock().insert(request_id, response_tx);
        let pending = PendingRequest {
            request_id,
            rx,
            correlation: Arc::clone(&self.correlation),
        };

        socket.send(frame)?;
        trace!(%request_id, "Request sent");

        Ok(pending)
    }
}

// ============================================================================
// Inner - Reconnect
// ============================================================================

impl Inner {
    /// Arms the reconnect timer after the close of `generation`, if the
    /// policy allows it and no newer socket took over meanwhile.
    fn schedule_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();

        if state.generation != generation || state.socket.is_some() {
            debug!(generation, "Socket replaced during close, reconnect not needed");
            return;
        }

        if !state.reconnect_armed {
            return;
        }

        let Some(options) = state.options.clone() else {
            return;
        };

        if let Some(max) = options.max_reconnect_attempts
            && state.reconnect_attempts >= max
        {
            warn!(
                attempts = state.reconnect_attempts,
                "Reconnect limit reached, giving up"
            );
            state.reconnect_armed = false;
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime, reconnect skipped");
            return;
        };

        state.reconnect_attempts += 1;
        state.status = ConnectionStatus::Reconnecting;

        let attempt = state.reconnect_attempts;
        let delay = options.reconnect_delay;

        info!(
            attempt,
            delay_ms = millis(delay),
            "Scheduling reconnect"
        );

        let task = runtime.spawn(run_reconnect(
            Arc::downgrade(self),
            options.for_reconnect(),
            attempt,
            delay,
        ));

        if let Some(previous) = state.reconnect_task.replace(task) {
            previous.abort();
        }
    }
}

/// Waits `delay`, then reopens the last URL unless reconnect was disarmed.
async fn run_reconnect(weak: Weak<Inner>, options: ConnectionOptions, attempt: u32, delay: Duration) {
    sleep(delay).await;

    let pending = {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut state = inner.state.lock();

        if !state.reconnect_armed || state.socket.is_some() {
            debug!(attempt, "Reconnect skipped");
            return;
        }

        let url = match options.validate() {
            Ok(url) => url,
            Err(e) => {
                state.status = ConnectionStatus::Disconnected;
                warn!(error = %e, "Reconnect options rejected");
                return;
            }
        };

        info!(%url, attempt, "Reconnecting");
        match inner.open_locked(&mut state, url, options) {
            Ok(pending) => pending,
            Err(e) => {
                state.status = ConnectionStatus::Disconnected;
                warn!(attempt, error = %e, "Reconnect attempt could not start");
                return;
            }
        }
    };

    match pending.wait().await {
        Ok(()) => info!(attempt, "Reconnected"),
        Err(e) => warn!(attempt, error = %e, "Reconnect attempt failed"),
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        if let Some(task) = state.reconnect_task.take() {
            task.abort();
        }

        if let Some(socket) = state.socket.take() {
            socket.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
