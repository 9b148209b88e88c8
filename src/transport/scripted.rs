//! In-memory transport for tests.
//!
//! Sockets never touch the network. Tests drive notifications by hand with
//! the `emit_*` helpers, which invoke the manager's handler synchronously.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::protocol::{MessageEvent, Payload, TransportError};

use super::{EventHandler, OpenRequest, Socket, Transport, TransportEvent};

struct SocketState {
    request: OpenRequest,
    handler: EventHandler,
    sent: Mutex<Vec<Payload>>,
    closed: AtomicBool,
}

/// Test-side view of a socket created by [`ScriptedTransport`].
#[derive(Clone)]
pub(crate) struct ScriptedSocket {
    state: Arc<SocketState>,
}

impl ScriptedSocket {
    pub(crate) fn request(&self) -> &OpenRequest {
        &self.state.request
    }

    pub(crate) fn url(&self) -> &str {
        self.state.request.url.as_str()
    }

    pub(crate) fn sent(&self) -> Vec<Payload> {
        self.state.sent.lock().clone()
    }

    pub(crate) fn close_requested(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn emit_open(&self) {
        (self.state.handler)(TransportEvent::Open);
    }

    pub(crate) fn emit_message(&self, data: impl Into<Payload>) {
        let event = MessageEvent::new(data, self.state.request.binary_type);
        (self.state.handler)(TransportEvent::Message(event));
    }

    pub(crate) fn emit_error(&self, data: &str) {
        (self.state.handler)(TransportEvent::Error(TransportError::new(data)));
    }

    pub(crate) fn emit_close(&self) {
        (self.state.handler)(TransportEvent::Close);
    }
}

struct ScriptedHandle {
    state: Arc<SocketState>,
}

impl Socket for ScriptedHandle {
    fn send(&self, payload: Payload) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.state.sent.lock().push(payload);
        Ok(())
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Transport that records every open attempt.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    sockets: Mutex<Vec<ScriptedSocket>>,
    opened: Notify,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn socket_count(&self) -> usize {
        self.sockets.lock().len()
    }

    pub(crate) fn socket(&self, index: usize) -> ScriptedSocket {
        self.sockets.lock()[index].clone()
    }

    pub(crate) fn last(&self) -> ScriptedSocket {
        self.sockets
            .lock()
            .last()
            .cloned()
            .expect("no socket opened yet")
    }

    /// Waits until the socket at `index` has been opened.
    pub(crate) async fn wait_for_socket(&self, index: usize) -> ScriptedSocket {
        loop {
            let notified = self.opened.notified();
            if let Some(socket) = self.sockets.lock().get(index).cloned() {
                return socket;
            }
            notified.await;
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, request: OpenRequest, handler: EventHandler) -> Result<Box<dyn Socket>> {
        let state = Arc::new(SocketState {
            request,
            handler,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });

        self.sockets.lock().push(ScriptedSocket {
            state: Arc::clone(&state),
        });
        self.opened.notify_waiters();

        Ok(Box::new(ScriptedHandle { state }))
    }
}
