//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Per-connection handle shared between the worker, protocols and the registry

use crate::registry::Registration;
use crate::{ConnectionId, ConnectionInfo, ConnectionState, Result, ServiceError};
use linewire_linecodec::LineCodecError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A line-oriented connection
///
/// `LineConnection` is a cheap clonable handle. Every clone refers to the same
/// connection; the socket itself is owned by the connection's worker task,
/// which drains the outbound queue filled by [`send_line`](Self::send_line).
///
/// Closing is idempotent. The first [`close`](Self::close) marks the handle
/// closed, drops its registry [`Registration`] before returning and wakes the
/// worker, which flushes lines queued earlier and then releases the socket.
#[derive(Clone)]
pub struct LineConnection {
    inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    id: ConnectionId,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    created_at: Instant,

    outbound: mpsc::Sender<String>,
    slot: Mutex<Slot>,
    shutdown: CancellationToken,

    lines_sent: AtomicU64,
    lines_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

/// State guarded by one lock so that "closed" and "enqueue" never interleave
#[derive(Default)]
struct Slot {
    closed: bool,
    registration: Option<Registration>,
}

impl ConnectionInner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LineConnection {
    /// Create a connection handle and the receiving end of its outbound queue
    ///
    /// The worker uses this for accepted sockets. It is public so protocol
    /// implementations can be exercised without a socket: lines passed to
    /// [`send_line`](Self::send_line) show up on the returned receiver.
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        outbound_capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbound, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
        let inner = ConnectionInner {
            id,
            peer_addr,
            local_addr,
            created_at: Instant::now(),
            outbound,
            slot: Mutex::new(Slot::default()),
            shutdown: CancellationToken::new(),
            lines_sent: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            outbound_rx,
        )
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Get the local address the peer connected to
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// Name this connection is registered under, if any
    pub fn display_name(&self) -> Option<String> {
        self.inner
            .slot()
            .registration
            .as_ref()
            .map(|r| r.name().to_string())
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.slot().closed
    }

    /// Queue one line for delivery to the peer
    ///
    /// Never waits. The line must not contain `\n`; the configured line
    /// ending is appended when it is written.
    pub fn send_line(&self, line: impl Into<String>) -> Result<()> {
        let line = line.into();
        if line.contains('\n') {
            return Err(LineCodecError::EmbeddedDelimiter.into());
        }

        let slot = self.inner.slot();
        if slot.closed {
            return Err(ServiceError::ConnectionClosed);
        }
        match self.inner.outbound.try_send(line) {
            Ok(()) => {
                trace!(connection_id = %self.inner.id, "line queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ServiceError::SendQueueFull(self.inner.id)),
            Err(TrySendError::Closed(_)) => Err(ServiceError::ConnectionClosed),
        }
    }

    /// Close the connection
    ///
    /// Returns `true` for the call that actually closed it. Any registry
    /// entry for this connection is gone by the time this returns.
    pub fn close(&self) -> bool {
        let registration = {
            let mut slot = self.inner.slot();
            if slot.closed {
                return false;
            }
            slot.closed = true;
            slot.registration.take()
        };

        if let Some(registration) = registration {
            debug!(
                connection_id = %self.inner.id,
                name = registration.name(),
                "deregistering"
            );
            drop(registration);
        }
        self.inner.shutdown.cancel();
        debug!(connection_id = %self.inner.id, "connection closed");
        true
    }

    /// Snapshot of this connection in the given state
    pub(crate) fn info(&self, state: ConnectionState) -> ConnectionInfo {
        ConnectionInfo {
            id: self.inner.id,
            state,
            peer_addr: self.inner.peer_addr,
            name: self.display_name(),
            created_at: self.inner.created_at,
            lines_received: self.inner.lines_received.load(Ordering::Relaxed),
            lines_sent: self.inner.lines_sent.load(Ordering::Relaxed),
            bytes_received: self.inner.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.inner.bytes_sent.load(Ordering::Relaxed),
        }
    }

    /// Hand a registry entry to this connection
    ///
    /// A connection holds at most one registration; attaching a second one
    /// releases the first. A closed connection refuses it, and the
    /// registration is released before this returns.
    pub(crate) fn attach_registration(&self, registration: Registration) -> Result<()> {
        let mut slot = self.inner.slot();
        if slot.closed {
            drop(slot);
            drop(registration);
            return Err(ServiceError::ConnectionClosed);
        }
        let previous = slot.registration.replace(registration);
        drop(slot);
        drop(previous);
        Ok(())
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<ConnectionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<ConnectionInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn record_line_received(&self, bytes: u64) {
        self.inner.lines_received.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_line_sent(&self, bytes: u64) {
        self.inner.lines_sent.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for LineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConnection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
