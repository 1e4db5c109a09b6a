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

//! Server-wide counters
//!
//! [`ServerMetrics`] keeps its own atomics so a [`MetricsSnapshot`] is always
//! available, and mirrors every update into the `metrics` facade under the
//! `linewire.*` namespace for whatever recorder the binary installs.

use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
#[derive(Debug)]
pub struct ServerMetrics {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,

    lines_sent: AtomicU64,
    lines_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    connection_errors: AtomicU64,
    framing_errors: AtomicU64,
    protocol_errors: AtomicU64,
    timeout_errors: AtomicU64,

    total_connection_duration_ns: AtomicU64,
    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            lines_sent: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            timeout_errors: AtomicU64::new(0),
            total_connection_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Connection tracking

    /// Record a new connection being opened
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.connections.total").increment(1);
        gauge!("linewire.connections.active").increment(1.0);
    }

    /// Record a connection being closed
    pub fn connection_closed(&self, duration: Duration) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_connection_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        gauge!("linewire.connections.active").decrement(1.0);
        histogram!("linewire.connection.duration").record(duration.as_secs_f64());
    }

    /// Record a socket dropped at accept because the server was full
    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.connections.rejected").increment(1);
    }

    /// Get the current number of active connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the total number of connections since server start
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    // Throughput tracking

    /// Record one line read from a peer, `bytes` including its terminator
    pub fn line_received(&self, bytes: u64) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        counter!("linewire.lines.received").increment(1);
        counter!("linewire.bytes.received").increment(bytes);
    }

    /// Record one line written to a peer, `bytes` including its terminator
    pub fn line_sent(&self, bytes: u64) {
        self.lines_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        counter!("linewire.lines.sent").increment(1);
        counter!("linewire.bytes.sent").increment(bytes);
    }

    // Error tracking

    /// Record an I/O failure on a connection
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.errors.connection").increment(1);
    }

    /// Record a framing failure (overlong line, invalid UTF-8)
    pub fn framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.errors.framing").increment(1);
    }

    /// Record an error returned by a protocol handler
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.errors.protocol").increment(1);
    }

    /// Record an idle or write timeout
    pub fn timeout_error(&self) {
        self.timeout_errors.fetch_add(1, Ordering::Relaxed);
        counter!("linewire.errors.timeout").increment(1);
    }

    // Snapshot

    /// Get a point-in-time view of all metrics
    ///
    /// Individual counters are read independently, so a snapshot taken while
    /// connections are busy may be off by a few events.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            lines_sent: self.lines_sent.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            timeout_errors: self.timeout_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_connection_duration: self.average_connection_duration(),
        }
    }

    fn average_connection_duration(&self) -> Duration {
        let total = self.total_connections.load(Ordering::Relaxed);
        if total == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_connection_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / total)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total connections since server start
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Sockets closed at accept because `max_connections` was reached
    pub rejected_connections: u64,
    /// Total lines written
    pub lines_sent: u64,
    /// Total lines read
    pub lines_received: u64,
    /// Total bytes written
    pub bytes_sent: u64,
    /// Total bytes read
    pub bytes_received: u64,
    /// Total I/O errors
    pub connection_errors: u64,
    /// Total framing errors
    pub framing_errors: u64,
    /// Total protocol handler errors
    pub protocol_errors: u64,
    /// Total timeout errors
    pub timeout_errors: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average connection duration
    pub avg_connection_duration: Duration,
}

impl MetricsSnapshot {
    /// Lines received per second of uptime
    pub fn lines_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.lines_received as f64 / self.uptime.as_secs_f64()
    }

    /// Lines sent per second of uptime
    pub fn lines_sent_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.lines_sent as f64 / self.uptime.as_secs_f64()
    }

    /// Calculate total error count
    pub fn total_errors(&self) -> u64 {
        self.connection_errors + self.framing_errors + self.protocol_errors + self.timeout_errors
    }
}
