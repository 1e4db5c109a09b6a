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

//! Connection worker implementation
//!
//! The ConnectionWorker owns one accepted socket for its whole life:
//! - reading and dispatching complete lines to the protocol
//! - writing the lines queued on the connection handle
//! - idle and write timeouts
//! - the close sequence (deregister, flush, shut down, notify)

use crate::{
    ConnectionState, LineConnection, LineProtocol, Result, ServerConfig, ServerMetrics,
    ServiceError,
};
use futures_util::{SinkExt, StreamExt};
use linewire_linecodec::{LineCodec, LineEnding};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Longest accepted inbound line
    pub max_line_length: Option<usize>,
    /// Terminator for outbound lines
    pub line_ending: LineEnding,
    /// Close the connection after this long without an inbound line
    pub idle_timeout: Option<Duration>,
    /// Write timeout (max time for one outbound line)
    pub write_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for WorkerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            line_ending: config.line_ending,
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

/// Connection worker that manages a single connection's lifecycle
pub struct ConnectionWorker {
    connection: LineConnection,
    protocol: Box<dyn LineProtocol>,
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
    outbound_rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
    config: WorkerConfig,
    state: Arc<AtomicU8>,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionWorker {
    /// Create a worker for `stream`
    ///
    /// `outbound_rx` is the receiver returned by [`LineConnection::new`] for
    /// `connection`.
    pub fn new(
        stream: TcpStream,
        connection: LineConnection,
        outbound_rx: mpsc::Receiver<String>,
        protocol: Box<dyn LineProtocol>,
        config: WorkerConfig,
        state: Arc<AtomicU8>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let codec = LineCodec::from_settings(config.max_line_length, config.line_ending);
        let shutdown = connection.shutdown_token();

        Self {
            reader: FramedRead::new(read_half, codec.clone()),
            writer: FramedWrite::new(write_half, codec),
            connection,
            protocol,
            outbound_rx,
            shutdown,
            config,
            state,
            metrics,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, new_state: ConnectionState) {
        self.state.store(new_state.as_u8(), Ordering::Release);
    }

    /// Run the worker until the connection ends
    #[instrument(skip(self), fields(connection_id = %self.connection.id(), peer = %self.connection.peer_addr()))]
    pub async fn run(mut self) {
        self.set_state(ConnectionState::Active);

        let result = match self.protocol.on_connect(&self.connection).await {
            Ok(()) => self.event_loop().await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.record_error(&e);
            self.protocol.on_error(&self.connection, &e).await;
        }

        self.cleanup().await;
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut idle_deadline = self.idle_deadline();
        loop {
            select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("close requested");
                    return Ok(());
                }

                Some(line) = self.outbound_rx.recv() => {
                    self.write_queued(line).await?;
                }

                frame = self.reader.next() => {
                    match frame {
                        Some(Ok(line)) => {
                            idle_deadline = self.idle_deadline();
                            self.set_state(ConnectionState::Active);
                            self.receive_line(line).await?;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            debug!("peer closed the connection");
                            return Ok(());
                        }
                    }
                }

                _ = idle_expired(idle_deadline) => {
                    self.set_state(ConnectionState::Idle);
                    self.protocol.on_timeout(&self.connection).await;
                    return Err(ServiceError::Timeout);
                }
            }
        }
    }

    /// Dispatch one complete inbound line to the protocol
    async fn receive_line(&mut self, line: String) -> Result<()> {
        let bytes = (line.len() + 1) as u64;
        self.connection.record_line_received(bytes);
        self.metrics.line_received(bytes);
        trace!(length = line.len(), "line received");
        self.protocol.on_line(&self.connection, line).await
    }

    /// Write `first` and everything else already queued, then flush once
    async fn write_queued(&mut self, first: String) -> Result<()> {
        self.write_line(first).await?;
        while let Ok(line) = self.outbound_rx.try_recv() {
            self.write_line(line).await?;
        }
        match timeout(self.config.write_timeout, SinkExt::<String>::flush(&mut self.writer)).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Timeout),
        }
    }

    async fn write_line(&mut self, line: String) -> Result<()> {
        let bytes = (line.len() + self.config.line_ending.as_bytes().len()) as u64;
        match timeout(self.config.write_timeout, self.writer.feed(line)).await {
            Ok(Ok(())) => {
                self.connection.record_line_sent(bytes);
                self.metrics.line_sent(bytes);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ServiceError::Timeout),
        }
    }

    fn idle_deadline(&self) -> Option<Instant> {
        self.config.idle_timeout.map(|idle| Instant::now() + idle)
    }

    fn record_error(&self, error: &ServiceError) {
        if error.is_framing_error() {
            self.metrics.framing_error();
            if error.is_frame_too_long() {
                warn!(error = %error, "over-long line, closing connection");
            } else {
                warn!(error = %error, "framing error, closing connection");
            }
        } else if matches!(error, ServiceError::Timeout) {
            self.metrics.timeout_error();
            info!("connection timed out");
        } else if error.is_connection_error() {
            self.metrics.connection_error();
            debug!(error = %error, "transport error");
        } else {
            self.metrics.protocol_error();
            debug!(error = %error, "protocol ended the connection");
        }
    }

    /// Close sequence
    ///
    /// The handle is closed first so the registry no longer reaches this
    /// connection, then the lines queued before that point are written.
    async fn cleanup(&mut self) {
        self.set_state(ConnectionState::Closing);
        self.connection.close();

        let mut pending = Vec::new();
        while let Ok(line) = self.outbound_rx.try_recv() {
            pending.push(line);
        }
        for line in pending {
            if let Err(e) = self.write_line(line).await {
                debug!(error = %e, "dropping queued lines");
                break;
            }
        }
        match timeout(self.config.write_timeout, SinkExt::<String>::close(&mut self.writer)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "error shutting down the socket"),
            Err(_) => debug!("timed out shutting down the socket"),
        }

        self.protocol.on_disconnect(&self.connection).await;
        self.set_state(ConnectionState::Closed);
        debug!("worker finished");
    }
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("connection", &self.connection)
            .field("state", &self.state())
            .finish()
    }
}
