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

//! Connection manager implementation
//!
//! The ConnectionManager is responsible for:
//! - Assigning connection ids and tracking live connections
//! - Spawning connection workers
//! - Server-wide broadcasts
//! - Draining or force-closing connections on shutdown

use crate::{
    BroadcastResult, ConnectionId, ConnectionInfo, ConnectionState, ConnectionWorker,
    LineConnection, ProtocolFactory, Result, ServerMetrics, ServiceError, ShutdownMode,
    WorkerConfig,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Managed connection entry
struct ManagedConnection {
    connection: LineConnection,
    state: Arc<AtomicU8>,
}

impl ManagedConnection {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn info(&self) -> ConnectionInfo {
        self.connection.info(self.state())
    }
}

/// Runs when a worker task ends, whether it returned or unwound
///
/// Closing here covers protocols that panic: the registry entry and the
/// manager entry are released even though the worker never reached its own
/// close sequence.
struct WorkerGuard {
    id: ConnectionId,
    connection: LineConnection,
    connections: Arc<DashMap<ConnectionId, ManagedConnection>>,
    metrics: Arc<ServerMetrics>,
    started: Instant,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.connection.close() {
            warn!(connection_id = %self.id, "worker ended without closing its connection");
        }
        self.connections.remove(&self.id);
        self.metrics.connection_closed(self.started.elapsed());
        info!(connection_id = %self.id, "connection closed");
    }
}

/// Connection manager
pub struct ConnectionManager {
    /// Active connections (lock-free concurrent map)
    connections: Arc<DashMap<ConnectionId, ManagedConnection>>,
    /// Next connection ID (monotonically increasing)
    next_id: AtomicU64,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Worker configuration
    worker_config: WorkerConfig,
    /// Per-connection outbound queue capacity
    outbound_buffer: usize,
    /// Live connection limit
    max_connections: usize,
    /// Worker tasks
    tracker: TaskTracker,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(
        metrics: Arc<ServerMetrics>,
        worker_config: WorkerConfig,
        outbound_buffer: usize,
        max_connections: usize,
    ) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            metrics,
            worker_config,
            outbound_buffer,
            max_connections,
            tracker: TaskTracker::new(),
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Take ownership of an accepted socket
    ///
    /// Builds the protocol through `factory`, records the connection and
    /// spawns its worker. The connection is tracked before the worker runs,
    /// so it is visible to [`broadcast`](Self::broadcast) and
    /// [`shutdown`](Self::shutdown) from the start.
    ///
    /// At the connection limit the socket is dropped unanswered and
    /// [`ServiceError::MaxConnectionsReached`] is returned.
    pub fn add_connection(
        &self,
        stream: TcpStream,
        factory: &Arc<dyn ProtocolFactory>,
    ) -> Result<ConnectionId> {
        if self.connection_count() >= self.max_connections {
            return Err(ServiceError::MaxConnectionsReached(self.max_connections));
        }

        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let id = self.next_connection_id();

        let (connection, outbound_rx) =
            LineConnection::new(id, peer_addr, local_addr, self.outbound_buffer);
        let protocol = factory.build_protocol(&connection);
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8()));
        let worker = ConnectionWorker::new(
            stream,
            connection.clone(),
            outbound_rx,
            protocol,
            self.worker_config.clone(),
            state.clone(),
            self.metrics.clone(),
        );

        self.connections.insert(
            id,
            ManagedConnection {
                connection: connection.clone(),
                state,
            },
        );
        self.metrics.connection_opened();

        let guard = WorkerGuard {
            id,
            connection,
            connections: self.connections.clone(),
            metrics: self.metrics.clone(),
            started: Instant::now(),
        };
        self.tracker.spawn(async move {
            let _guard = guard;
            worker.run().await;
        });

        info!(connection_id = %id, peer = %peer_addr, "connection established");
        Ok(id)
    }

    /// Close a connection
    ///
    /// The worker flushes the lines already queued and then ends; the entry
    /// disappears from the manager once it has.
    pub fn remove_connection(&self, id: ConnectionId) -> Result<()> {
        let connection = self
            .get_connection(id)
            .ok_or(ServiceError::ConnectionNotFound(id))?;
        connection.close();
        Ok(())
    }

    /// Get a connection by ID
    pub fn get_connection(&self, id: ConnectionId) -> Option<LineConnection> {
        self.connections
            .get(&id)
            .map(|entry| entry.connection.clone())
    }

    /// Get connection info
    pub fn get_connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(&id).map(|entry| entry.info())
    }

    /// Get all connection IDs
    pub fn get_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Get all connection infos
    pub fn get_all_connection_infos(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|entry| entry.value().info())
            .collect()
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send `line` to every live connection, registered or not
    pub fn broadcast(&self, line: &str) -> BroadcastResult {
        let targets: Vec<(ConnectionId, LineConnection)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.connection.clone()))
            .collect();

        let mut result = BroadcastResult::default();
        for (id, connection) in targets {
            result.record(id, connection.send_line(line));
        }
        result
    }

    /// Close every live connection
    pub fn close_all(&self) -> usize {
        let targets: Vec<LineConnection> = self
            .connections
            .iter()
            .map(|entry| entry.connection.clone())
            .collect();
        targets.iter().filter(|connection| connection.close()).count()
    }

    /// Allow workers to be tracked again after a shutdown
    pub(crate) fn reopen(&self) {
        self.tracker.reopen();
    }

    /// Stop all connections
    ///
    /// With [`ShutdownMode::Drain`] the optional `notice` is sent to every
    /// connection and peers get up to `grace` to disconnect on their own;
    /// the rest are closed afterwards. [`ShutdownMode::Force`] closes
    /// everything immediately. Returns once the workers have finished, or
    /// after the write timeout if some worker is stuck flushing.
    pub async fn shutdown(&self, mode: ShutdownMode, grace: Duration, notice: Option<&str>) {
        self.tracker.close();
        info!(
            ?mode,
            connections = self.connection_count(),
            "shutting down connections"
        );

        if mode == ShutdownMode::Drain {
            if let Some(notice) = notice {
                let result = self.broadcast(notice);
                debug!(delivered = result.succeeded, "shutdown notice sent");
            }
            if timeout(grace, self.tracker.wait()).await.is_ok() {
                return;
            }
            warn!(
                remaining = self.connection_count(),
                "drain timeout elapsed, closing remaining connections"
            );
        }

        let closed = self.close_all();
        debug!(closed, "connections closed");

        if timeout(self.worker_config.write_timeout, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.connection_count(),
                "workers still flushing after shutdown"
            );
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LineProtocol;
    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    struct Echo;

    #[async_trait]
    impl LineProtocol for Echo {
        async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
            conn.send_line(line)
        }
    }

    struct EchoFactory;

    #[async_trait]
    impl ProtocolFactory for EchoFactory {
        fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
            Box::new(Echo)
        }
    }

    struct Panicky;

    #[async_trait]
    impl LineProtocol for Panicky {
        async fn on_line(&mut self, _conn: &LineConnection, _line: String) -> Result<()> {
            panic!("protocol bug");
        }
    }

    struct PanickyFactory;

    #[async_trait]
    impl ProtocolFactory for PanickyFactory {
        fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
            Box::new(Panicky)
        }
    }

    async fn create_test_connection() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(ServerMetrics::new()),
            WorkerConfig::default(),
            16,
            64,
        )
    }

    async fn wait_for_count(manager: &ConnectionManager, expected: usize) {
        for _ in 0..100 {
            if manager.connection_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {expected} connections, have {}",
            manager.connection_count()
        );
    }

    #[tokio::test]
    async fn test_manager_add_remove() {
        let manager = manager();
        let factory: Arc<dyn ProtocolFactory> = Arc::new(EchoFactory);

        let (server, client) = create_test_connection().await;
        let id = manager.add_connection(server, &factory).unwrap();

        assert_eq!(manager.connection_count(), 1);
        assert!(manager.get_connection(id).is_some());
        assert_eq!(manager.get_connection_ids(), vec![id]);

        let (read, mut write) = client.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(b"ping\n").await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ping"));

        let info = manager.get_connection_info(id).unwrap();
        assert_eq!(info.lines_received, 1);

        manager.remove_connection(id).unwrap();
        assert_eq!(lines.next_line().await.unwrap(), None);
        wait_for_count(&manager, 0).await;

        assert!(matches!(
            manager.remove_connection(id),
            Err(ServiceError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_manager_enforces_connection_limit() {
        let manager = ConnectionManager::new(
            Arc::new(ServerMetrics::new()),
            WorkerConfig::default(),
            16,
            1,
        );
        let factory: Arc<dyn ProtocolFactory> = Arc::new(EchoFactory);

        let (first, _first_client) = create_test_connection().await;
        manager.add_connection(first, &factory).unwrap();

        let (second, second_client) = create_test_connection().await;
        assert!(matches!(
            manager.add_connection(second, &factory),
            Err(ServiceError::MaxConnectionsReached(1))
        ));
        assert_eq!(manager.connection_count(), 1);

        // the rejected socket was dropped
        let mut lines = BufReader::new(second_client).lines();
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_manager_broadcast() {
        let manager = manager();
        let factory: Arc<dyn ProtocolFactory> = Arc::new(EchoFactory);

        let mut clients = Vec::new();
        for _ in 0..3 {
            let (server, client) = create_test_connection().await;
            manager.add_connection(server, &factory).unwrap();
            clients.push(BufReader::new(client).lines());
        }

        let result = manager.broadcast("attention");
        assert_eq!(result.total, 3);
        assert!(result.all_succeeded());

        for lines in &mut clients {
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("attention"));
        }

        manager
            .shutdown(ShutdownMode::Force, Duration::from_secs(1), None)
            .await;
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_manager_drain_sends_notice() {
        let manager = manager();
        let factory: Arc<dyn ProtocolFactory> = Arc::new(EchoFactory);

        let (server, client) = create_test_connection().await;
        manager.add_connection(server, &factory).unwrap();
        let mut lines = BufReader::new(client).lines();

        manager
            .shutdown(
                ShutdownMode::Drain,
                Duration::from_millis(100),
                Some("server going down"),
            )
            .await;

        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("server going down")
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_manager_survives_protocol_panic() {
        let manager = manager();
        let factory: Arc<dyn ProtocolFactory> = Arc::new(PanickyFactory);

        let (server, mut client) = create_test_connection().await;
        let id = manager.add_connection(server, &factory).unwrap();
        let connection = manager.get_connection(id).unwrap();

        client.write_all(b"trigger\n").await.unwrap();
        wait_for_count(&manager, 0).await;
        assert!(connection.is_closed());
    }
}
