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

//! Line server implementation
//!
//! The LineServer owns the TCP listener, runs the factory's start and stop
//! hooks, accepts connections and hands them to the ConnectionManager.
//!
//! The listener lives inside the accept loop while the server runs and is
//! closed when the loop ends, so peers are refused after shutdown. A restart
//! binds the same address again.

use crate::{
    ConnectionManager, ProtocolFactory, Result, ServerConfig, ServerMetrics, ServerSnapshot,
    ServiceError, WorkerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// State of one start/shutdown cycle
struct RunState {
    factory: Arc<dyn ProtocolFactory>,
    cancel: CancellationToken,
    accept_handle: JoinHandle<()>,
}

/// Line server
///
/// # Example
///
/// ```no_run
/// use linewire_service::{
///     LineConnection, LineProtocol, LineServer, ProtocolFactory, Result, ServerConfig,
/// };
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct Echo;
///
/// #[async_trait]
/// impl LineProtocol for Echo {
///     async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
///         conn.send_line(line)
///     }
/// }
///
/// struct EchoFactory;
///
/// #[async_trait]
/// impl ProtocolFactory for EchoFactory {
///     fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
///         Box::new(Echo)
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let server = LineServer::new(ServerConfig::default().with_port(8007)).await?;
///     server.start(Arc::new(EchoFactory)).await?;
///
///     // tokio::signal::ctrl_c().await?;
///     server.shutdown().await
/// }
/// ```
pub struct LineServer {
    /// Server configuration
    config: ServerConfig,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Listener bound by `new`, taken by the first accept loop
    listener: Mutex<Option<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server creation time
    started_at: Instant,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Present between `start` and `shutdown`
    run: Mutex<Option<RunState>>,
}

impl LineServer {
    /// Create a new server with the given configuration
    ///
    /// This validates the configuration and binds the listener but does not
    /// accept connections yet. Call [`start`](Self::start) for that.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let actual_addr = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let manager = Arc::new(ConnectionManager::new(
            metrics.clone(),
            WorkerConfig::from(&config),
            config.outbound_buffer,
            config.max_connections,
        ));

        tracing::info!("Line server bound to {}", actual_addr);

        Ok(Self {
            config,
            manager,
            metrics,
            listener: Mutex::new(Some(listener)),
            bind_address: actual_addr,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            run: Mutex::new(None),
        })
    }

    /// Bind `port` on localhost with default settings and start serving
    pub async fn start_on_port(port: u16, factory: Arc<dyn ProtocolFactory>) -> Result<Self> {
        let server = Self::new(ServerConfig::default().with_port(port)).await?;
        server.start(factory).await?;
        Ok(server)
    }

    /// Start the server with the given factory
    ///
    /// The factory's `on_start` hook completes before the first connection
    /// is accepted; if it fails the server stays stopped and the error is
    /// returned. A server that was shut down can be started again.
    pub async fn start(&self, factory: Arc<dyn ProtocolFactory>) -> Result<()> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(ServiceError::ServerAlreadyRunning);
        }

        let listener = match self.listener.lock().await.take() {
            Some(listener) => listener,
            None => {
                tracing::debug!("Rebinding listener on {}", self.bind_address);
                TcpListener::bind(self.bind_address).await?
            }
        };

        if let Err(e) = factory.on_start().await {
            *self.listener.lock().await = Some(listener);
            return Err(e);
        }

        tracing::info!("Starting line server on {}", self.bind_address);

        self.manager.reopen();
        let cancel = CancellationToken::new();
        let accept_handle = self.spawn_accept_loop(listener, factory.clone(), cancel.clone());
        *run = Some(RunState {
            factory,
            cancel,
            accept_handle,
        });
        self.running.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn spawn_accept_loop(
        &self,
        listener: TcpListener,
        factory: Arc<dyn ProtocolFactory>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.manager.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            loop {
                let accept_result = tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = listener.accept() => result,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        tracing::debug!("Accepted connection from {}", peer_addr);

                        match manager.add_connection(socket, &factory) {
                            Ok(_) => {}
                            Err(e @ ServiceError::MaxConnectionsReached(_)) => {
                                tracing::warn!("Rejecting connection from {}: {}", peer_addr, e);
                                metrics.connection_rejected();
                            }
                            Err(e) => {
                                tracing::error!("Failed to add connection from {}: {}", peer_addr, e);
                                metrics.connection_error();
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        metrics.connection_error();

                        // Back off on errors to avoid tight loop
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }

            drop(listener);
            tracing::info!("Accept loop terminated, listener closed");
        })
    }

    /// Shut the server down
    ///
    /// Closes the listener, drains or force-closes the open connections according
    /// to [`ServerConfig::shutdown_mode`], then runs the factory's `on_stop`
    /// hook. Every successful `start` is matched by exactly one `on_stop`.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(run) = self.run.lock().await.take() else {
            return Err(ServiceError::ServerNotRunning);
        };
        self.running.store(false, Ordering::SeqCst);

        tracing::info!("Shutting down line server");

        run.cancel.cancel();
        if tokio::time::timeout(Duration::from_secs(5), run.accept_handle)
            .await
            .is_err()
        {
            tracing::warn!("Accept loop did not stop in time");
        }

        self.manager
            .shutdown(
                self.config.shutdown_mode,
                self.config.shutdown_timeout,
                self.config.shutdown_notice.as_deref(),
            )
            .await;

        let stopped = run.factory.on_stop().await;
        if let Err(e) = &stopped {
            tracing::error!("Protocol factory failed to stop cleanly: {}", e);
        }

        tracing::info!("Line server shutdown complete");
        stopped
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.manager.connection_count(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.bind_address(),
            running: self.is_running(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the connection manager
    pub fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for LineServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineServer")
            .field("bind_address", &self.bind_address())
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for LineServer {
    fn drop(&mut self) {
        let Some(run) = self.run.get_mut().take() else {
            return;
        };
        tracing::warn!("LineServer dropped while still running");
        self.running.store(false, Ordering::SeqCst);
        run.cancel.cancel();
        self.manager.close_all();

        // on_stop still runs once if there is a runtime to run it on
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let factory = run.factory;
                handle.spawn(async move {
                    if let Err(e) = factory.on_stop().await {
                        tracing::error!("Protocol factory failed to stop cleanly: {}", e);
                    }
                });
            }
            Err(_) => tracing::error!("No runtime available, on_stop skipped"),
        }
    }
}
