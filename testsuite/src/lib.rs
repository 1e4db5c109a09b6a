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

//! Shared harness for the end-to-end tests.
//!
//! Servers bind an ephemeral localhost port; clients connect with a short
//! read timeout so a missing reply fails the test instead of hanging it.

use linewire_client::{ClientConfig, LineClient};
use linewire_service::{LineServer, ProtocolFactory, ServerConfig, ShutdownMode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Read timeout used by [`connect`]
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Start `factory` on an ephemeral port
///
/// Shutdown force-closes open connections so tests holding clients do not
/// wait out the drain period.
pub async fn serve(factory: Arc<dyn ProtocolFactory>) -> LineServer {
    let config = ServerConfig::default().with_shutdown_mode(ShutdownMode::Force);
    serve_with(config, factory).await
}

/// Start `factory` with a custom configuration
pub async fn serve_with(config: ServerConfig, factory: Arc<dyn ProtocolFactory>) -> LineServer {
    let server = LineServer::new(config).await.expect("bind test server");
    server.start(factory).await.expect("start test server");
    server
}

/// Connect a client to `server`
pub async fn connect(server: &LineServer) -> LineClient {
    let config = ClientConfig::new("127.0.0.1", server.bind_address().port())
        .with_read_timeout(Some(READ_TIMEOUT));
    LineClient::connect(config).await.expect("connect test client")
}

/// Poll `check` until it holds, panicking after two seconds
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Wait until `server` has accepted `accepted` connections in total and
/// every one of them has finished
///
/// A worker only finishes after reading its peer's end of stream, so every
/// line those clients sent has been handled once this returns.
pub async fn wait_for_finished(server: &LineServer, accepted: u64) {
    wait_until(|| {
        server.metrics().total_connections() >= accepted && server.connection_count() == 0
    })
    .await;
}

/// Run `fut` with the standard read timeout
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(READ_TIMEOUT, fut)
        .await
        .expect("operation timed out")
}

/// A unique scratch file path under the system temp directory
pub fn scratch_file(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "linewire-suite-{}-{name}.txt",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}
