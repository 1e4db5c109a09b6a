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

//! Integer calculator on port 8110
//!
//! Requests look like `add 3 4`; `subtract`, `multiply` and `divide` work
//! the same way. A bad request gets an `ERROR ...` line and the connection
//! is closed.

use linewire_protocols::CalcFactory;
use linewire_service::LineServer;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let server = LineServer::start_on_port(8110, Arc::new(CalcFactory)).await?;
    println!("Calculation server listening on {}", server.bind_address());
    println!("Try: echo 'add 3 4' | nc localhost 8110");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await?;

    let metrics = server.metrics().snapshot();
    println!(
        "Served {} connections, {} requests, {} errors",
        metrics.total_connections, metrics.lines_received, metrics.protocol_errors
    );
    Ok(())
}
