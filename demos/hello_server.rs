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

//! Hello server on port 8041

use linewire_protocols::HelloFactory;
use linewire_service::{LineServer, ServerConfig, ShutdownMode};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("Starting Linewire Hello Server on 127.0.0.1:8041");
    println!("Press Ctrl+C to stop the server\n");

    let config = ServerConfig::default()
        .with_port(8041)
        .with_idle_timeout(Duration::from_secs(60))
        .with_shutdown_mode(ShutdownMode::Force);
    let server = LineServer::new(config).await?;
    server.start(Arc::new(HelloFactory::default())).await?;

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down server...");
    server.shutdown().await?;
    println!("Server stopped");

    Ok(())
}
