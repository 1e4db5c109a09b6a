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

//! Line logger on port 8109
//!
//! Every line received from any connection is appended to `log.txt` in the
//! working directory (or the path given as the first argument).

use linewire_protocols::LogFileFactory;
use linewire_service::{LineServer, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "log.txt".to_string());

    let server = LineServer::new(ServerConfig::default().with_port(8109)).await?;
    server.start(Arc::new(LogFileFactory::new(&path))).await?;
    println!("Logging lines from port 8109 to {path}");
    println!("Try: echo 'something happened' | nc localhost 8109");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await?;
    Ok(())
}
