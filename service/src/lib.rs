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

//! Line-framed TCP service core
//!
//! This crate accepts TCP connections, splits each byte stream into
//! newline-delimited lines and hands them to a pluggable protocol:
//!
//! - every connection runs in its own task that owns the socket
//! - sending never waits on the peer; lines go through a bounded queue
//! - a shared [`Registry`] maps display names to live connections and is
//!   cleaned up synchronously when a connection closes, even if its
//!   protocol panics
//! - startup and shutdown hooks on the [`ProtocolFactory`] run exactly once
//!   per server run
//!
//! # Architecture
//!
//! ```text
//! LineServer
//!     ↓
//! ConnectionManager
//!     ↓
//! ConnectionWorker → LineConnection ← Registry
//!     ↓
//! LineProtocol
//! ```
//!
//! # Example
//!
//! ```no_run
//! use linewire_service::{
//!     LineConnection, LineProtocol, LineServer, ProtocolFactory, Result, ServerConfig,
//! };
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl LineProtocol for Greeter {
//!     async fn on_connect(&mut self, conn: &LineConnection) -> Result<()> {
//!         conn.send_line("Who are you?")
//!     }
//!
//!     async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
//!         conn.send_line(format!("Hello, {line}!"))?;
//!         conn.close();
//!         Ok(())
//!     }
//! }
//!
//! struct GreeterFactory;
//!
//! #[async_trait]
//! impl ProtocolFactory for GreeterFactory {
//!     fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
//!         Box::new(Greeter)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = LineServer::new(ServerConfig::default().with_port(7000)).await?;
//!     server.start(Arc::new(GreeterFactory)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

mod config;
mod connection;
mod error;
mod handler;
mod manager;
mod metrics;
mod registry;
mod server;
mod types;
mod worker;

pub use config::{ServerConfig, ShutdownMode};
pub use connection::LineConnection;
pub use error::{Result, ServiceError};
pub use handler::{LineProtocol, ProtocolFactory};
pub use linewire_linecodec::{LineCodecError, LineEnding};
pub use manager::ConnectionManager;
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::{Registration, Registry};
pub use server::LineServer;
pub use types::{BroadcastResult, ConnectionId, ConnectionInfo, ConnectionState, ServerSnapshot};
pub use worker::{ConnectionWorker, WorkerConfig};
