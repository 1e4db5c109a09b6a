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

//! # Linewire Protocols
//!
//! Ready-made [`LineProtocol`](linewire_service::LineProtocol)s for
//! [`linewire_service::LineServer`]:
//!
//! - [`chat`]: name login followed by a chat room shared through a
//!   [`Registry`](linewire_service::Registry)
//! - [`calc`]: `add`/`subtract`/`multiply`/`divide` over 64-bit integers
//! - [`logging`]: append every line to a file shared by all connections
//! - [`echo`]: send every line back
//! - [`hello`]: send a greeting and close once the peer answers
//!
//! ```no_run
//! use linewire_protocols::ChatFactory;
//! use linewire_service::{LineServer, Registry, ServerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> linewire_service::Result<()> {
//! let server = LineServer::new(ServerConfig::default().with_port(8123)).await?;
//! server.start(Arc::new(ChatFactory::new(Registry::new()))).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, future_incompatible, rust_2018_idioms)]

pub mod calc;
pub mod chat;
pub mod echo;
pub mod hello;
pub mod logging;

pub use calc::{CalcFactory, CalcProtocol, Operation, Request};
pub use chat::{ChatFactory, ChatProtocol, ChatState, NAME_PROMPT, NAME_TAKEN};
pub use echo::{EchoFactory, EchoProtocol};
pub use hello::{DEFAULT_GREETING, HelloFactory, HelloProtocol};
pub use logging::{LogFileFactory, LoggingProtocol};
