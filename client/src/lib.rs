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

//! # Linewire Client
//!
//! A small async client for line-framed TCP services. It speaks the same
//! framing as the server side (`\n` terminated, `\r\n` tolerated) and is
//! used by the end-to-end tests and the `line_client` demo.
//!
//! ```no_run
//! use linewire_client::{ClientConfig, LineClient};
//!
//! # async fn run() -> linewire_client::Result<()> {
//! let mut client = LineClient::connect(ClientConfig::new("127.0.0.1", 8110)).await?;
//! client.send_line("add 3 4").await?;
//! assert_eq!(client.recv_line().await?, "7");
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    future_incompatible,
    rust_2018_idioms
)]

mod client;
mod config;
mod error;

pub use client::LineClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use linewire_linecodec::LineEnding;
