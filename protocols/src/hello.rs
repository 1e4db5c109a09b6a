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

//! Greet on connect, hang up on the first reply

use async_trait::async_trait;
use linewire_service::{LineConnection, LineProtocol, ProtocolFactory, Result};
use std::sync::Arc;
use tracing::info;

/// Lines sent by [`HelloFactory::default`]
pub const DEFAULT_GREETING: [&str; 2] = ["Hello, this is a linewire server!", "Bye bye ~"];

/// Factory for [`HelloProtocol`]
#[derive(Debug, Clone)]
pub struct HelloFactory {
    greeting: Arc<[String]>,
}

impl HelloFactory {
    /// Greet every connection with `lines`, in order
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            greeting: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// The greeting lines
    pub fn greeting(&self) -> &[String] {
        &self.greeting
    }
}

impl Default for HelloFactory {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

#[async_trait]
impl ProtocolFactory for HelloFactory {
    fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
        Box::new(HelloProtocol {
            greeting: self.greeting.clone(),
        })
    }
}

/// One-shot session: the greeting goes out, the first line received ends it
#[derive(Debug)]
pub struct HelloProtocol {
    greeting: Arc<[String]>,
}

#[async_trait]
impl LineProtocol for HelloProtocol {
    async fn on_connect(&mut self, conn: &LineConnection) -> Result<()> {
        for line in self.greeting.iter() {
            conn.send_line(line.as_str())?;
        }
        Ok(())
    }

    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
        info!(connection_id = %conn.id(), %line, "Received reply, closing");
        conn.close();
        Ok(())
    }
}
