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

//! Echo every line back, with a greeting that reports server load

use async_trait::async_trait;
use linewire_service::{LineConnection, LineProtocol, ProtocolFactory, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Factory for [`EchoProtocol`], tracking how many echo sessions are open
#[derive(Debug, Default)]
pub struct EchoFactory {
    open: Arc<AtomicUsize>,
}

impl EchoFactory {
    /// Create a factory with no open sessions
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently open
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolFactory for EchoFactory {
    async fn on_start(&self) -> Result<()> {
        info!("Echo factory started");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        info!(open = self.open_connections(), "Echo factory stopped");
        Ok(())
    }

    fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
        self.open.fetch_add(1, Ordering::SeqCst);
        Box::new(EchoProtocol {
            session: OpenSession {
                open: self.open.clone(),
            },
        })
    }
}

/// Counts as open until dropped, however the session ends
#[derive(Debug)]
struct OpenSession {
    open: Arc<AtomicUsize>,
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Line echo session
#[derive(Debug)]
pub struct EchoProtocol {
    session: OpenSession,
}

#[async_trait]
impl LineProtocol for EchoProtocol {
    async fn on_connect(&mut self, conn: &LineConnection) -> Result<()> {
        let open = self.session.open.load(Ordering::SeqCst);
        let port = conn.local_addr().port();
        info!(connection_id = %conn.id(), open, "Connection made");

        conn.send_line(format!(
            "Welcome! There are currently {open} open connections."
        ))?;
        conn.send_line(format!("The port you are connecting to is {port}."))
    }

    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
        conn.send_line(line)
    }

    async fn on_disconnect(&mut self, conn: &LineConnection) {
        info!(
            connection_id = %conn.id(),
            open = self.session.open.load(Ordering::SeqCst) - 1,
            "Connection lost"
        );
    }
}
