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

//! Protocol traits
//!
//! A [`ProtocolFactory`] is shared by the whole server; it is started before
//! the first connection is accepted, stopped once after the last, and builds
//! one [`LineProtocol`] per accepted connection. The protocol instance is
//! owned by that connection's worker, so it can keep per-connection state in
//! plain fields.

use crate::{LineConnection, Result, ServiceError};
use async_trait::async_trait;

/// Shared per-server protocol factory
///
/// # Example
///
/// ```no_run
/// use linewire_service::{LineConnection, LineProtocol, ProtocolFactory, Result};
/// use async_trait::async_trait;
///
/// struct Shout;
///
/// #[async_trait]
/// impl LineProtocol for Shout {
///     async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
///         conn.send_line(line.to_uppercase())
///     }
/// }
///
/// struct ShoutFactory;
///
/// #[async_trait]
/// impl ProtocolFactory for ShoutFactory {
///     fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
///         Box::new(Shout)
///     }
/// }
/// ```
#[async_trait]
pub trait ProtocolFactory: Send + Sync + 'static {
    /// Called once before the listener accepts its first connection
    ///
    /// An error aborts [`LineServer::start`](crate::LineServer::start).
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Called exactly once after the listener stopped and connections ended
    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Build the protocol instance for a freshly accepted connection
    fn build_protocol(&self, conn: &LineConnection) -> Box<dyn LineProtocol>;
}

/// Per-connection protocol state machine
///
/// Returning an error from [`on_connect`](Self::on_connect) or
/// [`on_line`](Self::on_line) ends this connection only: the worker calls
/// [`on_error`](Self::on_error), flushes whatever was queued, closes the
/// socket and finally calls [`on_disconnect`](Self::on_disconnect).
#[async_trait]
pub trait LineProtocol: Send + 'static {
    /// Called once the connection is set up, before any line is read
    async fn on_connect(&mut self, _conn: &LineConnection) -> Result<()> {
        Ok(())
    }

    /// Called for every complete line, in arrival order
    ///
    /// The line has its terminator removed.
    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()>;

    /// Called when the connection is about to close because of `error`
    ///
    /// Lines sent from here still reach the peer.
    async fn on_error(&mut self, _conn: &LineConnection, _error: &ServiceError) {}

    /// Called when no line arrived within the idle timeout
    async fn on_timeout(&mut self, _conn: &LineConnection) {}

    /// Called last, after the connection has been closed
    async fn on_disconnect(&mut self, _conn: &LineConnection) {}
}
