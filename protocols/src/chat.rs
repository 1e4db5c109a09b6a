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

//! Multi-user chat
//!
//! A connection starts unauthenticated and is asked for a display name.
//! Once a free name is supplied the connection is registered under it and
//! every further line is relayed to all other registered users as
//! `<name> message`.

use async_trait::async_trait;
use linewire_service::{
    LineConnection, LineProtocol, ProtocolFactory, Registry, Result, ServiceError,
};
use tracing::{debug, info};

/// Sent when a connection opens, and again after an empty name
pub const NAME_PROMPT: &str = "What's your name?";

/// Sent when the requested name is registered to someone else
pub const NAME_TAKEN: &str = "Name taken, please choose another.";

/// Per-connection chat state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatState {
    /// Waiting for a display name
    Unauthenticated,
    /// Logged in; lines are chat messages
    Active {
        /// Registered display name
        name: String,
    },
}

/// Builds [`ChatProtocol`] instances sharing one [`Registry`]
#[derive(Debug, Clone, Default)]
pub struct ChatFactory {
    registry: Registry,
}

impl ChatFactory {
    /// Create a factory whose users are registered in `registry`
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// The registry of logged-in users
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[async_trait]
impl ProtocolFactory for ChatFactory {
    fn build_protocol(&self, _conn: &LineConnection) -> Box<dyn LineProtocol> {
        Box::new(ChatProtocol::new(self.registry.clone()))
    }
}

/// Chat state machine for one connection
#[derive(Debug)]
pub struct ChatProtocol {
    registry: Registry,
    state: ChatState,
}

impl ChatProtocol {
    /// Create an unauthenticated session
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            state: ChatState::Unauthenticated,
        }
    }

    /// Current state
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    fn login(&mut self, conn: &LineConnection, name: String) -> Result<()> {
        if name.is_empty() {
            return conn.send_line(NAME_PROMPT);
        }

        let welcome = format!("Welcome, {name}!");
        match self.registry.register_with_greeting(&name, conn, &welcome) {
            Ok(()) => {
                info!(connection_id = %conn.id(), name = %name, "User login");
                self.state = ChatState::Active { name };
                Ok(())
            }
            Err(ServiceError::NameAlreadyTaken(_)) => {
                debug!(connection_id = %conn.id(), name = %name, "Name taken");
                conn.send_line(NAME_TAKEN)
            }
            Err(e) => Err(e),
        }
    }

    fn relay(&self, conn: &LineConnection, name: &str, message: &str) {
        let line = format!("<{name}> {message}");
        info!(connection_id = %conn.id(), message = %line, "Received message");

        let result = self.registry.broadcast_except(conn.id(), &line);
        if !result.all_succeeded() {
            debug!(
                failed = result.failed,
                total = result.total,
                "Some recipients missed a message"
            );
        }
    }
}

#[async_trait]
impl LineProtocol for ChatProtocol {
    async fn on_connect(&mut self, conn: &LineConnection) -> Result<()> {
        conn.send_line(NAME_PROMPT)
    }

    async fn on_line(&mut self, conn: &LineConnection, line: String) -> Result<()> {
        match &self.state {
            ChatState::Unauthenticated => self.login(conn, line),
            ChatState::Active { name } => {
                self.relay(conn, name, &line);
                Ok(())
            }
        }
    }

    async fn on_disconnect(&mut self, conn: &LineConnection) {
        if let ChatState::Active { name } = &self.state {
            info!(connection_id = %conn.id(), name = %name, "User logout");
        }
    }
}
