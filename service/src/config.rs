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

//! Server configuration

use crate::{Result, ServiceError};
use linewire_linecodec::{DEFAULT_MAX_LINE_LENGTH, LineEnding};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// How open connections are treated when the server stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Stop accepting, let connections finish until `shutdown_timeout`
    /// elapses, then close whatever is left
    #[default]
    Drain,
    /// Stop accepting and close every connection immediately
    Force,
}

/// Server configuration
///
/// Use the builder methods to customize the configuration.
///
/// # Example
///
/// ```
/// use linewire_service::{ServerConfig, ShutdownMode};
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_port(8123)
///     .with_max_connections(500)
///     .with_idle_timeout(Duration::from_secs(600))
///     .with_shutdown_mode(ShutdownMode::Force);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    ///
    /// Port `0` asks the OS for an ephemeral port; use
    /// [`LineServer::bind_address`](crate::LineServer::bind_address) to
    /// discover the port that was chosen.
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    ///
    /// Sockets accepted beyond this limit are closed immediately.
    pub max_connections: usize,

    /// Longest line accepted from a peer, in bytes, excluding the terminator
    ///
    /// `None` disables the limit.
    pub max_line_length: Option<usize>,

    /// Terminator appended to outbound lines
    pub line_ending: LineEnding,

    /// Close connections that send nothing for this long
    pub idle_timeout: Option<Duration>,

    /// Timeout for a single outbound write
    pub write_timeout: Duration,

    /// How long a draining shutdown waits before closing connections
    pub shutdown_timeout: Duration,

    /// Whether shutdown drains or force-closes connections
    pub shutdown_mode: ShutdownMode,

    /// Capacity of each connection's outbound line queue
    pub outbound_buffer: usize,

    /// Line sent to every connection when a draining shutdown begins
    pub shutdown_notice: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            max_connections: 1000,
            max_line_length: Some(DEFAULT_MAX_LINE_LENGTH),
            line_ending: LineEnding::default(),
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            shutdown_mode: ShutdownMode::default(),
            outbound_buffer: 1024,
            shutdown_notice: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Keep the bind IP but listen on `port`
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address.set_port(port);
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum inbound line length (`None` for unbounded)
    pub fn with_max_line_length(mut self, max: Option<usize>) -> Self {
        self.max_line_length = max;
        self
    }

    /// Set the outbound line terminator
    pub fn with_line_ending(mut self, ending: LineEnding) -> Self {
        self.line_ending = ending;
        self
    }

    /// Set the idle timeout duration
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the shutdown mode
    pub fn with_shutdown_mode(mut self, mode: ShutdownMode) -> Self {
        self.shutdown_mode = mode;
        self
    }

    /// Set the per-connection outbound queue capacity
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity;
        self
    }

    /// Set a line announced to every connection when a draining shutdown starts
    pub fn with_shutdown_notice(mut self, notice: impl Into<String>) -> Self {
        self.shutdown_notice = Some(notice.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(invalid("max_connections must be greater than 0"));
        }

        if self.max_line_length == Some(0) {
            return Err(invalid("max_line_length must be greater than 0"));
        }

        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("idle_timeout must be greater than 0"));
        }

        if self.write_timeout.is_zero() {
            return Err(invalid("write_timeout must be greater than 0"));
        }

        if self.outbound_buffer == 0 {
            return Err(invalid("outbound_buffer must be greater than 0"));
        }

        if let Some(notice) = &self.shutdown_notice
            && notice.contains('\n')
        {
            return Err(invalid("shutdown_notice must be a single line"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ServiceError {
    ServiceError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_line_length, Some(DEFAULT_MAX_LINE_LENGTH));
        assert_eq!(config.line_ending, LineEnding::Lf);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.shutdown_mode, ShutdownMode::Drain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::default()
            .with_port(8123)
            .with_max_connections(500)
            .with_idle_timeout(Duration::from_secs(600))
            .with_line_ending(LineEnding::CrLf)
            .with_shutdown_notice("bye");

        assert_eq!(config.bind_address.port(), 8123);
        assert_eq!(config.max_connections, 500);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert_eq!(config.shutdown_notice.as_deref(), Some("bye"));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_ok());

        config.max_connections = 0;
        assert!(matches!(
            config.validate(),
            Err(ServiceError::InvalidConfig(_))
        ));

        config.max_connections = 1000;
        config.idle_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        config.idle_timeout = None;
        config.outbound_buffer = 0;
        assert!(config.validate().is_err());

        config.outbound_buffer = 8;
        config.shutdown_notice = Some("two\nlines".into());
        assert!(config.validate().is_err());
    }
}
