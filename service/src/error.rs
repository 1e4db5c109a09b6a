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

//! Error types for the line protocol service

use crate::types::ConnectionId;
use linewire_linecodec::LineCodecError;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Line service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// I/O error from the underlying TCP stream (peer reset, write failure)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the line codec
    #[error("Framing error: {0}")]
    Codec(#[from] LineCodecError),

    /// A request line could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A request asked for a division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// A request overflowed 64-bit integer arithmetic
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// The requested display name is already registered
    #[error("name '{0}' is already taken")]
    NameAlreadyTaken(String),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// The connection's outbound queue is full (peer not reading)
    #[error("Outbound queue full on {0}")]
    SendQueueFull(ConnectionId),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Maximum number of connections reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A shared resource (log file, etc.) is not available
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),
}

impl ServiceError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors leave the connection usable; the caller may
    /// report them to the peer and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::NameAlreadyTaken(_) | ServiceError::SendQueueFull(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ServiceError::ConnectionNotFound(_)
                | ServiceError::ConnectionClosed
                | ServiceError::Io(_)
                | ServiceError::Timeout
        )
    }

    /// Check if the error was caused by the content of a request line
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ServiceError::MalformedRequest(_)
                | ServiceError::DivisionByZero
                | ServiceError::ArithmeticOverflow
        )
    }

    /// Check if the error came from the framing layer
    pub fn is_framing_error(&self) -> bool {
        matches!(self, ServiceError::Codec(_))
    }

    /// Check if the peer exceeded the maximum line length
    pub fn is_frame_too_long(&self) -> bool {
        matches!(self, ServiceError::Codec(e) if e.is_frame_too_long())
    }
}
