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

//! Client error types

use linewire_linecodec::LineCodecError;
use std::io;

/// Client error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Framing error on the wire
    #[error("Codec error: {0}")]
    Codec(#[from] LineCodecError),

    /// Connection attempt did not complete in time
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// No line arrived within the read timeout
    #[error("Read timeout")]
    ReadTimeout,

    /// Connection closed by server
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// The server sent a line other than the one expected
    #[error("Unexpected line: expected {expected:?}, got {actual:?}")]
    UnexpectedLine {
        /// Line the caller expected
        expected: String,
        /// Line actually received
        actual: String,
    },
}

impl ClientError {
    /// Check if the server has gone away
    pub fn is_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;
