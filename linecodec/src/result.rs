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

//! Error types for line framing

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, LineCodecError>;

/// Errors raised while framing or unframing lines.
#[derive(Debug, thiserror::Error)]
pub enum LineCodecError {
    /// The peer sent more than `limit` bytes without a delimiter, or a
    /// complete line longer than `limit`.
    ///
    /// The framer discards its buffer after reporting this error; the
    /// connection should be terminated.
    #[error("line exceeds maximum length of {limit} bytes")]
    FrameTooLong {
        /// Configured maximum line length
        limit: usize,
    },

    /// A decoded line was not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    /// An outbound line contained a line delimiter and would split into
    /// several frames on the wire.
    #[error("outbound line contains an embedded line delimiter")]
    EmbeddedDelimiter,

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineCodecError {
    /// Check if the error was caused by an over-long line
    pub fn is_frame_too_long(&self) -> bool {
        matches!(self, LineCodecError::FrameTooLong { .. })
    }
}
