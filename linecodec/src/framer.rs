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

//! Incremental newline framer
//!
//! [`LineFramer`] turns an arbitrarily chunked byte stream into complete
//! lines. Bytes are accumulated until a `\n` is seen; everything before it
//! (minus an optional `\r`) is emitted as one line and the delimiter is
//! dropped. Only the incomplete trailing fragment stays buffered between
//! calls, and scanning resumes where the previous call stopped so a long
//! partial line is never rescanned.

use crate::{CodecResult, LineCodecError};
use bytes::{BufMut, Bytes, BytesMut};
use std::iter::FusedIterator;

/// Maximum line length used when a bound is requested without a value.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024;

/// Line terminator appended to outbound lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// The terminator bytes
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

/// Stateful newline framer.
///
/// # Example
///
/// ```
/// use linewire_linecodec::LineFramer;
///
/// let mut framer = LineFramer::new();
/// let lines: Vec<_> = framer.feed(b"hello\nwor").map(Result::unwrap).collect();
/// assert_eq!(lines, vec![&b"hello"[..]]);
///
/// let lines: Vec<_> = framer.feed(b"ld\n").map(Result::unwrap).collect();
/// assert_eq!(lines, vec![&b"world"[..]]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LineFramer {
    buffer: BytesMut,
    scanned: usize,
    max_length: Option<usize>,
    line_ending: LineEnding,
}

impl LineFramer {
    /// Create an unbounded framer that writes `\n` line endings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer that rejects lines longer than `max_length` bytes.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::default()
        }
    }

    /// Set the line ending used by [`LineFramer::encode`].
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Change the maximum line length. `None` removes the bound.
    pub fn set_max_length(&mut self, max_length: Option<usize>) {
        self.max_length = max_length;
    }

    /// Current maximum line length
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Line ending appended on encode
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Bytes of the incomplete line currently held.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard any buffered partial line, returning it if it was non-empty.
    pub fn take_remainder(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    /// Append `chunk` to the stream and iterate the lines it completes.
    ///
    /// The returned iterator is lazy: each call to `next` extracts one line.
    /// Lines not pulled before the iterator is dropped stay buffered and are
    /// produced by the next call, so every line is emitted exactly once.
    pub fn feed(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer.extend_from_slice(chunk);
        Lines {
            framer: self,
            finished: false,
        }
    }

    /// Move all bytes out of `src` into the framer's buffer.
    pub fn absorb(&mut self, src: &mut BytesMut) {
        if src.is_empty() {
            return;
        }
        let incoming = src.split();
        if self.buffer.is_empty() {
            self.buffer = incoming;
        } else {
            self.buffer.extend_from_slice(&incoming);
        }
    }

    /// Extract the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> CodecResult<Option<Bytes>> {
        let newline = self.buffer[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n');

        match newline {
            Some(offset) => {
                let index = self.scanned + offset;
                self.scanned = 0;

                let mut line = self.buffer.split_to(index + 1);
                line.truncate(index);
                if line.last() == Some(&b'\r') {
                    line.truncate(index - 1);
                }

                if let Some(limit) = self.max_length {
                    if line.len() > limit {
                        return Err(self.overflow(limit));
                    }
                }
                Ok(Some(line.freeze()))
            }
            None => {
                self.scanned = self.buffer.len();
                if let Some(limit) = self.max_length {
                    // A trailing '\r' may be the first half of "\r\n".
                    let pending = self.buffer.len() - usize::from(self.buffer.last() == Some(&b'\r'));
                    if pending > limit {
                        return Err(self.overflow(limit));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Append `line` and the configured line ending to `dst`.
    pub fn encode(&self, line: &str, dst: &mut BytesMut) -> CodecResult<()> {
        if line.bytes().any(|byte| byte == b'\n') {
            return Err(LineCodecError::EmbeddedDelimiter);
        }
        let ending = self.line_ending.as_bytes();
        dst.reserve(line.len() + ending.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(ending);
        Ok(())
    }

    /// Encode a single line into a fresh buffer.
    pub fn encode_line(&self, line: &str) -> CodecResult<Bytes> {
        let mut dst = BytesMut::new();
        self.encode(line, &mut dst)?;
        Ok(dst.freeze())
    }

    fn overflow(&mut self, limit: usize) -> LineCodecError {
        tracing::warn!(
            limit,
            buffered = self.buffer.len(),
            "Discarding over-long line"
        );
        self.buffer.clear();
        self.scanned = 0;
        LineCodecError::FrameTooLong { limit }
    }
}

/// Lazy iterator over the lines completed by one [`LineFramer::feed`] call.
///
/// Yields `Err(FrameTooLong)` at most once and then ends.
#[derive(Debug)]
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
    finished: bool,
}

impl Iterator for Lines<'_> {
    type Item = CodecResult<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.framer.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Lines<'_> {}
