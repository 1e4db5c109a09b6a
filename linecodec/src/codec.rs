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

//! `tokio_util` codec adapter for [`LineFramer`]

use crate::{LineCodecError, LineEnding, LineFramer};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

/// Newline-delimited UTF-8 codec.
///
/// Wraps a [`LineFramer`] so it can be used with `FramedRead`,
/// `FramedWrite` or `Framed`. Each decoded item is one line without its
/// delimiter; each encoded item gets the configured line ending appended.
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    framer: LineFramer,
}

impl LineCodec {
    /// Create an unbounded codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec that fails with [`LineCodecError::FrameTooLong`] once
    /// a line grows past `max_length` bytes.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            framer: LineFramer::with_max_length(max_length),
        }
    }

    /// Create a codec from optional settings.
    pub fn from_settings(max_length: Option<usize>, line_ending: LineEnding) -> Self {
        let mut framer = LineFramer::new().with_line_ending(line_ending);
        framer.set_max_length(max_length);
        Self { framer }
    }

    /// Returns a reference to the inner framer.
    pub fn framer(&self) -> &LineFramer {
        &self.framer
    }

    /// Returns a mutable reference to the inner framer.
    pub fn framer_mut(&mut self) -> &mut LineFramer {
        &mut self.framer
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.framer.absorb(src);
        match self.framer.next_line()? {
            Some(line) => {
                let line = String::from_utf8(line.to_vec())
                    .map_err(|_| LineCodecError::InvalidUtf8)?;
                trace!(length = line.len(), "Decoded line");
                Ok(Some(line))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if let Some(rest) = self.framer.take_remainder() {
                    debug!(bytes = rest.len(), "Discarding unterminated line at end of stream");
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.framer.encode(item, dst)
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.framer.encode(&item, dst)
    }
}
