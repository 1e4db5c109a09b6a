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

//! # Linewire Line Codec
//!
//! Newline framing for byte streams. [`LineFramer`] is the synchronous core:
//! feed it chunks as they arrive and pull out complete lines. [`LineCodec`]
//! adapts the same framer to `tokio_util::codec` so a socket half can be
//! wrapped in `FramedRead`/`FramedWrite`.
//!
//! ```rust
//! use linewire_linecodec::{LineCodec, LineFramer};
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//!
//! let mut framer = LineFramer::with_max_length(1024);
//! for line in framer.feed(b"add 3 4\ndivide 7 2\n") {
//!     println!("request: {:?}", line.unwrap());
//! }
//!
//! let mut codec = LineCodec::new();
//! let mut input = BytesMut::from(&b"hello\n"[..]);
//! assert_eq!(codec.decode(&mut input).unwrap().as_deref(), Some("hello"));
//! ```
//!
//! ## Framing rules
//!
//! - Lines end at `\n`; one `\r` directly before it is removed as well.
//! - Only complete lines are emitted, in arrival order, exactly once.
//! - With a maximum length configured, a line (complete or still partial)
//!   longer than the bound produces [`LineCodecError::FrameTooLong`] and the
//!   buffer is discarded. Callers are expected to drop the connection.
//! - Outbound lines may not contain `\n`. A `\r` inside a line is ordinary
//!   data in both directions.

#![warn(
    missing_docs,
    future_incompatible,
    rust_2018_idioms
)]

mod codec;
mod framer;
mod result;

pub use codec::LineCodec;
pub use framer::{DEFAULT_MAX_LINE_LENGTH, LineEnding, LineFramer, Lines};
pub use result::{CodecResult, LineCodecError};
