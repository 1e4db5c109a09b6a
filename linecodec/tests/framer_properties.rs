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

//! Property tests for chunked line framing

use linewire_linecodec::LineFramer;
use proptest::prelude::*;

/// Split `data` at the given (sorted, deduplicated) cut points.
fn chunk(data: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.retain(|cut| *cut <= data.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

proptest! {
    #[test]
    fn every_delimited_line_is_emitted_once_in_order(
        stream in proptest::collection::vec(prop_oneof![Just(b'\n'), Just(b'\r'), b'a'..=b'z', Just(b' ')], 0..512),
        cuts in proptest::collection::vec(0usize..512, 0..32),
    ) {
        let mut framer = LineFramer::new();
        let mut emitted = Vec::new();
        for piece in chunk(&stream, cuts) {
            for line in framer.feed(piece) {
                emitted.push(line.unwrap().to_vec());
            }
        }

        let delimiters = stream.iter().filter(|byte| **byte == b'\n').count();
        prop_assert_eq!(emitted.len(), delimiters);

        let expected: Vec<Vec<u8>> = stream
            .split(|byte| *byte == b'\n')
            .take(delimiters)
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
            .collect();
        prop_assert_eq!(emitted, expected);

        let tail_start = stream.iter().rposition(|byte| *byte == b'\n').map_or(0, |i| i + 1);
        prop_assert_eq!(framer.buffered(), &stream[tail_start..]);
    }

    #[test]
    fn chunk_without_delimiter_never_emits(
        first in "[a-z ]{0,64}",
        second in "[a-z ]{0,64}",
    ) {
        let mut framer = LineFramer::new();
        prop_assert_eq!(framer.feed(first.as_bytes()).count(), 0);

        let mut tail = second.clone().into_bytes();
        tail.push(b'\n');
        let lines: Vec<_> = framer.feed(&tail).map(Result::unwrap).collect();

        prop_assert_eq!(lines.len(), 1);
        prop_assert_eq!(lines[0].to_vec(), format!("{first}{second}").into_bytes());
    }

    #[test]
    fn bounded_framer_never_buffers_past_limit(
        data in proptest::collection::vec(prop_oneof![Just(b'\n'), b'a'..=b'z'], 0..256),
        limit in 1usize..32,
    ) {
        let mut framer = LineFramer::with_max_length(limit);
        for line in framer.feed(&data) {
            match line {
                Ok(line) => prop_assert!(line.len() <= limit),
                Err(e) => prop_assert!(e.is_frame_too_long()),
            }
        }
        prop_assert!(framer.buffered().len() <= limit + 1);
    }
}
