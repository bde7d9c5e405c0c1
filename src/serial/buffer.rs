// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reassembly of serial bytes into lines.

use tracing::warn;

/// Longest partial line kept before the buffer gives up on it.
const MAX_PARTIAL_LINE: usize = 4096;

/// Accumulates raw serial bytes and hands them out one line at a time.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Append bytes read from the port.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        if !self.has_complete_line() && self.buffer.len() > MAX_PARTIAL_LINE {
            warn!(
                "Discarding {} bytes of serial input without a line terminator",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }

    pub fn has_complete_line(&self) -> bool {
        self.buffer.contains(&b'\n')
    }

    /// Remove exactly one line, without its `\n` or `\r\n` terminator.
    ///
    /// Returns `None` when no complete line is buffered.
    pub fn read_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes buffered but not yet returned as a line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_reads() {
        let mut buf = LineBuffer::new();

        buf.push(b"ts:1");
        assert!(!buf.has_complete_line());
        assert_eq!(buf.read_line(), None);

        buf.push(b"00\r\nuuid:A");
        assert!(buf.has_complete_line());
        assert_eq!(buf.read_line().as_deref(), Some("ts:100"));
        assert!(!buf.has_complete_line());
        assert_eq!(buf.pending(), 6);
    }

    #[test]
    fn test_one_line_per_read() {
        let mut buf = LineBuffer::new();
        buf.push(b"a\nb\n\nc\n");

        assert_eq!(buf.read_line().as_deref(), Some("a"));
        assert_eq!(buf.read_line().as_deref(), Some("b"));
        assert_eq!(buf.read_line().as_deref(), Some(""));
        assert_eq!(buf.read_line().as_deref(), Some("c"));
        assert_eq!(buf.read_line(), None);
    }

    #[test]
    fn test_runaway_partial_line_is_dropped() {
        let mut buf = LineBuffer::new();
        buf.push(&vec![b'x'; MAX_PARTIAL_LINE + 1]);

        assert_eq!(buf.pending(), 0);

        buf.push(b"done\n");
        assert_eq!(buf.read_line().as_deref(), Some("done"));
    }
}
