//! Coalesces raw output bytes into UTF-8 text chunks.
//!
//! Output arrives in arbitrary byte slices, so a multi-byte character can be
//! split across reads. The batcher holds back an incomplete trailing
//! sequence until the rest arrives (or a forced flush gives up on it).

/// Byte buffer drained as text.
#[derive(Debug)]
pub struct OutputBatcher {
    buf: Vec<u8>,
    max_bytes: usize,
}

impl OutputBatcher {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_bytes: max_bytes.max(1),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The buffer reached the size that forces an early flush
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.max_bytes
    }

    /// Drain the buffer as text.
    ///
    /// Without `force`, an incomplete UTF-8 sequence at the end stays
    /// buffered. Invalid bytes are replaced with U+FFFD.
    pub fn take(&mut self, force: bool) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let cut = if force {
            self.buf.len()
        } else {
            self.buf.len() - incomplete_tail_len(&self.buf)
        };
        if cut == 0 {
            return None;
        }
        let rest = self.buf.split_off(cut);
        let chunk = std::mem::replace(&mut self.buf, rest);
        Some(String::from_utf8_lossy(&chunk).into_owned())
    }
}

/// Length of a trailing UTF-8 sequence that is still missing bytes
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            // continuation byte, keep looking for the lead
            continue;
        }
        let needed = if byte & 0b1110_0000 == 0b1100_0000 {
            2
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            3
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            1
        };
        return if needed > back { back } else { 0 };
    }
    0
}
