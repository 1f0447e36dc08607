//! Reassembles newline-delimited watch records from arbitrarily chunked bytes.

use bytes::BytesMut;

use crate::error::{DiscoveryError, Result};
use crate::model::ChangeRecord;

const NEWLINE: u8 = b'\n';

/// Default cap on a single watch record.
pub(crate) const DEFAULT_MAX_RECORD_LEN: usize = 4 * 1024 * 1024;

/// Per-stream byte accumulator.
///
/// Chunks go in with [`extend`](Self::extend); complete records come out of
/// [`next_record`](Self::next_record) in arrival order. The output does not
/// depend on where the transport split the stream.
#[derive(Debug)]
pub(crate) struct RecordReassembler {
    buffer: BytesMut,
    // Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_record_len: usize,
}

impl RecordReassembler {
    pub(crate) fn new(max_record_len: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_record_len,
        }
    }

    /// Appends a received chunk.
    pub(crate) fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decodes the next complete record, if one is buffered.
    ///
    /// Whitespace-only lines are skipped. A malformed line or a line longer
    /// than the limit is an error, and the stream should not be read further.
    pub(crate) fn next_record(&mut self) -> Result<Option<ChangeRecord>> {
        loop {
            let Some(offset) = self.buffer[self.scanned..]
                .iter()
                .position(|byte| *byte == NEWLINE)
            else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_record_len {
                    return Err(self.too_large());
                }

                return Ok(None);
            };

            let end = self.scanned + offset;
            if end > self.max_record_len {
                return Err(self.too_large());
            }

            let line = self.buffer.split_to(end + 1);
            self.scanned = 0;

            if let Some(record) = decode_line(&line)? {
                return Ok(Some(record));
            }
        }
    }

    /// Decodes whatever is left once the stream has ended.
    ///
    /// The API server terminates every record with a newline, so this
    /// normally finds nothing.
    pub(crate) fn finish(&mut self) -> Result<Option<ChangeRecord>> {
        let rest = self.buffer.split();
        self.scanned = 0;

        if rest.len() > self.max_record_len {
            return Err(self.too_large());
        }

        decode_line(&rest)
    }

    /// Bytes held that do not yet form a complete record.
    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn too_large(&self) -> DiscoveryError {
        DiscoveryError::RecordTooLarge {
            limit: self.max_record_len,
        }
    }
}

impl Default for RecordReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_LEN)
    }
}

fn decode_line(line: &[u8]) -> Result<Option<ChangeRecord>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_slice(line)?))
}
