use crate::types::StreamEventRecord;

const DATA_PREFIX: &str = "data: ";

/// Incremental decoder for the platform's SSE-style response body: one JSON
/// record per `data: ` line. Bytes are buffered across calls, so a frame or
/// a multi-byte character may split anywhere between chunks.
#[derive(Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every record it completed, in arrival order.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<StreamEventRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|byte| *byte == b'\n') {
            let end = start + offset;
            if let Some(record) = decode_line(&self.buffer[start..end]) {
                records.push(record);
            }
            start = end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        records
    }

    /// Surrender whatever never saw a terminating newline. An unterminated
    /// line is never a record; the caller decides whether to log it.
    pub fn flush(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.buffer)).into_owned()
    }
}

fn decode_line(line: &[u8]) -> Option<StreamEventRecord> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    // lines without the data prefix (blanks, comments, event metadata) are not frames
    let payload = text.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str(payload) {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::warn!(error = %error, line = %text, "dropping malformed stream frame");
            None
        }
    }
}
