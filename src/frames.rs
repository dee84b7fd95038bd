use crate::constants::MAX_FRAME_BYTES;
use bytes::{Buf, BytesMut};

/// One complete server-push event unit: an optional event name plus the
/// joined data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

/// Reassembles complete SSE frames from raw chunks arriving at arbitrary,
/// protocol-unaware boundaries.
///
/// The tail buffer holds raw bytes, not decoded text, so a chunk boundary
/// inside a multi-byte UTF-8 sequence cannot corrupt the next frame.
#[derive(Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw chunk and returns every frame completed by it. Partial
    /// trailing data is buffered for the next call. Never drops bytes and
    /// never reorders frames.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, delim_len)) = find_frame_end(&self.buffer) {
            let block = self.buffer.split_to(end);
            self.buffer.advance(delim_len);
            if let Some(frame) = parse_block(&block) {
                frames.push(frame);
            }
        }

        if self.buffer.len() > MAX_FRAME_BYTES {
            tracing::warn!(
                "[☁️  -> ⚙️ ] Frame exceeded {} bytes without a delimiter, discarding {} buffered bytes",
                MAX_FRAME_BYTES,
                self.buffer.len()
            );
            self.buffer.clear();
        }

        frames
    }

    /// Signals stream end. Buffered-but-incomplete trailing data is discarded;
    /// the returned count is the truncation condition for the caller to log.
    pub fn finish(&mut self) -> usize {
        let dangling = self.buffer.len();
        self.buffer.clear();
        dangling
    }
}

/// Finds the first blank-line frame delimiter. Returns the byte offset of the
/// newline that terminates the frame's last line, plus the delimiter length
/// (`\n\n` or `\n\r\n`; leading `\r` stays inside the block and is stripped
/// line-wise during parsing).
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len().saturating_sub(1) {
        if buf[i] != b'\n' {
            continue;
        }
        if buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i + 1] == b'\r' && buf.get(i + 2) == Some(&b'\n') {
            return Some((i, 3));
        }
    }
    None
}

fn parse_block(block: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(block);
    let mut event: Option<String> = None;
    let mut data_lines: Vec<String> = Vec::new();

    for line in text.lines() {
        // The delimiter scan leaves the last line's \r behind when the stream
        // uses \r\n endings; lines() only strips \r ahead of a \n.
        let line = match line.strip_suffix('\r') {
            Some(trimmed) => trimmed,
            None => line,
        };
        if let Some(val) = line.strip_prefix("event:") {
            event = Some(val.trim().to_string());
        } else if let Some(val) = line.strip_prefix("data:") {
            data_lines.push(val.trim_start_matches(' ').to_string());
        }
        // id:, retry:, and comment lines are ignored
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(Frame {
        event,
        data: data_lines.join("\n"),
    })
}
