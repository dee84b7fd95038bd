use crate::events::{decode_frame, BlockKind, StreamEvent};
use crate::frames::FrameReassembler;
use crate::logging::CaptureMetric;
use crate::types::{ConnectionId, Spindle};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

struct OpenBlock {
    id: String,
    kind: BlockKind,
    buffer: String,
    started_at: DateTime<Utc>,
}

/// Per-connection extraction state machine. One instance per proxied
/// request/response exchange; dropped with the connection.
///
/// The contract mirrors the forwarding split: the proxy writes every raw
/// chunk to the client itself and hands this processor a copy. Nothing here
/// can alter, delay, or fail the forwarded bytes; `process_chunk` only ever
/// reads its input and returns the spindles sealed by it, in completion
/// order.
pub struct StreamProcessor {
    reassembler: FrameReassembler,
    connection_id: ConnectionId,
    session_id: Option<String>,
    open: HashMap<u64, OpenBlock>,
    seq: u64,
    metric: CaptureMetric,
}

impl StreamProcessor {
    pub fn new(connection_id: ConnectionId, session_id: Option<String>) -> Self {
        Self {
            reassembler: FrameReassembler::new(),
            connection_id,
            session_id,
            open: HashMap::new(),
            seq: 0,
            metric: CaptureMetric::new(),
        }
    }

    /// Consumes a copy of one forwarded chunk and returns the spindles sealed
    /// as a result, in completion order.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<Spindle> {
        self.metric.record_chunk(chunk.len());
        let mut sealed = Vec::new();
        for frame in self.reassembler.feed(chunk) {
            let event = decode_frame(&frame);
            self.metric.record_event(&event);
            self.apply(event, &mut sealed);
        }
        self.metric.record_spindles(sealed.len());
        sealed
    }

    fn apply(&mut self, event: StreamEvent, sealed: &mut Vec<Spindle>) {
        match event {
            StreamEvent::BlockStart { index, kind } => {
                let block = self.open_block(index, kind);
                if let Some(previous) = self.open.insert(index, block) {
                    tracing::warn!(
                        "[☁️  -> ⚙️ ] Duplicate start for block {} [{}], discarding {} buffered chars",
                        index,
                        self.connection_id.short(),
                        previous.buffer.len()
                    );
                }
            }
            StreamEvent::BlockDelta { index, fragment } => {
                if !self.open.contains_key(&index) {
                    tracing::warn!(
                        "[☁️  -> ⚙️ ] Delta before start for block {} [{}], opening retroactively",
                        index,
                        self.connection_id.short()
                    );
                    let block = self.open_block(index, BlockKind::Unknown);
                    self.open.insert(index, block);
                }
                if let Some(block) = self.open.get_mut(&index) {
                    block.buffer.push_str(&fragment);
                }
            }
            StreamEvent::BlockStop { index } => match self.open.remove(&index) {
                Some(block) => self.seal(index, block, sealed, false),
                None => {
                    tracing::debug!(
                        "[☁️  -> ⚙️ ] Stop without start for block {} [{}], ignoring",
                        index,
                        self.connection_id.short()
                    );
                }
            },
            StreamEvent::MessageStop => self.flush_open(sealed),
            StreamEvent::Unrecognized => {}
        }
    }

    fn open_block(&mut self, index: u64, kind: BlockKind) -> OpenBlock {
        let id = format!("{}-{}-{}", self.connection_id.short(), index, self.seq);
        self.seq += 1;
        OpenBlock {
            id,
            kind,
            buffer: String::new(),
            started_at: Utc::now(),
        }
    }

    fn seal(&self, index: u64, block: OpenBlock, sealed: &mut Vec<Spindle>, truncated: bool) {
        match &block.kind {
            BlockKind::Thinking => {}
            BlockKind::Unknown => {
                // Retroactively opened: declared type never observed. Emit
                // rather than lose the accumulated text.
                tracing::warn!(
                    "[⚙️ ] Sealing block {} [{}] of unobserved type",
                    index,
                    self.connection_id.short()
                );
            }
            BlockKind::Other(kind) => {
                tracing::debug!(
                    "[⚙️ ] Block {} [{}] is '{}', no spindle",
                    index,
                    self.connection_id.short(),
                    kind
                );
                return;
            }
        }
        if truncated {
            tracing::warn!(
                "[⚙️ ] Stream ended with block {} [{}] still open, flushing {} chars as partial",
                index,
                self.connection_id.short(),
                block.buffer.len()
            );
        }
        sealed.push(Spindle {
            id: block.id,
            session_id: self.session_id.clone(),
            content: block.buffer,
            started_at: block.started_at,
            completed_at: Utc::now(),
        });
    }

    /// Seals every still-open block. Blocks that never saw their stop event
    /// are flushed in ascending index order (completion order is undefined
    /// for them).
    fn flush_open(&mut self, sealed: &mut Vec<Spindle>) {
        let mut remaining: Vec<(u64, OpenBlock)> = self.open.drain().collect();
        remaining.sort_by_key(|(index, _)| *index);
        for (index, block) in remaining {
            self.seal(index, block, sealed, true);
        }
    }

    /// Signals stream end (upstream close, client disconnect, or timeout).
    /// Returns the final batch of spindles under the flush-as-partial policy
    /// and logs the stream's capture summary.
    pub fn finish(&mut self) -> Vec<Spindle> {
        let dangling = self.reassembler.finish();
        if dangling > 0 {
            tracing::warn!(
                "[☁️  -> ⚙️ ] Stream truncated mid-frame [{}], {} trailing bytes discarded",
                self.connection_id.short(),
                dangling
            );
        }
        let mut sealed = Vec::new();
        self.flush_open(&mut sealed);
        self.metric.record_spindles(sealed.len());
        self.metric.log_summary(self.connection_id.short());
        sealed
    }
}
