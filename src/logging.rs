use crate::events::StreamEvent;
use std::panic;
use tracing::{error, info};

/// Sets up a global panic hook that logs panics through tracing before the
/// default hook runs.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

/// Per-stream extraction counters, summarised once when the stream ends.
#[derive(Default)]
pub struct CaptureMetric {
    pub chunks: usize,
    pub bytes: usize,
    pub block_starts: usize,
    pub deltas: usize,
    pub delta_chars: usize,
    pub block_stops: usize,
    pub unrecognized: usize,
    pub spindles: usize,
}

impl CaptureMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len;
    }

    pub fn record_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::BlockStart { .. } => self.block_starts += 1,
            StreamEvent::BlockDelta { fragment, .. } => {
                self.deltas += 1;
                self.delta_chars += fragment.len();
            }
            StreamEvent::BlockStop { .. } => self.block_stops += 1,
            StreamEvent::MessageStop => {}
            StreamEvent::Unrecognized => self.unrecognized += 1,
        }
    }

    pub fn record_spindles(&mut self, count: usize) {
        self.spindles += count;
    }

    pub fn log_summary(&self, connection: &str) {
        info!(
            "[STREAM END] Conn: {} | Chunks: {} ({} bytes) | Blocks: {}/{} | Deltas: {} ({} chars) | Spindles: {} | Unrecognized: {}",
            connection,
            self.chunks,
            self.bytes,
            self.block_starts,
            self.block_stops,
            self.deltas,
            self.delta_chars,
            self.spindles,
            self.unrecognized
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BlockKind;

    #[test]
    fn metric_counts_events_by_category() {
        let mut m = CaptureMetric::new();
        m.record_chunk(10);
        m.record_event(&StreamEvent::BlockStart {
            index: 0,
            kind: BlockKind::Thinking,
        });
        m.record_event(&StreamEvent::BlockDelta {
            index: 0,
            fragment: "abcd".to_string(),
        });
        m.record_event(&StreamEvent::BlockStop { index: 0 });
        m.record_event(&StreamEvent::Unrecognized);
        m.record_spindles(1);

        assert_eq!(m.chunks, 1);
        assert_eq!(m.bytes, 10);
        assert_eq!(m.block_starts, 1);
        assert_eq!(m.deltas, 1);
        assert_eq!(m.delta_chars, 4);
        assert_eq!(m.block_stops, 1);
        assert_eq!(m.unrecognized, 1);
        assert_eq!(m.spindles, 1);
    }
}
