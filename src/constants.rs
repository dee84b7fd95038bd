/// Default upstream API host the proxy forwards to.
pub const DEFAULT_UPSTREAM: &str = "https://api.anthropic.com";

/// Optional inbound header carrying the caller's session correlation id.
pub const SESSION_ID_HEADER: &str = "x-spindle-session-id";

/// Headers stripped before forwarding in either direction. Everything else is
/// copied verbatim.
pub const HOP_HEADERS: &[&str] = &["host", "connection", "content-length", "transfer-encoding"];

/// Content type prefix that engages the chunked extraction path.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// A single SSE frame larger than this is discarded from the extraction side
/// rather than buffered forever. Forwarding is unaffected.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Characters of spindle content echoed to the console.
pub const PREVIEW_CHARS: usize = 120;

/// Bound on the spindle log writer queue. A full queue drops entries instead
/// of backpressuring the forwarding path.
pub const LOG_CHANNEL_CAPACITY: usize = 256;

/// Bound on the chunk channel between the upstream pump and the client body.
pub const FORWARD_CHANNEL_CAPACITY: usize = 64;
