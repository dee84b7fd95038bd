use crate::frames::Frame;
use crate::str_utils;
use serde::Deserialize;

/// Content-block type as declared by the upstream at block-start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Thinking,
    Other(String),
    /// Block observed via a delta before any start event; its declared type is
    /// unknown.
    Unknown,
}

impl BlockKind {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "thinking" => BlockKind::Thinking,
            other => BlockKind::Other(other.to_string()),
        }
    }
}

/// Decoded protocol event. Consumers match exhaustively; there is no
/// field-probing of dynamic JSON past this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    BlockStart { index: u64, kind: BlockKind },
    BlockDelta { index: u64, fragment: String },
    BlockStop { index: u64 },
    MessageStop,
    Unrecognized,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "content_block_start")]
    BlockStart {
        index: u64,
        content_block: WireContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    BlockDelta { index: u64, delta: WireDelta },
    #[serde(rename = "content_block_stop")]
    BlockStop { index: u64 },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(rename = "type")]
    kind: String,
}

/// Delta payloads carry their fragment under a type-specific key. Deltas with
/// no text (signature updates and the like) decode to an empty fragment,
/// which appends nothing downstream.
#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl WireDelta {
    fn into_fragment(self) -> String {
        match self.thinking {
            Some(t) => t,
            None => match self.text {
                Some(t) => t,
                None => String::new(),
            },
        }
    }
}

/// Decodes one complete frame into a typed event. A payload that fails to
/// parse, or whose shape matches no recognized category, is swallowed as
/// `Unrecognized`: logged for diagnostics, never an error that could reach
/// the forwarding path.
pub fn decode_frame(frame: &Frame) -> StreamEvent {
    match serde_json::from_str::<WireEvent>(&frame.data) {
        Ok(WireEvent::BlockStart {
            index,
            content_block,
        }) => StreamEvent::BlockStart {
            index,
            kind: BlockKind::from_wire(&content_block.kind),
        },
        Ok(WireEvent::BlockDelta { index, delta }) => StreamEvent::BlockDelta {
            index,
            fragment: delta.into_fragment(),
        },
        Ok(WireEvent::BlockStop { index }) => StreamEvent::BlockStop { index },
        Ok(WireEvent::MessageStop) => StreamEvent::MessageStop,
        Ok(WireEvent::Other) => {
            tracing::debug!(
                "[☁️  -> ⚙️ ] Ignoring frame outside the content-block protocol (event: {:?})",
                frame.event
            );
            StreamEvent::Unrecognized
        }
        Err(e) => {
            tracing::debug!(
                "[☁️  -> ⚙️ ] Undecodable frame (event: {:?}): {}: {}",
                frame.event,
                e,
                str_utils::first_n_chars_lossy(&frame.data, 200)
            );
            StreamEvent::Unrecognized
        }
    }
}
