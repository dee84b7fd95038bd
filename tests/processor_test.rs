use spindle::processor::StreamProcessor;
use spindle::types::{ConnectionId, Spindle};

fn sse(event: &str, json: &str) -> Vec<u8> {
    format!("event: {}\ndata: {}\n\n", event, json).into_bytes()
}

fn block_start(index: u64, kind: &str) -> Vec<u8> {
    sse(
        "content_block_start",
        &format!(
            r#"{{"type":"content_block_start","index":{},"content_block":{{"type":"{}"}}}}"#,
            index, kind
        ),
    )
}

fn thinking_delta(index: u64, text: &str) -> Vec<u8> {
    sse(
        "content_block_delta",
        &format!(
            r#"{{"type":"content_block_delta","index":{},"delta":{{"type":"thinking_delta","thinking":"{}"}}}}"#,
            index, text
        ),
    )
}

fn text_delta(index: u64, text: &str) -> Vec<u8> {
    sse(
        "content_block_delta",
        &format!(
            r#"{{"type":"content_block_delta","index":{},"delta":{{"type":"text_delta","text":"{}"}}}}"#,
            index, text
        ),
    )
}

fn block_stop(index: u64) -> Vec<u8> {
    sse(
        "content_block_stop",
        &format!(r#"{{"type":"content_block_stop","index":{}}}"#, index),
    )
}

fn message_stop() -> Vec<u8> {
    sse("message_stop", r#"{"type":"message_stop"}"#)
}

fn processor() -> StreamProcessor {
    StreamProcessor::new(ConnectionId::new(), None)
}

fn run(proc: &mut StreamProcessor, chunks: &[Vec<u8>]) -> Vec<Spindle> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(proc.process_chunk(chunk));
    }
    out
}

#[test]
fn completeness_one_spindle_per_completed_thinking_block() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "Hello, "),
            thinking_delta(0, "world"),
            block_stop(0),
        ],
    );

    assert_eq!(spindles.len(), 1);
    assert_eq!(spindles[0].content, "Hello, world");
    assert!(proc.finish().is_empty());
}

#[test]
fn type_filtering_text_blocks_emit_nothing() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "text"),
            text_delta(0, "plain answer"),
            block_stop(0),
        ],
    );

    assert!(spindles.is_empty());
    assert!(proc.finish().is_empty());
}

#[test]
fn mixed_blocks_only_thinking_is_captured() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "reasoning"),
            block_stop(0),
            block_start(1, "text"),
            text_delta(1, "answer"),
            block_stop(1),
            message_stop(),
        ],
    );

    assert_eq!(spindles.len(), 1);
    assert_eq!(spindles[0].content, "reasoning");
}

#[test]
fn emission_order_follows_completion_not_start() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            block_start(1, "thinking"),
            thinking_delta(0, "first started"),
            thinking_delta(1, "first finished"),
            block_stop(1),
            block_stop(0),
        ],
    );

    assert_eq!(spindles.len(), 2);
    assert_eq!(spindles[0].content, "first finished");
    assert_eq!(spindles[1].content, "first started");
}

#[test]
fn delta_before_start_keeps_the_text() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[thinking_delta(2, "orphan text"), block_stop(2)],
    );

    assert_eq!(spindles.len(), 1);
    assert_eq!(spindles[0].content, "orphan text");
}

#[test]
fn stop_without_start_is_ignored() {
    let mut proc = processor();
    let spindles = run(&mut proc, &[block_stop(7)]);
    assert!(spindles.is_empty());
    assert!(proc.finish().is_empty());
}

#[test]
fn duplicate_start_resets_the_block() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "stale "),
            block_start(0, "thinking"),
            thinking_delta(0, "fresh"),
            block_stop(0),
        ],
    );

    assert_eq!(spindles.len(), 1);
    assert_eq!(spindles[0].content, "fresh");
}

#[test]
fn message_stop_flushes_open_thinking_blocks() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "interrupted"),
            message_stop(),
        ],
    );

    assert_eq!(spindles.len(), 1);
    assert_eq!(spindles[0].content, "interrupted");
    // Already flushed; stream end finds nothing further.
    assert!(proc.finish().is_empty());
}

#[test]
fn stream_end_flushes_partials() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[block_start(3, "thinking"), thinking_delta(3, "cut off mid")],
    );
    assert!(spindles.is_empty());

    let flushed = proc.finish();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].content, "cut off mid");
}

#[test]
fn stream_end_does_not_flush_non_thinking_blocks() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[block_start(0, "text"), text_delta(0, "half an answer")],
    );
    assert!(spindles.is_empty());
    assert!(proc.finish().is_empty());
}

#[test]
fn idempotent_restart_identical_input_identical_output() {
    let transcript: Vec<Vec<u8>> = vec![
        block_start(0, "thinking"),
        thinking_delta(0, "alpha "),
        thinking_delta(0, "beta"),
        block_stop(0),
        block_start(1, "text"),
        text_delta(1, "visible"),
        block_stop(1),
        block_start(2, "thinking"),
        thinking_delta(2, "gamma"),
        block_stop(2),
        message_stop(),
    ];

    let mut first = processor();
    let mut second = processor();
    let a = run(&mut first, &transcript);
    let b = run(&mut second, &transcript);

    let contents_a: Vec<&str> = a.iter().map(|s| s.content.as_str()).collect();
    let contents_b: Vec<&str> = b.iter().map(|s| s.content.as_str()).collect();
    assert_eq!(contents_a, vec!["alpha beta", "gamma"]);
    assert_eq!(contents_a, contents_b);
}

#[test]
fn session_id_propagates_into_every_spindle() {
    let mut proc = StreamProcessor::new(ConnectionId::new(), Some("sess-42".to_string()));
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "a"),
            block_stop(0),
            block_start(1, "thinking"),
            thinking_delta(1, "b"),
            block_stop(1),
        ],
    );

    assert_eq!(spindles.len(), 2);
    for s in &spindles {
        assert_eq!(s.session_id.as_deref(), Some("sess-42"));
    }
}

#[test]
fn spindle_ids_are_distinct_within_a_connection() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            block_stop(0),
            block_start(0, "thinking"),
            block_stop(0),
        ],
    );

    assert_eq!(spindles.len(), 2);
    assert_ne!(spindles[0].id, spindles[1].id);
}

#[test]
fn timestamps_are_ordered() {
    let mut proc = processor();
    let spindles = run(
        &mut proc,
        &[
            block_start(0, "thinking"),
            thinking_delta(0, "x"),
            block_stop(0),
        ],
    );

    assert_eq!(spindles.len(), 1);
    assert!(spindles[0].started_at <= spindles[0].completed_at);
}
