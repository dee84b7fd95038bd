use crate::constants::{
    EVENT_STREAM_CONTENT_TYPE, FORWARD_CHANNEL_CAPACITY, HOP_HEADERS, SESSION_ID_HEADER,
};
use crate::processor::StreamProcessor;
use crate::spindle_log::SpindleLogger;
use crate::types::{ConnectionId, Result, SpindleError};
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

fn is_hop_header(name: &str) -> bool {
    HOP_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Fallback handler: every method and path not claimed by the health routes
/// lands here and is forwarded to the upstream host.
pub async fn forward(State(state): State<Arc<AppState>>, req: Request<Body>) -> Response {
    match forward_inner(state, req).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!("[⚙️  -> 🖱️ ] Proxy error: {}", e);
            e.into_response()
        }
    }
}

async fn forward_inner(state: Arc<AppState>, req: Request<Body>) -> Result<Response> {
    let conn = ConnectionId::new();
    let (parts, body) = req.into_parts();

    let session_id = parts
        .headers
        .get(SESSION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let path_query = match parts.uri.path_and_query() {
        Some(pq) => pq.as_str(),
        None => "/",
    };
    let target = format!("{}{}", state.upstream, path_query);

    let body_bytes = axum::body::to_bytes(body, state.args.max_body_size)
        .await
        .map_err(|e| SpindleError::Protocol(format!("failed to read request body: {}", e)))?;

    tracing::info!(
        "[🖱️  -> ⚙️ ] {} {} ({} bytes) [{}]{}",
        parts.method,
        path_query,
        body_bytes.len(),
        conn.short(),
        match &session_id {
            Some(sid) => format!(" session: {}", crate::str_utils::prefix_chars(sid, 8)),
            None => String::new(),
        }
    );

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|_| SpindleError::Protocol(format!("unsupported method: {}", parts.method)))?;

    let mut builder = state.client.request(method, &target);
    for (name, value) in parts.headers.iter() {
        if is_hop_header(name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    tracing::debug!("[⚙️  -> ☁️ ] Forwarding to {}", target);
    let response = builder
        .body(body_bytes)
        .send()
        .await
        .map_err(SpindleError::Network)?;

    let status = response.status();
    tracing::info!("[☁️  -> ⚙️ ] Status: {} [{}]", status, conn.short());

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut resp_builder = axum::http::Response::builder().status(status.as_u16());
    for (name, value) in response.headers().iter() {
        if is_hop_header(name.as_str()) {
            continue;
        }
        resp_builder = resp_builder.header(name.as_str(), value.as_bytes());
    }

    let built = if content_type.starts_with(EVENT_STREAM_CONTENT_TYPE) {
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(FORWARD_CHANNEL_CAPACITY);
        let processor = StreamProcessor::new(conn.clone(), session_id);
        let dump = if state.args.disable_raw_dump {
            None
        } else {
            open_dump_file(&state.args.dump_dir, &conn).await
        };

        tokio::spawn(pump(response, tx, processor, state.logger.clone(), dump));

        resp_builder.body(Body::from_stream(ReceiverStream::new(rx)))
    } else {
        // Non-stream responses are relayed as a single unit; nothing to
        // extract from them.
        let full = response.bytes().await.map_err(SpindleError::Network)?;
        resp_builder.body(Body::from(full))
    };

    built.map_err(|e| {
        SpindleError::Internal(
            format!("failed to assemble client response: {}", e),
            tracing_error::SpanTrace::capture(),
        )
        .into()
    })
}

/// Reads the upstream body chunk by chunk, writing each chunk verbatim to the
/// client before feeding a copy to the extraction side. The forward is never
/// gated on extraction: both it and the raw dump run after the send, and
/// their failures only ever log.
async fn pump(
    response: reqwest::Response,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
    mut processor: StreamProcessor,
    logger: SpindleLogger,
    mut dump: Option<tokio::fs::File>,
) {
    let mut upstream = Box::pin(response.bytes_stream());

    while let Some(next) = upstream.next().await {
        match next {
            Ok(chunk) => {
                if tx.send(Ok(chunk.clone())).await.is_err() {
                    tracing::debug!("[⚙️  -> 🖱️ ] Client went away, stopping stream");
                    break;
                }
                for spindle in processor.process_chunk(&chunk) {
                    logger.log(spindle);
                }
                if let Some(file) = dump.as_mut() {
                    if let Err(e) = file.write_all(&chunk).await {
                        tracing::warn!(
                            "[⚙️ ] Raw dump write failed, disabling for this request: {}",
                            e
                        );
                        dump = None;
                    }
                }
            }
            Err(e) => {
                // Headers are already out; end the body and let the client
                // see the broken stream.
                tracing::error!("[☁️  -> ⚙️ ] Upstream read error: {}", e);
                let _ = tx.send(Err(std::io::Error::other(e))).await;
                break;
            }
        }
    }

    for spindle in processor.finish() {
        logger.log(spindle);
    }
    if let Some(mut file) = dump {
        if let Err(e) = file.flush().await {
            tracing::warn!("[⚙️ ] Raw dump flush failed: {}", e);
        }
    }
}

async fn open_dump_file(dir: &str, conn: &ConnectionId) -> Option<tokio::fs::File> {
    let name = format!(
        "raw-{}-{}.dump",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
        conn.short()
    );
    let path = std::path::Path::new(dir).join(name);
    match tokio::fs::File::create(&path).await {
        Ok(f) => Some(f),
        Err(e) => {
            tracing::warn!(
                "[⚙️ ] Raw dump unavailable for this request ({}): {}",
                path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_headers_are_filtered_case_insensitively() {
        assert!(is_hop_header("Host"));
        assert!(is_hop_header("CONNECTION"));
        assert!(is_hop_header("content-length"));
        assert!(is_hop_header("Transfer-Encoding"));
        assert!(!is_hop_header("content-type"));
        assert!(!is_hop_header("x-api-key"));
    }
}
