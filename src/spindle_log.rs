use crate::constants::{LOG_CHANNEL_CAPACITY, PREVIEW_CHARS};
use crate::str_utils;
use crate::types::{Result, Spindle, SpindleLogEntry};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

enum LogCommand {
    Append(SpindleLogEntry),
    Shutdown(oneshot::Sender<()>),
}

/// Append-only JSON-Lines recorder for completed spindles.
///
/// Constructed once at startup and handed to every connection through
/// `AppState`. A single writer task owns the file handle for the process
/// lifetime, so concurrent connections can never interleave partial lines.
/// `log` is fire-and-forget: a full or closed queue drops the entry with an
/// error log instead of stalling live traffic.
#[derive(Clone)]
pub struct SpindleLogger {
    tx: mpsc::Sender<LogCommand>,
    path: PathBuf,
}

impl SpindleLogger {
    pub async fn open(path: impl AsRef<Path>, echo_preview: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        tokio::spawn(writer_task(file, rx, echo_preview));

        Ok(Self { tx, path })
    }

    /// Stamps the capture time and enqueues the entry. Never blocks and never
    /// surfaces a persistence failure to the caller.
    pub fn log(&self, spindle: Spindle) {
        let entry = SpindleLogEntry::new(spindle);
        if let Err(e) = self.tx.try_send(LogCommand::Append(entry)) {
            tracing::error!("[⚙️ ] Spindle log queue rejected entry, dropping: {}", e);
        }
    }

    /// Drains the queue, flushes and closes the file. Called once on
    /// controlled shutdown.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(LogCommand::Shutdown(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the writer task is still accepting entries.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn writer_task(mut file: File, mut rx: mpsc::Receiver<LogCommand>, echo_preview: bool) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            LogCommand::Append(entry) => {
                append_entry(&mut file, &entry, echo_preview).await;
            }
            LogCommand::Shutdown(done) => {
                if let Err(e) = file.flush().await {
                    tracing::error!("[⚙️ ] Spindle log flush failed on shutdown: {}", e);
                }
                // Close before acking so senders observe the closed channel
                // as soon as shutdown() returns.
                rx.close();
                let _ = done.send(());
                break;
            }
        }
    }
    tracing::info!("[⚙️ ] Spindle log writer closed");
}

async fn append_entry(file: &mut File, entry: &SpindleLogEntry, echo_preview: bool) {
    let mut line = match serde_json::to_string(entry) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("[⚙️ ] Spindle {} not serializable, dropping: {}", entry.spindle.id, e);
            return;
        }
    };
    line.push('\n');

    if let Err(e) = file.write_all(line.as_bytes()).await {
        tracing::error!("[⚙️ ] Spindle {} write failed, dropping: {}", entry.spindle.id, e);
        return;
    }

    if echo_preview {
        let flat = entry.spindle.content.replace('\n', " ");
        let preview = str_utils::first_n_chars_lossy(&flat, PREVIEW_CHARS);
        tracing::info!(
            "[🧵] {} ({} chars): {}",
            entry.spindle.id,
            entry.spindle.content.len(),
            preview.as_ref().dimmed()
        );
    }
}
