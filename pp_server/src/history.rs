//! Append-only JSON lines files for hand history and the shuffle audit trail.

use async_trait::async_trait;
use poker_table::{
    game::{deck::ShuffleAudit, seats::SeatRelease},
    table::{HandHistorySink, HandResult, ShuffleAuditLog, SinkResult},
};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

pub const HAND_HISTORY_FILE: &str = "hands.jsonl";
pub const SHUFFLE_AUDIT_FILE: &str = "shuffle_audit.jsonl";

/// One record per line in the hand history file.
#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum HistoryRecord<'a> {
    Hand(&'a HandResult),
    SeatReleased(&'a SeatRelease),
}

/// A file opened for appending. Every record is flushed before the call
/// returns.
#[derive(Debug)]
pub struct JsonLinesLog {
    file: Mutex<File>,
}

impl JsonLinesLog {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    async fn write_record<T: Serialize + ?Sized>(&self, record: &T) -> SinkResult {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl HandHistorySink for JsonLinesLog {
    async fn record_hand(&self, result: Arc<HandResult>) -> SinkResult {
        self.write_record(&HistoryRecord::Hand(&result)).await
    }

    async fn seat_released(&self, release: SeatRelease) -> SinkResult {
        self.write_record(&HistoryRecord::SeatReleased(&release)).await
    }
}

#[async_trait]
impl ShuffleAuditLog for JsonLinesLog {
    async fn append(&self, audit: ShuffleAudit) -> SinkResult {
        self.write_record(&audit).await
    }
}

/// The two files every hosted table writes to.
#[derive(Clone, Debug)]
pub struct HistoryFiles {
    pub hands: Arc<JsonLinesLog>,
    pub shuffle_audit: Arc<JsonLinesLog>,
}

impl HistoryFiles {
    /// Open (or create) both files under `dir`, creating `dir` if needed.
    pub async fn open(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            hands: Arc::new(JsonLinesLog::open(dir.join(HAND_HISTORY_FILE)).await?),
            shuffle_audit: Arc::new(JsonLinesLog::open(dir.join(SHUFFLE_AUDIT_FILE)).await?),
        })
    }
}
