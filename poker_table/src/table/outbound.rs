//! Outbound collaborators: hand history persistence and the shuffle audit
//! trail.
//!
//! The actor never awaits these. Records are queued on one bounded FIFO
//! dispatcher task per running table, so the audit log sees records in the
//! order the table produced them. A sink that stalls long enough to fill the
//! queue loses records, and each loss is logged at `error`.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

use super::snapshot::HandResult;
use crate::game::{deck::ShuffleAudit, seats::SeatRelease};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

pub type SinkResult = Result<(), SinkError>;

/// Persistence/broadcast target for finished hands and freed seats.
#[async_trait]
pub trait HandHistorySink: Send + Sync {
    async fn record_hand(&self, result: Arc<HandResult>) -> SinkResult;

    /// A seat was freed and its chips left the table.
    async fn seat_released(&self, release: SeatRelease) -> SinkResult;
}

/// Append-only log of shuffle commitments.
#[async_trait]
pub trait ShuffleAuditLog: Send + Sync {
    async fn append(&self, audit: ShuffleAudit) -> SinkResult;
}

/// Hand history that only logs.
#[derive(Debug, Default)]
pub struct LogHandHistory;

#[async_trait]
impl HandHistorySink for LogHandHistory {
    async fn record_hand(&self, result: Arc<HandResult>) -> SinkResult {
        log::info!(
            "Table {}: hand #{} ({}) paid ${} with ${} rake",
            result.table_id,
            result.hand_number,
            result.hand_id,
            result.total_distributed(),
            result.rake
        );
        Ok(())
    }

    async fn seat_released(&self, release: SeatRelease) -> SinkResult {
        log::info!(
            "Seat {} released: user {} cashed out ${}",
            release.seat,
            release.user_id,
            release.stack
        );
        Ok(())
    }
}

/// Shuffle audit that only logs.
#[derive(Debug, Default)]
pub struct LogShuffleAudit;

#[async_trait]
impl ShuffleAuditLog for LogShuffleAudit {
    async fn append(&self, audit: ShuffleAudit) -> SinkResult {
        log::debug!(
            "Table {}: hand #{} committed to {}",
            audit.table_id,
            audit.hand_number,
            audit.commitment
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutboundRecord {
    ShuffleCommitted(ShuffleAudit),
    HandCompleted(Arc<HandResult>),
    SeatReleased(SeatRelease),
}

impl OutboundRecord {
    fn describe(&self) -> String {
        match self {
            Self::ShuffleCommitted(audit) => format!(
                "shuffle audit for table {} hand #{}",
                audit.table_id, audit.hand_number
            ),
            Self::HandCompleted(result) => format!(
                "hand result for table {} hand #{}",
                result.table_id, result.hand_number
            ),
            Self::SeatReleased(release) => format!(
                "seat release for user {} (${})",
                release.user_id, release.stack
            ),
        }
    }
}

/// Sending half of the outbound queue.
#[derive(Clone, Debug)]
pub struct OutboundDispatcher {
    sender: mpsc::Sender<OutboundRecord>,
}

impl OutboundDispatcher {
    /// Spawn the dispatcher task. It delivers records one at a time and
    /// exits once every dispatcher clone is dropped and the queue is empty.
    pub fn spawn(
        history: Arc<dyn HandHistorySink>,
        audit: Arc<dyn ShuffleAuditLog>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<OutboundRecord>(capacity);
        let task = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                let (what, result) = match record {
                    OutboundRecord::ShuffleCommitted(entry) => {
                        ("shuffle audit", audit.append(entry).await)
                    }
                    OutboundRecord::HandCompleted(result) => {
                        ("hand result", history.record_hand(result).await)
                    }
                    OutboundRecord::SeatReleased(release) => {
                        ("seat release", history.seat_released(release).await)
                    }
                };
                if let Err(e) = result {
                    log::error!("Failed to deliver {what}: {e}");
                }
            }
        });
        (Self { sender }, task)
    }

    /// Queue a record without waiting. Returns whether it was queued.
    pub fn dispatch(&self, record: OutboundRecord) -> bool {
        match self.sender.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                log::error!("Outbound queue full, dropped {}", record.describe());
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                log::warn!("Outbound dispatcher closed, dropped {}", record.describe());
                false
            }
        }
    }

    /// Records waiting for delivery.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}
