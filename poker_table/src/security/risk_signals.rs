//! Risk signals forwarded to an external scoring pipeline.
//!
//! The table only reports what it saw. Scoring, flagging and any follow-up
//! decisions belong to the [`RiskScorer`]. Delivery is fire-and-forget: a
//! full channel drops the signal instead of slowing the table down.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::game::entities::{ActionKind, Chips, UserId};
use crate::table::config::TableId;

/// Decisions made faster than this look automated.
pub const FAST_ACTION_THRESHOLD: Duration = Duration::from_millis(150);

/// Signal severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// How long a player took to act
    ActionTiming,

    /// Action applied by the table after a timeout
    ForcedAction,

    /// Identities dealt into the same hand
    SeatCoOccurrence,

    /// Bet or raise far out of proportion to the pot
    ExtremeBetSizing,

    /// Fold facing a bet, in favor of the last aggressor
    FoldToAggression,

    /// Seat given up while still holding cards
    LeftMidHand,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::ActionTiming => write!(f, "action_timing"),
            SignalKind::ForcedAction => write!(f, "forced_action"),
            SignalKind::SeatCoOccurrence => write!(f, "seat_co_occurrence"),
            SignalKind::ExtremeBetSizing => write!(f, "extreme_bet_sizing"),
            SignalKind::FoldToAggression => write!(f, "fold_to_aggression"),
            SignalKind::LeftMidHand => write!(f, "left_mid_hand"),
        }
    }
}

/// One observation about one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub table_id: TableId,
    pub hand_id: Option<Uuid>,
    pub user_id: UserId,
    pub kind: SignalKind,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RiskSignal {
    fn new(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        kind: SignalKind,
        severity: Severity,
        details: serde_json::Value,
    ) -> Self {
        Self {
            table_id,
            hand_id,
            user_id,
            kind,
            severity,
            details,
            created_at: Utc::now(),
        }
    }

    pub fn action_timing(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        action: ActionKind,
        elapsed: Duration,
    ) -> Self {
        let severity = if elapsed < FAST_ACTION_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        };
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::ActionTiming,
            severity,
            json!({
                "action": action,
                "elapsed_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            }),
        )
    }

    pub fn forced_action(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        action: ActionKind,
        missed_actions: u32,
    ) -> Self {
        let severity = if missed_actions > 1 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::ForcedAction,
            severity,
            json!({
                "action": action,
                "missed_actions": missed_actions,
            }),
        )
    }

    pub fn seat_co_occurrence(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        others: &[UserId],
    ) -> Self {
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::SeatCoOccurrence,
            Severity::Low,
            json!({ "others": others }),
        )
    }

    pub fn extreme_bet_sizing(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        added: Chips,
        pot_before: Chips,
    ) -> Self {
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::ExtremeBetSizing,
            Severity::Medium,
            json!({
                "added": added,
                "pot_before": pot_before,
            }),
        )
    }

    pub fn fold_to_aggression(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        beneficiary: UserId,
        to_call: Chips,
    ) -> Self {
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::FoldToAggression,
            Severity::Low,
            json!({
                "beneficiary": beneficiary,
                "to_call": to_call,
            }),
        )
    }

    /// The hand was folded because its owner left. Leaving with chips to
    /// call is rated higher than leaving on a free check.
    pub fn left_mid_hand(
        table_id: TableId,
        hand_id: Option<Uuid>,
        user_id: UserId,
        on_turn: bool,
        to_call: Chips,
    ) -> Self {
        let severity = if to_call > 0 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Self::new(
            table_id,
            hand_id,
            user_id,
            SignalKind::LeftMidHand,
            severity,
            json!({
                "on_turn": on_turn,
                "to_call": to_call,
            }),
        )
    }
}

/// External detection pipeline.
#[async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(&self, signal: RiskSignal);
}

/// Scorer that only logs. Medium and high severity signals are logged at
/// `warn`, everything else at `debug`.
#[derive(Debug, Default)]
pub struct LogRiskScorer;

#[async_trait]
impl RiskScorer for LogRiskScorer {
    async fn score(&self, signal: RiskSignal) {
        match signal.severity {
            Severity::Low => log::debug!(
                "Risk signal {} for user {} at table {}: {}",
                signal.kind,
                signal.user_id,
                signal.table_id,
                signal.details
            ),
            Severity::Medium | Severity::High => log::warn!(
                "Risk signal {} ({}) for user {} at table {}: {}",
                signal.kind,
                signal.severity,
                signal.user_id,
                signal.table_id,
                signal.details
            ),
        }
    }
}

/// Sending half of the signal pipeline.
#[derive(Clone, Debug)]
pub struct RiskSignalEmitter {
    sender: mpsc::Sender<RiskSignal>,
}

impl RiskSignalEmitter {
    /// Spawn the forwarding task. It runs until every emitter clone is
    /// dropped and the queue is drained.
    pub fn spawn(scorer: Arc<dyn RiskScorer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<RiskSignal>(capacity.max(1));
        let task = tokio::spawn(async move {
            while let Some(signal) = receiver.recv().await {
                scorer.score(signal).await;
            }
        });
        (Self { sender }, task)
    }

    /// Queue a signal without waiting. Returns whether it was queued.
    pub fn emit(&self, signal: RiskSignal) -> bool {
        match self.sender.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                log::warn!(
                    "Risk signal queue full, dropping {} for user {}",
                    signal.kind,
                    signal.user_id
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Risk signal pipeline closed");
                false
            }
        }
    }
}
