//! Table actor implementation with async message handling.

use log::{debug, error, info, warn};
use std::{future::Future, sync::Arc};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, MissedTickBehavior, interval},
};

use super::{
    messages::{InboxGate, TableMessage},
    outbound::{HandHistorySink, OutboundDispatcher, OutboundRecord, ShuffleAuditLog},
    snapshot::TableSnapshot,
};
use crate::{
    game::{
        errors::{TableError, TableResult},
        state_machine::{EngineEvent, TableEngine},
    },
    security::risk_signals::{RiskScorer, RiskSignalEmitter},
};

/// Queue depth of the risk signal forwarder.
const RISK_SIGNAL_CAPACITY: usize = 1024;

/// Queue depth of the hand history and shuffle audit dispatcher.
const OUTBOUND_CAPACITY: usize = 4096;

/// Per-run delivery channels. Dropped when the run ends so the dispatcher
/// tasks flush and exit.
struct Delivery {
    outbound: OutboundDispatcher,
    signals: RiskSignalEmitter,
}

/// Table actor managing a single poker table
///
/// The actor owns the engine outright. It is moved into a task by
/// [`run`](Self::run) and handed back when the run ends, so a stopped table
/// can be started again with its seats intact.
pub struct TableActor {
    engine: TableEngine,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Closed by the actor when a run ends
    gate: Arc<InboxGate>,

    /// Latest committed snapshot
    snapshots: watch::Sender<Arc<TableSnapshot>>,

    version: u64,

    hand_history: Arc<dyn HandHistorySink>,

    shuffle_audit: Arc<dyn ShuffleAuditLog>,

    risk_scorer: Arc<dyn RiskScorer>,

    /// Set once an invariant check fails. A halted actor never runs again.
    halted: Option<String>,
}

impl TableActor {
    pub(crate) fn new(
        engine: TableEngine,
        inbox: mpsc::Receiver<TableMessage>,
        gate: Arc<InboxGate>,
        snapshots: watch::Sender<Arc<TableSnapshot>>,
        hand_history: Arc<dyn HandHistorySink>,
        shuffle_audit: Arc<dyn ShuffleAuditLog>,
        risk_scorer: Arc<dyn RiskScorer>,
    ) -> Self {
        Self {
            engine,
            inbox,
            gate,
            snapshots,
            version: 0,
            hand_history,
            shuffle_audit,
            risk_scorer,
            halted: None,
        }
    }

    /// Reason the actor halted, if it did.
    #[must_use]
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Run the table actor event loop until `shutdown` resolves or an
    /// invariant check fails.
    ///
    /// A hand still in progress when the loop ends is abandoned and every
    /// contribution refunded. Requests still queued are refused. Outbound
    /// records are flushed before this returns.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Self {
        let table_id = self.engine.config().table_id;
        info!("Table {table_id} '{}' starting", self.engine.config().name);

        let (outbound, outbound_task) = OutboundDispatcher::spawn(
            self.hand_history.clone(),
            self.shuffle_audit.clone(),
            OUTBOUND_CAPACITY,
        );
        let (signals, signal_task) =
            RiskSignalEmitter::spawn(self.risk_scorer.clone(), RISK_SIGNAL_CAPACITY);
        let delivery = Delivery { outbound, signals };

        let mut ticker = interval(self.engine.config().tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        // Seats may have filled up while the table was stopped.
        self.engine.tick(Instant::now());
        let _ = self.commit(&delivery);

        while self.halted.is_none() {
            tokio::select! {
                biased;

                () = &mut shutdown => break,

                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message, &delivery),
                    None => break,
                },

                _ = ticker.tick() => {
                    self.engine.tick(Instant::now());
                    let _ = self.commit(&delivery);
                }
            }
        }

        if self.halted.is_none() {
            self.engine.abandon_hand();
            let _ = self.commit(&delivery);
        }
        self.refuse_queued();

        drop(delivery);
        if let Err(e) = outbound_task.await {
            error!("Table {table_id}: outbound dispatcher failed: {e}");
        }
        if let Err(e) = signal_task.await {
            error!("Table {table_id}: risk signal forwarder failed: {e}");
        }
        info!("Table {table_id} stopped");
        self
    }

    fn handle_message(&mut self, message: TableMessage, delivery: &Delivery) {
        let now = Instant::now();
        match message {
            TableMessage::Join {
                user_id,
                username,
                buy_in,
                response,
            } => {
                let result = self.engine.join(user_id, username, buy_in, now);
                self.reply(result, response, delivery);
            }

            TableMessage::Leave { user_id, response } => {
                let result = self.engine.leave(user_id, now);
                self.reply(result, response, delivery);
            }

            TableMessage::Disconnect { user_id, response } => {
                let result = self.engine.disconnect(user_id, now);
                self.reply(result, response, delivery);
            }

            TableMessage::TopUp {
                user_id,
                amount,
                response,
            } => {
                let result = self.engine.top_up(user_id, amount, now);
                self.reply(result, response, delivery);
            }

            TableMessage::Action(request) => {
                // Rejections are recorded by the engine and surface in the
                // snapshot.
                let _ = self.engine.submit_action(&request, now);
                let _ = self.commit(delivery);
            }
        }
    }

    /// Commit, then answer. The requester sees the snapshot that includes
    /// its own request.
    fn reply<T>(
        &mut self,
        result: TableResult<T>,
        response: oneshot::Sender<TableResult<T>>,
        delivery: &Delivery,
    ) {
        let result = match self.commit(delivery) {
            Ok(()) => result,
            Err(violation) => Err(violation),
        };
        if response.send(result).is_err() {
            debug!(
                "Table {}: requester went away before the reply",
                self.engine.config().table_id
            );
        }
    }

    /// Forward engine events, verify the table and publish the new state.
    fn commit(&mut self, delivery: &Delivery) -> TableResult<()> {
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::Risk(signal) => {
                    delivery.signals.emit(signal);
                }
                EngineEvent::ShuffleCommitted(audit) => {
                    delivery
                        .outbound
                        .dispatch(OutboundRecord::ShuffleCommitted(audit));
                }
                EngineEvent::HandCompleted(result) => {
                    delivery
                        .outbound
                        .dispatch(OutboundRecord::HandCompleted(result));
                }
                EngineEvent::SeatReleased(release) => {
                    delivery
                        .outbound
                        .dispatch(OutboundRecord::SeatReleased(release));
                }
            }
        }

        match self.engine.check_invariants() {
            Ok(()) => {
                self.publish();
                Ok(())
            }
            Err(violation) => {
                self.halt(&violation);
                Err(violation)
            }
        }
    }

    /// Publish the engine's state if it differs from what readers already
    /// have.
    fn publish(&mut self) {
        let mut snapshot = self.engine.snapshot();
        snapshot.version = self.version;
        if **self.snapshots.borrow() == snapshot {
            return;
        }
        self.version += 1;
        snapshot.version = self.version;
        self.snapshots.send_replace(Arc::new(snapshot));
    }

    /// Keep the last good snapshot, marked halted, and stop accepting work.
    fn halt(&mut self, violation: &TableError) {
        let reason = violation.to_string();
        error!(
            "Table {}: halting, {reason}",
            self.engine.config().table_id
        );
        let mut last = (**self.snapshots.borrow()).clone();
        self.version += 1;
        last.version = self.version;
        last.halted = Some(reason.clone());
        self.snapshots.send_replace(Arc::new(last));
        self.halted = Some(reason);
    }

    /// Close the gate and fail everything still queued. A halted table
    /// also closes its inbox for good.
    fn refuse_queued(&mut self) {
        let table_id = self.engine.config().table_id;
        self.gate.close();
        let error = match &self.halted {
            Some(reason) => {
                self.inbox.close();
                TableError::InvariantViolation(reason.clone())
            }
            None => TableError::QueueClosed,
        };

        let mut refused = 0;
        while let Ok(message) = self.inbox.try_recv() {
            refused += 1;
            debug!(
                "Table {table_id}: refusing {} from user {}",
                message.name(),
                message.user_id()
            );
            message.refuse(error.clone());
        }
        if refused > 0 {
            warn!("Table {table_id}: refused {refused} queued requests: {error}");
        }
    }
}
