//! Public face of a table: lifecycle control, request submission and
//! snapshot reads.

use log::{error, info};
use std::{future::Future, sync::Arc};
use tokio::{
    sync::{Mutex, mpsc, oneshot, watch},
    task::JoinHandle,
};

use super::{
    actor::TableActor,
    config::{TableConfig, TableId},
    messages::{InboxGate, TableMessage},
    outbound::{HandHistorySink, LogHandHistory, LogShuffleAudit, ShuffleAuditLog},
    snapshot::TableSnapshot,
};
use crate::{
    game::{
        deck::{SeedSource, ThreadRngSeedSource},
        entities::{ActionRequest, Chips, SeatIndex, UserId, Username},
        errors::{TableError, TableResult},
        pot::RakePolicy,
        seats::{JoinOutcome, LeaveOutcome},
        state_machine::TableEngine,
    },
    security::risk_signals::{LogRiskScorer, RiskScorer},
};

/// Injected collaborators. Every default only logs.
pub struct TableServices {
    /// Overrides the policy derived from the config's rake settings.
    pub rake_policy: Option<RakePolicy>,
    pub seed_source: Box<dyn SeedSource>,
    pub hand_history: Arc<dyn HandHistorySink>,
    pub shuffle_audit: Arc<dyn ShuffleAuditLog>,
    pub risk_scorer: Arc<dyn RiskScorer>,
}

impl Default for TableServices {
    fn default() -> Self {
        Self {
            rake_policy: None,
            seed_source: Box::new(ThreadRngSeedSource),
            hand_history: Arc::new(LogHandHistory),
            shuffle_audit: Arc::new(LogShuffleAudit),
            risk_scorer: Arc::new(LogRiskScorer),
        }
    }
}

impl TableServices {
    #[must_use]
    pub fn with_rake_policy(mut self, policy: RakePolicy) -> Self {
        self.rake_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_seed_source(mut self, source: impl SeedSource + 'static) -> Self {
        self.seed_source = Box::new(source);
        self
    }

    #[must_use]
    pub fn with_hand_history(mut self, sink: Arc<dyn HandHistorySink>) -> Self {
        self.hand_history = sink;
        self
    }

    #[must_use]
    pub fn with_shuffle_audit(mut self, log: Arc<dyn ShuffleAuditLog>) -> Self {
        self.shuffle_audit = log;
        self
    }

    #[must_use]
    pub fn with_risk_scorer(mut self, scorer: Arc<dyn RiskScorer>) -> Self {
        self.risk_scorer = scorer;
        self
    }
}

enum Lifecycle {
    Idle(Box<TableActor>),
    Running {
        task: JoinHandle<TableActor>,
        stop: oneshot::Sender<()>,
    },
    /// The actor task panicked. Nothing left to restart.
    Crashed,
}

/// A single poker table.
///
/// Construction is pure; nothing runs until [`start`](Self::start).
/// Requests submitted before that are queued and answered once the table
/// starts. Submitting never waits: a full queue is `QueueFull`, and a table
/// that was stopped refuses requests with `QueueClosed` until it starts
/// again.
pub struct Table {
    table_id: TableId,
    sender: mpsc::Sender<TableMessage>,
    gate: Arc<InboxGate>,
    snapshots: watch::Receiver<Arc<TableSnapshot>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Table {
    pub fn new(config: TableConfig) -> TableResult<Self> {
        Self::with_services(config, TableServices::default())
    }

    pub fn with_services(config: TableConfig, services: TableServices) -> TableResult<Self> {
        let table_id = config.table_id;
        let queue_capacity = config.queue_capacity;
        let rake_policy = services
            .rake_policy
            .unwrap_or_else(|| RakePolicy::for_config(&config.rake));
        let engine = TableEngine::with_parts(config, rake_policy, services.seed_source)?;

        let (sender, inbox) = mpsc::channel(queue_capacity);
        let gate = Arc::new(InboxGate::new());
        let (publisher, snapshots) = watch::channel(Arc::new(engine.snapshot()));
        let actor = TableActor::new(
            engine,
            inbox,
            Arc::clone(&gate),
            publisher,
            services.hand_history,
            services.shuffle_audit,
            services.risk_scorer,
        );

        Ok(Self {
            table_id,
            sender,
            gate,
            snapshots,
            lifecycle: Mutex::new(Lifecycle::Idle(Box::new(actor))),
        })
    }

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Start the actor. Runs until [`stop`](Self::stop). Starting a
    /// running table is a no-op.
    pub async fn start(&self) -> TableResult<()> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Start the actor and also stop it once `shutdown` resolves.
    pub async fn start_with_shutdown<F>(&self, shutdown: F) -> TableResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut lifecycle = self.lifecycle.lock().await;
        let actor = match std::mem::replace(&mut *lifecycle, Lifecycle::Crashed) {
            Lifecycle::Idle(actor) => actor,
            Lifecycle::Running { task, stop } if !task.is_finished() => {
                *lifecycle = Lifecycle::Running { task, stop };
                return Ok(());
            }
            // Ended on its own shutdown future; collect it and go again.
            Lifecycle::Running { task, .. } => match task.await {
                Ok(actor) => Box::new(actor),
                Err(e) => {
                    error!("Table {}: actor task failed: {e}", self.table_id);
                    return Err(TableError::QueueClosed);
                }
            },
            Lifecycle::Crashed => return Err(TableError::QueueClosed),
        };

        if let Some(reason) = actor.halted() {
            let violation = TableError::InvariantViolation(reason.to_string());
            *lifecycle = Lifecycle::Idle(actor);
            return Err(violation);
        }

        let (stop, stopped) = oneshot::channel::<()>();
        let shutdown = async move {
            tokio::select! {
                () = shutdown => {}
                _ = stopped => {}
            }
        };
        let actor = *actor;
        self.gate.open();
        let task = tokio::spawn(actor.run(shutdown));
        *lifecycle = Lifecycle::Running { task, stop };
        info!("Table {} started", self.table_id);
        Ok(())
    }

    /// Stop the actor and wait for it to finish the in-flight request. Any
    /// hand in progress is abandoned and refunded, and requests still queued
    /// are refused with `QueueClosed`. A no-op unless running.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        *lifecycle = match std::mem::replace(&mut *lifecycle, Lifecycle::Crashed) {
            Lifecycle::Running { task, stop } => {
                let _ = stop.send(());
                match task.await {
                    Ok(actor) => Lifecycle::Idle(Box::new(actor)),
                    Err(e) => {
                        error!("Table {}: actor task failed: {e}", self.table_id);
                        Lifecycle::Crashed
                    }
                }
            }
            other => other,
        };
    }

    pub async fn is_running(&self) -> bool {
        matches!(
            &*self.lifecycle.lock().await,
            Lifecycle::Running { task, .. } if !task.is_finished()
        )
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<TableResult<T>>) -> TableMessage,
    ) -> TableResult<T> {
        let (response, reply) = oneshot::channel();
        self.gate.send(&self.sender, build(response))?;
        reply.await.map_err(|_| TableError::QueueClosed)?
    }

    /// Seat a player with `buy_in` chips, or reconnect them to the seat
    /// they already hold.
    pub async fn player_joins(
        &self,
        user_id: UserId,
        username: impl Into<Username>,
        buy_in: Chips,
    ) -> TableResult<JoinOutcome> {
        let username = username.into();
        self.request(|response| TableMessage::Join {
            user_id,
            username,
            buy_in,
            response,
        })
        .await
    }

    pub async fn player_leaves(&self, user_id: UserId) -> TableResult<LeaveOutcome> {
        self.request(|response| TableMessage::Leave { user_id, response })
            .await
    }

    /// The transport lost the player. Their seat is held for the
    /// configured grace period.
    pub async fn player_disconnected(&self, user_id: UserId) -> TableResult<SeatIndex> {
        self.request(|response| TableMessage::Disconnect { user_id, response })
            .await
    }

    pub async fn top_up(&self, user_id: UserId, amount: Chips) -> TableResult<Chips> {
        self.request(|response| TableMessage::TopUp {
            user_id,
            amount,
            response,
        })
        .await
    }

    /// Queue an action and return right away. Only queue admission fails
    /// here; validation errors show up in the next snapshot's
    /// `recent_rejections`.
    pub async fn submit_action(&self, request: ActionRequest) -> TableResult<()> {
        self.gate.send(&self.sender, TableMessage::Action(request))
    }

    /// Most recently committed state. Never waits on the actor.
    ///
    /// This is the full view, hole cards included; use
    /// [`TableSnapshot::view_for`] before handing it to a player.
    #[must_use]
    pub fn get_state(&self) -> Arc<TableSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<TableSnapshot>> {
        self.snapshots.clone()
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("table_id", &self.table_id)
            .finish_non_exhaustive()
    }
}
