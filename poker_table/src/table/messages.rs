//! Table actor message types.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

use crate::game::{
    entities::{ActionRequest, Chips, SeatIndex, UserId, Username},
    errors::{TableError, TableResult},
    seats::{JoinOutcome, LeaveOutcome},
};

/// Requests drained by a table actor, in submission order.
#[derive(Debug)]
pub enum TableMessage {
    /// Take a seat, or reconnect to the seat already held
    Join {
        user_id: UserId,
        username: Username,
        buy_in: Chips,
        response: oneshot::Sender<TableResult<JoinOutcome>>,
    },

    /// Give up the seat, now or at the end of the current hand
    Leave {
        user_id: UserId,
        response: oneshot::Sender<TableResult<LeaveOutcome>>,
    },

    /// Transport lost the player
    Disconnect {
        user_id: UserId,
        response: oneshot::Sender<TableResult<SeatIndex>>,
    },

    /// Add chips between hands
    TopUp {
        user_id: UserId,
        amount: Chips,
        response: oneshot::Sender<TableResult<Chips>>,
    },

    /// Player action. Validation errors are reported through the next
    /// snapshot rather than a reply.
    Action(ActionRequest),
}

impl TableMessage {
    /// User the request is about.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        match self {
            Self::Join { user_id, .. }
            | Self::Leave { user_id, .. }
            | Self::Disconnect { user_id, .. }
            | Self::TopUp { user_id, .. } => *user_id,
            Self::Action(request) => request.user_id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Disconnect { .. } => "disconnect",
            Self::TopUp { .. } => "top-up",
            Self::Action(_) => "action",
        }
    }

    /// Answer the request with `error` instead of handling it.
    pub fn refuse(self, error: TableError) {
        match self {
            Self::Join { response, .. } => {
                let _ = response.send(Err(error));
            }
            Self::Leave { response, .. } => {
                let _ = response.send(Err(error));
            }
            Self::Disconnect { response, .. } => {
                let _ = response.send(Err(error));
            }
            Self::TopUp { response, .. } => {
                let _ = response.send(Err(error));
            }
            Self::Action(_) => {}
        }
    }
}

/// Admission to a table's inbox.
///
/// Enqueueing never waits: a full inbox is `QueueFull` and a closed gate is
/// `QueueClosed`. The check and the enqueue happen under one lock, so once
/// the actor has closed the gate and refused what was queued, nothing else
/// gets in until the next start.
#[derive(Debug)]
pub struct InboxGate {
    open: Mutex<bool>,
}

impl InboxGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn send(
        &self,
        inbox: &mpsc::Sender<TableMessage>,
        message: TableMessage,
    ) -> TableResult<()> {
        let open = self.lock();
        if !*open {
            return Err(TableError::QueueClosed);
        }
        inbox.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TableError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TableError::QueueClosed,
        })
    }

    pub fn open(&self) {
        *self.lock() = true;
    }

    pub fn close(&self) {
        *self.lock() = false;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.lock()
    }
}

impl Default for InboxGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_inbox_fails_without_waiting() {
        let gate = InboxGate::new();
        let (inbox, _receiver) = mpsc::channel(1);
        let check = || TableMessage::Action(ActionRequest::check(1));
        assert_eq!(gate.send(&inbox, check()), Ok(()));
        assert_eq!(
            gate.send(&inbox, TableMessage::Action(ActionRequest::check(1))),
            Err(TableError::QueueFull)
        );
    }

    #[test]
    fn test_closed_gate_refuses() {
        let gate = InboxGate::new();
        let (inbox, mut receiver) = mpsc::channel(4);
        gate.close();
        assert!(!gate.is_open());
        assert_eq!(
            gate.send(&inbox, TableMessage::Action(ActionRequest::check(1))),
            Err(TableError::QueueClosed)
        );
        assert!(receiver.try_recv().is_err());

        gate.open();
        let check = || TableMessage::Action(ActionRequest::check(1));
        assert_eq!(gate.send(&inbox, check()), Ok(()));
    }

    #[tokio::test]
    async fn test_refused_request_gets_the_error() {
        let (response, reply) = oneshot::channel();
        let message = TableMessage::Leave {
            user_id: 3,
            response,
        };
        assert_eq!(message.user_id(), 3);
        assert_eq!(message.name(), "leave");
        message.refuse(TableError::QueueClosed);
        assert_eq!(reply.await, Ok(Err(TableError::QueueClosed)));
    }
}
