//! Message types for actor communication
//!
//! Every actor owns an mpsc command channel; queries carry a oneshot sender
//! for the answer.

use tokio::sync::oneshot;

use crate::error::{CycleError, VentilationError};
use crate::notification::{Action, NotificationState};
use crate::transport::MessageId;

/// Outcome of one successful poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Identity keys of the alerts active after the cycle
    pub alerts: Vec<String>,

    /// Whether the active set differs from the previous cycle
    pub changed: bool,

    /// What was done to the chat
    pub action: Action,
}

/// Commands that can be sent to the PollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Run a cycle immediately, independent of the timer
    PollNow {
        respond_to: oneshot::Sender<Result<CycleReport, CycleError>>,
    },

    /// Get the current notification state
    GetState {
        respond_to: oneshot::Sender<NotificationState>,
    },

    /// Stop after the cycle in flight, if any
    Shutdown,
}

/// Commands that can be sent to the ReminderActor
#[derive(Debug)]
pub enum ReminderCommand {
    /// Send a reminder now, without waiting for the next scheduled time
    FireNow {
        respond_to: oneshot::Sender<Result<MessageId, VentilationError>>,
    },

    Shutdown,
}

/// Commands that can be sent to the CommandWatcher
#[derive(Debug)]
pub enum WatcherCommand {
    Shutdown,
}
