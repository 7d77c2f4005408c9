//! Edit-in-place notification state machine
//!
//! ```text
//! Idle      + empty set            → nothing
//! Idle      + alerts               → send,  Active(id)
//! Active(id) + alerts, changed     → edit(id), Active(id)
//! Active(id) + alerts, unchanged   → nothing
//! Active(id) + empty set           → send all-clear, Idle
//! ```
//!
//! The state only moves after the transport call succeeded, so a failed
//! cycle leaves it untouched.

use tracing::{debug, info, instrument};

use crate::alerts::TriggeredSet;
use crate::error::{CycleError, TemplateError};
use crate::transport::{ChatTransport, MessageId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NotificationState {
    /// No live message
    #[default]
    Idle,

    /// A message listing the active alerts exists and gets edited
    Active(MessageId),
}

/// What one cycle did to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No transport call was made
    None,

    /// A new alert message was sent
    Send(MessageId),

    /// The live message was edited
    Edit(MessageId),

    /// The all-clear message was sent and the live message dropped
    Resolve,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationMachine {
    state: NotificationState,
}

enum Plan {
    Nothing,
    Send,
    Edit(MessageId),
    Resolve,
}

impl NotificationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &NotificationState {
        &self.state
    }

    fn plan(&self, alerts: &TriggeredSet, changed: bool) -> Plan {
        match (&self.state, alerts.is_empty()) {
            (NotificationState::Idle, true) => Plan::Nothing,
            (NotificationState::Idle, false) => Plan::Send,
            (NotificationState::Active(_), true) => Plan::Resolve,
            (NotificationState::Active(id), false) if changed => Plan::Edit(id.clone()),
            (NotificationState::Active(_), false) => Plan::Nothing,
        }
    }

    /// Drive the machine once for the current cycle.
    ///
    /// `render` produces the text for `alerts` and is only called when a
    /// transport call is going to be made. At most one transport call happens.
    #[instrument(skip_all, fields(alerts = alerts.len(), changed = changed))]
    pub async fn advance<F>(
        &mut self,
        transport: &dyn ChatTransport,
        alerts: &TriggeredSet,
        changed: bool,
        render: F,
    ) -> Result<Action, CycleError>
    where
        F: FnOnce() -> Result<String, TemplateError>,
    {
        match self.plan(alerts, changed) {
            Plan::Nothing => Ok(Action::None),
            Plan::Send => {
                let text = render()?;
                let id = transport.send(&text).await?;
                info!("sent alert message {id}");
                self.state = NotificationState::Active(id.clone());
                Ok(Action::Send(id))
            }
            Plan::Edit(id) => {
                let text = render()?;
                transport.edit(&id, &text).await?;
                info!("edited alert message {id}");
                Ok(Action::Edit(id))
            }
            Plan::Resolve => {
                let text = render()?;
                let id = transport.send(&text).await?;
                debug!("sent all-clear message {id}, going idle");
                self.state = NotificationState::Idle;
                Ok(Action::Resolve)
            }
        }
    }
}
