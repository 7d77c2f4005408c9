//! ReminderActor - daily ventilation reminders
//!
//! Sleeps until the next configured local time, asks the
//! [`VentilationAdvisor`] for a recommendation and posts it as a new message.
//! It shares the transport with the poller but never touches the alert
//! message.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::VentilationError;
use crate::render::Renderer;
use crate::transport::{ChatTransport, MessageId};
use crate::ventilation::VentilationAdvisor;

use super::messages::ReminderCommand;

/// Earliest of `times` strictly after `now`, looking at today and tomorrow.
///
/// Times that do not exist on a day (DST gap) are skipped for that day.
pub fn next_occurrence<Tz: TimeZone>(
    times: &[NaiveTime],
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    let tomorrow = today.succ_opt()?;
    let zone = now.timezone();

    [today, tomorrow]
        .into_iter()
        .flat_map(|day| times.iter().map(move |time| day.and_time(*time)))
        .filter_map(|local| zone.from_local_datetime(&local).earliest())
        .filter(|candidate| candidate > now)
        .min()
}

pub struct ReminderActor {
    advisor: VentilationAdvisor,
    renderer: Renderer,
    transport: Arc<dyn ChatTransport>,
    times: Vec<NaiveTime>,
    rng: StdRng,
    command_rx: mpsc::Receiver<ReminderCommand>,
}

impl ReminderActor {
    pub fn new(
        advisor: VentilationAdvisor,
        renderer: Renderer,
        transport: Arc<dyn ChatTransport>,
        times: Vec<NaiveTime>,
        command_rx: mpsc::Receiver<ReminderCommand>,
    ) -> Self {
        Self {
            advisor,
            renderer,
            transport,
            times,
            rng: StdRng::from_os_rng(),
            command_rx,
        }
    }

    /// Run until shutdown or the first failed scheduled reminder.
    #[instrument(skip(self), fields(times = ?self.times))]
    pub async fn run(mut self) -> Result<(), VentilationError> {
        debug!("starting reminder actor");

        loop {
            let now = Local::now();
            let wait = match next_occurrence(&self.times, &now) {
                Some(next) => {
                    let wait = next
                        .signed_duration_since(now)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    debug!("next reminder at {next}, waiting {}s", wait.as_secs());
                    wait
                }
                None => {
                    debug!("no reminder times configured");
                    Duration::MAX
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.remind().await {
                        error!("ventilation reminder failed, stopping: {e}");
                        return Err(e);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ReminderCommand::FireNow { respond_to } => {
                            let result = self.remind().await;
                            if let Err(e) = &result {
                                warn!("requested reminder failed: {e}");
                            }
                            let _ = respond_to.send(result);
                        }

                        ReminderCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("reminder actor stopped");
        Ok(())
    }

    async fn remind(&mut self) -> Result<MessageId, VentilationError> {
        let recommendation = self.advisor.recommend().await?;
        let text = self.renderer.render_reminder(recommendation, &mut self.rng);
        let id = self.transport.send(&text).await?;
        info!("sent ventilation reminder {id} ({recommendation:?})");
        Ok(id)
    }
}

/// Handle for controlling a ReminderActor
#[derive(Clone)]
pub struct ReminderHandle {
    sender: mpsc::Sender<ReminderCommand>,
}

impl ReminderHandle {
    pub fn spawn(
        advisor: VentilationAdvisor,
        renderer: Renderer,
        transport: Arc<dyn ChatTransport>,
        times: Vec<NaiveTime>,
    ) -> (Self, JoinHandle<Result<(), VentilationError>>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ReminderActor::new(advisor, renderer, transport, times, cmd_rx);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Send a reminder immediately.
    pub async fn fire_now(&self) -> Result<MessageId> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ReminderCommand::FireNow { respond_to: tx })
            .await
            .context("failed to send FireNow command")?;

        let id = rx.await.context("failed to receive response")??;
        Ok(id)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(ReminderCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
