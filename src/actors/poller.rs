//! PollerActor - drives the alert engine
//!
//! ## Cycle
//!
//! ```text
//! fetch → evaluate → diff → plan → (render) → send/edit → commit
//!   ↑
//!   └─── timer tick or PollNow command
//! ```
//!
//! The previous alert set is only replaced after the whole cycle succeeded,
//! so a failed cycle is retried against the same baseline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, warn};

use crate::alerts::{TriggeredSet, evaluate};
use crate::config::Config;
use crate::error::CycleError;
use crate::metrics::MetricsSource;
use crate::notification::{NotificationMachine, NotificationState};
use crate::render::Renderer;
use crate::rules::RuleRegistry;
use crate::tracker;
use crate::transport::ChatTransport;

use super::messages::{CycleReport, PollerCommand};

/// Loop behaviour that is not part of the engine itself.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub fail_fast: bool,
    pub seed: Option<u64>,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.interval,
            fail_fast: config.fail_fast,
            seed: config.seed,
        }
    }
}

pub struct PollerActor {
    registry: RuleRegistry,
    renderer: Renderer,
    machine: NotificationMachine,

    /// Alerts of the last successful cycle
    previous: TriggeredSet,

    source: Arc<dyn MetricsSource>,
    transport: Arc<dyn ChatTransport>,
    rng: StdRng,

    command_rx: mpsc::Receiver<PollerCommand>,
    interval_duration: Duration,
    fail_fast: bool,
}

impl PollerActor {
    pub fn new(
        registry: RuleRegistry,
        renderer: Renderer,
        source: Arc<dyn MetricsSource>,
        transport: Arc<dyn ChatTransport>,
        settings: PollerSettings,
        command_rx: mpsc::Receiver<PollerCommand>,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            registry,
            renderer,
            machine: NotificationMachine::new(),
            previous: TriggeredSet::new(),
            source,
            transport,
            rng,
            command_rx,
            interval_duration: settings.interval,
            fail_fast: settings.fail_fast,
        }
    }

    /// Run until shutdown, a closed command channel or, with `fail_fast`, the
    /// first failed timer cycle.
    ///
    /// The first timer cycle runs one interval after start.
    #[instrument(skip(self), fields(rules = self.registry.len()))]
    pub async fn run(mut self) -> Result<(), CycleError> {
        debug!("starting poller actor");

        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.cycle().await {
                        if self.fail_fast {
                            error!(kind = e.kind(), "poll cycle failed, stopping: {e}");
                            return Err(e);
                        }
                        warn!(kind = e.kind(), "poll cycle failed: {e}");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            let result = self.cycle().await;
                            if let Err(e) = &result {
                                warn!(kind = e.kind(), "requested poll cycle failed: {e}");
                            }
                            let _ = respond_to.send(result);
                        }

                        PollerCommand::GetState { respond_to } => {
                            let _ = respond_to.send(self.machine.state().clone());
                        }

                        PollerCommand::Shutdown => {
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

        debug!("poller actor stopped");
        Ok(())
    }

    async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        let snapshot = self.source.fetch().await?;
        let current = evaluate(&self.registry, &snapshot);

        let changed = {
            let differing = tracker::diff(&self.previous, &current);
            if !differing.is_empty() {
                debug!("alert set changed: {differing:?}");
            }
            !differing.is_empty()
        };

        let renderer = &self.renderer;
        let rng = &mut self.rng;
        let action = self
            .machine
            .advance(self.transport.as_ref(), &current, changed, || {
                renderer.render(&current, rng)
            })
            .await?;

        let report = CycleReport {
            alerts: current.keys().map(str::to_string).collect(),
            changed,
            action,
        };
        self.previous = current;

        Ok(report)
    }
}

/// Handle for controlling a PollerActor
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,
}

impl PollerHandle {
    /// Spawn the actor; the join handle resolves once the loop ends.
    pub fn spawn(
        registry: RuleRegistry,
        renderer: Renderer,
        source: Arc<dyn MetricsSource>,
        transport: Arc<dyn ChatTransport>,
        settings: PollerSettings,
    ) -> (Self, JoinHandle<Result<(), CycleError>>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = PollerActor::new(registry, renderer, source, transport, settings, cmd_rx);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Run a cycle now and wait for its outcome.
    pub async fn poll_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        let report = rx.await.context("failed to receive response")??;
        Ok(report)
    }

    pub async fn state(&self) -> Result<NotificationState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::GetState { respond_to: tx })
            .await
            .context("failed to send GetState command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
