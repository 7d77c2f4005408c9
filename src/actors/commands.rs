//! CommandWatcher - answers Telegram bot commands
//!
//! Long-polls `getUpdates` and replies in the chat a command came from.
//! `/fensterauf` asks the [`VentilationAdvisor`] for a recommendation, every
//! other command gets the phrasebook's `unknown_command` line. Plain messages
//! are skipped. A failed reply is logged and the update counts as consumed.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::VentilationError;
use crate::render::Renderer;
use crate::transport::telegram::{TelegramTransport, Update};
use crate::ventilation::VentilationAdvisor;

use super::messages::WatcherCommand;

pub const VENTILATION_COMMAND: &str = "fensterauf";

const LONG_POLL: Duration = Duration::from_secs(25);
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct CommandWatcher {
    telegram: TelegramTransport,
    advisor: VentilationAdvisor,
    renderer: Renderer,
    rng: StdRng,
    /// Lowest `update_id` not handled yet
    offset: i64,
    command_rx: mpsc::Receiver<WatcherCommand>,
}

impl CommandWatcher {
    pub fn new(
        telegram: TelegramTransport,
        advisor: VentilationAdvisor,
        renderer: Renderer,
        command_rx: mpsc::Receiver<WatcherCommand>,
    ) -> Self {
        Self {
            telegram,
            advisor,
            renderer,
            rng: StdRng::from_os_rng(),
            offset: 0,
            command_rx,
        }
    }

    /// Run until shutdown. Failed update fetches are retried after a pause.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting command watcher");

        loop {
            tokio::select! {
                result = self.telegram.updates(self.offset, LONG_POLL) => {
                    match result {
                        Ok(updates) => self.handle(updates).await,
                        Err(e) => {
                            warn!("fetching updates failed, retrying in {}s: {e}", RETRY_DELAY.as_secs());
                            tokio::time::sleep(RETRY_DELAY).await;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(WatcherCommand::Shutdown) => debug!("received shutdown command"),
                        None => warn!("command channel closed, shutting down"),
                    }
                    break;
                }
            }
        }

        debug!("command watcher stopped");
    }

    async fn handle(&mut self, updates: Vec<Update>) {
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(command) = message.command() else {
                continue;
            };

            if let Err(e) = self.reply(message.chat.id, command).await {
                warn!("could not answer /{command} in chat {}: {e}", message.chat.id);
            }
        }
    }

    #[instrument(skip(self))]
    async fn reply(&mut self, chat_id: i64, command: &str) -> Result<(), VentilationError> {
        let text = if command == VENTILATION_COMMAND {
            let recommendation = self.advisor.recommend().await?;
            self.renderer
                .recommendation_phrase(recommendation, &mut self.rng)
                .to_string()
        } else {
            debug!("unknown command /{command}");
            self.renderer.phrases().unknown_command.clone()
        };

        let id = self.telegram.send_to(chat_id, &text).await?;
        info!("answered /{command} with message {id}");
        Ok(())
    }
}

/// Handle for controlling a CommandWatcher
#[derive(Clone)]
pub struct CommandWatchHandle {
    sender: mpsc::Sender<WatcherCommand>,
}

impl CommandWatchHandle {
    pub fn spawn(
        telegram: TelegramTransport,
        advisor: VentilationAdvisor,
        renderer: Renderer,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let watcher = CommandWatcher::new(telegram, advisor, renderer, cmd_rx);
        let task = tokio::spawn(watcher.run());

        (Self { sender: cmd_tx }, task)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WatcherCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
