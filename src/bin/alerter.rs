use std::future::pending;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use home_alerter::{
    actors::{CommandWatchHandle, PollerHandle, PollerSettings, ReminderHandle},
    config::{Config, TransportConfig, read_config_file},
    metrics::{HttpMetricsSource, MetricsSource},
    render::Renderer,
    rules::RuleRegistry,
    transport::{self, ChatTransport, TelegramTransport},
    ventilation::VentilationAdvisor,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Log level for the alerter's own targets
    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![("home_alerter", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let source: Arc<dyn MetricsSource> = Arc::new(
        HttpMetricsSource::new(&config.metrics).context("could not set up metrics client")?,
    );
    let transport: Arc<dyn ChatTransport> = Arc::from(
        transport::from_config(&config.transport).context("could not set up chat transport")?,
    );
    let registry =
        RuleRegistry::from_config(&config.rules).context("invalid rule description")?;
    let renderer = Renderer::new(config.phrases.clone());

    info!(
        "watching {} with {} rules every {}s",
        config.metrics.endpoint,
        registry.len(),
        config.interval.as_secs()
    );

    let (poller, poller_task) = PollerHandle::spawn(
        registry,
        renderer.clone(),
        source.clone(),
        transport.clone(),
        PollerSettings::from(&config),
    );

    let commands = spawn_command_watch(&config, source.clone(), renderer.clone())?;
    let reminder = spawn_reminder(&config, source, transport, renderer)?;

    let reminder_done = async {
        match reminder {
            Some((_handle, task)) => task.await,
            None => pending().await,
        }
    };

    tokio::select! {
        result = poller_task => {
            result.context("poller task panicked")??;
            warn!("poller stopped");
        }

        result = reminder_done => {
            result.context("reminder task panicked")??;
            warn!("reminder stopped");
        }

        result = tokio::signal::ctrl_c() => {
            result.context("could not listen for ctrl-c")?;
            debug!("received ctrl-c, shutting down");
            poller.shutdown().await?;
            if let Some(commands) = &commands {
                commands.shutdown().await?;
            }
        }
    }

    Ok(())
}

type Reminder = (
    ReminderHandle,
    JoinHandle<Result<(), home_alerter::error::VentilationError>>,
);

fn spawn_reminder(
    config: &Config,
    source: Arc<dyn MetricsSource>,
    transport: Arc<dyn ChatTransport>,
    renderer: Renderer,
) -> anyhow::Result<Option<Reminder>> {
    let Some(ventilation) = &config.ventilation else {
        debug!("no ventilation config, reminders disabled");
        return Ok(None);
    };

    let advisor =
        VentilationAdvisor::new(ventilation, source).context("could not set up weather client")?;
    Ok(Some(ReminderHandle::spawn(
        advisor,
        renderer,
        transport,
        ventilation.reminders.clone(),
    )))
}

fn spawn_command_watch(
    config: &Config,
    source: Arc<dyn MetricsSource>,
    renderer: Renderer,
) -> anyhow::Result<Option<CommandWatchHandle>> {
    let (TransportConfig::Telegram(telegram), Some(ventilation)) =
        (&config.transport, &config.ventilation)
    else {
        debug!("bot commands need telegram and a ventilation config, not watching");
        return Ok(None);
    };

    let telegram = TelegramTransport::new(telegram).context("could not set up bot client")?;
    let advisor =
        VentilationAdvisor::new(ventilation, source).context("could not set up weather client")?;
    let (handle, _task) = CommandWatchHandle::spawn(telegram, advisor, renderer);
    info!("answering /{} commands", home_alerter::actors::commands::VENTILATION_COMMAND);
    Ok(Some(handle))
}
