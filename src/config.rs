use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use tracing::trace;

use crate::render::Phrasebook;
use crate::rules::{RuleConfig, RuleRegistry, default_rules};
use crate::util;

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub endpoint: String,

    /// Sent as `X-MONITORING-SECRET` when present
    pub token: Option<String>,

    #[serde(default = "crate::util::get_default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
            timeout_secs: util::get_default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportConfig {
    Telegram(Telegram),
    Discord(Discord),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Telegram {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default = "crate::util::get_default_telegram_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Discord {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VentilationConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub api_key: String,

    /// Daily local reminder times
    #[serde(default = "default_reminders", deserialize_with = "daily_times")]
    pub reminders: Vec<NaiveTime>,

    #[serde(default = "crate::util::get_default_weather_url")]
    pub weather_url: String,
}

fn default_reminders() -> Vec<NaiveTime> {
    [(8, 0), (22, 0)]
        .into_iter()
        .filter_map(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
        .collect()
}

fn daily_times<'de, D>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let times = Vec::<String>::deserialize(deserializer)?;
    times
        .iter()
        .map(|time| {
            NaiveTime::parse_from_str(time, "%H:%M").map_err(|e| {
                serde::de::Error::custom(format!("invalid reminder time `{time}`: {e}"))
            })
        })
        .collect()
}

fn default_fail_fast() -> bool {
    true
}

/// The configuration file as written; transport and endpoint may still be
/// filled in from the environment.
#[derive(Debug, Clone, Deserialize)]
struct FileConfig {
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default = "crate::util::get_default_interval")]
    interval: u64,
    #[serde(default = "default_fail_fast")]
    fail_fast: bool,
    transport: Option<TransportConfig>,
    #[serde(default)]
    phrases: Phrasebook,
    #[serde(default = "default_rules")]
    rules: Vec<RuleConfig>,
    ventilation: Option<VentilationConfig>,
    seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub interval: Duration,
    /// Stop the poll loop on the first failed cycle
    pub fail_fast: bool,
    pub transport: TransportConfig,
    pub phrases: Phrasebook,
    pub rules: Vec<RuleConfig>,
    pub ventilation: Option<VentilationConfig>,
    /// Seed for phrase selection, random when absent
    pub seed: Option<u64>,
}

/// Values taken from the environment, applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub metrics_endpoint: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub openweathermap_api_key: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            metrics_endpoint: util::get_metrics_endpoint(),
            telegram_token: util::get_telegram_token(),
            telegram_chat_id: util::get_telegram_chat_id(),
            openweathermap_api_key: util::get_openweathermap_api_key(),
        }
    }

    fn apply(self, config: &mut FileConfig) {
        if let Some(endpoint) = self.metrics_endpoint {
            config.metrics.endpoint = endpoint;
        }

        match config.transport {
            Some(TransportConfig::Telegram(ref mut telegram)) => {
                if let Some(token) = self.telegram_token {
                    telegram.token = token;
                }
                if let Some(chat_id) = self.telegram_chat_id {
                    telegram.chat_id = chat_id;
                }
            }
            Some(TransportConfig::Discord(_)) => {}
            None => {
                if let (Some(token), Some(chat_id)) = (self.telegram_token, self.telegram_chat_id) {
                    config.transport = Some(TransportConfig::Telegram(Telegram {
                        token,
                        chat_id,
                        api_url: util::get_default_telegram_api_url(),
                    }));
                }
            }
        }

        if let (Some(ventilation), Some(api_key)) =
            (&mut config.ventilation, self.openweathermap_api_key)
        {
            ventilation.api_key = api_key;
        }
    }
}

impl FileConfig {
    fn resolve(self) -> anyhow::Result<Config> {
        if self.metrics.endpoint.is_empty() {
            bail!("no metrics endpoint configured (set `metrics.endpoint` or METRICS_ENDPOINT)");
        }

        if self.interval == 0 {
            bail!("`interval` must be at least one second");
        }

        let Some(transport) = self.transport else {
            bail!("no chat transport configured");
        };
        if let TransportConfig::Telegram(telegram) = &transport {
            if telegram.token.is_empty() || telegram.chat_id == 0 {
                bail!("telegram transport needs a bot token and a chat id");
            }
        }

        let empty = self.phrases.empty_pools();
        if !empty.is_empty() {
            bail!("empty phrase pools: {}", empty.join(", "));
        }

        RuleRegistry::from_config(&self.rules).context("invalid rule description")?;

        if let Some(ventilation) = &self.ventilation {
            if ventilation.api_key.is_empty() {
                bail!("ventilation reminders need an OpenWeatherMap API key");
            }
        }

        Ok(Config {
            metrics: self.metrics,
            interval: Duration::from_secs(self.interval),
            fail_fast: self.fail_fast,
            transport,
            phrases: self.phrases,
            rules: self.rules,
            ventilation: self.ventilation,
            seed: self.seed,
        })
    }
}

pub fn parse_config(content: &str, overrides: Overrides) -> anyhow::Result<Config> {
    let mut config: FileConfig =
        serde_json::from_str(content).context("Invalid configuration file provided!")?;
    overrides.apply(&mut config);
    config.resolve()
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    parse_config(&file_content, Overrides::from_env())
        .inspect(|config| trace!("loaded config: {config:?}"))
}
