//! Ventilation advice
//!
//! Compares the absolute humidity indoors with the one outside. Airing the
//! flat only helps when the outside air carries noticeably less water.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::VentilationConfig;
use crate::error::VentilationError;
use crate::metrics::{MetricsSource, Snapshot};

const TEMPERATURE_FAMILY: &str = "tado_sensor_temperature_value";
const HUMIDITY_FAMILY: &str = "tado_sensor_humidity_percentage";
const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    No,
    Maybe,
    Yes,
}

impl Recommendation {
    /// Map an absolute humidity difference (indoor minus outdoor, g/m³).
    pub fn from_difference(difference: f64) -> Self {
        if difference < 0.5 {
            Recommendation::No
        } else if difference < 2.0 {
            Recommendation::Maybe
        } else {
            Recommendation::Yes
        }
    }
}

/// Temperature in °C and relative humidity in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature: f64,
    pub humidity: f64,
}

impl Climate {
    /// Water content of the air in g/m³ (Magnus formula).
    pub fn absolute_humidity(&self) -> f64 {
        absolute_humidity(self.temperature, self.humidity)
    }
}

pub fn absolute_humidity(temperature: f64, relative_humidity: f64) -> f64 {
    let saturation = 6.112 * ((17.67 * temperature) / (temperature + 243.5)).exp();
    (saturation * relative_humidity * 2.1674) / (KELVIN_OFFSET + temperature)
}

/// Average the heated rooms of a snapshot.
///
/// Only samples labelled `type="HEATING"` count, temperatures additionally
/// need `unit="celsius"`.
pub fn indoor_climate(snapshot: &Snapshot) -> Result<Climate, VentilationError> {
    let heated = |labels: &[(&str, &str)], family: &str| -> Vec<f64> {
        snapshot
            .family(family)
            .iter()
            .filter(|sample| {
                labels
                    .iter()
                    .all(|(name, value)| sample.label(name) == Some(*value))
            })
            .map(|sample| sample.value)
            .collect()
    };

    let temperatures = heated(&[("unit", "celsius"), ("type", "HEATING")], TEMPERATURE_FAMILY);
    let humidities = heated(&[("type", "HEATING")], HUMIDITY_FAMILY);

    Ok(Climate {
        temperature: average(&temperatures).ok_or(VentilationError::NoIndoorSamples("temperature"))?,
        humidity: average(&humidities).ok_or(VentilationError::NoIndoorSamples("humidity"))?,
    })
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    /// Kelvin
    temp: f64,
    humidity: f64,
}

pub struct VentilationAdvisor {
    client: Client,
    source: Arc<dyn MetricsSource>,
    weather_url: String,
    latitude: f64,
    longitude: f64,
    api_key: String,
}

impl VentilationAdvisor {
    pub fn new(
        config: &VentilationConfig,
        source: Arc<dyn MetricsSource>,
    ) -> Result<Self, VentilationError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            source,
            weather_url: config.weather_url.trim_end_matches('/').to_string(),
            latitude: config.latitude,
            longitude: config.longitude,
            api_key: config.api_key.clone(),
        })
    }

    /// Current outdoor climate from OpenWeatherMap.
    #[instrument(skip(self))]
    pub async fn outdoor_climate(&self) -> Result<Climate, VentilationError> {
        let response = self
            .client
            .get(format!("{}/data/2.5/weather", self.weather_url))
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VentilationError::WeatherStatus(response.status()));
        }

        let weather: WeatherResponse = response.json().await?;
        Ok(Climate {
            temperature: weather.main.temp - KELVIN_OFFSET,
            humidity: weather.main.humidity,
        })
    }

    pub async fn indoor_climate(&self) -> Result<Climate, VentilationError> {
        let snapshot = self.source.fetch().await?;
        indoor_climate(&snapshot)
    }

    #[instrument(skip(self))]
    pub async fn recommend(&self) -> Result<Recommendation, VentilationError> {
        let outdoor = self.outdoor_climate().await?;
        let indoor = self.indoor_climate().await?;

        let difference = indoor.absolute_humidity() - outdoor.absolute_humidity();
        let recommendation = Recommendation::from_difference(difference);
        debug!(
            "indoor {:.1}°C/{:.0}%, outdoor {:.1}°C/{:.0}%, difference {difference:.2} g/m³ → {recommendation:?}",
            indoor.temperature, indoor.humidity, outdoor.temperature, outdoor.humidity
        );

        Ok(recommendation)
    }
}
