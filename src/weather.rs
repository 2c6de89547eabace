use crate::model::{GeoPoint, Weather, WeatherCondition};
use crate::ports::WeatherProvider;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

/* ----------------------------
   Current conditions (Open-Meteo)
---------------------------- */

pub struct OpenMeteo {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl OpenMeteo {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("weather client setup failed")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResp {
    current: OpenMeteoCurrent,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: f64,
    weather_code: i32,
    is_day: u8,
}

impl WeatherProvider for OpenMeteo {
    fn current(&self, point: GeoPoint) -> Result<Weather> {
        let url = format!(
            "{}?latitude={}&longitude={}&current=temperature_2m,weather_code,is_day",
            self.endpoint, point.lat, point.lon
        );
        let resp = self
            .client
            .get(url)
            .send()
            .context("weather request failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("weather HTTP {}", resp.status()));
        }

        let om: OpenMeteoResp = resp.json().context("weather JSON parse failed")?;
        let is_day = om.current.is_day == 1;
        Ok(Weather {
            temperature_c: om.current.temperature_2m,
            condition: condition_from_code(om.current.weather_code, is_day),
            is_day,
        })
    }
}

/// Collapses WMO weather codes into the four backgrounds the app draws.
/// A dry night is always `Night`.
pub fn condition_from_code(code: i32, is_day: bool) -> WeatherCondition {
    let condition = match code {
        51..=67 | 80..=82 | 95..=99 => WeatherCondition::Rain,
        2 | 3 | 45 | 48 => WeatherCondition::Cloudy,
        _ => WeatherCondition::Sun,
    };
    if !is_day && condition != WeatherCondition::Rain {
        return WeatherCondition::Night;
    }
    condition
}

/// Fixed answer, used when live lookups are switched off.
pub struct StaticWeather(pub Weather);

impl WeatherProvider for StaticWeather {
    fn current(&self, _point: GeoPoint) -> Result<Weather> {
        Ok(self.0)
    }
}
