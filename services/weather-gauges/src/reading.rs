//! Reading names and the reading set delivered by the station

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GaugeError;

/// A measurement the station reports and a gauge displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingName {
    Temperature,
    Humidity,
    WindAverage,
    WindGust,
    WindDirection,
    RainHourly,
    RainDaily,
    RainWeekly,
    RainMonthly,
}

impl ReadingName {
    pub const ALL: [ReadingName; 9] = [
        ReadingName::Temperature,
        ReadingName::Humidity,
        ReadingName::WindAverage,
        ReadingName::WindGust,
        ReadingName::WindDirection,
        ReadingName::RainHourly,
        ReadingName::RainDaily,
        ReadingName::RainWeekly,
        ReadingName::RainMonthly,
    ];

    /// JSON key used by `/readings` and the `new_readings` event
    pub fn wire_key(&self) -> &'static str {
        match self {
            ReadingName::Temperature => "ws_temp_c",
            ReadingName::Humidity => "ws_humidity",
            ReadingName::WindAverage => "ws_wind_avg_ms",
            ReadingName::WindGust => "ws_wind_gust_ms",
            ReadingName::WindDirection => "ws_wind_dir_deg",
            ReadingName::RainHourly => "ws_rain_h",
            ReadingName::RainDaily => "ws_rain_d",
            ReadingName::RainWeekly => "ws_rain_w",
            ReadingName::RainMonthly => "ws_rain_m",
        }
    }
}

impl fmt::Display for ReadingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingName::Temperature => write!(f, "temperature"),
            ReadingName::Humidity => write!(f, "humidity"),
            ReadingName::WindAverage => write!(f, "wind average speed"),
            ReadingName::WindGust => write!(f, "wind gust speed"),
            ReadingName::WindDirection => write!(f, "wind direction"),
            ReadingName::RainHourly => write!(f, "rain past hour"),
            ReadingName::RainDaily => write!(f, "rain today"),
            ReadingName::RainWeekly => write!(f, "rain this week"),
            ReadingName::RainMonthly => write!(f, "rain this month"),
        }
    }
}

/// A partial or full set of readings.
///
/// `None` means "no update for this field". A JSON `null` is treated the
/// same as an absent key, unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingSet {
    #[serde(rename = "ws_temp_c", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(rename = "ws_humidity", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(rename = "ws_wind_avg_ms", default, skip_serializing_if = "Option::is_none")]
    pub wind_average: Option<f64>,
    #[serde(rename = "ws_wind_gust_ms", default, skip_serializing_if = "Option::is_none")]
    pub wind_gust: Option<f64>,
    #[serde(rename = "ws_wind_dir_deg", default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    #[serde(rename = "ws_rain_h", default, skip_serializing_if = "Option::is_none")]
    pub rain_hourly: Option<f64>,
    #[serde(rename = "ws_rain_d", default, skip_serializing_if = "Option::is_none")]
    pub rain_daily: Option<f64>,
    #[serde(rename = "ws_rain_w", default, skip_serializing_if = "Option::is_none")]
    pub rain_weekly: Option<f64>,
    #[serde(rename = "ws_rain_m", default, skip_serializing_if = "Option::is_none")]
    pub rain_monthly: Option<f64>,
}

impl ReadingSet {
    /// Decode a response body or event payload.
    ///
    /// Anything but a JSON object, or an object with a non-numeric value for
    /// a known key, is rejected as a whole. Nothing is ever partially decoded.
    pub fn decode(body: &str) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(GaugeError::Json(serde::de::Error::custom(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            ))));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn get(&self, name: ReadingName) -> Option<f64> {
        match name {
            ReadingName::Temperature => self.temperature,
            ReadingName::Humidity => self.humidity,
            ReadingName::WindAverage => self.wind_average,
            ReadingName::WindGust => self.wind_gust,
            ReadingName::WindDirection => self.wind_direction,
            ReadingName::RainHourly => self.rain_hourly,
            ReadingName::RainDaily => self.rain_daily,
            ReadingName::RainWeekly => self.rain_weekly,
            ReadingName::RainMonthly => self.rain_monthly,
        }
    }

    pub fn set(&mut self, name: ReadingName, value: Option<f64>) {
        let slot = match name {
            ReadingName::Temperature => &mut self.temperature,
            ReadingName::Humidity => &mut self.humidity,
            ReadingName::WindAverage => &mut self.wind_average,
            ReadingName::WindGust => &mut self.wind_gust,
            ReadingName::WindDirection => &mut self.wind_direction,
            ReadingName::RainHourly => &mut self.rain_hourly,
            ReadingName::RainDaily => &mut self.rain_daily,
            ReadingName::RainWeekly => &mut self.rain_weekly,
            ReadingName::RainMonthly => &mut self.rain_monthly,
        };
        *slot = value;
    }

    /// Builder-style variant of [`ReadingSet::set`]
    pub fn with(mut self, name: ReadingName, value: f64) -> Self {
        self.set(name, Some(value));
        self
    }

    /// Present readings in a stable order
    pub fn present(&self) -> impl Iterator<Item = (ReadingName, f64)> + '_ {
        ReadingName::ALL
            .iter()
            .filter_map(move |name| self.get(*name).map(|value| (*name, value)))
    }

    pub fn len(&self) -> usize {
        self.present().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
