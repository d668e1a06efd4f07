//! Reshapes the station's MQTT payloads into flat per-field records
//!
//! Each sensor topic publishes one JSON object. Cloud dashboards want one
//! `{device, field, value}` record per measurement instead, with fixed field
//! names. Keys missing from the payload are passed on as `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_BASE_TOPIC: &str = "ESPWeather-789ABC/";
pub const DEFAULT_DEVICE_ID: &str = "ac0fa860-75fd-49a0-9065-fdf740729ed1";

const WEATHER_TOPIC: &str = "WeatherSensor/data";
const SOIL_TOPIC: &str = "SoilSensor/data";
const LIGHTNING_TOPIC: &str = "LightningSensor/data";

/// (output field, payload key)
const WEATHER_FIELDS: &[(&str, &str)] = &[
    ("WS_BATTERY_OK", "battery_ok"),
    ("WS_TEMP_C", "temp_c"),
    ("WS_HUMIDITY", "humidity"),
    ("WS_WIND_GUST_MS", "wind_gust"),
    ("WS_WIND_AVG_MS", "wind_avg"),
    ("WS_WIND_DIR_DEG", "wind_dir"),
    ("WS_RAIN_MM", "rain"),
    ("WS_RAIN_HOURLY_MM", "rain_h"),
    ("WS_RAIN_DAILY_MM", "rain_d"),
    ("WS_RAIN_WEEKLY_MM", "rain_w"),
    // Field name as already configured on deployed dashboards
    ("WS_RAIN_MONTLY_MM", "rain_m"),
];

const SOIL_FIELDS: &[(&str, &str)] = &[("SOIL1_MOISTURE", "moisture"), ("SOIL1_TEMP_C", "temp_c")];

const LIGHTNING_FIELDS: &[(&str, &str)] = &[
    ("LGT_EV_EVENTS", "lightning_count"),
    ("LGT_EV_DIST_KM", "lightning_distance_km"),
    ("LGT_EV_HR", "lightning_hr"),
];

/// One measurement addressed to a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub device: String,
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct UplinkReshaper {
    base_topic: String,
    device_id: String,
}

impl Default for UplinkReshaper {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC, DEFAULT_DEVICE_ID)
    }
}

impl UplinkReshaper {
    pub fn new(base_topic: &str, device_id: &str) -> Self {
        Self {
            base_topic: base_topic.to_string(),
            device_id: device_id.to_string(),
        }
    }

    /// Records for one message. Topics outside the station's three sensor
    /// topics yield no records; their payload is not parsed.
    pub fn reshape(&self, topic: &str, payload: &str) -> crate::Result<Vec<FieldRecord>> {
        let Some(fields) = self.fields_for(topic) else {
            tracing::debug!("No field mapping for topic '{}'", topic);
            return Ok(Vec::new());
        };

        let payload: Value = serde_json::from_str(payload)?;
        Ok(fields
            .iter()
            .map(|(field, key)| FieldRecord {
                device: self.device_id.clone(),
                field: field.to_string(),
                value: payload.get(key).cloned().unwrap_or(Value::Null),
            })
            .collect())
    }

    fn fields_for(&self, topic: &str) -> Option<&'static [(&'static str, &'static str)]> {
        match topic.strip_prefix(self.base_topic.as_str())? {
            WEATHER_TOPIC => Some(WEATHER_FIELDS),
            SOIL_TOPIC => Some(SOIL_FIELDS),
            LIGHTNING_TOPIC => Some(LIGHTNING_FIELDS),
            _ => None,
        }
    }
}
