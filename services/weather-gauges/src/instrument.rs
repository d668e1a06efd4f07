//! Instruments: gauge configuration and the animated display sink

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::reading::ReadingName;
use crate::sanitize::ClampRange;

/// Time an instrument takes to move to a new target
pub const ANIMATION_DURATION: Duration = Duration::from_millis(1500);

/// Write-only display sink bound to one reading.
///
/// The engine only ever assigns targets; how the instrument gets there is
/// its own business.
#[cfg_attr(test, mockall::automock)]
pub trait Instrument: Send + Sync {
    /// Assign a new target value
    fn set_value(&self, value: f64);
}

/// Shape of the rendered gauge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeKind {
    Radial,
    Linear,
}

/// Colored band drawn on the dial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub from: f64,
    pub to: f64,
    pub color: String,
}

impl Highlight {
    fn new(from: f64, to: f64, color: &str) -> Self {
        Self {
            from,
            to,
            color: color.to_string(),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.from && value <= self.to
    }
}

/// Static configuration of one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub reading: ReadingName,
    pub title: String,
    pub units: Option<String>,
    pub kind: GaugeKind,
    pub min_value: f64,
    pub max_value: f64,
    pub major_ticks: Vec<String>,
    pub minor_ticks: u32,
    pub highlights: Vec<Highlight>,
    /// Minimum number of integer digits shown in the value box
    pub value_int: u8,
    /// Number of decimals shown in the value box
    pub value_dec: u8,
    pub animation: Duration,
    /// Range readings are clamped to before display, if any
    pub clamp: Option<ClampRange>,
}

impl InstrumentConfig {
    /// Format a value with this instrument's precision and units
    pub fn format_value(&self, value: f64) -> String {
        let number = format_number(value, self.value_int, self.value_dec);
        match &self.units {
            Some(units) => format!("{} {}", number, units),
            None => number,
        }
    }

    /// First highlight band the value falls into
    pub fn highlight_for(&self, value: f64) -> Option<&Highlight> {
        self.highlights.iter().find(|h| h.contains(value))
    }
}

fn format_number(value: f64, int_digits: u8, decimals: u8) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let decimals = decimals as usize;
    let magnitude = format!("{:.*}", decimals, value.abs());
    let int_len = magnitude.find('.').unwrap_or(magnitude.len());
    let padding = (int_digits as usize).saturating_sub(int_len);
    let sign = if value < 0.0 && magnitude.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    format!("{}{}{}", sign, "0".repeat(padding), magnitude)
}

fn ticks(values: &[&str]) -> Vec<String> {
    values.iter().map(|t| t.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn radial(
    reading: ReadingName,
    title: &str,
    units: Option<&str>,
    min_value: f64,
    max_value: f64,
    major_ticks: &[&str],
    minor_ticks: u32,
    highlights: Vec<Highlight>,
    value_dec: u8,
) -> InstrumentConfig {
    InstrumentConfig {
        reading,
        title: title.to_string(),
        units: units.map(str::to_string),
        kind: GaugeKind::Radial,
        min_value,
        max_value,
        major_ticks: ticks(major_ticks),
        minor_ticks,
        highlights,
        value_int: 1,
        value_dec,
        animation: ANIMATION_DURATION,
        clamp: None,
    }
}

fn rain_bar(reading: ReadingName, title: &str, max_value: f64, limit: f64) -> InstrumentConfig {
    let step = max_value / 5.0;
    let major_ticks = (0..=5).map(|i| format!("{}", i as f64 * step)).collect();
    InstrumentConfig {
        reading,
        title: title.to_string(),
        units: Some("mm".to_string()),
        kind: GaugeKind::Linear,
        min_value: 0.0,
        max_value,
        major_ticks,
        minor_ticks: if max_value > 50.0 { 10 } else { 5 },
        highlights: Vec::new(),
        value_int: 1,
        value_dec: 1,
        animation: ANIMATION_DURATION,
        // The bar may overshoot its scale slightly, never run off it
        clamp: Some(ClampRange::new(-1.0, limit)),
    }
}

/// The station dashboard: one instrument per reading
pub fn default_instruments() -> Vec<InstrumentConfig> {
    let wind_bands = || {
        vec![
            Highlight::new(8.0, 17.2, "rgba(255, 128, 0, .3)"),
            Highlight::new(17.2, 30.0, "rgba(255, 0, 0, .3)"),
        ]
    };

    vec![
        radial(
            ReadingName::Temperature,
            "Temperature",
            Some("°C"),
            -40.0,
            40.0,
            &["-40", "-30", "-20", "-10", "0", "10", "20", "30", "40"],
            2,
            vec![
                Highlight::new(-40.0, 0.0, "rgba(0,0, 255, .3)"),
                Highlight::new(30.0, 40.0, "rgba(255, 0, 0, .3)"),
            ],
            1,
        ),
        radial(
            ReadingName::Humidity,
            "Humidity",
            Some("% rH"),
            0.0,
            100.0,
            &["0", "10", "20", "30", "40", "50", "60", "70", "80", "90", "100"],
            5,
            vec![
                Highlight::new(0.0, 35.0, "rgba(255,0, 0, .3)"),
                Highlight::new(65.0, 100.0, "rgba(0, 0, 255, .3)"),
            ],
            0,
        ),
        radial(
            ReadingName::WindAverage,
            "Wind Speed (avg)",
            Some("m/s"),
            0.0,
            30.0,
            &["0", "5", "10", "20", "30"],
            2,
            wind_bands(),
            1,
        ),
        radial(
            ReadingName::WindGust,
            "Wind Speed (Gusts)",
            Some("m/s"),
            0.0,
            30.0,
            &["0", "5", "10", "20", "30"],
            2,
            wind_bands(),
            1,
        ),
        radial(
            ReadingName::WindDirection,
            "Wind Direction",
            None,
            0.0,
            360.0,
            &["N", "NE", "E", "SE", "S", "SW", "W", "NW", "N"],
            9,
            Vec::new(),
            0,
        ),
        rain_bar(ReadingName::RainHourly, "Past 60 mins", 50.0, 52.0),
        rain_bar(ReadingName::RainDaily, "Today", 50.0, 52.0),
        rain_bar(ReadingName::RainWeekly, "Week", 100.0, 104.0),
        rain_bar(ReadingName::RainMonthly, "Month", 100.0, 104.0),
    ]
}

#[derive(Debug)]
struct Animation {
    from: f64,
    to: f64,
    started: Option<Instant>,
    assignments: u64,
}

/// Display sink that moves linearly to each new target
#[derive(Debug)]
pub struct AnimatedGauge {
    config: InstrumentConfig,
    animation: Mutex<Animation>,
}

impl AnimatedGauge {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            config,
            animation: Mutex::new(Animation {
                from: 0.0,
                to: 0.0,
                started: None,
                assignments: 0,
            }),
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Value the gauge is moving toward
    pub fn target(&self) -> f64 {
        self.lock().to
    }

    /// Number of targets assigned so far
    pub fn assignments(&self) -> u64 {
        self.lock().assignments
    }

    /// Rendered value at `now`
    pub fn value_at(&self, now: Instant) -> f64 {
        let animation = self.lock();
        interpolate(&animation, self.config.animation, now)
    }

    pub fn current_value(&self) -> f64 {
        self.value_at(Instant::now())
    }

    fn assign_at(&self, value: f64, now: Instant) {
        let mut animation = self.lock();
        let from = interpolate(&animation, self.config.animation, now);
        animation.from = from;
        animation.to = value;
        animation.started = Some(now);
        animation.assignments += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Animation> {
        // A poisoned animation still holds a usable value
        self.animation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Instrument for AnimatedGauge {
    fn set_value(&self, value: f64) {
        tracing::debug!("{} -> {}", self.config.title, value);
        self.assign_at(value, Instant::now());
    }
}

fn interpolate(animation: &Animation, duration: Duration, now: Instant) -> f64 {
    let Some(started) = animation.started else {
        return animation.to;
    };
    if duration.is_zero() {
        return animation.to;
    }
    let elapsed = now.saturating_duration_since(started);
    if elapsed >= duration {
        return animation.to;
    }
    let progress = elapsed.as_secs_f64() / duration.as_secs_f64();
    animation.from + (animation.to - animation.from) * progress
}
