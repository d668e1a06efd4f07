//! Display sink registry: reading name to instrument binding

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GaugeError;
use crate::instrument::{AnimatedGauge, Instrument, InstrumentConfig};
use crate::reading::{ReadingName, ReadingSet};

/// Channel a reading set arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Snapshot,
    Live,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateSource::Snapshot => write!(f, "snapshot"),
            UpdateSource::Live => write!(f, "live"),
        }
    }
}

struct Binding {
    config: InstrumentConfig,
    instrument: Arc<dyn Instrument>,
    written_live: AtomicBool,
}

/// Static binding of every reading to its instrument.
///
/// This is the only path from a decoded reading set to the display, so both
/// channels get identical sanitizing and routing.
pub struct SinkRegistry {
    bindings: BTreeMap<ReadingName, Binding>,
    snapshot_yields_to_live: bool,
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("readings", &self.bindings.keys().collect::<Vec<_>>())
            .field("snapshot_yields_to_live", &self.snapshot_yields_to_live)
            .finish()
    }
}

impl SinkRegistry {
    /// Bind instruments. Binding the same reading twice is a configuration error.
    pub fn new(
        bindings: impl IntoIterator<Item = (InstrumentConfig, Arc<dyn Instrument>)>,
    ) -> crate::Result<Self> {
        let mut map = BTreeMap::new();
        for (config, instrument) in bindings {
            let reading = config.reading;
            let binding = Binding {
                config,
                instrument,
                written_live: AtomicBool::new(false),
            };
            if map.insert(reading, binding).is_some() {
                return Err(GaugeError::Config(format!(
                    "More than one instrument bound to {}",
                    reading
                )));
            }
        }
        Ok(Self {
            bindings: map,
            snapshot_yields_to_live: false,
        })
    }

    /// Build animated gauges for the given configurations and bind them.
    ///
    /// The gauges are returned as well so a renderer can read them.
    pub fn animated(
        configs: Vec<InstrumentConfig>,
    ) -> crate::Result<(Self, Vec<Arc<AnimatedGauge>>)> {
        let gauges: Vec<Arc<AnimatedGauge>> = configs
            .into_iter()
            .map(|config| Arc::new(AnimatedGauge::new(config)))
            .collect();
        let registry = Self::new(gauges.iter().map(|gauge| {
            (
                gauge.config().clone(),
                Arc::clone(gauge) as Arc<dyn Instrument>,
            )
        }))?;
        Ok((registry, gauges))
    }

    /// Keep live values when a snapshot response arrives after them
    pub fn with_snapshot_yielding_to_live(mut self, enabled: bool) -> Self {
        self.snapshot_yields_to_live = enabled;
        self
    }

    pub fn config(&self, reading: ReadingName) -> Option<&InstrumentConfig> {
        self.bindings.get(&reading).map(|b| &b.config)
    }

    pub fn readings(&self) -> impl Iterator<Item = ReadingName> + '_ {
        self.bindings.keys().copied()
    }

    /// Route every present reading through its sanitizer to its instrument.
    ///
    /// Returns the number of instruments written.
    pub fn apply(&self, set: &ReadingSet, source: UpdateSource) -> usize {
        let mut written = 0;
        for (reading, raw) in set.present() {
            let Some(binding) = self.bindings.get(&reading) else {
                tracing::debug!("No instrument bound to {}, ignoring {}", reading, raw);
                continue;
            };

            match source {
                UpdateSource::Live => binding.written_live.store(true, Ordering::SeqCst),
                UpdateSource::Snapshot => {
                    if self.snapshot_yields_to_live && binding.written_live.load(Ordering::SeqCst)
                    {
                        tracing::debug!(
                            "Snapshot value {} for {} superseded by live update",
                            raw,
                            reading
                        );
                        continue;
                    }
                }
            }

            let value = match binding.config.clamp {
                Some(range) => range.apply(raw),
                None => raw,
            };
            if value.to_bits() != raw.to_bits() {
                tracing::debug!("Clamped {} from {} to {}", reading, raw, value);
            }

            binding.instrument.set_value(value);
            written += 1;
        }
        tracing::debug!("Applied {} of {} readings from {}", written, set.len(), source);
        written
    }
}
