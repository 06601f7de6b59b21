// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host configuration surface.
//!
//! Grounded on the weewx driver's `.conf` stanza (`kl.py`'s `Configure`/
//! `loader` option parsing) and, for the serde/TOML plumbing itself, on
//! `hdds-discovery-server`'s `ServerConfig` (`#[serde(default = "...")]`
//! per field, a matching `Default` impl, `from_file`/`validate`).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::model::config::CHARSTR;

/// RF front-end band. Selects the PLL base frequency the USB layer programs
/// at startup (EU = 868.3 MHz, US = 905.0 MHz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransceiverFrequency {
    Eu,
    Us,
}

impl Default for TransceiverFrequency {
    fn default() -> Self {
        TransceiverFrequency::Eu
    }
}

/// How frame dumps are logged when a debug knob is turned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    Auto,
    Short,
    Long,
}

impl Default for DumpFormat {
    fn default() -> Self {
        DumpFormat::Auto
    }
}

/// Per-category debug verbosity, consulted before an expensive
/// `log::debug!` frame dump is assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Verbosity {
    #[serde(default)]
    pub debug_comm: u8,
    #[serde(default)]
    pub debug_config_data: u8,
    #[serde(default)]
    pub debug_weather_data: u8,
    #[serde(default)]
    pub debug_history_data: u8,
}

fn default_comm_interval() -> u8 {
    8
}

fn default_polling_interval() -> u64 {
    10
}

fn default_timing_ms() -> u32 {
    300
}

fn default_limit_rec_read_to() -> u32 {
    3001
}

/// Host-side driver configuration; deserializable from the same TOML shape
/// as weewx's own driver stanza.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub transceiver_frequency: TransceiverFrequency,

    /// Free-text station model name; informational only.
    #[serde(default)]
    pub model: String,

    /// Decimal-string USB serial to disambiguate multiple transceivers.
    #[serde(default)]
    pub serial: Option<String>,

    /// Seconds of staleness tolerated on the current-weather frame before a
    /// fresh one is accepted as "new".
    #[serde(default = "default_comm_interval")]
    pub comm_interval: u8,

    /// Seconds between facade snapshot pulls by the consumer; purely
    /// advisory, not enforced by the engine itself.
    #[serde(default = "default_polling_interval")]
    pub polling_interval: u64,

    /// Milliseconds in `[100, 400]`; sets the RF worker's `first_sleep`.
    #[serde(default = "default_timing_ms")]
    pub timing: u32,

    /// Upper bound on records requested in one history catch-up, in
    /// `[0, 51200]`.
    #[serde(default = "default_limit_rec_read_to")]
    pub limit_rec_read_to: u32,

    #[serde(flatten)]
    pub verbosity: Verbosity,

    #[serde(default)]
    pub debug_dump_format: DumpFormat,

    #[serde(default)]
    pub sensor_text1: Option<String>,
    #[serde(default)]
    pub sensor_text2: Option<String>,
    #[serde(default)]
    pub sensor_text3: Option<String>,
    #[serde(default)]
    pub sensor_text4: Option<String>,
    #[serde(default)]
    pub sensor_text5: Option<String>,
    #[serde(default)]
    pub sensor_text6: Option<String>,
    #[serde(default)]
    pub sensor_text7: Option<String>,
    #[serde(default)]
    pub sensor_text8: Option<String>,

    /// Protocol sensor name (e.g. `"Temp2"`) to external column name.
    #[serde(default)]
    pub sensor_map: HashMap<String, String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            transceiver_frequency: TransceiverFrequency::default(),
            model: String::new(),
            serial: None,
            comm_interval: default_comm_interval(),
            polling_interval: default_polling_interval(),
            timing: default_timing_ms(),
            limit_rec_read_to: default_limit_rec_read_to(),
            verbosity: Verbosity::default(),
            debug_dump_format: DumpFormat::default(),
            sensor_text1: None,
            sensor_text2: None,
            sensor_text3: None,
            sensor_text4: None,
            sensor_text5: None,
            sensor_text6: None,
            sensor_text7: None,
            sensor_text8: None,
            sensor_map: HashMap::new(),
        }
    }
}

/// A `DriverConfig` field failed validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidValue(String),
}

impl DriverConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=400).contains(&self.timing) {
            return Err(ConfigError::InvalidValue(format!(
                "timing must be in [100, 400], got {}",
                self.timing
            )));
        }
        if self.limit_rec_read_to > 51_200 {
            return Err(ConfigError::InvalidValue(format!(
                "limit_rec_read_to must be in [0, 51200], got {}",
                self.limit_rec_read_to
            )));
        }
        for knob in [
            self.verbosity.debug_comm,
            self.verbosity.debug_config_data,
            self.verbosity.debug_weather_data,
            self.verbosity.debug_history_data,
        ] {
            if knob > 3 {
                return Err(ConfigError::InvalidValue(format!(
                    "debug verbosity must be 0..=3, got {knob}"
                )));
            }
        }
        for (_, text) in self.sensor_texts() {
            validate_sensor_text(text)?;
        }
        Ok(())
    }

    /// The eight `sensor_textN` slots paired with their 1-based slot index
    /// (`1` for `sensor_text1`, ..., `8` for `sensor_text8`), skipping unset
    /// ones. The slot index is what [`crate::model::config::OutgoingConfig::
    /// set_sensor_text`] expects, so it must survive unset gaps rather than
    /// being renumbered.
    pub fn sensor_texts(&self) -> impl Iterator<Item = (usize, &str)> {
        [
            &self.sensor_text1,
            &self.sensor_text2,
            &self.sensor_text3,
            &self.sensor_text4,
            &self.sensor_text5,
            &self.sensor_text6,
            &self.sensor_text7,
            &self.sensor_text8,
        ]
        .into_iter()
        .enumerate()
        .filter_map(|(i, s)| s.as_deref().map(|text| (i + 1, text)))
    }

    /// `first_sleep` duration for the RF worker's per-cycle pause.
    pub fn first_sleep(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timing as u64)
    }
}

fn validate_sensor_text(text: &str) -> Result<(), ConfigError> {
    let len = text.chars().count();
    if !(1..=10).contains(&len) {
        return Err(ConfigError::InvalidValue(format!(
            "sensor text {text:?} must be 1-10 characters"
        )));
    }
    if let Some(bad) = text.chars().find(|c| !CHARSTR.contains(*c)) {
        return Err(ConfigError::InvalidValue(format!(
            "sensor text {text:?} contains unsupported character {bad:?}"
        )));
    }
    Ok(())
}
