use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Largest accepted `ahead_amount`, in seconds.
pub const MAX_AHEAD_SECS: f64 = 3600.0;

/// Note-message layout sent to the resonator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteSettings {
    /// MIDI channel, 0-15
    pub channel: u8,
    pub velocity: u8,
    /// Time units the natural note-off is pulled forward by
    pub safety_margin: f64,
    pub address: String,
    pub quality_prefix: String,
    pub all_notes_off_address: String,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            channel: 15,
            velocity: 127,
            safety_margin: 0.02,
            address: "/mrp/midi".into(),
            quality_prefix: "/mrp/quality/".into(),
            all_notes_off_address: "/mrp/allnotesoff".into(),
        }
    }
}

impl NoteSettings {
    pub fn note_on_status(&self) -> i32 {
        0x90 | (self.channel & 0x0F) as i32
    }

    pub fn note_off_status(&self) -> i32 {
        0x80 | (self.channel & 0x0F) as i32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    pub ip: String,
    pub port: u16,
    pub name: String,
    /// Seconds added to "now" when stamping outgoing bundles
    pub ahead_amount: f64,
    /// Seconds per duration unit
    pub time_unit: f64,
    pub notes: NoteSettings,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".into(),
            port: 7770,
            name: "MRPHandler".into(),
            ahead_amount: 0.0,
            time_unit: 1.0,
            notes: NoteSettings::default(),
        }
    }
}

impl HandlerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ron_string = fs::read_to_string(path)?;
        let config: HandlerConfig = ron::from_str(&ron_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_AHEAD_SECS).contains(&self.ahead_amount) {
            return Err(ConfigError::Invalid(format!(
                "ahead_amount must be 0-{MAX_AHEAD_SECS} seconds, got {}",
                self.ahead_amount
            )));
        }
        if !self.time_unit.is_finite() || self.time_unit <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_unit must be positive, got {}",
                self.time_unit
            )));
        }
        if self.notes.channel > 15 {
            return Err(ConfigError::Invalid(format!(
                "channel must be 0-15, got {}",
                self.notes.channel
            )));
        }
        if self.notes.velocity > 127 {
            return Err(ConfigError::Invalid(format!(
                "velocity must be 0-127, got {}",
                self.notes.velocity
            )));
        }
        if !self.notes.safety_margin.is_finite() || self.notes.safety_margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "safety_margin must be non-negative, got {}",
                self.notes.safety_margin
            )));
        }
        Ok(())
    }

    /// `ahead_amount` as a duration, clamped to `0..=MAX_AHEAD_SECS`. NaN
    /// reads as zero.
    pub fn look_ahead(&self) -> Duration {
        Duration::try_from_secs_f64(self.ahead_amount.clamp(0.0, MAX_AHEAD_SECS))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_resonator() {
        let config = HandlerConfig::default();
        assert_eq!(config.port, 7770);
        assert_eq!(config.look_ahead(), Duration::ZERO);
        assert_eq!(config.notes.note_on_status(), 0x9F);
        assert_eq!(config.notes.note_off_status(), 0x8F);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config: HandlerConfig =
            ron::from_str("(port: 9000, ahead_amount: 0.1, notes: (channel: 2))").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.ip, "127.0.0.1");
        assert_eq!(config.look_ahead(), Duration::from_millis(100));
        assert_eq!(config.notes.channel, 2);
        assert_eq!(config.notes.velocity, 127);
        assert_eq!(config.notes.note_on_status(), 0x92);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            HandlerConfig {
                ahead_amount: -0.5,
                ..Default::default()
            },
            HandlerConfig {
                ahead_amount: 1e19,
                ..Default::default()
            },
            HandlerConfig {
                ahead_amount: f64::NAN,
                ..Default::default()
            },
            HandlerConfig {
                time_unit: 0.0,
                ..Default::default()
            },
            HandlerConfig {
                notes: NoteSettings {
                    channel: 16,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn look_ahead_never_exceeds_the_bound() {
        for ahead_amount in [1e19, f64::INFINITY] {
            let config = HandlerConfig {
                ahead_amount,
                ..Default::default()
            };
            assert_eq!(config.look_ahead(), Duration::from_secs(3600));
        }
        let config = HandlerConfig {
            ahead_amount: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.look_ahead(), Duration::ZERO);
    }

    #[test]
    fn load_reads_saved_file() {
        let path = std::env::temp_dir().join(format!("mrp-osc-config-{}.ron", std::process::id()));
        let config = HandlerConfig {
            name: "Resonator".into(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = HandlerConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
