//! Runtime configuration
//!
//! Numeric bounds and engine endpoints for the controller. Loaded from a
//! JSON file; every field has a default so a missing file or a partial file
//! still yields a working configuration.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ClaroError, Result};

/// Controller configuration.
///
/// Gain bounds are absolute dB limits for the composed gain; the spans are
/// symmetric clamp intervals for the user-facing tone/balance/loudness
/// settings. SPL figures parameterize the loudness curve family: the
/// reference listening level and the levels of maximum and minimum
/// compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute gain floor in dB.
    pub gain_min: f64,
    /// Absolute gain ceiling in dB (0 dBFS).
    pub gain_max: f64,
    /// Balance clamp interval, +- dB.
    pub balance_span: f64,
    /// Bass/treble clamp interval, +- dB.
    pub tone_span: f64,
    /// Loudness reference clamp interval, +- dB.
    pub loudness_ref_span: f64,
    /// Listening SPL the loudness curves are flat at.
    pub loudness_spl_ref: f64,
    /// SPL of the zero-compensation end of the loudness table.
    pub loudness_spl_max: f64,
    /// SPL of the maximum-compensation end of the loudness table.
    pub loudness_spl_min: f64,
    /// Reapply the input's associated crossover set on input switch.
    pub use_input_xo: bool,
    /// DSP engine command interface address.
    pub dsp_address: String,
    /// DSP engine command interface port.
    pub dsp_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gain_min: -100.0,
            gain_max: 0.0,
            balance_span: 6.0,
            tone_span: 6.0,
            loudness_ref_span: 12.0,
            loudness_spl_ref: 83.0,
            loudness_spl_max: 90.0,
            loudness_spl_min: 70.0,
            use_input_xo: true,
            dsp_address: "127.0.0.1".to_string(),
            dsp_port: 3000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the built-in defaults; a present but invalid
    /// file is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency of the numeric bounds.
    pub fn validate(&self) -> Result<()> {
        if self.gain_min >= self.gain_max {
            return Err(ClaroError::InvalidConfig {
                reason: format!(
                    "gain_min ({}) must be below gain_max ({})",
                    self.gain_min, self.gain_max
                ),
            });
        }
        for (name, span) in [
            ("balance_span", self.balance_span),
            ("tone_span", self.tone_span),
            ("loudness_ref_span", self.loudness_ref_span),
        ] {
            if span <= 0.0 {
                return Err(ClaroError::InvalidConfig {
                    reason: format!("{name} must be positive, got {span}"),
                });
            }
        }
        if !(self.loudness_spl_min < self.loudness_spl_ref
            && self.loudness_spl_ref <= self.loudness_spl_max)
        {
            return Err(ClaroError::InvalidConfig {
                reason: format!(
                    "loudness SPL levels must satisfy min < ref <= max, got {}/{}/{}",
                    self.loudness_spl_min, self.loudness_spl_ref, self.loudness_spl_max
                ),
            });
        }
        Ok(())
    }

    /// Number of columns a tone curve table must carry (1 dB steps over the
    /// +-tone_span interval).
    pub fn tone_steps(&self) -> usize {
        (2.0 * self.tone_span).round() as usize + 1
    }

    /// Number of columns the loudness curve table must carry (1 dB steps
    /// from zero compensation at SPL max down to SPL min).
    pub fn loudness_steps(&self) -> usize {
        (self.loudness_spl_max - self.loudness_spl_min).round() as usize + 1
    }
}
