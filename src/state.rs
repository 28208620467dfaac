//! State Record
//!
//! The single mutable snapshot of every user-settable parameter. The record
//! is only ever mutated through the command dispatcher, which works on a
//! copy and commits all-or-nothing, so a failed command can never leave a
//! partially updated record behind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output polarity of both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Direct,
    Inverted,
}

impl Polarity {
    /// Multiplier sign applied to both channel gains.
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Direct => 1.0,
            Polarity::Inverted => -1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Polarity::Direct => Polarity::Inverted,
            Polarity::Inverted => Polarity::Direct,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Direct => write!(f, "+"),
            Polarity::Inverted => write!(f, "-"),
        }
    }
}

/// Snapshot of all user-settable parameters.
///
/// `PartialEq` is load-bearing: rollback tests and the dispatcher's
/// change detection compare whole records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Master volume in dB relative to the speaker reference level.
    pub level: f64,
    /// Channel balance in dB, positive favors the right channel.
    pub balance: f64,
    /// Bass tone control in dB.
    pub bass: f64,
    /// Treble tone control in dB.
    pub treble: f64,
    /// Loudness compensation reference shift in dB.
    pub loudness_ref: f64,
    pub mute: bool,
    /// Equal-loudness compensation enabled.
    pub loudness: bool,
    /// Mono downmix enabled.
    pub mono: bool,
    pub polarity: Polarity,
    /// Selected input, a catalog id.
    pub input: String,
    /// Selected crossover set, a catalog id.
    pub xo_set: String,
    /// Selected room-correction set; `None` bypasses the correction stage.
    pub drc_set: Option<String>,
    /// Selected parametric-EQ set; `None` bypasses the stage.
    pub peq_set: Option<String>,
}

impl Default for StateRecord {
    fn default() -> Self {
        Self {
            level: -20.0,
            balance: 0.0,
            bass: 0.0,
            treble: 0.0,
            loudness_ref: 0.0,
            mute: false,
            loudness: false,
            mono: false,
            polarity: Polarity::Direct,
            input: String::new(),
            xo_set: String::new(),
            drc_set: None,
            peq_set: None,
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

impl StateRecord {
    /// Render the human-readable snapshot for the `show` command.
    ///
    /// Gain figures are computed by the caller from the current state so the
    /// report reflects exactly what is committed downstream.
    pub fn render_show(
        &self,
        ref_level_gain: f64,
        input_gain: f64,
        gain: f64,
        headroom: f64,
    ) -> String {
        let mut out = String::new();
        let muted = if self.mute { "(muted)" } else { "" };
        out.push_str(&format!("Level          {:6.1} {}\n", self.level, muted));
        out.push_str(&format!("Balance        {:6.1}\n", self.balance));
        out.push_str(&format!("Polarity       {:>6}\n", self.polarity.to_string()));
        out.push_str(&format!("Mono           {:>6}\n", on_off(self.mono)));
        out.push('\n');
        out.push_str(&format!("Bass           {:6.1}\n", self.bass));
        out.push_str(&format!("Treble         {:6.1}\n", self.treble));
        out.push_str(&format!(
            "Loudness       {:>6} (ref {:+.1})\n",
            on_off(self.loudness),
            self.loudness_ref
        ));
        out.push('\n');
        out.push_str(&format!("Input          {:>6}\n", display_id(Some(&self.input))));
        out.push_str(&format!("Input gain     {:6.1}\n", input_gain));
        out.push_str(&format!(
            "Crossover set  {:>6}\n",
            display_id(Some(&self.xo_set))
        ));
        out.push_str(&format!(
            "DRC set        {:>6}\n",
            display_id(self.drc_set.as_deref())
        ));
        out.push_str(&format!(
            "PEQ set        {:>6}\n",
            display_id(self.peq_set.as_deref())
        ));
        out.push('\n');
        out.push_str(&format!("Ref level gain {:6.1}\n", ref_level_gain));
        out.push_str(&format!("Gain           {:6.1}\n", gain));
        out.push_str(&format!("Headroom       {:6.1}\n", headroom));
        out
    }
}

fn display_id(id: Option<&str>) -> &str {
    match id {
        None => "off",
        Some("") => "-",
        Some(name) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_sign_and_flip() {
        assert_eq!(Polarity::Direct.sign(), 1.0);
        assert_eq!(Polarity::Inverted.sign(), -1.0);
        assert_eq!(Polarity::Direct.flipped(), Polarity::Inverted);
        assert_eq!(Polarity::Inverted.flipped(), Polarity::Direct);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut state = StateRecord::default();
        state.input = "analog".to_string();
        state.drc_set = Some("sofa".to_string());
        state.polarity = Polarity::Inverted;

        let json = serde_json::to_string(&state).unwrap();
        let restored: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_show_reports_bypassed_stages() {
        let state = StateRecord::default();
        let report = state.render_show(0.0, 0.0, -20.0, 3.5);
        assert!(report.contains("DRC set"));
        assert!(report.contains("off"));
        assert!(report.contains("Headroom"));
    }
}
