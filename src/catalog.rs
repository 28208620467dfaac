//! Input and filter-set catalogs
//!
//! Externally defined routing and coefficient tables for one loudspeaker:
//! which sources exist, which crossover/room-correction/parametric-EQ sets
//! can be selected, and which DSP filters each set feeds. The controller
//! checks command arguments against these catalogs, it never invents ids.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClaroError, Result};

/// One selectable source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Capture ports of the source, left then right.
    pub source_ports: Vec<String>,
    /// Per-input trim gain in dB, added on top of the speaker reference.
    #[serde(default)]
    pub gain: f64,
    /// Crossover set to reapply when this input is selected.
    #[serde(default)]
    pub xo: Option<String>,
}

/// A family of DSP filters plus the named coefficient sets they accept.
///
/// Every set must list exactly one coefficient per filter, in filter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterBank {
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub sets: BTreeMap<String, Vec<String>>,
}

impl FilterBank {
    /// Pair the filters of this bank with the coefficients of a named set.
    pub fn pairs(&self, set: &str) -> Option<Vec<(&str, &str)>> {
        let coeffs = self.sets.get(set)?;
        Some(
            self.filters
                .iter()
                .map(String::as_str)
                .zip(coeffs.iter().map(String::as_str))
                .collect(),
        )
    }

    fn validate(&self, family: &str) -> Result<()> {
        for (name, coeffs) in &self.sets {
            if coeffs.len() != self.filters.len() {
                return Err(ClaroError::InvalidCatalog {
                    reason: format!(
                        "{family} set '{name}' lists {} coefficients for {} filters",
                        coeffs.len(),
                        self.filters.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Catalog of everything selectable for the configured loudspeaker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Speaker calibration gain in dB, added to the user level.
    #[serde(default)]
    pub ref_level_gain: f64,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSpec>,
    #[serde(default)]
    pub xo: FilterBank,
    #[serde(default)]
    pub drc: FilterBank,
    #[serde(default)]
    pub peq: FilterBank,
}

impl Catalog {
    /// Load and validate a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check set/filter arity for every bank.
    pub fn validate(&self) -> Result<()> {
        self.xo.validate("xo")?;
        self.drc.validate("drc")?;
        self.peq.validate("peq")?;
        for (name, input) in &self.inputs {
            if let Some(xo) = &input.xo {
                if !self.xo.sets.contains_key(xo) {
                    return Err(ClaroError::InvalidCatalog {
                        reason: format!("input '{name}' references unknown xo set '{xo}'"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Trim gain of an input, 0 dB when the input is not in the catalog.
    pub fn input_gain(&self, input: &str) -> f64 {
        self.inputs.get(input).map(|spec| spec.gain).unwrap_or(0.0)
    }

    /// Names usable in warning messages.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }

    pub fn xo_names(&self) -> Vec<&str> {
        self.xo.sets.keys().map(String::as_str).collect()
    }

    pub fn drc_names(&self) -> Vec<&str> {
        self.drc.sets.keys().map(String::as_str).collect()
    }

    pub fn peq_names(&self) -> Vec<&str> {
        self.peq.sets.keys().map(String::as_str).collect()
    }
}
