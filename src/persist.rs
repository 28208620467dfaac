//! State persistence
//!
//! Saves the state record after every successful mutation so a restart
//! resumes where the listener left off. The on-disk format is a small JSON
//! envelope around the record; writes go through a temp file and rename so
//! a crash mid-write can never leave a truncated state file behind.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ClaroError, Result};
use crate::state::StateRecord;

/// On-disk envelope around the state record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub saved_at: DateTime<Utc>,
    pub version: String,
    pub state: StateRecord,
}

/// Persist the state record atomically.
pub fn save(path: &Path, state: &StateRecord) -> Result<()> {
    let envelope = StateFile {
        saved_at: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: state.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    debug!("state saved to {}", path.display());
    Ok(())
}

/// Restore the state record; a missing file yields the defaults.
pub fn load(path: &Path) -> Result<StateRecord> {
    if !path.exists() {
        debug!("no state file at {}, starting from defaults", path.display());
        return Ok(StateRecord::default());
    }
    let text = fs::read_to_string(path).map_err(|error| ClaroError::StateFile {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    let envelope: StateFile =
        serde_json::from_str(&text).map_err(|error| ClaroError::StateFile {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
    Ok(envelope.state)
}
