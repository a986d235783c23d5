//! `state.json` on-disk schema and IO.
//!
//! The file is human-editable UTF-8. Unknown fields are ignored on load
//! and missing fields fall back to factory defaults, so hand edits and
//! schema evolution never brick the installation. Writes go through a
//! temp file + rename so a crash mid-save leaves the previous state
//! intact.

use crate::{ApplicationState, ZoneState};
use core_color::Color;
use core_model::{AnimationState, RenderMode, ZoneId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to write state file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-zone persisted shape. Every field optional: absent fields default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedZone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RenderMode>,
    #[serde(default)]
    pub animation: Option<AnimationState>,
}

impl PersistedZone {
    pub fn from_state(state: &ZoneState) -> Self {
        Self {
            color: Some(state.color.clone()),
            brightness: Some(state.brightness),
            is_on: Some(state.power),
            mode: Some(state.mode),
            animation: state.animation.clone(),
        }
    }

    /// Materialize, filling gaps from factory defaults.
    pub fn into_state(self) -> ZoneState {
        let defaults = ZoneState::factory_default();
        ZoneState {
            color: self.color.unwrap_or(defaults.color),
            brightness: self.brightness.unwrap_or(defaults.brightness).min(100),
            power: self.is_on.unwrap_or(defaults.power),
            mode: self.mode.unwrap_or(defaults.mode),
            animation: self.animation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub zones: BTreeMap<ZoneId, PersistedZone>,
    #[serde(default)]
    pub application: ApplicationState,
}

/// Load persisted state. Read or parse failure falls back to factory
/// defaults: state is a convenience, not a dependency.
pub fn load_state(path: &Path) -> PersistedState {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "state.store", path = %path.display(), "state_file_absent");
            return PersistedState::default();
        }
        Err(e) => {
            warn!(target: "state.store", path = %path.display(), error = %e, "state_read_failed");
            return PersistedState::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(state) => state,
        Err(e) => {
            warn!(target: "state.store", path = %path.display(), error = %e, "state_parse_failed");
            PersistedState::default()
        }
    }
}

/// Write state atomically (temp file in the same directory, then rename).
pub fn save_state(path: &Path, state: &PersistedState) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    debug!(target: "state.store", path = %path.display(), bytes = json.len(), "state_saved");
    Ok(())
}
