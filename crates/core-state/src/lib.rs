//! Zone and application state: the mutable half of the domain.
//!
//! `ZoneConfig` (immutable, from configuration) and `ZoneState` (mutable)
//! are aggregated into `ZoneCombined`; `ZoneService` is the only mutation
//! path and publishes a snapshot after every change. Persistence goes
//! through `StateRepository`, which debounces writes to `state.json`.

use core_model::{AnimationState, RenderMode, ZoneConfig};
use core_color::Color;
use serde::{Deserialize, Serialize};

mod persist;
mod repository;
mod service;

pub use persist::{load_state, save_state, PersistedState, PersistedZone, PersistenceError};
pub use repository::{SaveKey, StateProvider, StateRepository, SAVE_DEBOUNCE};
pub use service::{Registry, StateError, ZoneService};

/// What the modulator encoder edits on the selected zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditTarget {
    #[serde(rename = "COLOR_HUE")]
    ColorHue,
    #[serde(rename = "COLOR_PRESET")]
    ColorPreset,
    #[serde(rename = "BRIGHTNESS")]
    Brightness,
}

impl EditTarget {
    pub const fn next(self) -> EditTarget {
        match self {
            EditTarget::ColorHue => EditTarget::ColorPreset,
            EditTarget::ColorPreset => EditTarget::Brightness,
            EditTarget::Brightness => EditTarget::ColorHue,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            EditTarget::ColorHue => "COLOR_HUE",
            EditTarget::ColorPreset => "COLOR_PRESET",
            EditTarget::Brightness => "BRIGHTNESS",
        }
    }
}

/// Application-level UI state (edit focus, frame stepping, persistence
/// policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationState {
    pub edit_mode: bool,
    pub selected_zone_index: usize,
    pub selected_edit_target: EditTarget,
    pub selected_animation_param: Option<core_model::ParamId>,
    pub frame_by_frame: bool,
    pub save_on_change: bool,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            edit_mode: false,
            selected_zone_index: 0,
            selected_edit_target: EditTarget::ColorHue,
            selected_animation_param: None,
            frame_by_frame: false,
            save_on_change: true,
        }
    }
}

/// Mutable per-zone state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneState {
    pub color: Color,
    pub brightness: u8,
    pub power: bool,
    pub mode: RenderMode,
    pub animation: Option<AnimationState>,
}

impl ZoneState {
    /// Factory defaults used when `state.json` is missing or partial.
    pub fn factory_default() -> Self {
        Self {
            color: Color::hue(30),
            brightness: 80,
            power: true,
            mode: RenderMode::Static,
            animation: None,
        }
    }
}

/// Immutable config plus mutable state for one zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCombined {
    pub config: ZoneConfig,
    pub state: ZoneState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_target_cycles_through_all_three() {
        let mut target = EditTarget::ColorHue;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(target);
            target = target.next();
        }
        assert_eq!(target, EditTarget::ColorHue);
        assert_eq!(
            seen,
            vec![
                EditTarget::ColorHue,
                EditTarget::ColorPreset,
                EditTarget::Brightness
            ]
        );
    }

    #[test]
    fn factory_default_is_on_and_static() {
        let state = ZoneState::factory_default();
        assert!(state.power);
        assert_eq!(state.mode, RenderMode::Static);
        assert!(state.animation.is_none());
    }
}
