//! Shared domain vocabulary: identifiers, render priorities, the frame
//! model consumed by the scheduler, the zone→pixel mapper, animation
//! parameter definitions, and the serializable snapshot DTOs exchanged
//! over the event bus and the API.
//!
//! Everything here is a plain value type. Construction is cheap; frames
//! are moved into queues and consumed at most once.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod frame;
pub mod mapper;
pub mod param;
pub mod snapshot;

pub use frame::{Frame, FrameError, FrameMeta, FramePayload, FrameSource, PreviewFrame,
    DEFAULT_FRAME_TTL, PREVIEW_PIXELS};
pub use mapper::{MapperError, ZoneMapper};
pub use param::{ParamDef, ParamError, ParamKind, ParamValue};
pub use snapshot::{AnimationState, ZoneSnapshot};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Stable zone identifier from `zones.yaml` (e.g. `FLOOR`, `LAMP`).
    ZoneId
);
string_id!(
    /// Stable animation identifier from `animations.yaml` (e.g. `BREATHE`).
    AnimationId
);
string_id!(
    /// Stable animation parameter identifier from `parameters.yaml`
    /// (e.g. `SPEED`).
    ParamId
);

/// Render priority ladder. Higher wins; within a level the newest
/// non-expired frame is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Idle,
    Manual,
    Animation,
    Pulse,
    Transition,
    Debug,
}

impl Priority {
    /// Ascending order; iterate `.rev()` for selection.
    pub const ALL: [Priority; 6] = [
        Priority::Idle,
        Priority::Manual,
        Priority::Animation,
        Priority::Pulse,
        Priority::Transition,
        Priority::Debug,
    ];

    pub const fn value(self) -> u8 {
        match self {
            Priority::Idle => 0,
            Priority::Manual => 10,
            Priority::Animation => 20,
            Priority::Pulse => 30,
            Priority::Transition => 40,
            Priority::Debug => 50,
        }
    }
}

/// Per-zone render mode. The string forms are the single serializer used
/// by `state.json`, the API and the config files; parsing an unknown
/// string is a validation error at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    #[serde(rename = "STATIC")]
    Static,
    #[serde(rename = "ANIMATION")]
    Animation,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown render mode `{0}` (expected STATIC or ANIMATION)")]
pub struct RenderModeParseError(pub String);

impl RenderMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RenderMode::Static => "STATIC",
            RenderMode::Animation => "ANIMATION",
        }
    }
}

impl std::str::FromStr for RenderMode {
    type Err = RenderModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATIC" => Ok(RenderMode::Static),
            "ANIMATION" => Ok(RenderMode::Animation),
            other => Err(RenderModeParseError(other.to_string())),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order expected by a physical chain. Canonical RGB is remapped
/// inside the chain driver; nothing above the driver sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorOrder {
    #[serde(rename = "RGB")]
    Rgb,
    #[serde(rename = "RBG")]
    Rbg,
    #[serde(rename = "GRB")]
    Grb,
    #[serde(rename = "GBR")]
    Gbr,
    #[serde(rename = "BRG")]
    Brg,
    #[serde(rename = "BGR")]
    Bgr,
}

impl ColorOrder {
    pub fn permute(self, rgb: core_color::Rgb) -> [u8; 3] {
        let (r, g, b) = (rgb.r(), rgb.g(), rgb.b());
        match self {
            ColorOrder::Rgb => [r, g, b],
            ColorOrder::Rbg => [r, b, g],
            ColorOrder::Grb => [g, r, b],
            ColorOrder::Gbr => [g, b, r],
            ColorOrder::Brg => [b, r, g],
            ColorOrder::Bgr => [b, g, r],
        }
    }
}

/// Immutable zone configuration, fixed at startup from `zones.yaml` +
/// `zone_mapping.yaml`. `start_index` is derived, never configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub display_name: String,
    pub pixel_count: usize,
    pub enabled: bool,
    pub reversed: bool,
    /// Position in the declared zone order (selection cycling, snake
    /// traversal).
    pub order: usize,
    /// GPIO pin of the chain this zone lives on.
    pub gpio: u8,
    /// First absolute pixel index within the chain.
    pub start_index: usize,
}

/// Immutable animation metadata from `animations.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub id: AnimationId,
    pub display_name: String,
    pub description: String,
    /// Parameter ids this animation accepts, in edit order.
    pub parameters: Vec<ParamId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn priority_ladder_is_strictly_ordered() {
        let values: Vec<u8> = Priority::ALL.iter().map(|p| p.value()).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50]);
        assert!(Priority::Transition > Priority::Animation);
        assert!(Priority::Debug > Priority::Transition);
    }

    #[test]
    fn render_mode_serializer_is_bijective() {
        for mode in [RenderMode::Static, RenderMode::Animation] {
            assert_eq!(RenderMode::from_str(mode.as_str()), Ok(mode));
        }
        let err = RenderMode::from_str("static").unwrap_err();
        assert_eq!(err, RenderModeParseError("static".to_string()));
    }

    #[test]
    fn color_order_permutations() {
        let rgb = core_color::Rgb(1, 2, 3);
        assert_eq!(ColorOrder::Rgb.permute(rgb), [1, 2, 3]);
        assert_eq!(ColorOrder::Grb.permute(rgb), [2, 1, 3]);
        assert_eq!(ColorOrder::Bgr.permute(rgb), [3, 2, 1]);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ZoneId::from("FLOOR");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"FLOOR\"");
    }
}
