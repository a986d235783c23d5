//! Serializable projections of zone state.
//!
//! These DTOs are the one shape shared by the event bus
//! (`ZoneSnapshotUpdated`), the HTTP API and the WebSocket push, so
//! observers never reach into live state.

use crate::{AnimationId, ParamId, ParamValue, RenderMode, ZoneId};
use core_color::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable animation assignment on a zone: which animation and the
/// current parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    pub id: AnimationId,
    #[serde(default)]
    pub parameters: BTreeMap<ParamId, ParamValue>,
}

impl AnimationState {
    pub fn new(id: AnimationId) -> Self {
        Self {
            id,
            parameters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub id: ZoneId,
    pub display_name: String,
    pub pixel_count: usize,
    pub color: Color,
    pub brightness: u8,
    pub is_on: bool,
    pub mode: RenderMode,
    pub animation: Option<AnimationState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut params = BTreeMap::new();
        params.insert(ParamId::from("SPEED"), ParamValue::Int(50));
        let snap = ZoneSnapshot {
            id: ZoneId::from("FLOOR"),
            display_name: "Floor".to_string(),
            pixel_count: 42,
            color: Color::hue(180),
            brightness: 80,
            is_on: true,
            mode: RenderMode::Animation,
            animation: Some(AnimationState {
                id: AnimationId::from("BREATHE"),
                parameters: params,
            }),
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: ZoneSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn mode_serializes_as_stable_string() {
        let json = serde_json::to_value(RenderMode::Animation).unwrap();
        assert_eq!(json, serde_json::json!("ANIMATION"));
    }
}
