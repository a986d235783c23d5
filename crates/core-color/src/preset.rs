//! Named color presets loaded from `colors.yaml`.

use crate::Rgb;
use std::collections::{BTreeMap, BTreeSet};

/// Immutable preset table: name → RGB, a display/cycling order, and the
/// subset considered "white" (used by the lamp quick mode).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetTable {
    presets: BTreeMap<String, Rgb>,
    order: Vec<String>,
    white: BTreeSet<String>,
}

impl PresetTable {
    pub fn from_parts(
        presets: BTreeMap<String, Rgb>,
        order: Vec<String>,
        white: BTreeSet<String>,
    ) -> Self {
        Self {
            presets,
            order,
            white,
        }
    }

    pub fn get(&self, name: &str) -> Option<Rgb> {
        self.presets.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    pub fn is_white(&self, name: &str) -> bool {
        self.white.contains(name)
    }

    /// Cycling order for encoder navigation. Presets missing from
    /// `preset_order` are unreachable by encoder but stay addressable by
    /// name.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Step `detents` positions through the cycling order from `current`,
    /// wrapping at both ends. Unknown or missing `current` starts at the
    /// first entry.
    pub fn step_from(&self, current: Option<&str>, detents: i32) -> Option<&str> {
        if self.order.is_empty() {
            return None;
        }
        let len = self.order.len() as i32;
        let base = current
            .and_then(|name| self.order.iter().position(|p| p == name))
            .map(|i| i as i32)
            .unwrap_or(0);
        let idx = (base + detents).rem_euclid(len) as usize;
        self.order.get(idx).map(String::as_str)
    }

    /// First white preset in cycling order, used as the lamp quick-mode
    /// target.
    pub fn default_white(&self) -> Option<&str> {
        self.order
            .iter()
            .find(|name| self.white.contains(*name))
            .map(String::as_str)
            .or_else(|| self.white.iter().next().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PresetTable {
        PresetTable::from_parts(
            [
                ("red".to_string(), Rgb(255, 0, 0)),
                ("green".to_string(), Rgb(0, 255, 0)),
                ("warm_white".to_string(), Rgb(255, 200, 150)),
            ]
            .into_iter()
            .collect(),
            vec![
                "red".to_string(),
                "green".to_string(),
                "warm_white".to_string(),
            ],
            ["warm_white".to_string()].into_iter().collect(),
        )
    }

    #[test]
    fn step_wraps_in_both_directions() {
        let t = table();
        assert_eq!(t.step_from(Some("red"), 1), Some("green"));
        assert_eq!(t.step_from(Some("warm_white"), 1), Some("red"));
        assert_eq!(t.step_from(Some("red"), -1), Some("warm_white"));
        assert_eq!(t.step_from(Some("red"), 3), Some("red"));
    }

    #[test]
    fn step_from_unknown_starts_at_first() {
        let t = table();
        assert_eq!(t.step_from(None, 0), Some("red"));
        assert_eq!(t.step_from(Some("nope"), 1), Some("green"));
    }

    #[test]
    fn default_white_follows_cycling_order() {
        let t = table();
        assert_eq!(t.default_white(), Some("warm_white"));
    }
}
