//! User-facing color representation.
//!
//! The serde shape is the tagged dict used by `state.json` and the HTTP
//! API: `{"mode":"HUE","hue":180}`, `{"mode":"PRESET","preset_name":"warm_white"}`,
//! `{"mode":"RGB","rgb":[r,g,b]}`, plus HSV and KELVIN. Unknown `mode`
//! strings fail deserialization; callers surface that as a validation
//! error.

use crate::{hsv_to_rgb, hue_to_rgb, kelvin_to_rgb, PresetTable, Rgb};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum Color {
    /// Position on the fully saturated hue wheel, degrees. Stored wrapped
    /// to `[0, 360)`.
    #[serde(rename = "HUE")]
    Hue { hue: u16 },
    /// Named preset resolved through the color table at render time.
    #[serde(rename = "PRESET")]
    Preset { preset_name: String },
    #[serde(rename = "RGB")]
    Rgb { rgb: Rgb },
    #[serde(rename = "HSV")]
    Hsv { hue: f32, saturation: f32, value: f32 },
    #[serde(rename = "KELVIN")]
    Kelvin { kelvin: u16 },
}

impl Color {
    /// Hue constructor, wrapping into `[0, 360)`.
    pub fn hue(degrees: i32) -> Color {
        Color::Hue {
            hue: degrees.rem_euclid(360) as u16,
        }
    }

    pub fn preset(name: impl Into<String>) -> Color {
        Color::Preset {
            preset_name: name.into(),
        }
    }

    pub fn rgb(rgb: Rgb) -> Color {
        Color::Rgb { rgb }
    }

    /// Lower to canonical RGB. Total: an unknown preset renders black;
    /// preset-name validation happens at the mutation boundary so that
    /// fallback is unreachable through the services.
    pub fn to_rgb(&self, presets: &PresetTable) -> Rgb {
        match self {
            Color::Hue { hue } => hue_to_rgb(*hue),
            Color::Preset { preset_name } => presets.get(preset_name).unwrap_or(Rgb::BLACK),
            Color::Rgb { rgb } => *rgb,
            Color::Hsv {
                hue,
                saturation,
                value,
            } => hsv_to_rgb(*hue, *saturation, *value),
            Color::Kelvin { kelvin } => kelvin_to_rgb(*kelvin),
        }
    }

    /// A new color scaled linearly by `brightness / 100`. The result is
    /// always an RGB variant since scaling is not closed over the other
    /// representations.
    pub fn with_brightness(&self, brightness: u8, presets: &PresetTable) -> Color {
        Color::Rgb {
            rgb: self.to_rgb(presets).scale(brightness),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PresetTable {
        PresetTable::from_parts(
            [
                ("warm_white".to_string(), Rgb(255, 200, 150)),
                ("red".to_string(), Rgb(255, 0, 0)),
            ]
            .into_iter()
            .collect(),
            vec!["red".to_string(), "warm_white".to_string()],
            ["warm_white".to_string()].into_iter().collect(),
        )
    }

    #[test]
    fn hue_constructor_wraps() {
        assert_eq!(Color::hue(360), Color::Hue { hue: 0 });
        assert_eq!(Color::hue(-30), Color::Hue { hue: 330 });
        assert_eq!(Color::hue(725), Color::Hue { hue: 5 });
    }

    #[test]
    fn to_rgb_is_total_for_every_variant() {
        let t = table();
        assert_eq!(Color::hue(180).to_rgb(&t), Rgb(0, 255, 255));
        assert_eq!(Color::preset("warm_white").to_rgb(&t), Rgb(255, 200, 150));
        assert_eq!(Color::preset("missing").to_rgb(&t), Rgb::BLACK);
        assert_eq!(Color::rgb(Rgb(1, 2, 3)).to_rgb(&t), Rgb(1, 2, 3));
        assert_eq!(
            (Color::Kelvin { kelvin: 6600 }).to_rgb(&t),
            kelvin_to_rgb(6600)
        );
    }

    #[test]
    fn to_rgb_is_deterministic() {
        let t = table();
        let c = Color::Hsv {
            hue: 42.0,
            saturation: 0.7,
            value: 0.9,
        };
        assert_eq!(c.to_rgb(&t), c.to_rgb(&t));
    }

    #[test]
    fn with_brightness_scales_linearly() {
        let t = table();
        let dimmed = Color::preset("warm_white").with_brightness(80, &t);
        assert_eq!(dimmed, Color::rgb(Rgb(255, 200, 150).scale(80)));
    }

    #[test]
    fn serde_round_trip_preserves_mode_and_payload() {
        let cases = vec![
            Color::hue(210),
            Color::preset("warm_white"),
            Color::rgb(Rgb(10, 20, 30)),
            Color::Kelvin { kelvin: 2700 },
        ];
        for color in cases {
            let json = serde_json::to_value(&color).unwrap();
            let back: Color = serde_json::from_value(json).unwrap();
            assert_eq!(back, color);
        }
    }

    #[test]
    fn serde_shape_matches_state_schema() {
        let json = serde_json::to_value(Color::hue(180)).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "HUE", "hue": 180}));
        let json = serde_json::to_value(Color::preset("warm_white")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mode": "PRESET", "preset_name": "warm_white"})
        );
        let json = serde_json::to_value(Color::rgb(Rgb(1, 2, 3))).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "RGB", "rgb": [1, 2, 3]}));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let parsed: Result<Color, _> =
            serde_json::from_value(serde_json::json!({"mode": "CMYK", "c": 1}));
        assert!(parsed.is_err());
    }
}
