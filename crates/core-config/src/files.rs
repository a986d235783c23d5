//! On-disk shapes of the YAML configuration files.
//!
//! Every struct denies unknown keys: a typo in a config file is a fatal
//! startup error, not a silently ignored setting. Enum values parse
//! through the single serde serializer shared with the rest of the
//! system.

use core_model::{ColorOrder, ParamDef, ZoneId};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const HARDWARE_FILE: &str = "hardware.yaml";
pub const ZONES_FILE: &str = "zones.yaml";
pub const MAPPING_FILE: &str = "zone_mapping.yaml";
pub const COLORS_FILE: &str = "colors.yaml";
pub const ANIMATIONS_FILE: &str = "animations.yaml";
pub const PARAMETERS_FILE: &str = "parameters.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChainKind {
    #[serde(rename = "ws2811")]
    Ws2811,
    #[serde(rename = "ws2812b")]
    Ws2812b,
    #[serde(rename = "sk6812")]
    Sk6812,
}

fn default_dma() -> u8 {
    10
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub id: String,
    pub gpio: u8,
    #[serde(rename = "type")]
    pub kind: ChainKind,
    pub color_order: ColorOrder,
    pub count: usize,
    pub voltage: f32,
    pub frequency_hz: u32,
    pub enabled: bool,
    #[serde(default = "default_dma")]
    pub dma: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderConfig {
    pub id: String,
    pub clk: u8,
    pub dt: u8,
    #[serde(default)]
    pub sw: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonConfig {
    pub id: String,
    pub gpio: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareFile {
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub encoders: Vec<EncoderConfig>,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneEntry {
    pub id: ZoneId,
    pub display_name: String,
    pub pixel_count: usize,
    pub enabled: bool,
    pub reversed: bool,
    pub order: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZonesFile {
    pub zones: Vec<ZoneEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingFile {
    /// hardware chain id → zones on that chain, in physical order.
    pub mapping: BTreeMap<String, Vec<ZoneId>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorsFile {
    pub presets: BTreeMap<String, [u8; 3]>,
    pub preset_order: Vec<String>,
    #[serde(default)]
    pub white_presets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationEntry {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationsFile {
    pub animations: Vec<AnimationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersFile {
    pub parameters: Vec<ParamDef>,
}
