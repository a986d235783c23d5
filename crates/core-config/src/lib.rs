//! Declarative configuration, loaded once at startup.
//!
//! Six YAML files describe the installation: chains and input hardware,
//! zones, the chain→zone mapping, color presets, animation metadata, and
//! reusable parameter definitions. Loading is strict — unknown keys,
//! unknown references and out-of-range numerics are all fatal, because a
//! misconfigured installation must refuse to start rather than drive the
//! wrong pins.
//!
//! `start_index` is never configured: it is derived here by summing the
//! pixel counts of prior zones within a chain, which makes the
//! contiguous-partition invariant hold by construction (the mapper still
//! re-checks it).

use core_color::{PresetTable, Rgb};
use core_model::{AnimationConfig, AnimationId, ParamDef, ParamId, ZoneConfig, ZoneId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

mod files;

pub use files::{
    ButtonConfig, ChainConfig, ChainKind, EncoderConfig, ANIMATIONS_FILE, COLORS_FILE,
    HARDWARE_FILE, MAPPING_FILE, PARAMETERS_FILE, ZONES_FILE,
};
use files::{
    AnimationsFile, ColorsFile, HardwareFile, MappingFile, ParametersFile, ZonesFile,
};

/// Highest BCM pin number usable on the 40-pin header.
const MAX_BCM_PIN: u8 = 27;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "LUMA_CONFIG_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {file}: {message}")]
    Parse { file: &'static str, message: String },
    #[error("invalid {file}: {message}")]
    Validation { file: &'static str, message: String },
}

/// Fully validated configuration. Immutable for the process lifetime.
#[derive(Debug)]
pub struct Config {
    pub chains: Vec<ChainConfig>,
    pub encoders: Vec<EncoderConfig>,
    pub buttons: Vec<ButtonConfig>,
    /// Enabled zones grouped by chain id, in physical order with derived
    /// `start_index`.
    pub zones_by_chain: BTreeMap<String, Vec<ZoneConfig>>,
    pub presets: PresetTable,
    pub animations: Vec<AnimationConfig>,
    pub parameters: BTreeMap<ParamId, ParamDef>,
}

impl Config {
    /// All enabled zones across chains, sorted by declared `order`
    /// (selection cycling, snake traversal).
    pub fn zones_in_order(&self) -> Vec<ZoneConfig> {
        let mut zones: Vec<ZoneConfig> = self
            .zones_by_chain
            .values()
            .flat_map(|v| v.iter().cloned())
            .collect();
        zones.sort_by_key(|z| z.order);
        zones
    }

    pub fn chain(&self, id: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn animation(&self, id: &AnimationId) -> Option<&AnimationConfig> {
        self.animations.iter().find(|a| &a.id == id)
    }
}

/// Resolve the configuration directory: explicit override, then the
/// `LUMA_CONFIG_DIR` environment variable, then `./config`, then the
/// platform config dir.
pub fn discover(override_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir;
    }
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let local = PathBuf::from("config");
    if local.is_dir() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("luma");
    }
    local
}

fn read_file<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &'static str,
) -> Result<T, ConfigError> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
        file,
        message: e.to_string(),
    })
}

/// Load and validate all configuration files from `dir`. Any error is
/// fatal at startup.
pub fn load(dir: &Path) -> Result<Config, ConfigError> {
    let hardware: HardwareFile = read_file(dir, HARDWARE_FILE)?;
    let zones: ZonesFile = read_file(dir, ZONES_FILE)?;
    let mapping: MappingFile = read_file(dir, MAPPING_FILE)?;
    let colors: ColorsFile = read_file(dir, COLORS_FILE)?;
    let animations: AnimationsFile = read_file(dir, ANIMATIONS_FILE)?;
    let parameters: ParametersFile = read_file(dir, PARAMETERS_FILE)?;

    validate_hardware(&hardware)?;
    let presets = build_presets(colors)?;
    let parameters = build_parameters(parameters)?;
    let animations = build_animations(animations, &parameters)?;
    let zones_by_chain = assign_zones(&hardware, zones, mapping)?;

    let zone_total: usize = zones_by_chain.values().flatten().map(|z| z.pixel_count).sum();
    info!(
        target: "config",
        chains = hardware.chains.iter().filter(|c| c.enabled).count(),
        zones = zones_by_chain.values().map(Vec::len).sum::<usize>(),
        pixels = zone_total,
        animations = animations.len(),
        "config_loaded"
    );

    Ok(Config {
        chains: hardware.chains,
        encoders: hardware.encoders,
        buttons: hardware.buttons,
        zones_by_chain,
        presets,
        animations,
        parameters,
    })
}

fn validate_hardware(hardware: &HardwareFile) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::Validation {
        file: HARDWARE_FILE,
        message,
    };
    let mut pins = BTreeSet::new();
    let mut claim = |pin: u8, what: &str| -> Result<(), ConfigError> {
        if pin > MAX_BCM_PIN {
            return Err(invalid(format!("{what}: BCM pin {pin} out of range")));
        }
        if !pins.insert(pin) {
            return Err(invalid(format!("{what}: BCM pin {pin} claimed twice")));
        }
        Ok(())
    };

    let mut chain_ids = BTreeSet::new();
    for chain in &hardware.chains {
        if !chain_ids.insert(chain.id.clone()) {
            return Err(invalid(format!("duplicate chain id `{}`", chain.id)));
        }
        if chain.count == 0 {
            return Err(invalid(format!("chain `{}` has zero pixels", chain.id)));
        }
        if chain.frequency_hz == 0 {
            return Err(invalid(format!("chain `{}` has zero frequency", chain.id)));
        }
        if chain.enabled {
            claim(chain.gpio, &format!("chain `{}`", chain.id))?;
        }
    }
    for enc in &hardware.encoders {
        claim(enc.clk, &format!("encoder `{}` clk", enc.id))?;
        claim(enc.dt, &format!("encoder `{}` dt", enc.id))?;
        if let Some(sw) = enc.sw {
            claim(sw, &format!("encoder `{}` sw", enc.id))?;
        }
    }
    for btn in &hardware.buttons {
        claim(btn.gpio, &format!("button `{}`", btn.id))?;
    }
    Ok(())
}

fn build_presets(colors: ColorsFile) -> Result<PresetTable, ConfigError> {
    let invalid = |message: String| ConfigError::Validation {
        file: COLORS_FILE,
        message,
    };
    for name in &colors.preset_order {
        if !colors.presets.contains_key(name) {
            return Err(invalid(format!("preset_order references unknown `{name}`")));
        }
    }
    for name in &colors.white_presets {
        if !colors.presets.contains_key(name) {
            return Err(invalid(format!("white_presets references unknown `{name}`")));
        }
    }
    let presets: BTreeMap<String, Rgb> = colors
        .presets
        .into_iter()
        .map(|(name, rgb)| (name, Rgb::from(rgb)))
        .collect();
    Ok(PresetTable::from_parts(
        presets,
        colors.preset_order,
        colors.white_presets.into_iter().collect(),
    ))
}

fn build_parameters(
    file: ParametersFile,
) -> Result<BTreeMap<ParamId, ParamDef>, ConfigError> {
    let invalid = |message: String| ConfigError::Validation {
        file: PARAMETERS_FILE,
        message,
    };
    let mut defs = BTreeMap::new();
    for def in file.parameters {
        if def.min > def.max {
            return Err(invalid(format!(
                "parameter {}: min {} > max {}",
                def.id, def.min, def.max
            )));
        }
        if def.step <= 0.0 {
            return Err(invalid(format!(
                "parameter {}: step must be positive",
                def.id
            )));
        }
        if def.validate(def.default).is_err() {
            return Err(invalid(format!(
                "parameter {}: default {} outside [{}, {}]",
                def.id,
                def.default.as_f64(),
                def.min,
                def.max
            )));
        }
        let id = def.id.clone();
        if defs.insert(id.clone(), def).is_some() {
            return Err(invalid(format!("duplicate parameter id {id}")));
        }
    }
    Ok(defs)
}

fn build_animations(
    file: AnimationsFile,
    parameters: &BTreeMap<ParamId, ParamDef>,
) -> Result<Vec<AnimationConfig>, ConfigError> {
    let invalid = |message: String| ConfigError::Validation {
        file: ANIMATIONS_FILE,
        message,
    };
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(file.animations.len());
    for entry in file.animations {
        if !seen.insert(entry.id.clone()) {
            return Err(invalid(format!("duplicate animation id `{}`", entry.id)));
        }
        let params: Vec<ParamId> = entry
            .parameters
            .iter()
            .map(|p| ParamId::from(p.as_str()))
            .collect();
        for p in &params {
            if !parameters.contains_key(p) {
                return Err(invalid(format!(
                    "animation `{}` references unknown parameter {p}",
                    entry.id
                )));
            }
        }
        out.push(AnimationConfig {
            id: AnimationId::from(entry.id),
            display_name: entry.display_name,
            description: entry.description,
            parameters: params,
        });
    }
    Ok(out)
}

/// Join zones with the chain mapping: derive `start_index` by summing
/// prior zones within each chain, carry the chain's GPIO, and require
/// every enabled zone to appear exactly once.
fn assign_zones(
    hardware: &HardwareFile,
    zones: ZonesFile,
    mapping: MappingFile,
) -> Result<BTreeMap<String, Vec<ZoneConfig>>, ConfigError> {
    let invalid = |message: String| ConfigError::Validation {
        file: MAPPING_FILE,
        message,
    };

    let mut by_id: BTreeMap<ZoneId, files::ZoneEntry> = BTreeMap::new();
    for entry in zones.zones {
        let id = entry.id.clone();
        if entry.pixel_count == 0 {
            return Err(ConfigError::Validation {
                file: ZONES_FILE,
                message: format!("zone {id} has zero pixels"),
            });
        }
        if by_id.insert(id.clone(), entry).is_some() {
            return Err(ConfigError::Validation {
                file: ZONES_FILE,
                message: format!("duplicate zone id {id}"),
            });
        }
    }

    let mut assigned: BTreeSet<ZoneId> = BTreeSet::new();
    let mut out: BTreeMap<String, Vec<ZoneConfig>> = BTreeMap::new();
    for (chain_id, zone_ids) in mapping.mapping {
        let chain = hardware
            .chains
            .iter()
            .find(|c| c.id == chain_id)
            .ok_or_else(|| invalid(format!("unknown chain `{chain_id}`")))?;
        let mut cursor = 0usize;
        let mut configs = Vec::with_capacity(zone_ids.len());
        for zone_id in zone_ids {
            let entry = by_id
                .get(&zone_id)
                .ok_or_else(|| invalid(format!("unknown zone {zone_id}")))?;
            if !assigned.insert(zone_id.clone()) {
                return Err(invalid(format!("zone {zone_id} mapped twice")));
            }
            if !entry.enabled {
                continue;
            }
            configs.push(ZoneConfig {
                id: entry.id.clone(),
                display_name: entry.display_name.clone(),
                pixel_count: entry.pixel_count,
                enabled: true,
                reversed: entry.reversed,
                order: entry.order,
                gpio: chain.gpio,
                start_index: cursor,
            });
            cursor += entry.pixel_count;
        }
        if chain.enabled && cursor != chain.count {
            return Err(invalid(format!(
                "chain `{chain_id}` has {} pixels but its zones cover {cursor}",
                chain.count
            )));
        }
        out.insert(chain_id, configs);
    }

    for (id, entry) in &by_id {
        if entry.enabled && !assigned.contains(id) {
            return Err(invalid(format!("enabled zone {id} is not mapped")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join(HARDWARE_FILE),
            r#"
chains:
  - id: main
    gpio: 18
    type: ws2811
    color_order: GRB
    count: 72
    voltage: 5.0
    frequency_hz: 800000
    enabled: true
  - id: lamp
    gpio: 13
    type: ws2811
    color_order: GRB
    count: 18
    voltage: 5.0
    frequency_hz: 800000
    enabled: true
encoders:
  - id: selector
    clk: 17
    dt: 27
    sw: 22
buttons:
  - id: power
    gpio: 23
"#,
        )
        .unwrap();
        fs::write(
            dir.join(ZONES_FILE),
            r#"
zones:
  - id: FLOOR
    display_name: Floor
    pixel_count: 42
    enabled: true
    reversed: false
    order: 0
  - id: DESK
    display_name: Desk
    pixel_count: 30
    enabled: true
    reversed: true
    order: 1
  - id: LAMP
    display_name: Lamp
    pixel_count: 18
    enabled: true
    reversed: false
    order: 2
"#,
        )
        .unwrap();
        fs::write(
            dir.join(MAPPING_FILE),
            r#"
mapping:
  main: [FLOOR, DESK]
  lamp: [LAMP]
"#,
        )
        .unwrap();
        fs::write(
            dir.join(COLORS_FILE),
            r#"
presets:
  red: [255, 0, 0]
  warm_white: [255, 200, 150]
preset_order: [red, warm_white]
white_presets: [warm_white]
"#,
        )
        .unwrap();
        fs::write(
            dir.join(ANIMATIONS_FILE),
            r#"
animations:
  - id: BREATHE
    display_name: Breathe
    description: Sinusoidal brightness swell
    parameters: [SPEED]
"#,
        )
        .unwrap();
        fs::write(
            dir.join(PARAMETERS_FILE),
            r#"
parameters:
  - id: SPEED
    type: PERCENT
    min: 1
    max: 100
    step: 5
    wraps: false
    default: 50
"#,
        )
        .unwrap();
    }

    #[test]
    fn loads_and_derives_start_indices() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let config = load(dir.path()).unwrap();

        let main = &config.zones_by_chain["main"];
        assert_eq!(main.len(), 2);
        assert_eq!(main[0].id, ZoneId::from("FLOOR"));
        assert_eq!(main[0].start_index, 0);
        assert_eq!(main[1].id, ZoneId::from("DESK"));
        assert_eq!(main[1].start_index, 42);
        assert!(main[1].reversed);
        assert_eq!(main[1].gpio, 18);

        let lamp = &config.zones_by_chain["lamp"];
        assert_eq!(lamp[0].start_index, 0);
        assert_eq!(lamp[0].gpio, 13);

        assert_eq!(config.presets.get("warm_white"), Some(Rgb(255, 200, 150)));
        assert_eq!(config.animations[0].id, AnimationId::from("BREATHE"));
        assert!(config.parameters.contains_key(&ParamId::from("SPEED")));
    }

    #[test]
    fn unknown_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join(ZONES_FILE),
            "zones:\n  - id: FLOOR\n    display_name: Floor\n    pixel_count: 42\n    enabled: true\n    reversed: false\n    order: 0\n    pixelcount: 9\n",
        )
        .unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { file, .. } if file == ZONES_FILE));
    }

    #[test]
    fn pixel_sum_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(dir.path().join(MAPPING_FILE), "mapping:\n  main: [FLOOR]\n  lamp: [LAMP]\n")
            .unwrap();
        let err = load(dir.path()).unwrap_err();
        match err {
            ConfigError::Validation { file, message } => {
                assert_eq!(file, MAPPING_FILE);
                assert!(message.contains("cover 42") || message.contains("not mapped"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn double_mapping_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join(MAPPING_FILE),
            "mapping:\n  main: [FLOOR, DESK]\n  lamp: [FLOOR]\n",
        )
        .unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn duplicate_gpio_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join(HARDWARE_FILE),
            r#"
chains:
  - id: main
    gpio: 18
    type: ws2811
    color_order: GRB
    count: 72
    voltage: 5.0
    frequency_hz: 800000
    enabled: true
buttons:
  - id: power
    gpio: 18
"#,
        )
        .unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { file, .. } if file == HARDWARE_FILE));
    }

    #[test]
    fn unknown_animation_parameter_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::write(
            dir.path().join(ANIMATIONS_FILE),
            "animations:\n  - id: BREATHE\n    display_name: Breathe\n    parameters: [WOBBLE]\n",
        )
        .unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { file, .. } if file == ANIMATIONS_FILE));
    }

    #[test]
    fn zones_in_order_follows_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let config = load(dir.path()).unwrap();
        let zones = config.zones_in_order();
        let ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["FLOOR", "DESK", "LAMP"]);
    }

    #[test]
    fn discover_prefers_explicit_override() {
        let dir = discover(Some(PathBuf::from("/tmp/custom")));
        assert_eq!(dir, PathBuf::from("/tmp/custom"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
