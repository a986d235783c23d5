//! Animation runtime: lazy per-step frame producers driven by an engine
//! task per running animation.
//!
//! An animation is a state machine whose `step` returns a batch of
//! yields plus the delay until the next step. The engine re-reads the
//! live parameter set every iteration before stepping, which is how
//! SPEED and friends take effect mid-run without a restart — animations
//! must never cache values derived from parameters across iterations.

use core_color::Rgb;
use core_model::{AnimationId, ParamDef, ParamId, ParamValue, ZoneId};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

pub mod builtin;
mod engine;

pub use builtin::{build_animation, Breathe, ColorFade, ColorSnake, Snake};
pub use engine::{AnimationEngine, EngineError};

/// Live-mutable parameter values shared between the engine task and the
/// controllers/API. Values are validated before they get here.
#[derive(Debug, Default)]
pub struct ParamSet {
    values: Mutex<BTreeMap<ParamId, ParamValue>>,
}

impl ParamSet {
    pub fn new(initial: BTreeMap<ParamId, ParamValue>) -> Self {
        Self {
            values: Mutex::new(initial),
        }
    }

    /// Seed from definitions: defaults overlaid with stored values.
    pub fn seeded(defs: &[&ParamDef], stored: &BTreeMap<ParamId, ParamValue>) -> Self {
        let mut values = BTreeMap::new();
        for def in defs {
            let value = stored.get(&def.id).copied().unwrap_or(def.default);
            values.insert(def.id.clone(), value);
        }
        Self::new(values)
    }

    pub fn set(&self, id: ParamId, value: ParamValue) {
        self.values.lock().expect("param set poisoned").insert(id, value);
    }

    pub fn get(&self, id: &ParamId) -> Option<ParamValue> {
        self.values.lock().expect("param set poisoned").get(id).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<ParamId, ParamValue> {
        self.values.lock().expect("param set poisoned").clone()
    }
}

/// One renderable instruction out of an animation step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepYield {
    /// Uniform color for every zone in scope.
    Strip(Rgb),
    /// Uniform color for one zone.
    Zone(ZoneId, Rgb),
    /// One logical pixel within a zone.
    Pixel {
        zone: ZoneId,
        index: usize,
        color: Rgb,
    },
}

/// A zone as the animation sees it: identity, span length, and the
/// producer-side color/brightness inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimZone {
    pub id: ZoneId,
    pub pixel_count: usize,
    /// Effective RGB of the zone's configured color at its brightness
    /// (black when powered off).
    pub base_rgb: Rgb,
    pub brightness: u8,
}

/// Inputs for one step, rebuilt by the engine every iteration so zone
/// colors and parameters are always live.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub zones: Vec<AnimZone>,
    pub params: BTreeMap<ParamId, ParamValue>,
}

impl StepContext {
    pub fn param_f64(&self, id: &str, default: f64) -> f64 {
        self.params
            .get(&ParamId::from(id))
            .map(|v| v.as_f64())
            .unwrap_or(default)
    }

    /// Total logical pixels across the zones in scope.
    pub fn total_pixels(&self) -> usize {
        self.zones.iter().map(|z| z.pixel_count).sum()
    }

    /// Resolve a flat pixel position to `(zone, logical index)` along
    /// the declared zone order.
    pub fn locate(&self, position: usize) -> Option<(&AnimZone, usize)> {
        let mut offset = 0;
        for zone in &self.zones {
            if position < offset + zone.pixel_count {
                return Some((zone, position - offset));
            }
            offset += zone.pixel_count;
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub yields: Vec<StepYield>,
    pub delay: Duration,
}

/// A running animation's behavior. Implementations keep phase state
/// internally and derive everything else from the context each step.
pub trait Animation: Send {
    fn id(&self) -> AnimationId;

    fn step(&mut self, ctx: &StepContext) -> StepOutput;
}
