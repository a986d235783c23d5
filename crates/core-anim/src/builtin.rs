//! Built-in animations.
//!
//! Phase lives inside each animation; period, speed and length are read
//! from the step context every iteration so live parameter updates take
//! effect within at most one yield cycle.

use crate::{Animation, StepContext, StepOutput, StepYield};
use core_color::{hsv_to_rgb, hue_to_rgb};
use core_model::AnimationId;
use std::f32::consts::TAU;
use std::time::Duration;

pub const BREATHE: &str = "BREATHE";
pub const COLOR_FADE: &str = "COLOR_FADE";
pub const SNAKE: &str = "SNAKE";
pub const COLOR_SNAKE: &str = "COLOR_SNAKE";

/// Instantiate a built-in by id.
pub fn build_animation(id: &AnimationId) -> Option<Box<dyn Animation>> {
    match id.as_str() {
        BREATHE => Some(Box::new(Breathe::new())),
        COLOR_FADE => Some(Box::new(ColorFade::new())),
        SNAKE => Some(Box::new(Snake::new())),
        COLOR_SNAKE => Some(Box::new(ColorSnake::new())),
        _ => None,
    }
}

/// SPEED 100 → fastest period, SPEED 1 → slowest.
fn speed_to_period(speed: f64, fastest: Duration, slowest: Duration) -> Duration {
    let speed = speed.clamp(1.0, 100.0);
    let t = (100.0 - speed) / 99.0;
    let span = slowest.as_secs_f64() - fastest.as_secs_f64();
    Duration::from_secs_f64(fastest.as_secs_f64() + t * span)
}

/// Sinusoidal brightness swell between 15 % and 100 % of each zone's
/// configured color. Period 0.8 s (SPEED 100) to 8 s (SPEED 1).
pub struct Breathe {
    phase: f32,
}

/// Steps per breathing cycle.
const BREATHE_STEPS: u32 = 50;

impl Breathe {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }
}

impl Default for Breathe {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for Breathe {
    fn id(&self) -> AnimationId {
        AnimationId::from(BREATHE)
    }

    fn step(&mut self, ctx: &StepContext) -> StepOutput {
        let period = speed_to_period(
            ctx.param_f64("SPEED", 50.0),
            Duration::from_millis(800),
            Duration::from_secs(8),
        );
        // 0.15..1.0, minimum at phase 0
        let factor = 0.15 + 0.85 * (0.5 - 0.5 * (TAU * self.phase).cos());
        let yields = ctx
            .zones
            .iter()
            .map(|zone| StepYield::Zone(zone.id.clone(), zone.base_rgb.scale_f32(factor)))
            .collect();
        self.phase = (self.phase + 1.0 / BREATHE_STEPS as f32).fract();
        StepOutput {
            yields,
            delay: period / BREATHE_STEPS,
        }
    }
}

/// Shared hue wheel stepped per frame, all zones synchronized.
pub struct ColorFade {
    hue: f32,
}

const COLOR_FADE_FRAME: Duration = Duration::from_millis(25);

impl ColorFade {
    pub fn new() -> Self {
        Self { hue: 0.0 }
    }
}

impl Default for ColorFade {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for ColorFade {
    fn id(&self) -> AnimationId {
        AnimationId::from(COLOR_FADE)
    }

    fn step(&mut self, ctx: &StepContext) -> StepOutput {
        let speed = ctx.param_f64("SPEED", 50.0).clamp(1.0, 100.0);
        let color = hue_to_rgb(self.hue.rem_euclid(360.0) as u16);
        let yields = ctx
            .zones
            .iter()
            .map(|zone| StepYield::Zone(zone.id.clone(), color.scale(zone.brightness)))
            .collect();
        self.hue = (self.hue + (speed / 20.0) as f32).rem_euclid(360.0);
        StepOutput {
            yields,
            delay: COLOR_FADE_FRAME,
        }
    }
}

/// A single lit pixel traversing the zones in declared order.
pub struct Snake {
    position: usize,
}

impl Snake {
    pub fn new() -> Self {
        Self { position: 0 }
    }
}

impl Default for Snake {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for Snake {
    fn id(&self) -> AnimationId {
        AnimationId::from(SNAKE)
    }

    fn step(&mut self, ctx: &StepContext) -> StepOutput {
        let total = ctx.total_pixels();
        let hue = ctx.param_f64("HUE", 120.0).rem_euclid(360.0) as u16;
        let delay = speed_to_period(
            ctx.param_f64("SPEED", 50.0),
            Duration::from_millis(15),
            Duration::from_millis(250),
        );
        let mut yields = Vec::with_capacity(1);
        if total > 0 {
            self.position %= total;
            if let Some((zone, index)) = ctx.locate(self.position) {
                yields.push(StepYield::Pixel {
                    zone: zone.id.clone(),
                    index,
                    color: hue_to_rgb(hue).scale(zone.brightness),
                });
            }
            self.position = (self.position + 1) % total;
        }
        StepOutput { yields, delay }
    }
}

/// A rainbow tail of LENGTH pixels with a fixed hue offset per segment
/// and a slow global hue drift.
pub struct ColorSnake {
    head: usize,
    drift: f32,
}

/// Hue offset between adjacent tail segments, degrees.
const SEGMENT_HUE_OFFSET: f32 = 25.0;
/// Global drift per step, degrees.
const DRIFT_PER_STEP: f32 = 0.5;

impl ColorSnake {
    pub fn new() -> Self {
        Self {
            head: 0,
            drift: 0.0,
        }
    }
}

impl Default for ColorSnake {
    fn default() -> Self {
        Self::new()
    }
}

impl Animation for ColorSnake {
    fn id(&self) -> AnimationId {
        AnimationId::from(COLOR_SNAKE)
    }

    fn step(&mut self, ctx: &StepContext) -> StepOutput {
        let total = ctx.total_pixels();
        let length = ctx.param_f64("LENGTH", 7.0).clamp(3.0, 15.0) as usize;
        let delay = speed_to_period(
            ctx.param_f64("SPEED", 50.0),
            Duration::from_millis(15),
            Duration::from_millis(250),
        );
        let mut yields = Vec::with_capacity(length);
        if total > 0 {
            self.head %= total;
            for segment in 0..length.min(total) {
                let position = (self.head + total - segment) % total;
                if let Some((zone, index)) = ctx.locate(position) {
                    let hue = self.drift + segment as f32 * SEGMENT_HUE_OFFSET;
                    yields.push(StepYield::Pixel {
                        zone: zone.id.clone(),
                        index,
                        color: hsv_to_rgb(hue, 1.0, 1.0).scale(zone.brightness),
                    });
                }
            }
            self.head = (self.head + 1) % total;
            self.drift = (self.drift + DRIFT_PER_STEP).rem_euclid(360.0);
        }
        StepOutput { yields, delay }
    }
}
