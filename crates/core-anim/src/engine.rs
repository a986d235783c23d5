//! The animation engine: owns the running animation task and its
//! lifecycle.
//!
//! One animation runs at a time over a zone scope. Start captures the
//! current composite, computes the animation's first frame, hands both
//! to the transition service, then spawns the producer task. Stop is
//! cooperative: clear the running flag, nudge the sleeper, join with a
//! short grace period, abort as last resort. A panicking animation is
//! logged and stopped; the last rendered frame holds.

use crate::{Animation, AnimZone, ParamSet, StepContext, StepOutput, StepYield};
use core_color::Rgb;
use core_events::{Event, EventBus};
use core_model::{AnimationId, Frame, FrameSource, ParamId, ParamValue, Priority, ZoneId};
use core_render::SubmitFrames;
use core_state::ZoneService;
use core_transition::{TransitionConfig, TransitionService};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

/// Grace period for a cooperative stop before the task is aborted.
const STOP_GRACE: Duration = Duration::from_millis(50);

/// Floor for frame TTLs so a scheduling hiccup does not blank the strip.
const MIN_ANIM_TTL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("animation scope is empty after exclusions")]
    EmptyScope,
}

struct RunningAnimation {
    id: AnimationId,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    params: Arc<ParamSet>,
    task: tokio::task::JoinHandle<()>,
}

pub struct AnimationEngine {
    zones: Arc<ZoneService>,
    sink: Arc<dyn SubmitFrames>,
    transitions: Arc<TransitionService>,
    bus: Arc<EventBus>,
    current: Mutex<Option<RunningAnimation>>,
}

impl AnimationEngine {
    pub fn new(
        zones: Arc<ZoneService>,
        sink: Arc<dyn SubmitFrames>,
        transitions: Arc<TransitionService>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            zones,
            sink,
            transitions,
            bus,
            current: Mutex::new(None),
        }
    }

    pub async fn running_animation(&self) -> Option<AnimationId> {
        self.current.lock().await.as_ref().map(|r| r.id.clone())
    }

    /// Start (or switch to) an animation over `scope`, excluding
    /// `excluded` zones. An already-running animation is stopped first,
    /// and the visual handoff goes through one crossfade.
    pub async fn start(
        &self,
        animation: Box<dyn Animation>,
        scope: Vec<ZoneId>,
        excluded: BTreeSet<ZoneId>,
        params: Arc<ParamSet>,
        transition: Option<TransitionConfig>,
    ) -> Result<(), EngineError> {
        let scope: Vec<ZoneId> = scope.into_iter().filter(|z| !excluded.contains(z)).collect();
        if scope.is_empty() {
            return Err(EngineError::EmptyScope);
        }

        self.stop().await;

        let mut animation = animation;
        let id = animation.id();
        let ctx = build_context(&self.zones, &scope, &params);
        let first = animation.step(&ctx);

        if let Some(config) = transition {
            let to = yields_to_led_state(&first.yields, &ctx.zones);
            self.transitions.crossfade_from_current(to, &config).await;
        }

        let running = Arc::new(AtomicBool::new(true));
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_animation(
            animation,
            first,
            scope.clone(),
            self.zones.clone(),
            self.sink.clone(),
            params.clone(),
            running.clone(),
            wake.clone(),
        ));
        info!(target: "anim.engine", animation = %id, zones = scope.len(), "animation_started");
        self.bus
            .publish(Event::AnimationStarted {
                animation: id.clone(),
            })
            .await;

        *self.current.lock().await = Some(RunningAnimation {
            id,
            running,
            wake,
            params,
            task,
        });
        Ok(())
    }

    /// Stop the running animation, if any. Cooperative with a bounded
    /// grace period; abort is the expected last resort, not an error.
    pub async fn stop(&self) {
        let Some(running) = self.current.lock().await.take() else {
            return;
        };
        running.running.store(false, Relaxed);
        running.wake.notify_one();
        match tokio::time::timeout(STOP_GRACE, running.task).await {
            Ok(Ok(())) => {
                debug!(target: "anim.engine", animation = %running.id, "animation_stopped");
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                error!(
                    target: "anim.engine",
                    animation = %running.id,
                    ?join_err,
                    "animation_panicked"
                );
            }
            Ok(Err(_)) => {
                debug!(target: "anim.engine", animation = %running.id, "animation_cancelled");
            }
            Err(_) => {
                warn!(target: "anim.engine", animation = %running.id, "animation_stop_timeout");
            }
        }
        self.bus
            .publish(Event::AnimationStopped {
                animation: running.id,
            })
            .await;
    }

    /// Push a validated parameter value into the running animation's
    /// live set. No-op when the ids do not match.
    pub async fn update_param(&self, animation: &AnimationId, param: ParamId, value: ParamValue) {
        let guard = self.current.lock().await;
        if let Some(running) = guard.as_ref() {
            if &running.id == animation {
                running.params.set(param, value);
            }
        }
    }
}

fn build_context(zones: &ZoneService, scope: &[ZoneId], params: &ParamSet) -> StepContext {
    let configs = zones.zone_configs();
    let anim_zones = scope
        .iter()
        .filter_map(|id| {
            let config = configs.iter().find(|c| &c.id == id)?;
            let snapshot = zones.snapshot(id).ok()?;
            let base_rgb = zones.zone_rgb(id).unwrap_or(Rgb::BLACK);
            Some(AnimZone {
                id: id.clone(),
                pixel_count: config.pixel_count,
                base_rgb,
                brightness: snapshot.brightness,
            })
        })
        .collect();
    StepContext {
        zones: anim_zones,
        params: params.snapshot(),
    }
}

/// Convert one step's yields into per-zone logical spans (the shape the
/// transition service interpolates).
fn yields_to_led_state(
    yields: &[StepYield],
    zones: &[AnimZone],
) -> BTreeMap<ZoneId, Vec<Rgb>> {
    let mut state: BTreeMap<ZoneId, Vec<Rgb>> = zones
        .iter()
        .map(|z| (z.id.clone(), vec![Rgb::BLACK; z.pixel_count]))
        .collect();
    for y in yields {
        match y {
            StepYield::Strip(color) => {
                for span in state.values_mut() {
                    span.fill(*color);
                }
            }
            StepYield::Zone(zone, color) => {
                if let Some(span) = state.get_mut(zone) {
                    span.fill(*color);
                }
            }
            StepYield::Pixel { zone, index, color } => {
                if let Some(px) = state.get_mut(zone).and_then(|s| s.get_mut(*index)) {
                    *px = *color;
                }
            }
        }
    }
    state
}

/// Convert yields into one frame at ANIMATION priority. Zone-only
/// batches become zone frames (unyielded zones hold); any pixel yield
/// promotes the batch to a pixel frame with every scope zone explicit,
/// so trails go dark behind a moving head.
fn yields_to_frame(yields: &[StepYield], zones: &[AnimZone], ttl: Duration) -> Option<Frame> {
    if yields.is_empty() {
        return None;
    }
    let has_pixels = yields
        .iter()
        .any(|y| matches!(y, StepYield::Pixel { .. }));
    if has_pixels {
        let zone_pixels = yields_to_led_state(yields, zones);
        Some(
            Frame::pixels(zone_pixels, false, Priority::Animation, FrameSource::Animation)
                .with_ttl(ttl),
        )
    } else {
        let mut zone_colors = BTreeMap::new();
        for y in yields {
            match y {
                StepYield::Strip(color) => {
                    for zone in zones {
                        zone_colors.insert(zone.id.clone(), *color);
                    }
                }
                StepYield::Zone(zone, color) => {
                    zone_colors.insert(zone.clone(), *color);
                }
                StepYield::Pixel { .. } => {}
            }
        }
        Some(Frame::zones(zone_colors, Priority::Animation, FrameSource::Animation).with_ttl(ttl))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_animation(
    mut animation: Box<dyn Animation>,
    first: StepOutput,
    scope: Vec<ZoneId>,
    zones: Arc<ZoneService>,
    sink: Arc<dyn SubmitFrames>,
    params: Arc<ParamSet>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    let id = animation.id();
    let mut output = first;
    let mut ctx = build_context(&zones, &scope, &params);
    loop {
        if !running.load(Relaxed) {
            break;
        }
        let ttl = output.delay.mul_f32(1.5).max(MIN_ANIM_TTL);
        if let Some(frame) = yields_to_frame(&output.yields, &ctx.zones, ttl) {
            sink.submit(frame);
        }
        tokio::select! {
            biased;
            _ = wake.notified() => {
                // stop request observed between yields
                continue;
            }
            _ = tokio::time::sleep(output.delay) => {}
        }
        if !running.load(Relaxed) {
            break;
        }
        // live inputs: parameters and zone colors re-read every iteration
        ctx = build_context(&zones, &scope, &params);
        output = animation.step(&ctx);
    }
    debug!(target: "anim.task", animation = %id, "animation_task_exit");
}
