//! Eased crossfades between arbitrary LED states.
//!
//! One transition runs at a time (exclusive lock). Each step interpolates
//! every pixel and submits a TRANSITION-priority pixel frame, so the
//! priority ladder — not ad-hoc suppression — keeps animations and
//! pulses off the strips for the duration. All output flows through the
//! frame manager; the service never touches a chain.

use core_color::Rgb;
use core_model::{Frame, FrameSource, Priority, ZoneId};
use core_render::{SharedComposite, SubmitFrames};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

mod easing;

pub use easing::Easing;

/// Per-zone pixel spans in logical order; the unit of interpolation.
pub type LedState = BTreeMap<ZoneId, Vec<Rgb>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Fade,
    Crossfade,
    Cut,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionConfig {
    pub kind: TransitionKind,
    pub duration: Duration,
    pub steps: u32,
    pub easing: Easing,
}

impl TransitionConfig {
    pub const fn new(kind: TransitionKind, duration: Duration, steps: u32, easing: Easing) -> Self {
        Self {
            kind,
            duration,
            steps,
            easing,
        }
    }

    pub const fn startup() -> Self {
        Self::new(
            TransitionKind::Fade,
            Duration::from_millis(1200),
            30,
            Easing::EaseOutCubic,
        )
    }

    pub const fn shutdown() -> Self {
        Self::new(
            TransitionKind::Fade,
            Duration::from_millis(600),
            20,
            Easing::EaseInQuad,
        )
    }

    pub const fn mode_switch() -> Self {
        Self::new(
            TransitionKind::Crossfade,
            Duration::from_millis(400),
            15,
            Easing::EaseInOutQuad,
        )
    }

    pub const fn animation_switch() -> Self {
        Self::new(
            TransitionKind::Crossfade,
            Duration::from_millis(350),
            12,
            Easing::EaseInOutQuad,
        )
    }

    pub const fn power_toggle() -> Self {
        Self::new(
            TransitionKind::Fade,
            Duration::from_millis(500),
            18,
            Easing::EaseInOutQuad,
        )
    }

    pub const fn zone_change() -> Self {
        Self::new(
            TransitionKind::None,
            Duration::from_millis(0),
            1,
            Easing::Linear,
        )
    }
}

/// What actually ran, after the step floor was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionReport {
    pub steps_run: u32,
    pub step_delay: Duration,
    pub reduced: bool,
}

pub struct TransitionService {
    lock: Mutex<()>,
    sink: Arc<dyn SubmitFrames>,
    composite: SharedComposite,
    /// Step-delay floor: the slowest chain's minimum inter-frame time.
    min_frame_time: Duration,
    cancelled: AtomicBool,
}

impl TransitionService {
    pub fn new(
        sink: Arc<dyn SubmitFrames>,
        composite: SharedComposite,
        min_frame_time: Duration,
    ) -> Self {
        Self {
            lock: Mutex::new(()),
            sink,
            composite,
            min_frame_time,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request the active transition to stop. Observed between steps: the
    /// in-flight step always completes.
    pub fn cancel_active(&self) {
        self.cancelled.store(true, Relaxed);
    }

    /// Resolves once no transition holds the lock.
    pub async fn wait_for_idle(&self) {
        drop(self.lock.lock().await);
    }

    /// Crossfade from the currently rendered composite.
    pub async fn crossfade_from_current(
        &self,
        to: LedState,
        config: &TransitionConfig,
    ) -> TransitionReport {
        let from = self.composite.snapshot();
        self.crossfade(from, to, config).await
    }

    /// Fade the current composite to black.
    pub async fn fade_out(&self, duration: Duration) -> TransitionReport {
        let from = self.composite.snapshot();
        let to = blacked(&from);
        let config = TransitionConfig {
            duration,
            ..TransitionConfig::power_toggle()
        };
        self.crossfade(from, to, &config).await
    }

    /// Fade from black up to `to`.
    pub async fn fade_in(&self, to: LedState, duration: Duration) -> TransitionReport {
        let from = blacked(&to);
        let config = TransitionConfig {
            duration,
            ..TransitionConfig::power_toggle()
        };
        self.crossfade(from, to, &config).await
    }

    /// Interpolate `from` → `to` under the exclusive lock.
    pub async fn crossfade(
        &self,
        from: LedState,
        to: LedState,
        config: &TransitionConfig,
    ) -> TransitionReport {
        let _guard = self.lock.lock().await;
        self.cancelled.store(false, Relaxed);

        match config.kind {
            TransitionKind::None => {
                return TransitionReport {
                    steps_run: 0,
                    step_delay: Duration::ZERO,
                    reduced: false,
                };
            }
            TransitionKind::Cut => {
                self.submit_state(&to, Duration::from_millis(100));
                return TransitionReport {
                    steps_run: 1,
                    step_delay: Duration::ZERO,
                    reduced: false,
                };
            }
            TransitionKind::Fade | TransitionKind::Crossfade => {}
        }

        let (steps, step_delay, reduced) = self.effective_steps(config);
        if reduced {
            warn!(
                target: "transition",
                requested = config.steps,
                effective = steps,
                floor_ms = self.min_frame_time.as_millis() as u64,
                "steps_reduced_to_respect_frame_floor"
            );
        }
        debug!(
            target: "transition",
            kind = ?config.kind,
            easing = config.easing.as_str(),
            steps,
            duration_ms = config.duration.as_millis() as u64,
            "transition_started"
        );

        // interpolate exactly the zones of the target state: zones the
        // caller leaves out are not touched (a scoped animation start
        // must not drag unrelated zones to black)
        let zones = target_zones(&to);
        let ttl = step_delay.mul_f32(1.5).max(Duration::from_millis(20));
        let mut steps_run = 0;
        for k in 1..=steps {
            let t = config.easing.apply(k as f32 / steps as f32);
            let mut zone_pixels = BTreeMap::new();
            for (zone, len) in &zones {
                let from_span = from.get(zone);
                let to_span = to.get(zone);
                let span: Vec<Rgb> = (0..*len)
                    .map(|i| {
                        let a = pixel_at(from_span, i);
                        let b = pixel_at(to_span, i);
                        a.lerp(b, t)
                    })
                    .collect();
                zone_pixels.insert(zone.clone(), span);
            }
            self.sink.submit(
                Frame::pixels(zone_pixels, false, Priority::Transition, FrameSource::Transition)
                    .with_ttl(ttl),
            );
            steps_run += 1;
            if k < steps {
                tokio::time::sleep(step_delay).await;
                if self.cancelled.swap(false, Relaxed) {
                    debug!(target: "transition", step = k, "transition_cancelled");
                    break;
                }
            }
        }
        debug!(target: "transition", steps_run, "transition_finished");
        TransitionReport {
            steps_run,
            step_delay,
            reduced,
        }
    }

    fn submit_state(&self, state: &LedState, ttl: Duration) {
        self.sink.submit(
            Frame::pixels(
                state.clone(),
                false,
                Priority::Transition,
                FrameSource::Transition,
            )
            .with_ttl(ttl),
        );
    }

    /// Enforce the step-delay floor: when `duration/steps` would undercut
    /// the slowest chain, reduce the step count instead.
    fn effective_steps(&self, config: &TransitionConfig) -> (u32, Duration, bool) {
        let steps = config.steps.max(1);
        let delay = config.duration / steps;
        if delay >= self.min_frame_time || self.min_frame_time.is_zero() {
            return (steps, delay, false);
        }
        let reduced = ((config.duration.as_nanos() / self.min_frame_time.as_nanos()) as u32).max(1);
        (reduced, config.duration / reduced, true)
    }
}

fn blacked(state: &LedState) -> LedState {
    state
        .iter()
        .map(|(zone, span)| (zone.clone(), vec![Rgb::BLACK; span.len()]))
        .collect()
}

fn target_zones(to: &LedState) -> BTreeMap<ZoneId, usize> {
    to.iter()
        .map(|(zone, span)| (zone.clone(), span.len()))
        .collect()
}

fn pixel_at(span: Option<&Vec<Rgb>>, i: usize) -> Rgb {
    span.and_then(|s| s.get(i)).copied().unwrap_or(Rgb::BLACK)
}
