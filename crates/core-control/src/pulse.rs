//! Selection pulse: a ≤ 1 Hz brightness swell on the selected zone,
//! overlaid at PULSE priority so it rides above animations but under
//! transitions. Purely additive — the priority system does all the
//! arbitration.

use crate::Services;
use core_model::{Frame, FrameSource, Priority};
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Steps per pulse cycle; at 50 ms per step this is a 1 Hz pulse.
const PULSE_STEPS: u32 = 20;
const PULSE_STEP_DELAY: Duration = Duration::from_millis(50);
/// Brightness factor swings between these bounds.
const PULSE_MIN: f32 = 0.35;
const PULSE_MAX: f32 = 1.0;

pub struct PulseTask;

impl PulseTask {
    /// Spawn the pulse producer. It re-reads the selected zone and its
    /// effective color every step, so selection and edits show through
    /// immediately; it pauses itself while edit pulsing is meaningless
    /// (zone powered off).
    pub fn spawn(services: Services) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(target: "control", "pulse_task_started");
            let mut phase = 0u32;
            let mut interval = tokio::time::interval(PULSE_STEP_DELAY);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !services.zones.app_state().edit_mode {
                    continue;
                }
                let zone = services.zones.selected_zone();
                let Ok(base) = services.zones.zone_rgb(&zone) else {
                    continue;
                };
                if base.is_black() {
                    continue;
                }
                let t = phase as f32 / PULSE_STEPS as f32;
                let factor =
                    PULSE_MIN + (PULSE_MAX - PULSE_MIN) * (0.5 - 0.5 * (TAU * t).cos());
                let mut zone_colors = BTreeMap::new();
                zone_colors.insert(zone, base.scale_f32(factor));
                services.sink.submit(
                    Frame::zones(zone_colors, Priority::Pulse, FrameSource::Pulse)
                        .with_ttl(PULSE_STEP_DELAY * 3),
                );
                phase = (phase + 1) % PULSE_STEPS;
            }
        })
    }
}
