//! Application-level lighting arbitration: power toggle, lamp
//! warm-white quick mode, and per-zone render-mode changes.

use crate::Services;
use core_anim::{build_animation, ParamSet};
use core_color::Color;
use core_events::{Event, EventKind, HandlerError};
use core_model::{AnimationId, AnimationState, RenderMode, ZoneId};
use core_transition::TransitionConfig;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use tracing::{info, warn};

/// Zone locked to warm white by the quick mode.
pub const LAMP_ZONE: &str = "LAMP";

pub struct LightingController {
    services: Services,
    lamp_locked: AtomicBool,
}

impl LightingController {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            lamp_locked: AtomicBool::new(false),
        }
    }

    pub fn lamp_locked(&self) -> bool {
        self.lamp_locked.load(Relaxed)
    }

    /// Zones an animation must not touch right now.
    pub fn excluded_zones(&self) -> BTreeSet<ZoneId> {
        if self.lamp_locked() {
            [ZoneId::from(LAMP_ZONE)].into_iter().collect()
        } else {
            BTreeSet::new()
        }
    }

    /// Toggle power for the whole installation. Off: fade to black,
    /// then clear `is_on` (brightness survives in state). On: restore
    /// `is_on`, fading up to each zone's remembered color × brightness.
    pub async fn toggle_power(&self) {
        let zones = &self.services.zones;
        let any_on = zones.snapshots().iter().any(|s| s.is_on);
        if any_on {
            info!(target: "control", "power_off");
            self.services
                .engine
                .stop()
                .await;
            self.services
                .transitions
                .fade_out(TransitionConfig::power_toggle().duration)
                .await;
            for zone in zones.zone_ids() {
                let _ = zones.set_power(&zone, false).await;
            }
        } else {
            info!(target: "control", "power_on");
            let presets = zones.presets();
            let configs = zones.zone_configs();
            let mut target = BTreeMap::new();
            for snapshot in zones.snapshots() {
                let config = configs.iter().find(|c| c.id == snapshot.id);
                let len = config.map(|c| c.pixel_count).unwrap_or_default();
                let rgb = snapshot.color.to_rgb(&presets).scale(snapshot.brightness);
                target.insert(snapshot.id.clone(), vec![rgb; len]);
            }
            self.services
                .transitions
                .fade_in(target, TransitionConfig::power_toggle().duration)
                .await;
            for zone in zones.zone_ids() {
                let _ = zones.set_power(&zone, true).await;
            }
            self.sync_engine(None).await;
        }
    }

    /// Lock LAMP to the default white preset and keep it out of
    /// animations; toggling again releases the lock.
    pub async fn toggle_lamp_white(&self) {
        let lamp = ZoneId::from(LAMP_ZONE);
        if self.lamp_locked.swap(true, Relaxed) {
            self.lamp_locked.store(false, Relaxed);
            info!(target: "control", "lamp_white_released");
            self.sync_engine(Some(TransitionConfig::mode_switch())).await;
            return;
        }
        let zones = &self.services.zones;
        let Some(white) = zones.presets().default_white().map(str::to_string) else {
            warn!(target: "control", "no_white_preset_configured");
            self.lamp_locked.store(false, Relaxed);
            return;
        };
        info!(target: "control", preset = white.as_str(), "lamp_white_locked");
        let _ = zones.set_mode(&lamp, RenderMode::Static).await;
        let _ = zones.set_color(&lamp, Color::preset(white)).await;
        let _ = zones.set_power(&lamp, true).await;
        self.sync_engine(Some(TransitionConfig::mode_switch())).await;
    }

    /// Flip the selected zone between STATIC and ANIMATION, with the
    /// MODE_SWITCH crossfade and engine restart.
    pub async fn toggle_zone_mode(&self, zone: &ZoneId) {
        let zones = &self.services.zones;
        let Ok(snapshot) = zones.snapshot(zone) else {
            return;
        };
        match snapshot.mode {
            RenderMode::Static => {
                if snapshot.animation.is_none() {
                    // default assignment so the zone animates immediately
                    let _ = zones
                        .set_animation(
                            zone,
                            Some(AnimationState::new(AnimationId::from(
                                core_anim::builtin::BREATHE,
                            ))),
                        )
                        .await;
                }
                let _ = zones.set_mode(zone, RenderMode::Animation).await;
            }
            RenderMode::Animation => {
                let _ = zones.set_mode(zone, RenderMode::Static).await;
            }
        }
        self.sync_engine(Some(TransitionConfig::mode_switch())).await;
    }

    /// Reconcile the engine with the current per-zone modes: run the
    /// focus zone's animation over every ANIMATION-mode zone assigned
    /// the same animation, or stop when none remain.
    pub async fn sync_engine(&self, transition: Option<TransitionConfig>) {
        let zones = &self.services.zones;
        let excluded = self.excluded_zones();
        let animated: Vec<ZoneId> = zones
            .zones_in_mode(RenderMode::Animation)
            .into_iter()
            .filter(|z| !excluded.contains(z))
            .collect();
        if animated.is_empty() {
            self.services.engine.stop().await;
            return;
        }

        // focus zone: the selected one if animated, else the first
        let selected = zones.selected_zone();
        let focus = if animated.contains(&selected) {
            selected
        } else {
            animated[0].clone()
        };
        let Ok(snapshot) = zones.snapshot(&focus) else {
            return;
        };
        let Some(anim_state) = snapshot.animation else {
            warn!(target: "control", zone = %focus, "animation_mode_without_animation");
            return;
        };
        let scope: Vec<ZoneId> = animated
            .into_iter()
            .filter(|z| {
                zones
                    .snapshot(z)
                    .ok()
                    .and_then(|s| s.animation)
                    .map(|a| a.id == anim_state.id)
                    .unwrap_or(false)
            })
            .collect();

        let Some(animation) = build_animation(&anim_state.id) else {
            warn!(target: "control", animation = %anim_state.id, "unknown_animation");
            return;
        };
        let params = Arc::new(ParamSet::new(anim_state.parameters.clone()));
        if let Err(e) = self
            .services
            .engine
            .start(animation, scope, excluded, params, transition)
            .await
        {
            warn!(target: "control", error = %e, "engine_start_failed");
        }
    }

    /// Switch the zone to the next/previous animation in the catalog.
    pub async fn cycle_animation(&self, zone: &ZoneId, direction: i32) {
        let zones = &self.services.zones;
        let Ok(snapshot) = zones.snapshot(zone) else {
            return;
        };
        let catalog = zones.animations();
        if catalog.is_empty() {
            return;
        }
        let current = snapshot.animation.as_ref().map(|a| a.id.clone());
        let index = current
            .as_ref()
            .and_then(|id| catalog.iter().position(|a| &a.id == id))
            .unwrap_or(0);
        let next = (index as i32 + direction).rem_euclid(catalog.len() as i32) as usize;
        let next_id = catalog[next].id.clone();
        if Some(&next_id) == current.as_ref() {
            return;
        }
        let _ = zones
            .set_animation(zone, Some(AnimationState::new(next_id)))
            .await;
        if snapshot.mode == RenderMode::Animation {
            self.sync_engine(Some(TransitionConfig::animation_switch()))
                .await;
        }
    }
}

/// Bus wiring for the application-level buttons.
pub fn register(services: &Services, lighting: &Arc<LightingController>) {
    let on_button = {
        let lighting = lighting.clone();
        move |event: Event| {
            let lighting = lighting.clone();
            async move {
                let Event::ButtonPressed { button } = event else {
                    return Ok(());
                };
                match button.as_str() {
                    "power" => lighting.toggle_power().await,
                    "mode" => {
                        let zone = lighting.services.zones.selected_zone();
                        lighting.toggle_zone_mode(&zone).await;
                    }
                    "lamp_white" => lighting.toggle_lamp_white().await,
                    _ => {}
                }
                Ok::<(), HandlerError>(())
            }
        }
    };
    services
        .bus
        .subscribe_async("lighting_buttons", EventKind::ButtonPressed, 10, on_button);

    // live parameter edits (API or encoder) reach the running animation
    let engine = services.engine.clone();
    services.bus.subscribe_async(
        "engine_param_sync",
        EventKind::AnimationParamChanged,
        5,
        move |event| {
            let engine = engine.clone();
            async move {
                if let Event::AnimationParamChanged {
                    animation,
                    param,
                    value,
                } = event
                {
                    engine.update_param(&animation, param, value).await;
                }
                Ok(())
            }
        },
    );
}
