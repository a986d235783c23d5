//! Static-mode routing: zone selection, hue/preset/brightness edits,
//! and the MANUAL-priority renderer that keeps STATIC zones visible.

use crate::Services;
use core_color::{Color, Rgb};
use core_events::{EncoderSource, Event, EventKind, HandlerError};
use core_model::{Frame, FrameSource, Priority, RenderMode};
use core_state::EditTarget;
use std::collections::BTreeMap;
use tracing::debug;

/// Degrees per modulator detent in hue edit mode.
const HUE_STEP: i32 = 5;
/// Brightness percent per modulator detent.
const BRIGHTNESS_STEP: i32 = 5;

pub fn register(services: &Services, _lighting: &std::sync::Arc<crate::LightingController>) {
    // selector: zone selection, regardless of zone mode
    let selector = {
        let services = services.clone();
        move |event: Event| {
            let services = services.clone();
            async move {
                let Event::EncoderRotated { encoder, delta } = event else {
                    return Ok(());
                };
                if encoder != EncoderSource::Selector {
                    return Ok(());
                }
                let zone = services.zones.select_zone(delta).await;
                // any selector activity enters edit mode (pulse follows)
                services.zones.set_edit_mode(true).await;
                debug!(target: "control", zone = %zone, "zone_selected");
                Ok::<(), HandlerError>(())
            }
        }
    };
    services.bus.subscribe_async(
        "selector_zone_select",
        EventKind::EncoderRotated,
        10,
        selector,
    );

    // modulator: adjust the active edit target of the selected zone
    let modulator = {
        let services = services.clone();
        move |event: Event| {
            let services = services.clone();
            async move {
                let Event::EncoderRotated { encoder, delta } = event else {
                    return Ok(());
                };
                if encoder != EncoderSource::Modulator {
                    return Ok(());
                }
                let zone = services.zones.selected_zone();
                let Ok(snapshot) = services.zones.snapshot(&zone) else {
                    return Ok(());
                };
                if snapshot.mode != RenderMode::Static {
                    // animation-mode handling lives in anim_ctrl
                    return Ok(());
                }
                let app = services.zones.app_state();
                match app.selected_edit_target {
                    EditTarget::ColorHue => {
                        let current = match snapshot.color {
                            Color::Hue { hue } => i32::from(hue),
                            _ => 0,
                        };
                        let next = Color::hue(current + delta * HUE_STEP);
                        let _ = services.zones.set_color(&zone, next).await;
                    }
                    EditTarget::ColorPreset => {
                        let presets = services.zones.presets();
                        let current = match &snapshot.color {
                            Color::Preset { preset_name } => Some(preset_name.as_str()),
                            _ => None,
                        };
                        if let Some(next) = presets.step_from(current, delta) {
                            let _ = services.zones.set_color(&zone, Color::preset(next)).await;
                        }
                    }
                    EditTarget::Brightness => {
                        let next = (i32::from(snapshot.brightness) + delta * BRIGHTNESS_STEP)
                            .clamp(0, 100) as u8;
                        let _ = services.zones.set_brightness(&zone, next).await;
                    }
                }
                Ok(())
            }
        }
    };
    services.bus.subscribe_async(
        "modulator_static_edit",
        EventKind::EncoderRotated,
        5,
        modulator,
    );

    // selector push cycles the edit target on static zones
    let push = {
        let services = services.clone();
        move |event: Event| {
            let services = services.clone();
            async move {
                let Event::ButtonPressed { button } = event else {
                    return Ok(());
                };
                if button != "selector:push" {
                    return Ok(());
                }
                let zone = services.zones.selected_zone();
                let is_static = services
                    .zones
                    .snapshot(&zone)
                    .map(|s| s.mode == RenderMode::Static)
                    .unwrap_or(true);
                if is_static {
                    let target = services.zones.cycle_edit_target().await;
                    debug!(target: "control", edit_target = target.as_str(), "edit_target_cycled");
                }
                Ok::<(), HandlerError>(())
            }
        }
    };
    services
        .bus
        .subscribe_async("selector_push_edit_target", EventKind::ButtonPressed, 5, push);
}

/// Renders the STATIC zones at MANUAL priority whenever any snapshot
/// changes. The whole static set goes into one frame, so a burst of
/// mutations can never starve an earlier zone out of the bounded
/// queues; producers apply brightness, the scheduler never scales.
pub fn spawn_static_renderer(services: &Services) {
    let sink = services.sink.clone();
    let zones = services.zones.clone();
    services.bus.subscribe(
        "static_renderer",
        EventKind::ZoneSnapshotUpdated,
        0,
        move |event| {
            let Event::ZoneSnapshotUpdated { .. } = event else {
                return Ok(());
            };
            let zone_colors: BTreeMap<_, Rgb> = zones.static_zone_rgbs().into_iter().collect();
            if zone_colors.is_empty() {
                return Ok(());
            }
            sink.submit(Frame::zones(zone_colors, Priority::Manual, FrameSource::Static));
            Ok(())
        },
    );
}
