//! Animation-mode routing: parameter selection and live adjustment,
//! plus animation cycling on the modulator push.

use crate::{LightingController, Services};
use core_events::{EncoderSource, Event, EventKind, HandlerError};
use core_model::RenderMode;
use std::sync::Arc;
use tracing::debug;

pub fn register(services: &Services, lighting: &Arc<LightingController>) {
    // modulator on an ANIMATION zone adjusts the selected parameter live
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
                if snapshot.mode != RenderMode::Animation {
                    return Ok(());
                }
                let Some(anim) = snapshot.animation else {
                    return Ok(());
                };
                let Ok(config) = services.zones.animation_config(&anim.id) else {
                    return Ok(());
                };
                let app = services.zones.app_state();
                let param = app
                    .selected_animation_param
                    .filter(|p| config.parameters.contains(p))
                    .or_else(|| config.parameters.first().cloned());
                let Some(param) = param else {
                    return Ok(());
                };
                let defs = services.zones.param_defs();
                let Some(def) = defs.get(&param) else {
                    return Ok(());
                };
                let current = anim.parameters.get(&param).copied().unwrap_or(def.default);
                let next = def.adjust(current, delta);
                debug!(
                    target: "control",
                    zone = %zone,
                    param = %param,
                    value = %next,
                    "animation_param_adjusted"
                );
                // service publishes AnimationParamChanged; the engine
                // sync handler pushes it into the running ParamSet
                let _ = services.zones.set_animation_param(&zone, &param, next).await;
                Ok::<(), HandlerError>(())
            }
        }
    };
    services.bus.subscribe_async(
        "modulator_param_edit",
        EventKind::EncoderRotated,
        4,
        modulator,
    );

    // selector push on an ANIMATION zone cycles the edited parameter
    let param_cycle = {
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
                let Ok(snapshot) = services.zones.snapshot(&zone) else {
                    return Ok(());
                };
                if snapshot.mode != RenderMode::Animation {
                    return Ok(());
                }
                let Some(anim) = snapshot.animation else {
                    return Ok(());
                };
                let Ok(config) = services.zones.animation_config(&anim.id) else {
                    return Ok(());
                };
                if config.parameters.is_empty() {
                    return Ok(());
                }
                let app = services.zones.app_state();
                let index = app
                    .selected_animation_param
                    .as_ref()
                    .and_then(|p| config.parameters.iter().position(|c| c == p))
                    .map(|i| (i + 1) % config.parameters.len())
                    .unwrap_or(0);
                let param = config.parameters[index].clone();
                debug!(target: "control", param = %param, "animation_param_selected");
                services.zones.set_selected_param(Some(param)).await;
                Ok::<(), HandlerError>(())
            }
        }
    };
    services.bus.subscribe_async(
        "selector_push_param_cycle",
        EventKind::ButtonPressed,
        4,
        param_cycle,
    );

    // modulator push cycles the animation itself
    let anim_cycle = {
        let services = services.clone();
        let lighting = lighting.clone();
        move |event: Event| {
            let services = services.clone();
            let lighting = lighting.clone();
            async move {
                let Event::ButtonPressed { button } = event else {
                    return Ok(());
                };
                if button != "modulator:push" {
                    return Ok(());
                }
                let zone = services.zones.selected_zone();
                lighting.cycle_animation(&zone, 1).await;
                Ok::<(), HandlerError>(())
            }
        }
    };
    services.bus.subscribe_async(
        "modulator_push_anim_cycle",
        EventKind::ButtonPressed,
        4,
        anim_cycle,
    );
}
