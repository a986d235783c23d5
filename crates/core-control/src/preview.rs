//! Preview surface: 8 pixels mirroring the selected zone, switching to
//! a bar rendering while a magnitude-like target (brightness or an
//! animation parameter) is being edited.

use crate::Services;
use core_color::Rgb;
use core_events::{Event, EventKind};
use core_model::{FrameSource, PreviewFrame, Priority, RenderMode, PREVIEW_PIXELS};
use core_state::EditTarget;
use tracing::trace;

/// Bar color for magnitude displays.
const BAR_COLOR: Rgb = Rgb(255, 255, 255);

/// Map a 0..=100 magnitude onto lit bar pixels.
fn bar_pixels(percent: u8) -> [Rgb; PREVIEW_PIXELS] {
    let lit = (usize::from(percent.min(100)) * PREVIEW_PIXELS).div_ceil(100);
    std::array::from_fn(|i| if i < lit { BAR_COLOR } else { Rgb::BLACK })
}

/// Normalize a parameter value onto 0..=100 for the bar.
fn param_percent(value: f64, min: f64, max: f64) -> u8 {
    if max <= min {
        return 0;
    }
    (((value - min) / (max - min)) * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn spawn_preview_renderer(services: &Services) {
    let sink = services.sink.clone();
    let zones = services.zones.clone();
    let presets = services.zones.presets();
    services.bus.subscribe(
        "preview_renderer",
        EventKind::ZoneSnapshotUpdated,
        0,
        move |event| {
            let Event::ZoneSnapshotUpdated { snapshot } = event else {
                return Ok(());
            };
            if snapshot.id != zones.selected_zone() {
                return Ok(());
            }
            let app = zones.app_state();
            let frame = match (&snapshot.mode, app.selected_edit_target) {
                // magnitude edits render as a bar
                (_, EditTarget::Brightness) => PreviewFrame::from_array(
                    bar_pixels(snapshot.brightness),
                    Priority::Manual,
                    FrameSource::Controller,
                ),
                (RenderMode::Animation, _) => {
                    let percent = snapshot
                        .animation
                        .as_ref()
                        .zip(app.selected_animation_param.as_ref())
                        .and_then(|(anim, param)| {
                            let value = anim.parameters.get(param)?.as_f64();
                            let defs = zones.param_defs();
                            let def = defs.get(param)?;
                            Some(param_percent(value, def.min, def.max))
                        });
                    match percent {
                        Some(p) => PreviewFrame::from_array(
                            bar_pixels(p),
                            Priority::Manual,
                            FrameSource::Controller,
                        ),
                        None => mirror(&snapshot, &presets),
                    }
                }
                // default: mirror the zone's effective color
                _ => mirror(&snapshot, &presets),
            };
            trace!(target: "control", zone = %snapshot.id, "preview_updated");
            sink.submit_preview(frame);
            Ok(())
        },
    );
}

fn mirror(snapshot: &core_model::ZoneSnapshot, presets: &core_color::PresetTable) -> PreviewFrame {
    let rgb = if snapshot.is_on {
        snapshot.color.to_rgb(presets).scale(snapshot.brightness)
    } else {
        Rgb::BLACK
    };
    PreviewFrame::solid(rgb, Priority::Manual, FrameSource::Controller)
}
