//! Controllers: the routing layer between bus events and the services.
//!
//! Controllers never render pixels themselves and never call each other;
//! they translate encoder detents, button presses and keypresses into
//! `ZoneService` mutations and engine/transition commands, and exchange
//! strictly through the event bus. The `Services` container breaks the
//! controller↔service construction cycle.
//!
//! Local control model:
//! - selector rotate: zone selection (wraps over declared order)
//! - selector push: cycle the edit target (hue → preset → brightness)
//!   on STATIC zones; cycle the edited parameter on ANIMATION zones
//! - modulator rotate: adjust the current edit target on STATIC zones;
//!   adjust the selected animation parameter live on ANIMATION zones
//! - modulator push: cycle the zone's animation (with crossfade)
//! - `power` button: application-level power toggle
//! - `mode` button: STATIC ↔ ANIMATION for the selected zone

use core_anim::AnimationEngine;
use core_events::{EventBus, TaskRegistry};
use core_render::FrameSink;
use core_state::ZoneService;
use core_transition::TransitionService;
use std::sync::Arc;

mod anim_ctrl;
mod keymap;
mod lighting;
mod preview;
mod pulse;
mod static_ctrl;

pub use keymap::KeyCommand;
pub use lighting::LightingController;
pub use preview::spawn_preview_renderer;
pub use pulse::PulseTask;
pub use static_ctrl::spawn_static_renderer;

/// Shared service handles passed to every controller.
#[derive(Clone)]
pub struct Services {
    pub zones: Arc<ZoneService>,
    pub engine: Arc<AnimationEngine>,
    pub transitions: Arc<TransitionService>,
    pub sink: FrameSink,
    pub bus: Arc<EventBus>,
    pub tasks: Arc<TaskRegistry>,
}

/// Register every controller on the bus and start the render-side
/// helpers (static renderer, selection pulse, preview).
pub fn wire_controllers(services: &Services) -> Arc<LightingController> {
    let lighting = Arc::new(LightingController::new(services.clone()));

    static_ctrl::register(services, &lighting);
    anim_ctrl::register(services, &lighting);
    keymap::register(services, &lighting);
    lighting::register(services, &lighting);

    spawn_static_renderer(services);
    spawn_preview_renderer(services);

    let pulse = PulseTask::spawn(services.clone());
    services.tasks.register("pulse", pulse);

    lighting
}
