//! Event types, the pub/sub bus, and the named-task registry.
//!
//! Every input surface (encoders, buttons, keyboard, API) and every state
//! mutation funnels through the bus as a typed `Event`. Controllers and
//! broadcasters subscribe with a priority and an optional filter; a
//! failing handler never stops the remaining handlers.

use core_model::{AnimationId, ParamId, ParamValue, RenderMode, ZoneId, ZoneSnapshot};
use std::fmt;

mod bus;
mod middleware;
mod tasks;

pub use bus::{BusMetricsSnapshot, EventBus, HandlerError, EVENT_HISTORY_CAP};
pub use middleware::{LoggingMiddleware, Middleware, RateLimitMiddleware};
pub use tasks::{TaskInfo, TaskRegistry, TaskStats};

/// Physical rotary encoder roles. The selector picks *what* is edited,
/// the modulator changes *how much*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderSource {
    Selector,
    Modulator,
}

impl EncoderSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            EncoderSource::Selector => "selector",
            EncoderSource::Modulator => "modulator",
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

/// Normalized logical keys surfaced by the keyboard adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Tab,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyInput {
    pub fn plain(code: KeyCode) -> Self {
        Self {
            code,
            mods: KeyModifiers::empty(),
        }
    }
}

impl fmt::Display for KeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.code, self.mods)
    }
}

/// Everything that can happen in the system, as observed by controllers
/// and broadcasters.
#[derive(Debug, Clone)]
pub enum Event {
    EncoderRotated {
        encoder: EncoderSource,
        delta: i32,
    },
    ButtonPressed {
        button: String,
    },
    KeyPressed {
        key: KeyInput,
    },
    ZoneStateChanged {
        zone: ZoneId,
    },
    ZoneRenderModeChanged {
        zone: ZoneId,
        mode: RenderMode,
    },
    ZoneAnimationChanged {
        zone: ZoneId,
        animation: Option<AnimationId>,
    },
    AnimationStarted {
        animation: AnimationId,
    },
    AnimationStopped {
        animation: AnimationId,
    },
    AnimationParamChanged {
        animation: AnimationId,
        param: ParamId,
        value: ParamValue,
    },
    /// Serializable projection published after every mutation so the API
    /// broadcaster and the preview never poll.
    ZoneSnapshotUpdated {
        snapshot: ZoneSnapshot,
    },
    ShutdownRequested {
        reason: String,
    },
}

/// Discriminant used for subscription matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    EncoderRotated,
    ButtonPressed,
    KeyPressed,
    ZoneStateChanged,
    ZoneRenderModeChanged,
    ZoneAnimationChanged,
    AnimationStarted,
    AnimationStopped,
    AnimationParamChanged,
    ZoneSnapshotUpdated,
    ShutdownRequested,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventKind::EncoderRotated => "encoder_rotated",
            EventKind::ButtonPressed => "button_pressed",
            EventKind::KeyPressed => "key_pressed",
            EventKind::ZoneStateChanged => "zone_state_changed",
            EventKind::ZoneRenderModeChanged => "zone_render_mode_changed",
            EventKind::ZoneAnimationChanged => "zone_animation_changed",
            EventKind::AnimationStarted => "animation_started",
            EventKind::AnimationStopped => "animation_stopped",
            EventKind::AnimationParamChanged => "animation_param_changed",
            EventKind::ZoneSnapshotUpdated => "zone_snapshot_updated",
            EventKind::ShutdownRequested => "shutdown_requested",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::EncoderRotated { .. } => EventKind::EncoderRotated,
            Event::ButtonPressed { .. } => EventKind::ButtonPressed,
            Event::KeyPressed { .. } => EventKind::KeyPressed,
            Event::ZoneStateChanged { .. } => EventKind::ZoneStateChanged,
            Event::ZoneRenderModeChanged { .. } => EventKind::ZoneRenderModeChanged,
            Event::ZoneAnimationChanged { .. } => EventKind::ZoneAnimationChanged,
            Event::AnimationStarted { .. } => EventKind::AnimationStarted,
            Event::AnimationStopped { .. } => EventKind::AnimationStopped,
            Event::AnimationParamChanged { .. } => EventKind::AnimationParamChanged,
            Event::ZoneSnapshotUpdated { .. } => EventKind::ZoneSnapshotUpdated,
            Event::ShutdownRequested { .. } => EventKind::ShutdownRequested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let ev = Event::EncoderRotated {
            encoder: EncoderSource::Selector,
            delta: 1,
        };
        assert_eq!(ev.kind(), EventKind::EncoderRotated);
        assert_eq!(ev.kind().as_str(), "encoder_rotated");
    }
}
