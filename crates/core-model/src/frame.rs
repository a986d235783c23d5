//! Atomic renderable frames.
//!
//! A frame describes the desired LED state for one tick at one priority.
//! Frames are produced by exactly one owner, submitted to the frame
//! manager, rendered at most once, then dropped. Expiry is wall-clock:
//! a frame that sat in a queue longer than its TTL is evicted instead of
//! rendered, which keeps stale producer output off the strips after a
//! priority burst.

use crate::{Priority, ZoneId};
use core_color::Rgb;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Default time-to-live for submitted frames.
pub const DEFAULT_FRAME_TTL: Duration = Duration::from_millis(100);

/// Fixed size of the preview surface.
pub const PREVIEW_PIXELS: usize = 8;

/// Identifies the producer of a frame, for metrics and debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Static,
    Animation,
    Transition,
    Pulse,
    Controller,
    Api,
    Debug,
}

impl FrameSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            FrameSource::Static => "static",
            FrameSource::Animation => "animation",
            FrameSource::Transition => "transition",
            FrameSource::Pulse => "pulse",
            FrameSource::Controller => "controller",
            FrameSource::Api => "api",
            FrameSource::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameMeta {
    pub priority: Priority,
    pub source: FrameSource,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl FrameMeta {
    pub fn new(priority: Priority, source: FrameSource) -> Self {
        Self {
            priority,
            source,
            timestamp: Instant::now(),
            ttl: DEFAULT_FRAME_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// For tests that need deterministic clocks.
    pub fn at(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > self.ttl
    }
}

/// Payload of a main-strip frame.
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Every zone takes the same color.
    FullStrip { color: Rgb },
    /// Listed zones take a uniform color; others keep their last state.
    Zones { zone_colors: BTreeMap<ZoneId, Rgb> },
    /// Listed zones take per-pixel spans in logical order (the mapper
    /// resolves reversal). With `clear_other_zones` the unlisted,
    /// non-static zones are blanked.
    Pixels {
        zone_pixels: BTreeMap<ZoneId, Vec<Rgb>>,
        clear_other_zones: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub meta: FrameMeta,
    pub payload: FramePayload,
}

impl Frame {
    pub fn full_strip(color: Rgb, priority: Priority, source: FrameSource) -> Self {
        Self {
            meta: FrameMeta::new(priority, source),
            payload: FramePayload::FullStrip { color },
        }
    }

    pub fn zones(
        zone_colors: BTreeMap<ZoneId, Rgb>,
        priority: Priority,
        source: FrameSource,
    ) -> Self {
        Self {
            meta: FrameMeta::new(priority, source),
            payload: FramePayload::Zones { zone_colors },
        }
    }

    pub fn pixels(
        zone_pixels: BTreeMap<ZoneId, Vec<Rgb>>,
        clear_other_zones: bool,
        priority: Priority,
        source: FrameSource,
    ) -> Self {
        Self {
            meta: FrameMeta::new(priority, source),
            payload: FramePayload::Pixels {
                zone_pixels,
                clear_other_zones,
            },
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.meta.ttl = ttl;
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.meta.is_expired(now)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("preview frame requires exactly {PREVIEW_PIXELS} pixels, got {0}")]
    PreviewLength(usize),
}

/// Frame for the 8-pixel preview surface. Selected independently from the
/// main strips at the same priority ladder.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub meta: FrameMeta,
    pub pixels: [Rgb; PREVIEW_PIXELS],
}

impl PreviewFrame {
    pub fn new(
        pixels: Vec<Rgb>,
        priority: Priority,
        source: FrameSource,
    ) -> Result<Self, FrameError> {
        let pixels: [Rgb; PREVIEW_PIXELS] = pixels
            .try_into()
            .map_err(|v: Vec<Rgb>| FrameError::PreviewLength(v.len()))?;
        Ok(Self {
            meta: FrameMeta::new(priority, source),
            pixels,
        })
    }

    pub fn from_array(
        pixels: [Rgb; PREVIEW_PIXELS],
        priority: Priority,
        source: FrameSource,
    ) -> Self {
        Self {
            meta: FrameMeta::new(priority, source),
            pixels,
        }
    }

    pub fn solid(color: Rgb, priority: Priority, source: FrameSource) -> Self {
        Self {
            meta: FrameMeta::new(priority, source),
            pixels: [color; PREVIEW_PIXELS],
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.meta.is_expired(now)
    }
}
