//! Render loop telemetry.
//!
//! Atomic counters with a snapshot view, plus a rolling window of render
//! instants for actual-FPS measurement. Shared as `Arc` with the API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Render instants kept for the FPS window.
const FPS_WINDOW: usize = 120;

#[derive(Debug, Default)]
pub struct RenderMetrics {
    pub(crate) ticks: AtomicU64,
    pub(crate) frames_rendered: AtomicU64,
    pub(crate) frames_held: AtomicU64,
    pub(crate) dropped_frames: AtomicU64,
    pub(crate) dma_skipped: AtomicU64,
    pub(crate) spacing_deferred: AtomicU64,
    pub(crate) expired: AtomicU64,
    pub(crate) overwritten: AtomicU64,
    pub(crate) preview_rendered: AtomicU64,
    window: Mutex<VecDeque<Instant>>,
    /// Queue depth per priority value at the last tick.
    holding: Mutex<Vec<(u8, usize)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderMetricsSnapshot {
    pub ticks: u64,
    pub frames_rendered: u64,
    pub frames_held: u64,
    pub dropped_frames: u64,
    pub dma_skipped: u64,
    pub spacing_deferred: u64,
    pub expired: u64,
    pub overwritten: u64,
    pub preview_rendered: u64,
    pub actual_fps: f64,
    pub holding: Vec<(u8, usize)>,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_render(&self, at: Instant) {
        let mut window = self.window.lock().expect("fps window poisoned");
        if window.len() == FPS_WINDOW {
            window.pop_front();
        }
        window.push_back(at);
    }

    pub(crate) fn set_holding(&self, depths: Vec<(u8, usize)>) {
        *self.holding.lock().expect("holding poisoned") = depths;
    }

    fn actual_fps(&self) -> f64 {
        let window = self.window.lock().expect("fps window poisoned");
        if window.len() < 2 {
            return 0.0;
        }
        let span = window
            .back()
            .unwrap()
            .saturating_duration_since(*window.front().unwrap());
        if span.is_zero() {
            return 0.0;
        }
        (window.len() - 1) as f64 / span.as_secs_f64()
    }

    pub fn snapshot(&self) -> RenderMetricsSnapshot {
        RenderMetricsSnapshot {
            ticks: self.ticks.load(Relaxed),
            frames_rendered: self.frames_rendered.load(Relaxed),
            frames_held: self.frames_held.load(Relaxed),
            dropped_frames: self.dropped_frames.load(Relaxed),
            dma_skipped: self.dma_skipped.load(Relaxed),
            spacing_deferred: self.spacing_deferred.load(Relaxed),
            expired: self.expired.load(Relaxed),
            overwritten: self.overwritten.load(Relaxed),
            preview_rendered: self.preview_rendered.load(Relaxed),
            actual_fps: self.actual_fps(),
            holding: self.holding.lock().expect("holding poisoned").clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reflects_window_span() {
        let metrics = RenderMetrics::new();
        let start = Instant::now();
        for i in 0..61 {
            metrics.record_render(start + Duration::from_millis(i * 16));
        }
        let fps = metrics.snapshot().actual_fps;
        assert!((fps - 62.5).abs() < 1.0, "~62.5 fps at 16ms spacing, got {fps}");
    }

    #[test]
    fn fps_is_zero_without_samples() {
        let metrics = RenderMetrics::new();
        assert_eq!(metrics.snapshot().actual_fps, 0.0);
        metrics.record_render(Instant::now());
        assert_eq!(metrics.snapshot().actual_fps, 0.0);
    }
}
