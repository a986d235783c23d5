//! The frame manager: a single cooperative render loop that merges all
//! frame producers onto the physical chains.
//!
//! One *tick* drains the submission channels into per-priority queues,
//! evicts expired frames, selects the highest-priority newest frame for
//! the main strips and independently for the preview, composites per
//! chain, and emits at most one `apply_frame` per chain. Unchanged
//! composites are not re-transmitted. The loop never aborts on producer
//! or driver errors: a failed transfer drops the frame and the next tick
//! retries with a fresh composite.

use core_color::Rgb;
use core_hw::Chain;
use core_model::{Frame, PreviewFrame, ZoneId, ZoneMapper, PREVIEW_PIXELS};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub mod compositor;
pub mod metrics;
pub mod queue;

pub use compositor::{compose, zone_spans, StaticColors};
pub use metrics::{RenderMetrics, RenderMetricsSnapshot};
use queue::{PriorityQueues, Queued};

/// Provider of live STATIC-zone colors, read at composite time.
pub type StaticColorsFn = Arc<dyn Fn() -> StaticColors + Send + Sync>;

impl Queued for Frame {
    fn priority(&self) -> core_model::Priority {
        self.meta.priority
    }
    fn expired(&self, now: Instant) -> bool {
        self.is_expired(now)
    }
}

impl Queued for PreviewFrame {
    fn priority(&self) -> core_model::Priority {
        self.meta.priority
    }
    fn expired(&self, now: Instant) -> bool {
        self.is_expired(now)
    }
}

/// A chain plus its zone mapping.
pub struct ChainBinding {
    pub chain: Arc<dyn Chain>,
    pub mapper: ZoneMapper,
}

struct ChainState {
    binding: ChainBinding,
    last_rendered: Vec<Rgb>,
    last_applied: Option<Vec<Rgb>>,
    last_apply_at: Option<Instant>,
}

struct PreviewState {
    chain: Arc<dyn Chain>,
    last_applied: Option<[Rgb; PREVIEW_PIXELS]>,
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
    Step,
    Clear,
    Shutdown,
}

/// Producer-facing submission seam. `FrameSink` is the live
/// implementation; tests substitute recorders.
pub trait SubmitFrames: Send + Sync {
    fn submit(&self, frame: Frame);
    fn submit_preview(&self, frame: PreviewFrame);
}

impl SubmitFrames for FrameSink {
    fn submit(&self, frame: Frame) {
        FrameSink::submit(self, frame);
    }
    fn submit_preview(&self, frame: PreviewFrame) {
        FrameSink::submit_preview(self, frame);
    }
}

/// Producer-facing handle. Submissions never block; after manager
/// shutdown they become no-ops.
#[derive(Clone)]
pub struct FrameSink {
    main_tx: mpsc::UnboundedSender<Frame>,
    preview_tx: mpsc::UnboundedSender<PreviewFrame>,
    ctrl_tx: mpsc::UnboundedSender<Control>,
}

impl FrameSink {
    pub fn submit(&self, frame: Frame) {
        if self.main_tx.send(frame).is_err() {
            debug!(target: "render.queue", "submit_after_shutdown");
        }
    }

    pub fn submit_preview(&self, frame: PreviewFrame) {
        if self.preview_tx.send(frame).is_err() {
            debug!(target: "render.queue", "preview_submit_after_shutdown");
        }
    }

    pub fn pause(&self) {
        let _ = self.ctrl_tx.send(Control::Pause);
    }

    pub fn resume(&self) {
        let _ = self.ctrl_tx.send(Control::Resume);
    }

    /// Render exactly one frame while paused.
    pub fn step(&self) {
        let _ = self.ctrl_tx.send(Control::Step);
    }

    /// Drop the held frame and drive the chains to black.
    pub fn clear(&self) {
        let _ = self.ctrl_tx.send(Control::Clear);
    }

    pub fn shutdown(&self) {
        let _ = self.ctrl_tx.send(Control::Shutdown);
    }
}

/// Shared view of the last composited zone spans, in logical pixel
/// order. Transitions capture their `from` state here.
#[derive(Clone, Default)]
pub struct SharedComposite {
    inner: Arc<Mutex<BTreeMap<ZoneId, Vec<Rgb>>>>,
}

impl SharedComposite {
    pub fn snapshot(&self) -> BTreeMap<ZoneId, Vec<Rgb>> {
        self.inner.lock().expect("composite poisoned").clone()
    }

    fn store(&self, spans: BTreeMap<ZoneId, Vec<Rgb>>) {
        *self.inner.lock().expect("composite poisoned") = spans;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameManagerConfig {
    pub fps: u32,
}

impl Default for FrameManagerConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}

pub struct FrameManager {
    chains: Vec<ChainState>,
    preview: Option<PreviewState>,
    statics_fn: StaticColorsFn,
    main_queue: PriorityQueues<Frame>,
    preview_queue: PriorityQueues<PreviewFrame>,
    main_rx: mpsc::UnboundedReceiver<Frame>,
    preview_rx: mpsc::UnboundedReceiver<PreviewFrame>,
    ctrl_rx: mpsc::UnboundedReceiver<Control>,
    paused: bool,
    step_pending: bool,
    metrics: Arc<RenderMetrics>,
    composite: SharedComposite,
    frame_duration: Duration,
}

impl FrameManager {
    pub fn new(
        chains: Vec<ChainBinding>,
        preview: Option<Arc<dyn Chain>>,
        statics_fn: StaticColorsFn,
        config: FrameManagerConfig,
    ) -> (Self, FrameSink) {
        let (main_tx, main_rx) = mpsc::unbounded_channel();
        let (preview_tx, preview_rx) = mpsc::unbounded_channel();
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let chains = chains
            .into_iter()
            .map(|binding| {
                let len = binding.chain.pixel_count();
                ChainState {
                    binding,
                    last_rendered: vec![Rgb::BLACK; len],
                    last_applied: None,
                    last_apply_at: None,
                }
            })
            .collect();
        let manager = Self {
            chains,
            preview: preview.map(|chain| PreviewState {
                chain,
                last_applied: None,
            }),
            statics_fn,
            main_queue: PriorityQueues::new(),
            preview_queue: PriorityQueues::new(),
            main_rx,
            preview_rx,
            ctrl_rx,
            paused: false,
            step_pending: false,
            metrics: Arc::new(RenderMetrics::new()),
            composite: SharedComposite::default(),
            frame_duration: Duration::from_secs(1) / config.fps.max(1),
        };
        let sink = FrameSink {
            main_tx,
            preview_tx,
            ctrl_tx,
        };
        (manager, sink)
    }

    pub fn metrics(&self) -> Arc<RenderMetrics> {
        self.metrics.clone()
    }

    pub fn composite(&self) -> SharedComposite {
        self.composite.clone()
    }

    /// One scheduler tick. Returns `false` once shutdown was requested.
    pub fn tick(&mut self, now: Instant) -> bool {
        use std::sync::atomic::Ordering::Relaxed;

        self.metrics.ticks.fetch_add(1, Relaxed);

        while let Ok(ctrl) = self.ctrl_rx.try_recv() {
            match ctrl {
                Control::Pause => {
                    info!(target: "render.loop", "paused");
                    self.paused = true;
                }
                Control::Resume => {
                    info!(target: "render.loop", "resumed");
                    self.paused = false;
                    self.step_pending = false;
                }
                Control::Step => self.step_pending = true,
                Control::Clear => {
                    for chain in &mut self.chains {
                        chain.last_rendered.fill(Rgb::BLACK);
                        chain.last_applied = None;
                    }
                    debug!(target: "render.loop", "hold_cleared");
                }
                Control::Shutdown => {
                    info!(target: "render.loop", "shutdown_requested");
                    return false;
                }
            }
        }

        while let Ok(frame) = self.main_rx.try_recv() {
            let overwritten = self.main_queue.push(frame);
            self.metrics.overwritten.fetch_add(overwritten, Relaxed);
        }
        while let Ok(frame) = self.preview_rx.try_recv() {
            let overwritten = self.preview_queue.push(frame);
            self.metrics.overwritten.fetch_add(overwritten, Relaxed);
        }

        let expired =
            self.main_queue.evict_expired(now) + self.preview_queue.evict_expired(now);
        self.metrics.expired.fetch_add(expired, Relaxed);
        self.metrics.set_holding(self.main_queue.depths());

        if self.paused && !self.step_pending {
            return true;
        }

        let selected = self.main_queue.take_newest(now);
        let render_new = selected.is_some();
        if let Some(frame) = &selected {
            let statics = (self.statics_fn)();
            for chain in &mut self.chains {
                chain.last_rendered = compose(
                    &chain.last_rendered,
                    &chain.binding.mapper,
                    frame,
                    &statics,
                );
            }
        }

        // at most one apply per chain per tick; a transfer error ends the
        // tick and the next one retries with a fresh composite
        for chain in &mut self.chains {
            if chain.last_applied.as_deref() == Some(chain.last_rendered.as_slice()) {
                if render_new {
                    self.metrics.dma_skipped.fetch_add(1, Relaxed);
                }
                continue;
            }
            if let Some(last_at) = chain.last_apply_at {
                if now.saturating_duration_since(last_at)
                    < chain.binding.chain.min_frame_interval()
                {
                    self.metrics.spacing_deferred.fetch_add(1, Relaxed);
                    continue;
                }
            }
            match chain.binding.chain.apply_frame(&chain.last_rendered) {
                Ok(()) => {
                    chain.last_applied = Some(chain.last_rendered.clone());
                    chain.last_apply_at = Some(now);
                }
                Err(e) => {
                    self.metrics.dropped_frames.fetch_add(1, Relaxed);
                    warn!(
                        target: "render.loop",
                        chain = chain.binding.chain.id(),
                        error = %e,
                        "apply_failed_frame_dropped"
                    );
                    break;
                }
            }
        }

        let mut spans = BTreeMap::new();
        for chain in &self.chains {
            spans.extend(zone_spans(&chain.last_rendered, &chain.binding.mapper));
        }
        self.composite.store(spans);

        if render_new {
            self.metrics.frames_rendered.fetch_add(1, Relaxed);
        } else {
            self.metrics.frames_held.fetch_add(1, Relaxed);
        }
        self.metrics.record_render(now);

        if let Some(preview_frame) = self.preview_queue.take_newest(now) {
            if let Some(preview) = &mut self.preview {
                if preview.last_applied != Some(preview_frame.pixels) {
                    match preview.chain.apply_frame(&preview_frame.pixels) {
                        Ok(()) => {
                            preview.last_applied = Some(preview_frame.pixels);
                            self.metrics.preview_rendered.fetch_add(1, Relaxed);
                        }
                        Err(e) => {
                            self.metrics.dropped_frames.fetch_add(1, Relaxed);
                            warn!(
                                target: "render.loop",
                                chain = preview.chain.id(),
                                error = %e,
                                "preview_apply_failed"
                            );
                        }
                    }
                }
            }
        }

        if self.paused {
            self.step_pending = false;
        }
        true
    }

    /// The cooperative render loop at the configured cadence.
    pub async fn run(mut self) {
        info!(
            target: "render.loop",
            fps = (1.0 / self.frame_duration.as_secs_f64()).round(),
            chains = self.chains.len(),
            "frame_loop_started"
        );
        let mut interval = tokio::time::interval(self.frame_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !self.tick(Instant::now()) {
                break;
            }
        }
        info!(target: "render.loop", "frame_loop_stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
