//! Frame manager behavior against the mock chain: priority selection,
//! expiry, hold-last, pause/step, transfer-failure recovery, and the
//! per-chain spacing/skip rules.

use core_color::Rgb;
use core_hw::{Chain, MockChain};
use core_model::{
    Frame, FrameSource, PreviewFrame, Priority, ZoneConfig, ZoneId, ZoneMapper,
};
use core_render::{ChainBinding, FrameManager, FrameManagerConfig, FrameSink, StaticColorsFn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Statics = Arc<Mutex<Vec<(ZoneId, Rgb)>>>;

fn zone(id: &str, start: usize, count: usize) -> ZoneConfig {
    ZoneConfig {
        id: ZoneId::from(id),
        display_name: id.to_string(),
        pixel_count: count,
        enabled: true,
        reversed: false,
        order: start,
        gpio: 18,
        start_index: start,
    }
}

fn setup() -> (FrameManager, FrameSink, Arc<MockChain>, Statics) {
    let chain = Arc::new(MockChain::new("main", 6));
    let mapper = ZoneMapper::new(&[zone("A", 0, 3), zone("B", 3, 3)], 6).unwrap();
    let statics: Statics = Arc::new(Mutex::new(Vec::new()));
    let statics_fn: StaticColorsFn = {
        let statics = statics.clone();
        Arc::new(move || statics.lock().unwrap().clone())
    };
    let binding = ChainBinding {
        chain: chain.clone() as Arc<dyn Chain>,
        mapper,
    };
    let (manager, sink) = FrameManager::new(
        vec![binding],
        None,
        statics_fn,
        FrameManagerConfig::default(),
    );
    (manager, sink, chain, statics)
}

#[test]
fn highest_priority_frame_wins_the_tick() {
    let (mut manager, sink, chain, _) = setup();
    sink.submit(Frame::full_strip(Rgb(1, 0, 0), Priority::Manual, FrameSource::Api));
    sink.submit(Frame::full_strip(
        Rgb(0, 2, 0),
        Priority::Transition,
        FrameSource::Transition,
    ));
    manager.tick(Instant::now());
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(0, 2, 0); 6]);
    assert_eq!(manager.metrics().snapshot().frames_rendered, 1);
}

#[test]
fn newest_frame_within_a_priority_wins() {
    let (mut manager, sink, chain, _) = setup();
    sink.submit(Frame::full_strip(Rgb(1, 0, 0), Priority::Manual, FrameSource::Api));
    sink.submit(Frame::full_strip(Rgb(2, 0, 0), Priority::Manual, FrameSource::Api));
    manager.tick(Instant::now());
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(2, 0, 0); 6]);
}

#[test]
fn expired_high_priority_frame_yields_to_live_lower_one() {
    let (mut manager, sink, chain, _) = setup();
    sink.submit(
        Frame::full_strip(Rgb(0, 2, 0), Priority::Transition, FrameSource::Transition)
            .with_ttl(Duration::from_millis(10)),
    );
    sink.submit(Frame::full_strip(Rgb(1, 0, 0), Priority::Manual, FrameSource::Api));
    manager.tick(Instant::now() + Duration::from_millis(50));
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(1, 0, 0); 6]);
    assert_eq!(manager.metrics().snapshot().expired, 1);
}

#[test]
fn one_apply_per_chain_per_tick() {
    let (mut manager, sink, chain, _) = setup();
    for i in 0..5 {
        sink.submit(Frame::full_strip(Rgb(i, 0, 0), Priority::Manual, FrameSource::Api));
    }
    manager.tick(Instant::now());
    assert_eq!(chain.apply_count(), 1);
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(4, 0, 0); 6]);
}

#[test]
fn hold_last_keeps_the_strip_without_retransmit() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    sink.submit(Frame::full_strip(Rgb(5, 5, 5), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    assert_eq!(chain.apply_count(), 1);

    manager.tick(start + Duration::from_millis(20));
    manager.tick(start + Duration::from_millis(40));
    // held, identical: nothing re-sent to the chain
    assert_eq!(chain.apply_count(), 1);
    let metrics = manager.metrics().snapshot();
    assert_eq!(metrics.frames_held, 2);
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(5, 5, 5); 6]);
}

#[test]
fn identical_new_composite_skips_dma() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    sink.submit(Frame::full_strip(Rgb(5, 5, 5), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    sink.submit(Frame::full_strip(Rgb(5, 5, 5), Priority::Manual, FrameSource::Api));
    manager.tick(start + Duration::from_millis(20));
    assert_eq!(chain.apply_count(), 1);
    let metrics = manager.metrics().snapshot();
    assert_eq!(metrics.dma_skipped, 1);
    assert_eq!(metrics.frames_rendered, 2);
}

#[test]
fn paused_manager_enqueues_but_does_not_render() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    sink.pause();
    sink.submit(Frame::full_strip(Rgb(1, 1, 1), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    assert_eq!(chain.apply_count(), 0);

    // one step renders exactly one frame
    sink.step();
    manager.tick(start + Duration::from_millis(5));
    assert_eq!(chain.apply_count(), 1);

    // still paused afterwards
    sink.submit(Frame::full_strip(Rgb(2, 2, 2), Priority::Manual, FrameSource::Api));
    manager.tick(start + Duration::from_millis(10));
    assert_eq!(chain.apply_count(), 1);

    sink.resume();
    manager.tick(start + Duration::from_millis(15));
    assert_eq!(chain.apply_count(), 2);
}

#[test]
fn transfer_failure_drops_frame_and_recovers_next_tick() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    chain.fail_next_transfer();
    sink.submit(Frame::full_strip(Rgb(3, 3, 3), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    assert_eq!(chain.apply_count(), 0);
    assert_eq!(manager.metrics().snapshot().dropped_frames, 1);

    // hold-last path re-applies the composite on the next tick
    manager.tick(start + Duration::from_millis(20));
    assert_eq!(chain.apply_count(), 1);
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(3, 3, 3); 6]);
}

#[test]
fn ticks_inside_min_frame_interval_defer_the_apply() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    sink.submit(Frame::full_strip(Rgb(1, 1, 1), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    assert_eq!(chain.apply_count(), 1);

    // 6-pixel chain: min interval is tiny but nonzero; 10 µs later is
    // still inside it
    sink.submit(Frame::full_strip(Rgb(2, 2, 2), Priority::Manual, FrameSource::Api));
    manager.tick(start + Duration::from_micros(10));
    assert_eq!(chain.apply_count(), 1);
    assert_eq!(manager.metrics().snapshot().spacing_deferred, 1);

    // past the interval the deferred composite goes out via hold-last
    manager.tick(start + Duration::from_millis(10));
    assert_eq!(chain.apply_count(), 2);
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb(2, 2, 2); 6]);
}

#[test]
fn animation_zone_frame_merges_live_static_colors() {
    let (mut manager, sink, chain, statics) = setup();
    statics
        .lock()
        .unwrap()
        .push((ZoneId::from("B"), Rgb(9, 9, 9)));
    let mut colors = BTreeMap::new();
    colors.insert(ZoneId::from("A"), Rgb(1, 1, 1));
    sink.submit(Frame::zones(colors, Priority::Animation, FrameSource::Animation));
    manager.tick(Instant::now());
    let out = chain.last_frame().unwrap();
    assert_eq!(&out[0..3], &[Rgb(1, 1, 1); 3]);
    assert_eq!(&out[3..6], &[Rgb(9, 9, 9); 3]);
}

#[test]
fn clear_control_blanks_the_chain() {
    let (mut manager, sink, chain, _) = setup();
    let start = Instant::now();
    sink.submit(Frame::full_strip(Rgb(5, 5, 5), Priority::Manual, FrameSource::Api));
    manager.tick(start);
    sink.clear();
    manager.tick(start + Duration::from_millis(20));
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb::BLACK; 6]);
}

#[test]
fn shutdown_stops_the_loop() {
    let (mut manager, sink, _, _) = setup();
    sink.shutdown();
    assert!(!manager.tick(Instant::now()));
}

#[test]
fn preview_selection_is_independent_of_main() {
    let chain = Arc::new(MockChain::new("main", 6));
    let preview = Arc::new(MockChain::new("preview", 8));
    let mapper = ZoneMapper::new(&[zone("A", 0, 3), zone("B", 3, 3)], 6).unwrap();
    let statics_fn: StaticColorsFn = Arc::new(Vec::new);
    let (mut manager, sink) = FrameManager::new(
        vec![ChainBinding {
            chain: chain.clone() as Arc<dyn Chain>,
            mapper,
        }],
        Some(preview.clone() as Arc<dyn Chain>),
        statics_fn,
        FrameManagerConfig::default(),
    );

    sink.submit_preview(PreviewFrame::solid(
        Rgb(4, 4, 4),
        Priority::Manual,
        FrameSource::Controller,
    ));
    manager.tick(Instant::now());
    assert_eq!(preview.last_frame().unwrap(), vec![Rgb(4, 4, 4); 8]);
    // no main frame was submitted: the main chain only got its initial
    // blanking apply, untouched by the preview path
    assert_eq!(chain.apply_count(), 1);
    assert_eq!(chain.last_frame().unwrap(), vec![Rgb::BLACK; 6]);
    assert_eq!(manager.metrics().snapshot().preview_rendered, 1);
}

#[test]
fn composite_snapshot_exposes_zone_spans() {
    let (mut manager, sink, _, _) = setup();
    let composite = manager.composite();
    sink.submit(Frame::full_strip(Rgb(3, 2, 1), Priority::Manual, FrameSource::Api));
    manager.tick(Instant::now());
    let spans = composite.snapshot();
    assert_eq!(spans[&ZoneId::from("A")], vec![Rgb(3, 2, 1); 3]);
    assert_eq!(spans[&ZoneId::from("B")], vec![Rgb(3, 2, 1); 3]);
}
