//! Per-chain frame compositing.
//!
//! The composite seeds from the last rendered buffer, so unlisted zones
//! hold their state. Static zones are re-merged from live zone state
//! under ANIMATION frames (animating a subset must not blank the rest)
//! and under clearing pixel frames (per-zone independence survives
//! transitions). Brightness is the producer's job; the compositor never
//! scales.

use core_color::Rgb;
use core_model::{Frame, FramePayload, Priority, ZoneId, ZoneMapper};
use std::collections::BTreeMap;

/// Live effective colors of zones currently in STATIC mode.
pub type StaticColors = Vec<(ZoneId, Rgb)>;

fn fill_zone(buf: &mut [Rgb], mapper: &ZoneMapper, zone: &ZoneId, color: Rgb) {
    if let Some(span) = mapper.indices(zone) {
        for &idx in span {
            buf[idx] = color;
        }
    }
}

fn merge_static<'a>(
    buf: &mut [Rgb],
    mapper: &ZoneMapper,
    statics: &StaticColors,
    covered: impl Fn(&ZoneId) -> bool + 'a,
) {
    for (zone, color) in statics {
        if !covered(zone) {
            fill_zone(buf, mapper, zone, *color);
        }
    }
}

/// Compose one chain's buffer for `frame` on top of `last_rendered`.
pub fn compose(
    last_rendered: &[Rgb],
    mapper: &ZoneMapper,
    frame: &Frame,
    statics: &StaticColors,
) -> Vec<Rgb> {
    let mut buf = last_rendered.to_vec();
    match &frame.payload {
        FramePayload::FullStrip { color } => {
            buf.fill(*color);
        }
        FramePayload::Zones { zone_colors } => {
            if frame.meta.priority == Priority::Animation {
                merge_static(&mut buf, mapper, statics, |z| zone_colors.contains_key(z));
            }
            for (zone, color) in zone_colors {
                fill_zone(&mut buf, mapper, zone, *color);
            }
        }
        FramePayload::Pixels {
            zone_pixels,
            clear_other_zones,
        } => {
            if *clear_other_zones {
                buf.fill(Rgb::BLACK);
                merge_static(&mut buf, mapper, statics, |z| zone_pixels.contains_key(z));
            } else if frame.meta.priority == Priority::Animation {
                merge_static(&mut buf, mapper, statics, |z| zone_pixels.contains_key(z));
            }
            overlay_pixels(&mut buf, mapper, zone_pixels);
        }
    }
    buf
}

fn overlay_pixels(
    buf: &mut [Rgb],
    mapper: &ZoneMapper,
    zone_pixels: &BTreeMap<ZoneId, Vec<Rgb>>,
) {
    for (zone, pixels) in zone_pixels {
        if let Some(span) = mapper.indices(zone) {
            // span is already in logical order (reversal resolved)
            for (&idx, px) in span.iter().zip(pixels.iter()) {
                buf[idx] = *px;
            }
        }
    }
}

/// Extract per-zone logical spans from a composed chain buffer. Used to
/// snapshot the visible state for transitions.
pub fn zone_spans(buf: &[Rgb], mapper: &ZoneMapper) -> BTreeMap<ZoneId, Vec<Rgb>> {
    mapper
        .zone_ids()
        .iter()
        .map(|zone| {
            let span = mapper
                .indices(zone)
                .map(|idxs| idxs.iter().map(|&i| buf[i]).collect())
                .unwrap_or_default();
            (zone.clone(), span)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{FrameSource, ZoneConfig};

    fn mapper() -> ZoneMapper {
        let zones = vec![
            ZoneConfig {
                id: ZoneId::from("A"),
                display_name: "A".into(),
                pixel_count: 3,
                enabled: true,
                reversed: false,
                order: 0,
                gpio: 18,
                start_index: 0,
            },
            ZoneConfig {
                id: ZoneId::from("B"),
                display_name: "B".into(),
                pixel_count: 3,
                enabled: true,
                reversed: true,
                order: 1,
                gpio: 18,
                start_index: 3,
            },
        ];
        ZoneMapper::new(&zones, 6).unwrap()
    }

    #[test]
    fn full_strip_overwrites_everything() {
        let frame = Frame::full_strip(Rgb(9, 9, 9), Priority::Manual, FrameSource::Api);
        let out = compose(&[Rgb::BLACK; 6], &mapper(), &frame, &vec![]);
        assert_eq!(out, vec![Rgb(9, 9, 9); 6]);
    }

    #[test]
    fn zone_frame_touches_only_listed_zones() {
        let mut colors = BTreeMap::new();
        colors.insert(ZoneId::from("A"), Rgb(1, 1, 1));
        let frame = Frame::zones(colors, Priority::Manual, FrameSource::Api);
        let seed = vec![Rgb(7, 7, 7); 6];
        let out = compose(&seed, &mapper(), &frame, &vec![]);
        assert_eq!(&out[0..3], &[Rgb(1, 1, 1); 3]);
        assert_eq!(&out[3..6], &[Rgb(7, 7, 7); 3], "unlisted zone holds");
    }

    #[test]
    fn animation_zone_frame_remerges_static_zones() {
        let mut colors = BTreeMap::new();
        colors.insert(ZoneId::from("A"), Rgb(1, 1, 1));
        let frame = Frame::zones(colors, Priority::Animation, FrameSource::Animation);
        // B is static and its live color differs from the stale seed
        let statics = vec![(ZoneId::from("B"), Rgb(5, 5, 5))];
        let out = compose(&[Rgb::BLACK; 6], &mapper(), &frame, &statics);
        assert_eq!(&out[0..3], &[Rgb(1, 1, 1); 3]);
        assert_eq!(&out[3..6], &[Rgb(5, 5, 5); 3]);
    }

    #[test]
    fn pixel_frame_honors_reversed_zones() {
        let mut pixels = BTreeMap::new();
        // logical pixel 0 of B should land on absolute index 5
        pixels.insert(ZoneId::from("B"), vec![Rgb(9, 0, 0), Rgb(0, 9, 0), Rgb(0, 0, 9)]);
        let frame = Frame::pixels(pixels, false, Priority::Animation, FrameSource::Animation);
        let out = compose(&[Rgb::BLACK; 6], &mapper(), &frame, &vec![]);
        assert_eq!(out[5], Rgb(9, 0, 0));
        assert_eq!(out[4], Rgb(0, 9, 0));
        assert_eq!(out[3], Rgb(0, 0, 9));
    }

    #[test]
    fn clearing_pixel_frame_zeroes_unlisted_but_keeps_static() {
        let mut pixels = BTreeMap::new();
        pixels.insert(ZoneId::from("A"), vec![Rgb(1, 1, 1); 3]);
        let frame = Frame::pixels(pixels, true, Priority::Transition, FrameSource::Transition);
        let statics = vec![(ZoneId::from("B"), Rgb(5, 5, 5))];
        let seed = vec![Rgb(7, 7, 7); 6];
        let out = compose(&seed, &mapper(), &frame, &statics);
        assert_eq!(&out[0..3], &[Rgb(1, 1, 1); 3]);
        // B is static: re-merged, not zeroed
        assert_eq!(&out[3..6], &[Rgb(5, 5, 5); 3]);

        // without B in statics the clear zeroes it
        let out = compose(&seed, &mapper(), &frame, &vec![]);
        assert_eq!(&out[3..6], &[Rgb::BLACK; 3]);
    }

    #[test]
    fn short_pixel_span_leaves_tail_untouched() {
        let mut pixels = BTreeMap::new();
        pixels.insert(ZoneId::from("A"), vec![Rgb(1, 1, 1)]);
        let frame = Frame::pixels(pixels, false, Priority::Manual, FrameSource::Api);
        let seed = vec![Rgb(7, 7, 7); 6];
        let out = compose(&seed, &mapper(), &frame, &vec![]);
        assert_eq!(out[0], Rgb(1, 1, 1));
        assert_eq!(out[1], Rgb(7, 7, 7));
    }

    #[test]
    fn zone_spans_round_trip_reversal() {
        let m = mapper();
        let mut buf = vec![Rgb::BLACK; 6];
        buf[5] = Rgb(9, 0, 0);
        let spans = zone_spans(&buf, &m);
        assert_eq!(spans[&ZoneId::from("B")][0], Rgb(9, 0, 0));
    }
}
