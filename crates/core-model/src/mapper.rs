//! Zone → absolute pixel index mapping for one chain.
//!
//! Built once at startup from the validated zone configuration. The
//! mapper is the single place reversal is resolved: a reversed zone's
//! index list is emitted in decreasing absolute order, so logical pixel 0
//! always lands on the zone's last physical pixel and every consumer can
//! `zip` logical spans against `indices()` without caring.

use crate::{ZoneConfig, ZoneId};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapperError {
    #[error("zone {zone} starts at {actual} but the previous zone ends at {expected}")]
    Gap {
        zone: ZoneId,
        expected: usize,
        actual: usize,
    },
    #[error("zones cover {covered} pixels but the chain has {chain}")]
    CountMismatch { covered: usize, chain: usize },
    #[error("duplicate zone id {0}")]
    Duplicate(ZoneId),
}

#[derive(Debug, Clone)]
pub struct ZoneMapper {
    spans: BTreeMap<ZoneId, Vec<usize>>,
    ordered: Vec<ZoneId>,
    pixel_count: usize,
}

impl ZoneMapper {
    /// Build the mapping for one chain. `zones` must be the enabled zones
    /// assigned to this chain; they are sorted by `start_index` and must
    /// partition `[0, chain_pixels)` exactly.
    pub fn new(zones: &[ZoneConfig], chain_pixels: usize) -> Result<Self, MapperError> {
        let mut sorted: Vec<&ZoneConfig> = zones.iter().collect();
        sorted.sort_by_key(|z| z.start_index);

        let mut spans = BTreeMap::new();
        let mut ordered = Vec::with_capacity(sorted.len());
        let mut cursor = 0usize;
        for zone in sorted {
            if zone.start_index != cursor {
                return Err(MapperError::Gap {
                    zone: zone.id.clone(),
                    expected: cursor,
                    actual: zone.start_index,
                });
            }
            let span: Vec<usize> = if zone.reversed {
                (zone.start_index..zone.start_index + zone.pixel_count)
                    .rev()
                    .collect()
            } else {
                (zone.start_index..zone.start_index + zone.pixel_count).collect()
            };
            if spans.insert(zone.id.clone(), span).is_some() {
                return Err(MapperError::Duplicate(zone.id.clone()));
            }
            ordered.push(zone.id.clone());
            cursor += zone.pixel_count;
        }
        if cursor != chain_pixels {
            return Err(MapperError::CountMismatch {
                covered: cursor,
                chain: chain_pixels,
            });
        }
        Ok(Self {
            spans,
            ordered,
            pixel_count: chain_pixels,
        })
    }

    /// Absolute indices for a zone, logical order. `None` for zones on
    /// other chains.
    pub fn indices(&self, zone: &ZoneId) -> Option<&[usize]> {
        self.spans.get(zone).map(Vec::as_slice)
    }

    /// Zone ids on this chain in physical (start index) order.
    pub fn zone_ids(&self) -> &[ZoneId] {
        &self.ordered
    }

    pub fn contains(&self, zone: &ZoneId) -> bool {
        self.spans.contains_key(zone)
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }
}
