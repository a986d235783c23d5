//! In-memory chain for tests and host-side development.

use crate::{min_frame_interval, Chain, HardwareError};
use core_color::Rgb;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Records every applied frame with its arrival time. `fail_next` makes
/// the following transfer refuse, for dropped-frame paths.
pub struct MockChain {
    id: String,
    pixel_count: usize,
    applied: Mutex<Vec<(Instant, Vec<Rgb>)>>,
    fail_next: AtomicBool,
}

impl MockChain {
    pub fn new(id: impl Into<String>, pixel_count: usize) -> Self {
        Self {
            id: id.into(),
            pixel_count,
            applied: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn fail_next_transfer(&self) {
        self.fail_next.store(true, Relaxed);
    }

    pub fn applied_frames(&self) -> Vec<Vec<Rgb>> {
        self.applied
            .lock()
            .expect("mock chain poisoned")
            .iter()
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn applied_with_times(&self) -> Vec<(Instant, Vec<Rgb>)> {
        self.applied.lock().expect("mock chain poisoned").clone()
    }

    pub fn last_frame(&self) -> Option<Vec<Rgb>> {
        self.applied
            .lock()
            .expect("mock chain poisoned")
            .last()
            .map(|(_, f)| f.clone())
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().expect("mock chain poisoned").len()
    }
}

impl Chain for MockChain {
    fn id(&self) -> &str {
        &self.id
    }

    fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    fn min_frame_interval(&self) -> Duration {
        min_frame_interval(self.pixel_count)
    }

    fn apply_frame(&self, pixels: &[Rgb]) -> Result<(), HardwareError> {
        if pixels.len() != self.pixel_count {
            return Err(HardwareError::Transfer {
                chain: self.id.clone(),
                message: format!(
                    "buffer length {} does not match chain length {}",
                    pixels.len(),
                    self.pixel_count
                ),
            });
        }
        if self.fail_next.swap(false, Relaxed) {
            return Err(HardwareError::Transfer {
                chain: self.id.clone(),
                message: "injected failure".to_string(),
            });
        }
        self.applied
            .lock()
            .expect("mock chain poisoned")
            .push((Instant::now(), pixels.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_frames_and_injected_failures() {
        let chain = MockChain::new("test", 4);
        chain.apply_frame(&[Rgb(1, 2, 3); 4]).unwrap();
        chain.fail_next_transfer();
        assert!(chain.apply_frame(&[Rgb::BLACK; 4]).is_err());
        chain.apply_frame(&[Rgb::BLACK; 4]).unwrap();
        assert_eq!(chain.apply_count(), 2);
        assert_eq!(chain.last_frame().unwrap(), vec![Rgb::BLACK; 4]);
    }

    #[test]
    fn wrong_length_is_a_transfer_error() {
        let chain = MockChain::new("test", 4);
        assert!(chain.apply_frame(&[Rgb::BLACK; 3]).is_err());
    }

    #[test]
    fn clear_applies_black() {
        let chain = MockChain::new("test", 3);
        chain.apply_frame(&[Rgb(9, 9, 9); 3]).unwrap();
        chain.clear().unwrap();
        assert_eq!(chain.last_frame().unwrap(), vec![Rgb::BLACK; 3]);
    }
}
