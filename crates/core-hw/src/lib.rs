//! Hardware surface: GPIO ownership and the LED chain drivers.
//!
//! A `Chain` exclusively owns one DMA-driven pixel chain. `apply_frame`
//! accepts a canonical RGB buffer for the whole chain and must not block
//! the scheduler thread: the WS281x implementation hands the buffer to a
//! dedicated worker thread and returns once it is accepted. A refused
//! transfer surfaces as `HardwareError` and the caller treats the frame
//! as dropped; the next tick retries with a fresh composite.

use core_color::Rgb;
use std::time::Duration;

pub mod gpio;
pub mod mock;
#[cfg(feature = "hardware")]
pub mod ws281x;

pub use gpio::{GpioRegistry, PinMode};
pub use mock::MockChain;
#[cfg(feature = "hardware")]
pub use ws281x::Ws281xChain;

/// WS281x wire timing: 24 bits per pixel at 1.25 µs per bit, plus the
/// low reset latch.
pub const BIT_TIME_NS: u64 = 1_250;
pub const BITS_PER_PIXEL: u64 = 24;
pub const RESET_TIME_US: u64 = 50;

/// Minimum spacing between two transfers on one chain: full transfer
/// time plus the reset latch. 90 pixels ⇒ 2.75 ms.
pub fn min_frame_interval(pixel_count: usize) -> Duration {
    let transfer_ns = pixel_count as u64 * BITS_PER_PIXEL * BIT_TIME_NS;
    Duration::from_nanos(transfer_ns) + Duration::from_micros(RESET_TIME_US)
}

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("gpio pin {pin} already owned by {owner}")]
    PinInUse { pin: u8, owner: String },
    #[error("chain `{chain}` failed to initialize: {message}")]
    Init { chain: String, message: String },
    #[error("chain `{chain}` refused transfer: {message}")]
    Transfer { chain: String, message: String },
    #[error("chain `{chain}` worker is gone")]
    Disconnected { chain: String },
}

/// One physical LED chain. Implementations serialize writes internally;
/// there is exactly one writer at a time per chain.
pub trait Chain: Send + Sync {
    fn id(&self) -> &str;

    fn pixel_count(&self) -> usize;

    /// Minimum wall-clock spacing between two `apply_frame` calls.
    fn min_frame_interval(&self) -> Duration;

    /// Write the full buffer and trigger one DMA transfer. `pixels` must
    /// be exactly `pixel_count` long; color-order remapping happens
    /// inside the driver.
    fn apply_frame(&self, pixels: &[Rgb]) -> Result<(), HardwareError>;

    fn clear(&self) -> Result<(), HardwareError> {
        self.apply_frame(&vec![Rgb::BLACK; self.pixel_count()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_frame_interval_for_ninety_pixels() {
        // 90 px × 24 bit × 1.25 µs + 50 µs = 2.75 ms
        assert_eq!(min_frame_interval(90), Duration::from_micros(2_750));
    }

    #[test]
    fn min_frame_interval_scales_with_length() {
        assert!(min_frame_interval(144) > min_frame_interval(90));
        assert_eq!(min_frame_interval(0), Duration::from_micros(RESET_TIME_US));
    }
}
