//! Input adapters: keyboard (always available) and GPIO encoders and
//! buttons (behind the `hardware` feature).
//!
//! Adapters translate raw input into bus events and nothing else; the
//! controllers decide what a rotation or keypress means. Every adapter
//! is failure-isolated: an I/O error logs and backs off, it never
//! reaches the scheduler.

pub mod backoff;
pub mod debounce;
#[cfg(feature = "hardware")]
pub mod gpio_poll;
pub mod keyboard;
pub mod quadrature;

pub use backoff::Backoff;
pub use debounce::Debounce;
#[cfg(feature = "hardware")]
pub use gpio_poll::spawn_gpio_pollers;
pub use keyboard::{spawn_keyboard_task, KeyboardShutdown};
pub use quadrature::QuadratureDecoder;
