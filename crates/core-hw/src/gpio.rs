//! Process-global GPIO ownership registry.
//!
//! Every component that claims a pin registers it here first. Double
//! registration is refused, which turns a mis-wired config into a clean
//! startup failure instead of two drivers fighting over one pin. Release
//! happens in reverse registration order during shutdown, after the
//! chains have been driven to black.

use crate::HardwareError;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    Input,
    Pwm,
}

impl PinMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            PinMode::Output => "output",
            PinMode::Input => "input",
            PinMode::Pwm => "pwm",
        }
    }
}

#[derive(Debug, Clone)]
struct PinClaim {
    pin: u8,
    owner: String,
    mode: PinMode,
}

#[derive(Debug, Default)]
pub struct GpioRegistry {
    claims: Mutex<Vec<PinClaim>>,
}

impl GpioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        pin: u8,
        owner: impl Into<String>,
        mode: PinMode,
    ) -> Result<(), HardwareError> {
        let owner = owner.into();
        let mut claims = self.claims.lock().expect("gpio registry poisoned");
        if let Some(existing) = claims.iter().find(|c| c.pin == pin) {
            warn!(
                target: "hw.gpio",
                pin,
                owner = owner.as_str(),
                held_by = existing.owner.as_str(),
                "pin_conflict"
            );
            return Err(HardwareError::PinInUse {
                pin,
                owner: existing.owner.clone(),
            });
        }
        info!(
            target: "hw.gpio",
            pin,
            owner = owner.as_str(),
            mode = mode.as_str(),
            "pin_registered"
        );
        claims.push(PinClaim { pin, owner, mode });
        Ok(())
    }

    pub fn owner_of(&self, pin: u8) -> Option<String> {
        self.claims
            .lock()
            .expect("gpio registry poisoned")
            .iter()
            .find(|c| c.pin == pin)
            .map(|c| c.owner.clone())
    }

    /// Release every pin in reverse registration order. Called once at
    /// shutdown; idempotent.
    pub fn release_all(&self) {
        let mut claims = self.claims.lock().expect("gpio registry poisoned");
        while let Some(claim) = claims.pop() {
            info!(
                target: "hw.gpio",
                pin = claim.pin,
                owner = claim.owner.as_str(),
                mode = claim.mode.as_str(),
                "pin_released"
            );
        }
    }

    pub fn claimed_pins(&self) -> Vec<u8> {
        self.claims
            .lock()
            .expect("gpio registry poisoned")
            .iter()
            .map(|c| c.pin)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_registration_is_refused() {
        let registry = GpioRegistry::new();
        registry.register(18, "chain:main", PinMode::Pwm).unwrap();
        let err = registry.register(18, "button:power", PinMode::Input);
        match err {
            Err(HardwareError::PinInUse { pin, owner }) => {
                assert_eq!(pin, 18);
                assert_eq!(owner, "chain:main");
            }
            other => panic!("expected PinInUse, got {other:?}"),
        }
    }

    #[test]
    fn release_all_empties_in_reverse() {
        let registry = GpioRegistry::new();
        registry.register(18, "chain:main", PinMode::Pwm).unwrap();
        registry.register(13, "chain:lamp", PinMode::Pwm).unwrap();
        assert_eq!(registry.claimed_pins(), vec![18, 13]);
        registry.release_all();
        assert!(registry.claimed_pins().is_empty());
        // registration works again after release
        registry.register(18, "chain:main", PinMode::Pwm).unwrap();
    }
}
