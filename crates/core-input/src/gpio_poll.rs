//! Rotary encoder and button polling over the Pi GPIO header.
//!
//! One task per encoder and one per button, each sampling at 1 kHz
//! through the pure quadrature/debounce state machines. Setup failure
//! logs and retries with exponential backoff; the pollers can always be
//! hot-replugged without touching the scheduler.

use crate::{Backoff, Debounce, QuadratureDecoder};
use core_config::{ButtonConfig, EncoderConfig};
use core_events::{EncoderSource, Event, EventBus};
use core_hw::{GpioRegistry, PinMode};
use rppal::gpio::{Gpio, InputPin};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Spawn pollers for every configured encoder and button. Pins are
/// claimed in the registry up front; a claim conflict is fatal, an
/// rppal error is retried with backoff inside the task.
pub fn spawn_gpio_pollers(
    encoders: &[EncoderConfig],
    buttons: &[ButtonConfig],
    registry: &GpioRegistry,
    bus: Arc<EventBus>,
) -> Result<Vec<JoinHandle<()>>, core_hw::HardwareError> {
    let mut handles = Vec::new();
    for encoder in encoders {
        let source = match encoder.id.as_str() {
            "selector" => EncoderSource::Selector,
            "modulator" => EncoderSource::Modulator,
            other => {
                warn!(target: "input.encoder", id = other, "unknown_encoder_role_skipped");
                continue;
            }
        };
        registry.register(encoder.clk, format!("encoder:{}:clk", encoder.id), PinMode::Input)?;
        registry.register(encoder.dt, format!("encoder:{}:dt", encoder.id), PinMode::Input)?;
        if let Some(sw) = encoder.sw {
            registry.register(sw, format!("encoder:{}:sw", encoder.id), PinMode::Input)?;
        }
        handles.push(tokio::spawn(run_encoder(
            encoder.clone(),
            source,
            bus.clone(),
        )));
    }
    for button in buttons {
        registry.register(button.gpio, format!("button:{}", button.id), PinMode::Input)?;
        handles.push(tokio::spawn(run_button(button.clone(), bus.clone())));
    }
    Ok(handles)
}

fn open_input(gpio: &Gpio, pin: u8) -> Result<InputPin, rppal::gpio::Error> {
    Ok(gpio.get(pin)?.into_input_pullup())
}

async fn run_encoder(config: EncoderConfig, source: EncoderSource, bus: Arc<EventBus>) {
    let mut backoff = Backoff::adapter();
    loop {
        let pins = Gpio::new().and_then(|gpio| {
            let clk = open_input(&gpio, config.clk)?;
            let dt = open_input(&gpio, config.dt)?;
            let sw = config.sw.map(|pin| open_input(&gpio, pin)).transpose()?;
            Ok((clk, dt, sw))
        });
        let (clk, dt, sw) = match pins {
            Ok(pins) => pins,
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    target: "input.encoder",
                    id = config.id.as_str(),
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "encoder_setup_failed_backing_off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        backoff.reset();
        info!(target: "input.encoder", id = config.id.as_str(), "encoder_poller_started");

        let mut decoder = QuadratureDecoder::new(clk.is_high(), dt.is_high());
        let mut push = sw
            .as_ref()
            .map(|pin| Debounce::new(crate::debounce::DEFAULT_SETTLE, pin.is_low()));
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let detents = decoder.update(clk.is_high(), dt.is_high());
            if detents != 0 {
                debug!(target: "input.encoder", id = config.id.as_str(), detents, "rotation");
                bus.publish(Event::EncoderRotated {
                    encoder: source,
                    delta: detents,
                })
                .await;
            }
            if let (Some(debounce), Some(pin)) = (push.as_mut(), sw.as_ref()) {
                // pull-up wiring: pressed reads low
                if debounce.update(pin.is_low(), Instant::now()) == Some(true) {
                    bus.publish(Event::ButtonPressed {
                        button: format!("{}:push", config.id),
                    })
                    .await;
                }
            }
        }
    }
}

async fn run_button(config: ButtonConfig, bus: Arc<EventBus>) {
    let mut backoff = Backoff::adapter();
    loop {
        let pin = match Gpio::new().and_then(|gpio| open_input(&gpio, config.gpio)) {
            Ok(pin) => pin,
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    target: "input.button",
                    id = config.id.as_str(),
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "button_setup_failed_backing_off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        backoff.reset();
        info!(target: "input.button", id = config.id.as_str(), "button_poller_started");

        let mut debounce = Debounce::new(crate::debounce::DEFAULT_SETTLE, pin.is_low());
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if debounce.update(pin.is_low(), Instant::now()) == Some(true) {
                debug!(target: "input.button", id = config.id.as_str(), "press");
                bus.publish(Event::ButtonPressed {
                    button: config.id.clone(),
                })
                .await;
            }
        }
    }
}
