//! WS281x chain over the rpi_ws281x PWM/DMA driver.
//!
//! The underlying render call blocks until the DMA transfer completes,
//! so each chain owns a worker thread. `apply_frame` permutes the buffer
//! to wire order and hands it over a bounded channel; a full channel
//! means the previous transfer is still in flight and the frame is
//! refused (the scheduler drops it and retries next tick).

use crate::{min_frame_interval, Chain, HardwareError};
use core_color::Rgb;
use core_model::ColorOrder;
use crossbeam_channel::{bounded, Sender, TrySendError};
use rs_ws281x::{ChannelBuilder, Controller, ControllerBuilder, StripType};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct Ws281xChain {
    id: String,
    pixel_count: usize,
    interval: Duration,
    tx: Option<Sender<Vec<[u8; 4]>>>,
    worker: Option<thread::JoinHandle<()>>,
    order: ColorOrder,
}

impl Ws281xChain {
    pub fn new(
        id: impl Into<String>,
        gpio: u8,
        pixel_count: usize,
        order: ColorOrder,
        freq_hz: u32,
        dma: u8,
    ) -> Result<Self, HardwareError> {
        let id = id.into();
        let controller = ControllerBuilder::new()
            .freq(freq_hz)
            .dma(i32::from(dma))
            .channel(
                0,
                ChannelBuilder::new()
                    .pin(i32::from(gpio))
                    .count(pixel_count as i32)
                    // remap happens here, before handoff; the strip runs raw
                    .strip_type(StripType::Ws2811Rgb)
                    .brightness(255)
                    .build(),
            )
            .build()
            .map_err(|e| HardwareError::Init {
                chain: id.clone(),
                message: e.to_string(),
            })?;

        // capacity 1: at most one queued transfer behind the in-flight one
        let (tx, rx) = bounded::<Vec<[u8; 4]>>(1);
        let worker_id = id.clone();
        let worker = thread::Builder::new()
            .name(format!("chain-{id}"))
            .spawn(move || run_worker(worker_id, controller, rx))
            .map_err(|e| HardwareError::Init {
                chain: id.clone(),
                message: e.to_string(),
            })?;

        info!(target: "hw.chain", chain = id.as_str(), gpio, pixel_count, "chain_started");
        Ok(Self {
            id,
            pixel_count,
            interval: min_frame_interval(pixel_count),
            tx: Some(tx),
            worker: Some(worker),
            order,
        })
    }
}

fn run_worker(id: String, mut controller: Controller, rx: crossbeam_channel::Receiver<Vec<[u8; 4]>>) {
    while let Ok(buffer) = rx.recv() {
        let leds = controller.leds_mut(0);
        for (led, px) in leds.iter_mut().zip(buffer.iter()) {
            *led = *px;
        }
        if let Err(e) = controller.render() {
            error!(target: "hw.chain", chain = id.as_str(), error = %e, "render_failed");
        }
    }
    debug!(target: "hw.chain", chain = id.as_str(), "worker_stopped");
}

impl Chain for Ws281xChain {
    fn id(&self) -> &str {
        &self.id
    }

    fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    fn min_frame_interval(&self) -> Duration {
        self.interval
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
        // ws2811_led_t is 0xWWRRGGBB, little-endian in memory
        let buffer: Vec<[u8; 4]> = pixels
            .iter()
            .map(|px| {
                let [r, g, b] = self.order.permute(*px);
                [b, g, r, 0]
            })
            .collect();
        let tx = self.tx.as_ref().ok_or_else(|| HardwareError::Disconnected {
            chain: self.id.clone(),
        })?;
        match tx.try_send(buffer) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(HardwareError::Transfer {
                chain: self.id.clone(),
                message: "previous transfer still in flight".to_string(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(HardwareError::Disconnected {
                chain: self.id.clone(),
            }),
        }
    }
}

impl Drop for Ws281xChain {
    fn drop(&mut self) {
        // closing the channel stops the worker after the in-flight frame
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!(target: "hw.chain", chain = self.id.as_str(), "chain_stopped");
    }
}
