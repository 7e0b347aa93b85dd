//! The producer loop tying source, segmenter and driver together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{error, info};

use crate::driver::DecodeDriver;
use crate::segmenter::UtteranceSegmenter;

/// Runs the capture → segment → decode flow on one thread until the
/// source is exhausted, the driver gives up, or the stop flag is
/// raised.
pub struct PipelineWorker {
    segmenter: UtteranceSegmenter,
    driver: DecodeDriver,
    stop: Arc<AtomicBool>,
}

impl PipelineWorker {
    pub fn new(segmenter: UtteranceSegmenter, driver: DecodeDriver, stop: Arc<AtomicBool>) -> Self {
        Self {
            segmenter,
            driver,
            stop,
        }
    }

    /// The stop flag is checked between events, never mid-feed or
    /// mid-decode.
    pub fn run(mut self) {
        info!("audio pipeline started");
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested, ending pipeline");
                break;
            }
            let Some(event) = self.segmenter.next() else {
                info!("frame stream ended");
                break;
            };
            if let Err(err) = self.driver.handle(event, Instant::now()) {
                error!(%err, "decode driver stopped");
                break;
            }
        }
        info!("audio pipeline stopped");
    }
}
