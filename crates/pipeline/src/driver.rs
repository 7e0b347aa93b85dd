//! Streaming decode driver: session lifecycle, partial pacing and
//! result emission.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, PipelineConfig};
use crate::decode::{DecodeEngine, DecodeError, DecodeSession};
use crate::event::ResultEvent;
use crate::segmenter::UtteranceEvent;
use crate::source::AudioFrame;

/// Drives exactly one decode session at a time over the segmented
/// event stream.
///
/// Frames are fed into the current session, with at most one partial
/// decode requested per pacing interval regardless of frame arrival
/// rate. A boundary finalizes the session and rotates in a fresh one;
/// the fresh session exists before the old one is finalized, so no
/// frame can ever land in a finalized session.
pub struct DecodeDriver {
    engine: Box<dyn DecodeEngine>,
    session: Box<dyn DecodeSession>,
    partial_interval: Duration,
    last_partial_at: Instant,
    policy: FailurePolicy,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    results: UnboundedSender<ResultEvent>,
}

impl DecodeDriver {
    /// Creates the driver and its first session. `now` seeds the
    /// pacing clock; callers pass `Instant::now()`.
    pub fn new(
        engine: Box<dyn DecodeEngine>,
        config: &PipelineConfig,
        results: UnboundedSender<ResultEvent>,
        now: Instant,
    ) -> Result<Self, DecodeError> {
        let session = engine.create_session()?;
        Ok(Self {
            engine,
            session,
            partial_interval: Duration::from_millis(config.partial_interval_ms),
            last_partial_at: now,
            policy: config.failure_policy,
            max_consecutive_failures: config.max_consecutive_failures,
            consecutive_failures: 0,
            results,
        })
    }

    /// Processes one segmented event. An error means the driver has
    /// given up and the pipeline should stop.
    pub fn handle(&mut self, event: UtteranceEvent, now: Instant) -> Result<(), DecodeError> {
        let outcome = match event {
            UtteranceEvent::Frame(frame) => self.on_frame(&frame, now),
            UtteranceEvent::Boundary => self.on_boundary(),
        };
        match outcome {
            Ok(()) => {
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(err) => self.absorb(err),
        }
    }

    fn on_frame(&mut self, frame: &AudioFrame, now: Instant) -> Result<(), DecodeError> {
        self.session.feed(&frame.samples)?;
        if now.duration_since(self.last_partial_at) >= self.partial_interval {
            self.last_partial_at = now;
            let text = self.session.partial()?;
            if let Some(event) = ResultEvent::partial(&text) {
                debug!(%text, "partial result");
                self.publish(event);
            }
        }
        Ok(())
    }

    fn on_boundary(&mut self) -> Result<(), DecodeError> {
        let fresh = self.engine.create_session()?;
        let finished = std::mem::replace(&mut self.session, fresh);
        let text = finished.finalize()?;
        if let Some(event) = ResultEvent::final_result(&text) {
            info!(%text, "utterance finalized");
            self.publish(event);
        }
        Ok(())
    }

    fn publish(&self, event: ResultEvent) {
        if self.results.send(event).is_err() {
            debug!("result channel closed, dropping event");
        }
    }

    /// Applies the failure policy: recover with a fresh session, or
    /// give up. Recovery is bounded so a persistently failing engine
    /// cannot spin the pipeline.
    fn absorb(&mut self, err: DecodeError) -> Result<(), DecodeError> {
        self.consecutive_failures += 1;
        if self.policy == FailurePolicy::Abort {
            return Err(err);
        }
        if self.consecutive_failures > self.max_consecutive_failures {
            warn!(
                failures = self.consecutive_failures,
                "too many consecutive decode failures, giving up"
            );
            return Err(err);
        }
        warn!(%err, "decode failure, recreating session");
        match self.engine.create_session() {
            Ok(fresh) => {
                self.session = fresh;
                Ok(())
            }
            Err(create_err) => Err(create_err),
        }
    }
}
