//! Utterance segmentation via dual-threshold hysteresis.
//!
//! Buffering a window of lead-in padding means the decoder receives
//! speech context from slightly before the detected onset, and the
//! dual thresholds keep isolated misclassified frames from flapping
//! the state.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::FRAME_DURATION_MS;
use crate::source::{AudioFrame, FrameSource, SourceError};
use crate::vad::SpeechDetector;

/// One element of the segmented event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum UtteranceEvent {
    /// Audio belonging to the current utterance.
    Frame(AudioFrame),
    /// End of the current utterance. Carries no payload.
    Boundary,
}

/// Bounded FIFO of classified frames. Pushing past capacity evicts the
/// oldest entry.
struct RingWindow {
    entries: VecDeque<(AudioFrame, bool)>,
    capacity: usize,
}

impl RingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, frame: AudioFrame, is_speech: bool) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((frame, is_speech));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn voiced(&self) -> usize {
        self.entries.iter().filter(|(_, speech)| *speech).count()
    }

    fn unvoiced(&self) -> usize {
        self.entries.iter().filter(|(_, speech)| !*speech).count()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Empties the window, yielding frames oldest-first.
    fn drain(&mut self) -> impl Iterator<Item = AudioFrame> + '_ {
        self.entries.drain(..).map(|(frame, _)| frame)
    }
}

/// Segments a frame stream into utterances.
///
/// Idle: classified frames accumulate in the ring window; once more
/// than `trigger_ratio` of the window capacity is voiced, the whole
/// window is flushed in original order (lead-in padding included) and
/// the segmenter is triggered. Triggered: frames pass through
/// unbuffered; once more than `trigger_ratio` of the window is
/// unvoiced, a single [`UtteranceEvent::Boundary`] is emitted and the
/// state returns to idle.
///
/// Both comparisons are strict and measured against the full window
/// capacity, even while the window is still filling, so a ratio
/// exactly at the threshold never flips the state.
pub struct UtteranceSegmenter {
    source: Box<dyn FrameSource>,
    detector: Box<dyn SpeechDetector>,
    window: RingWindow,
    trigger_ratio: f32,
    triggered: bool,
    ready: VecDeque<UtteranceEvent>,
    finished: bool,
}

impl UtteranceSegmenter {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn SpeechDetector>,
        padding_ms: u64,
        trigger_ratio: f32,
    ) -> Self {
        let capacity = (padding_ms / FRAME_DURATION_MS).max(1) as usize;
        Self {
            source,
            detector,
            window: RingWindow::new(capacity),
            trigger_ratio,
            triggered: false,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    fn over_threshold(&self, count: usize) -> bool {
        count as f32 > self.trigger_ratio * self.window.capacity as f32
    }

    fn ingest(&mut self, frame: AudioFrame, is_speech: bool) {
        if !self.triggered {
            self.window.push(frame, is_speech);
            if self.over_threshold(self.window.voiced()) {
                self.triggered = true;
                debug!(buffered = self.window.len(), "segmenter triggered");
                self.ready
                    .extend(self.window.drain().map(UtteranceEvent::Frame));
            }
        } else {
            self.ready.push_back(UtteranceEvent::Frame(frame.clone()));
            self.window.push(frame, is_speech);
            if self.over_threshold(self.window.unvoiced()) {
                self.triggered = false;
                debug!("segmenter released");
                self.ready.push_back(UtteranceEvent::Boundary);
                self.window.clear();
            }
        }
    }
}

impl Iterator for UtteranceSegmenter {
    type Item = UtteranceEvent;

    fn next(&mut self) -> Option<UtteranceEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(SourceError::Exhausted) => {
                    debug!("frame source exhausted");
                    self.finished = true;
                    continue;
                }
                Err(err) => {
                    warn!(%err, "frame source failed, ending segmentation");
                    self.finished = true;
                    continue;
                }
            };
            // A frame the oracle cannot accept ends the stream.
            if frame.samples.len() < self.detector.min_frame_samples() {
                debug!(
                    len = frame.samples.len(),
                    "short frame, ending segmentation"
                );
                self.finished = true;
                continue;
            }
            let is_speech = match self.detector.is_speech(&frame.samples) {
                Ok(flag) => flag,
                Err(err) => {
                    warn!(%err, "detector rejected frame, ending segmentation");
                    self.finished = true;
                    continue;
                }
            };
            self.ingest(frame, is_speech);
        }
    }
}
