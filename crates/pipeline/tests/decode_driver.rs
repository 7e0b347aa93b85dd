//! Decode driver pacing, token split, session rotation and failure
//! handling, exercised with a mock engine and simulated time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uttercast_pipeline::decode::{DecodeEngine, DecodeError, DecodeSession};
use uttercast_pipeline::source::AudioFrame;
use uttercast_pipeline::{
    DecodeDriver, FRAME_SAMPLES, FailurePolicy, PipelineConfig, ResultEvent, UtteranceEvent,
};

/// Every engine call across all sessions, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Create(u32),
    Feed(u32),
    Partial(u32),
    Finalize(u32),
}

#[derive(Default)]
struct MockState {
    ops: Vec<Op>,
    sessions: u32,
    partial_text: String,
    final_text: String,
    fail_feeds: bool,
}

struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl DecodeEngine for MockEngine {
    fn create_session(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        let mut state = self.state.lock().unwrap();
        state.sessions += 1;
        let id = state.sessions;
        state.ops.push(Op::Create(id));
        Ok(Box::new(MockSession {
            id,
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    id: u32,
    state: Arc<Mutex<MockState>>,
}

impl DecodeSession for MockSession {
    fn feed(&mut self, _samples: &[i16]) -> Result<(), DecodeError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Feed(self.id));
        if state.fail_feeds {
            return Err(DecodeError::Feed("scripted failure".to_string()));
        }
        Ok(())
    }

    fn partial(&mut self) -> Result<String, DecodeError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Partial(self.id));
        Ok(state.partial_text.clone())
    }

    fn finalize(self: Box<Self>) -> Result<String, DecodeError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Finalize(self.id));
        Ok(state.final_text.clone())
    }
}

struct Harness {
    state: Arc<Mutex<MockState>>,
    driver: DecodeDriver,
    events: mpsc::UnboundedReceiver<ResultEvent>,
    start: Instant,
}

fn harness_with(config: PipelineConfig, state: MockState) -> Harness {
    let state = Arc::new(Mutex::new(state));
    let (tx, events) = mpsc::unbounded_channel();
    let start = Instant::now();
    let driver = DecodeDriver::new(
        Box::new(MockEngine {
            state: state.clone(),
        }),
        &config,
        tx,
        start,
    )
    .unwrap();
    Harness {
        state,
        driver,
        events,
        start,
    }
}

fn harness(state: MockState) -> Harness {
    harness_with(PipelineConfig::default(), state)
}

fn frame() -> UtteranceEvent {
    UtteranceEvent::Frame(AudioFrame {
        samples: vec![0i16; FRAME_SAMPLES],
    })
}

impl Harness {
    fn at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }

    fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    fn drain(&mut self) -> Vec<ResultEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

#[test]
fn partials_are_paced_not_per_frame() {
    // 100 frames over 2 simulated seconds at a steady 20ms cadence:
    // the 500ms cadence allows at most 4 partial requests.
    let mut h = harness(MockState {
        partial_text: "hello world".to_string(),
        ..MockState::default()
    });
    for i in 1..=100u64 {
        let now = h.at(i * 20);
        h.driver.handle(frame(), now).unwrap();
    }
    let partials = h
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Partial(_)))
        .count();
    assert_eq!(partials, 4);
    assert_eq!(h.drain().len(), 4);
}

#[test]
fn partial_splits_tokens_into_stable_and_unstable() {
    let mut h = harness(MockState {
        partial_text: "a b c".to_string(),
        ..MockState::default()
    });
    h.driver.handle(frame(), h.at(600)).unwrap();
    let events = h.drain();
    assert_eq!(events.len(), 1);
    let items = &events[0].results[0].items;
    assert_eq!(items.len(), 2);
    assert_eq!((items[0].transcript.as_str(), items[0].confidence), ("a b", 1.0));
    assert_eq!((items[1].transcript.as_str(), items[1].confidence), ("c", 0.5));
}

#[test]
fn empty_partial_publishes_nothing() {
    let mut h = harness(MockState::default());
    h.driver.handle(frame(), h.at(600)).unwrap();
    let partials = h
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::Partial(_)))
        .count();
    assert_eq!(partials, 1);
    assert!(h.drain().is_empty());
}

#[test]
fn boundary_rotates_sessions_and_publishes_final() {
    let mut h = harness(MockState {
        final_text: "hello world".to_string(),
        ..MockState::default()
    });
    h.driver.handle(frame(), h.at(20)).unwrap();
    h.driver.handle(UtteranceEvent::Boundary, h.at(40)).unwrap();
    h.driver.handle(frame(), h.at(60)).unwrap();

    assert_eq!(
        h.ops(),
        vec![
            Op::Create(1),
            Op::Feed(1),
            Op::Create(2),
            Op::Finalize(1),
            Op::Feed(2),
        ]
    );

    let events = h.drain();
    assert_eq!(events.len(), 1);
    assert!(events[0].results[0].is_final);
    let items = &events[0].results[0].items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].transcript, "hello world");
    assert_eq!(items[0].confidence, 1.0);
}

#[test]
fn no_feed_ever_reaches_a_finalized_session() {
    let mut h = harness(MockState {
        final_text: "ok".to_string(),
        ..MockState::default()
    });
    for burst in 0..3u64 {
        for i in 0..5u64 {
            h.driver.handle(frame(), h.at(burst * 200 + i * 20)).unwrap();
        }
        h.driver
            .handle(UtteranceEvent::Boundary, h.at(burst * 200 + 120))
            .unwrap();
    }

    let ops = h.ops();
    for (i, op) in ops.iter().enumerate() {
        if let Op::Finalize(id) = op {
            assert!(
                !ops[i..].contains(&Op::Feed(*id)),
                "session {id} was fed after finalize"
            );
        }
    }
}

#[test]
fn empty_finalize_is_suppressed() {
    let mut h = harness(MockState::default());
    h.driver.handle(frame(), h.at(20)).unwrap();
    h.driver.handle(UtteranceEvent::Boundary, h.at(40)).unwrap();
    // Rotation still happened, but nothing was published.
    assert!(h.ops().contains(&Op::Finalize(1)));
    assert!(h.ops().contains(&Op::Create(2)));
    assert!(h.drain().is_empty());
}

#[test]
fn feed_failure_recovers_with_a_fresh_session() {
    let mut h = harness(MockState {
        fail_feeds: true,
        ..MockState::default()
    });
    h.driver.handle(frame(), h.at(20)).unwrap();
    assert_eq!(h.ops(), vec![Op::Create(1), Op::Feed(1), Op::Create(2)]);

    // Once the engine behaves again, the new session serves the stream.
    h.state.lock().unwrap().fail_feeds = false;
    h.driver.handle(frame(), h.at(40)).unwrap();
    assert_eq!(h.ops().last(), Some(&Op::Feed(2)));
}

#[test]
fn repeated_failures_exhaust_the_recovery_budget() {
    let config = PipelineConfig {
        max_consecutive_failures: 3,
        ..PipelineConfig::default()
    };
    let mut h = harness_with(
        config,
        MockState {
            fail_feeds: true,
            ..MockState::default()
        },
    );
    for i in 1..=3u64 {
        assert!(h.driver.handle(frame(), h.at(i * 20)).is_ok());
    }
    assert!(h.driver.handle(frame(), h.at(80)).is_err());
}

#[test]
fn abort_policy_stops_on_first_failure() {
    let config = PipelineConfig {
        failure_policy: FailurePolicy::Abort,
        ..PipelineConfig::default()
    };
    let mut h = harness_with(
        config,
        MockState {
            fail_feeds: true,
            ..MockState::default()
        },
    );
    assert!(h.driver.handle(frame(), h.at(20)).is_err());
}
