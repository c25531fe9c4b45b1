//! Scripted in-memory transport and a recording presentation sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use tradesim_backend::feed::{FeedConnector, FeedStream};
use tradesim_backend::{FeedEvent, PresentationSink, SimulatorConfig};

pub const BOOK: &str = r#"{"timestamp":"2025-05-04T10:39:13Z","exchange":"OKX","symbol":"BTC-USDT-SWAP",
    "asks":[["95445.5","9.06"],["95448.0","2.05"],["95450.1","0.5"]],
    "bids":[["95445.4","1104.23"],["95445.3","0.02"],["95444.0","3.1"]]}"#;

/// What the next `connect` call does.
pub enum Step {
    Fail(&'static str),
    /// Never completes; only a connect timeout or stop gets past it
    Hang,
    Stream(Vec<Frame>),
}

pub enum Frame {
    Text(String),
    Close,
    /// Never yields; only a read timeout or stop gets past it
    Hang,
}

pub fn text(s: &str) -> Frame {
    Frame::Text(s.to_string())
}

pub struct ScriptedConnector {
    steps: VecDeque<Step>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>) -> (Self, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let connector = Self {
            steps: steps.into(),
            connects: Arc::clone(&connects),
        };
        (connector, connects)
    }
}

#[async_trait::async_trait]
impl FeedConnector for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(&mut self, _endpoint: &str) -> Result<ScriptedStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Fail(reason)) => Err(anyhow!(reason)),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Stream(frames)) => Ok(ScriptedStream {
                frames: frames.into(),
            }),
            None => Err(anyhow!("connection refused")),
        }
    }
}

pub struct ScriptedStream {
    frames: VecDeque<Frame>,
}

#[async_trait::async_trait]
impl FeedStream for ScriptedStream {
    async fn next_message(&mut self) -> Result<Option<String>> {
        match self.frames.pop_front() {
            Some(Frame::Text(t)) => Ok(Some(t)),
            Some(Frame::Close) => Ok(None),
            Some(Frame::Hang) | None => std::future::pending().await,
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<FeedEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<FeedEvent> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                FeedEvent::Error { error } => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn estimates(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, FeedEvent::Estimate(_)))
            .count()
    }
}

impl PresentationSink for RecordingSink {
    fn push(&self, event: FeedEvent) {
        self.events.lock().push(event);
    }
}

/// Fast timings so scripted scenarios finish in milliseconds.
pub fn fast_config(max_retries: u32) -> SimulatorConfig {
    SimulatorConfig {
        endpoint: "ws://scripted.invalid/book".to_string(),
        max_retries,
        retry_delay_ms: 1,
        read_timeout_ms: 50,
        connect_timeout_ms: 50,
        ..SimulatorConfig::default()
    }
}
