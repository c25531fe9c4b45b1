//! Streaming connection manager.
//!
//! One cooperative task drives the whole feed: connect, read, run the cost
//! pipeline, push the result, and on failure wait out the retry delay before
//! trying again. Every suspension point (connect, read, retry delay) races
//! the stop signal, so a stop request takes effect without waiting for the
//! next frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::session::{ConnectionSession, ConnectionState, TransitionReason};
use super::transport::{FeedConnector, FeedStream};
use crate::config::SimulatorConfig;
use crate::events::{FeedEvent, PresentationSink};
use crate::performance::{LatencySample, PerformanceTracker};
use crate::pipeline::{CostPipeline, PipelineOutcome};

pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_DISCONNECTED: &str = "Disconnected";
pub const GIVE_UP_MESSAGE: &str = "Maximum retry attempts reached. Giving up.";

/// Requests a cooperative stop of a running manager. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// How a connected stream ended.
enum StreamExit {
    Stopped,
    Failed(TransitionReason, String),
}

pub struct StreamConnectionManager<C, K> {
    endpoint: String,
    connector: C,
    sink: K,
    pipeline: CostPipeline,
    tracker: PerformanceTracker,
    session: ConnectionSession,
    connect_timeout: Duration,
    read_timeout: Duration,
    summary_every: u64,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl<C, K> StreamConnectionManager<C, K>
where
    C: FeedConnector,
    K: PresentationSink,
{
    pub fn new(config: &SimulatorConfig, connector: C, sink: K) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            endpoint: config.endpoint.clone(),
            connector,
            sink,
            pipeline: CostPipeline::new(config),
            tracker: PerformanceTracker::new(),
            session: ConnectionSession::new(config.max_retries, config.retry_delay()),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            summary_every: config.summary_every,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    pub fn pipeline(&self) -> &CostPipeline {
        &self.pipeline
    }

    /// Run until stopped or until the retry budget is exhausted. Returns the
    /// final state: `Disconnected` or `GivenUp`.
    pub async fn run(&mut self) -> ConnectionState {
        if *self.stop_rx.borrow() {
            return self.shutdown();
        }

        info!(endpoint = %self.endpoint, max_attempts = self.session.max_attempts(), "feed_starting");
        self.enter(ConnectionState::Connecting, TransitionReason::Started);

        loop {
            let connected = tokio::select! {
                _ = stop_requested(&mut self.stop_rx) => return self.shutdown(),
                r = tokio::time::timeout(self.connect_timeout, self.connector.connect(&self.endpoint)) => r,
            };

            let (reason, detail) = match connected {
                Ok(Ok(stream)) => {
                    self.enter(ConnectionState::Connected, TransitionReason::ConnectSuccess);
                    self.sink.push(FeedEvent::status(STATUS_CONNECTED));

                    match self.stream_loop(stream).await {
                        StreamExit::Stopped => return self.shutdown(),
                        StreamExit::Failed(reason, detail) => (reason, detail),
                    }
                }
                Ok(Err(e)) => (TransitionReason::ConnectFailed, format!("{:#}", e)),
                Err(_) => (
                    TransitionReason::ConnectTimeout,
                    format!("connect timed out after {}ms", self.connect_timeout.as_millis()),
                ),
            };

            self.enter(ConnectionState::Retrying, reason);
            let message = format!(
                "Connection failed (attempt {}/{}): {}",
                self.session.attempts(),
                self.session.max_attempts(),
                detail
            );
            error!(reason = %reason, "{}", message);
            self.sink.push(FeedEvent::error(message));

            if self.session.retries_exhausted() {
                return self.give_up();
            }

            tokio::select! {
                _ = stop_requested(&mut self.stop_rx) => return self.shutdown(),
                _ = tokio::time::sleep(self.session.retry_delay()) => {}
            }
            self.enter(ConnectionState::Connecting, TransitionReason::RetryDelayElapsed);
        }
    }

    async fn stream_loop(&mut self, mut stream: C::Stream) -> StreamExit {
        loop {
            let wait_started = Instant::now();
            let next = tokio::select! {
                _ = stop_requested(&mut self.stop_rx) => return StreamExit::Stopped,
                r = tokio::time::timeout(self.read_timeout, stream.next_message()) => r,
            };
            let received = Instant::now();

            match next {
                Ok(Ok(Some(text))) => self.handle_message(&text, wait_started, received),
                Ok(Ok(None)) => {
                    return StreamExit::Failed(
                        TransitionReason::ServerClose,
                        "connection closed by server".to_string(),
                    )
                }
                Ok(Err(e)) => {
                    return StreamExit::Failed(TransitionReason::NetworkError, format!("{:#}", e))
                }
                Err(_) => {
                    warn!(timeout_ms = self.read_timeout.as_millis() as u64, "read timeout, reconnecting");
                    return StreamExit::Failed(
                        TransitionReason::ReadTimeout,
                        format!("no data for {}ms", self.read_timeout.as_millis()),
                    );
                }
            }
        }
    }

    fn handle_message(&mut self, text: &str, wait_started: Instant, received: Instant) {
        self.session.record_message();

        match self.pipeline.process(text) {
            PipelineOutcome::Estimate(mut record) => {
                let sample = LatencySample::from_instants(wait_started, received, Instant::now());
                let stats = self.tracker.record(sample);
                record.set_latency(sample, &stats);
                self.sink.push(FeedEvent::Estimate(record));

                if self.tracker.summary_due(self.summary_every) {
                    info!(
                        count = stats.count,
                        "Performance: Avg={:.2}ms, Min={:.2}ms, Max={:.2}ms",
                        stats.mean_ms,
                        stats.min_ms,
                        stats.max_ms
                    );
                }
            }
            PipelineOutcome::Rejected(message) => {
                self.session.record_rejected();
                self.sink.push(FeedEvent::error(message));
            }
            PipelineOutcome::Skipped(_) => {
                self.session.record_malformed();
            }
        }
    }

    fn give_up(&mut self) -> ConnectionState {
        self.enter(ConnectionState::GivenUp, TransitionReason::RetriesExhausted);
        error!(
            critical = true,
            attempts = self.session.attempts(),
            metrics = %self.session.metrics().summary(),
            "{}",
            GIVE_UP_MESSAGE
        );
        self.sink.push(FeedEvent::error(GIVE_UP_MESSAGE));
        ConnectionState::GivenUp
    }

    fn shutdown(&mut self) -> ConnectionState {
        self.enter(ConnectionState::Disconnected, TransitionReason::StopRequested);
        self.sink.push(FeedEvent::status(STATUS_DISCONNECTED));
        info!(metrics = %self.session.metrics().summary(), "feed_stopped");
        ConnectionState::Disconnected
    }

    /// Illegal edges are already logged by the session.
    fn enter(&mut self, state: ConnectionState, reason: TransitionReason) {
        let _ = self.session.transition(state, reason);
    }
}

/// Resolves once a stop has been requested.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: nobody can ask us to stop anymore
            std::future::pending::<()>().await;
        }
    }
}
