//! The orchestrator: one session per device, one fan-in consumer.

use std::time::Duration;

use lpec_session::{Session, SessionConfig, SessionError, SessionHandle};
use lpec_state::StateChangeEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::assertions::AssertionEngine;
use crate::directory::DeviceDirectory;
use crate::error::{MonitorError, Result};
use crate::scenario::Scenario;
use crate::sink::{ConsoleSink, ReportSink};

/// Capacity of the fan-in event channel shared by all sessions.
const EVENT_BUFFER: usize = 1024;

/// Terminal result of a monitor run.
#[derive(Debug, Clone, Copy)]
pub struct MonitorOutcome {
    /// `true` when the run ended gracefully with every assertion passed
    /// (or no scenario was active)
    pub success: bool,
    /// Whether the run ended because of an external stop signal
    pub cancelled: bool,
    /// Number of state-change events fanned in over the run
    pub events_observed: u64,
}

impl MonitorOutcome {
    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }
}

/// Owns the device directory, the report sink, and the run lifecycle.
///
/// The orchestrator starts one session task per device, consumes the shared
/// fan-in channel in a single loop (preserving per-device FIFO order), and
/// drives coordinated shutdown: either the assertion engine reaches a
/// terminal state, or an external stop signal arrives. Sessions that do not
/// close within the grace period are force-aborted.
pub struct Orchestrator {
    directory: DeviceDirectory,
    session_config: SessionConfig,
    scenario: Option<Scenario>,
    sink: Box<dyn ReportSink>,
    grace_period: Duration,
}

impl Orchestrator {
    /// Create an orchestrator reporting to stdout.
    pub fn new(directory: DeviceDirectory, session_config: SessionConfig) -> Self {
        Self {
            directory,
            session_config,
            scenario: None,
            sink: Box::new(ConsoleSink::new()),
            grace_period: Duration::from_secs(5),
        }
    }

    /// Activate the assertion engine for this run.
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Replace the report sink.
    pub fn with_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Bound the shutdown grace window.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Run to completion.
    ///
    /// `cancel` is the external stop signal (Ctrl-C in the binary). Fatal
    /// startup conditions (zero devices, invalid configuration or scenario)
    /// abort before any session starts.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> Result<MonitorOutcome> {
        self.session_config
            .validate()
            .map_err(|e| MonitorError::Configuration(e.to_string()))?;
        if self.directory.is_empty() {
            return Err(MonitorError::NoDevices);
        }
        if let Some(scenario) = &self.scenario {
            scenario.validate(&self.directory)?;
        }

        let (event_tx, mut event_rx) = mpsc::channel::<StateChangeEvent>(EVENT_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles: Vec<SessionHandle> = Vec::new();
        let mut tasks: Vec<JoinHandle<std::result::Result<(), SessionError>>> = Vec::new();
        for target in self.directory.targets() {
            info!(device = %target.id, ip = %target.ip, role = ?target.role, "starting session");
            let (session, handle) = Session::new(
                target.id.clone(),
                target.ip,
                self.session_config.clone(),
                event_tx.clone(),
                stop_rx.clone(),
            );
            tasks.push(tokio::spawn(session.run()));
            handles.push(handle);
        }
        // The consumer sees `None` once every session is gone
        drop(event_tx);

        let mut engine = self.scenario.as_ref().map(AssertionEngine::start);
        if let Some(scenario) = &self.scenario {
            info!(
                scenario = %scenario.name,
                assertions = scenario.assertions.len(),
                "assertion timers started"
            );
        }

        let mut cancelled = false;
        let mut events_observed: u64 = 0;
        let mut sessions_done = false;

        loop {
            if engine.as_ref().is_some_and(AssertionEngine::is_terminal) {
                info!("all assertions terminal, stopping");
                break;
            }

            let deadline = engine.as_ref().and_then(AssertionEngine::next_deadline);
            // Placeholder so the disabled branch still has an Instant to
            // construct its (never polled) future from
            let sleep_target =
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                maybe_event = event_rx.recv(), if !sessions_done => {
                    match maybe_event {
                        Some(event) => {
                            events_observed += 1;
                            self.sink.state_change(&event);
                            if let Some(engine) = engine.as_mut() {
                                for index in engine.observe(&event) {
                                    self.sink.assertion_passed(&engine.assertions()[index]);
                                }
                            }
                        }
                        None => {
                            sessions_done = true;
                            if engine.is_none() {
                                info!("all sessions ended");
                                break;
                            }
                            warn!("all sessions ended with assertions still pending");
                        }
                    }
                }
                _ = sleep_until(sleep_target), if deadline.is_some() => {
                    if let Some(engine) = engine.as_mut() {
                        for index in engine.expire_overdue(Instant::now()) {
                            self.sink.assertion_timed_out(&engine.assertions()[index]);
                        }
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!("stop requested, shutting down");
                        cancelled = true;
                        break;
                    }
                }
            }
        }

        let _ = stop_tx.send(true);
        self.stop_sessions(handles, tasks).await;

        let success = match &engine {
            Some(engine) => {
                self.sink.summary(engine.assertions());
                engine.all_passed()
            }
            None => true,
        };

        Ok(MonitorOutcome {
            success,
            cancelled,
            events_observed,
        })
    }

    /// Wait for every session to reach a terminal state within the grace
    /// window; force-abort any that do not.
    async fn stop_sessions(
        &self,
        handles: Vec<SessionHandle>,
        tasks: Vec<JoinHandle<std::result::Result<(), SessionError>>>,
    ) {
        let deadline = Instant::now() + self.grace_period;
        for (handle, task) in handles.into_iter().zip(tasks) {
            let abort = task.abort_handle();
            match timeout_at(deadline, task).await {
                Ok(Ok(Ok(()))) => {
                    debug!(device = %handle.device(), state = %handle.state(), "session stopped");
                }
                Ok(Ok(Err(error))) => {
                    warn!(device = %handle.device(), %error, "session ended with error");
                }
                Ok(Err(join_error)) => {
                    warn!(device = %handle.device(), %join_error, "session task panicked");
                }
                Err(_) => {
                    warn!(device = %handle.device(), "session did not stop within grace period, aborting");
                    abort.abort();
                }
            }
        }
    }
}
