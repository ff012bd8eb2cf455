//! The assertion engine: declarative expectations against the event stream.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lpec_state::{DeviceId, StateChangeEvent};
use tokio::time::Instant;
use tracing::debug;

use crate::scenario::Scenario;

/// Status of a single assertion.
///
/// Transitions are one-way: `Pending` moves to exactly one of `Passed` or
/// `TimedOut` and never reverts. There is no mismatch state: an observed
/// wrong value simply leaves the assertion pending until its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionStatus {
    /// Not yet matched and not yet past its deadline
    Pending,
    /// Matched by an event before the deadline
    Passed {
        /// Event time minus engine start
        elapsed: Duration,
    },
    /// The deadline passed without a match
    TimedOut,
}

/// One expectation: a device's variable reaches a value before a deadline.
#[derive(Debug, Clone)]
pub struct Assertion {
    /// The device to watch
    pub device: DeviceId,
    /// The variable to watch
    pub variable: String,
    /// Expected value, compared by exact string equality
    pub expected: String,
    /// The relative timeout the deadline was derived from
    pub timeout: Duration,
    deadline: Instant,
    status: AssertionStatus,
}

impl Assertion {
    /// Current status.
    pub fn status(&self) -> &AssertionStatus {
        &self.status
    }

    /// Whether the assertion is still pending.
    pub fn is_pending(&self) -> bool {
        self.status == AssertionStatus::Pending
    }

    /// Whether the assertion passed.
    pub fn passed(&self) -> bool {
        matches!(self.status, AssertionStatus::Passed { .. })
    }

    /// The absolute deadline, resolved at engine start.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Evaluates a scenario's assertions against state-change events.
///
/// The engine is a plain state machine driven by a single consumer: the
/// orchestrator feeds it every fanned-in event via [`observe`] and sweeps
/// overdue assertions via [`expire_overdue`], sleeping until
/// [`next_deadline`] in between. The run is terminal once no assertion is
/// pending.
///
/// [`observe`]: AssertionEngine::observe
/// [`expire_overdue`]: AssertionEngine::expire_overdue
/// [`next_deadline`]: AssertionEngine::next_deadline
#[derive(Debug)]
pub struct AssertionEngine {
    assertions: Vec<Assertion>,
    started_at: DateTime<Utc>,
}

impl AssertionEngine {
    /// Build the engine from a validated scenario, resolving each relative
    /// timeout to an absolute deadline now.
    pub fn start(scenario: &Scenario) -> Self {
        let now = Instant::now();
        let assertions = scenario
            .assertions
            .iter()
            .map(|spec| {
                let timeout = Duration::from_secs_f64(spec.within_seconds);
                Assertion {
                    device: DeviceId::new(&spec.device),
                    variable: spec.variable.clone(),
                    expected: spec.value.clone(),
                    timeout,
                    deadline: now + timeout,
                    status: AssertionStatus::Pending,
                }
            })
            .collect();
        Self {
            assertions,
            started_at: Utc::now(),
        }
    }

    /// Check a state-change event against every pending assertion.
    ///
    /// Initial full-state events participate like any other. Returns the
    /// indices of assertions that passed on this event.
    pub fn observe(&mut self, event: &StateChangeEvent) -> Vec<usize> {
        let now = Instant::now();
        let mut passed = Vec::new();
        for (index, assertion) in self.assertions.iter_mut().enumerate() {
            if !assertion.is_pending() || assertion.device != event.device {
                continue;
            }
            if now >= assertion.deadline {
                // Leave it for the deadline sweep
                continue;
            }
            if event.new_value(&assertion.variable) == Some(assertion.expected.as_str()) {
                let elapsed = (event.timestamp - self.started_at)
                    .to_std()
                    .unwrap_or_default();
                debug!(
                    device = %assertion.device,
                    variable = %assertion.variable,
                    value = %assertion.expected,
                    ?elapsed,
                    "assertion met"
                );
                assertion.status = AssertionStatus::Passed { elapsed };
                passed.push(index);
            }
        }
        passed
    }

    /// Transition every pending assertion whose deadline has passed to
    /// `TimedOut`. Returns the indices of newly timed out assertions.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<usize> {
        let mut expired = Vec::new();
        for (index, assertion) in self.assertions.iter_mut().enumerate() {
            if assertion.is_pending() && now >= assertion.deadline {
                debug!(
                    device = %assertion.device,
                    variable = %assertion.variable,
                    timeout = ?assertion.timeout,
                    "assertion timed out"
                );
                assertion.status = AssertionStatus::TimedOut;
                expired.push(index);
            }
        }
        expired
    }

    /// The earliest deadline among pending assertions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.assertions
            .iter()
            .filter(|a| a.is_pending())
            .map(Assertion::deadline)
            .min()
    }

    /// Whether every assertion has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.assertions.iter().all(|a| !a.is_pending())
    }

    /// Whether every assertion passed.
    pub fn all_passed(&self) -> bool {
        self.assertions.iter().all(Assertion::passed)
    }

    /// All assertions with their current status.
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// When the engine started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::AssertionSpec;
    use lpec_state::VariableChange;

    fn scenario(specs: &[(&str, &str, &str, f64)]) -> Scenario {
        Scenario {
            name: "test".to_string(),
            description: None,
            assertions: specs
                .iter()
                .map(|(device, variable, value, within)| AssertionSpec {
                    device: device.to_string(),
                    variable: variable.to_string(),
                    value: value.to_string(),
                    within_seconds: *within,
                })
                .collect(),
        }
    }

    fn event(device: &str, variable: &str, new: &str) -> StateChangeEvent {
        StateChangeEvent {
            device: DeviceId::new(device),
            timestamp: Utc::now(),
            seq: 1,
            initial: false,
            changes: vec![VariableChange {
                variable: variable.to_string(),
                old: None,
                new: new.to_string(),
            }],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_assertion_passes_on_exact_match() {
        let mut engine = AssertionEngine::start(&scenario(&[(
            "DEVICE_2",
            "TransportState",
            "Playing",
            10.0,
        )]));

        // Wrong value leaves the assertion pending
        assert!(engine
            .observe(&event("DEVICE_2", "TransportState", "Buffering"))
            .is_empty());
        assert!(!engine.is_terminal());

        let passed = engine.observe(&event("DEVICE_2", "TransportState", "Playing"));
        assert_eq!(passed, vec![0]);
        assert!(engine.is_terminal());
        assert!(engine.all_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_device_or_variable_does_not_match() {
        let mut engine = AssertionEngine::start(&scenario(&[(
            "DEVICE_2",
            "TransportState",
            "Playing",
            10.0,
        )]));

        assert!(engine
            .observe(&event("DEVICE_1", "TransportState", "Playing"))
            .is_empty());
        assert!(engine
            .observe(&event("DEVICE_2", "Status", "Playing"))
            .is_empty());
        assert!(!engine.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_sweep_times_out_pending() {
        let mut engine = AssertionEngine::start(&scenario(&[(
            "DEVICE_2",
            "TransportState",
            "Playing",
            1.0,
        )]));

        let deadline = engine.next_deadline().unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        let expired = engine.expire_overdue(Instant::now());
        assert_eq!(expired, vec![0]);
        assert!(engine.is_terminal());
        assert!(!engine.all_passed());
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_never_reverts() {
        let mut engine = AssertionEngine::start(&scenario(&[(
            "DEVICE_2",
            "TransportState",
            "Playing",
            10.0,
        )]));

        engine.observe(&event("DEVICE_2", "TransportState", "Playing"));
        assert!(engine.all_passed());

        // A later revert does not change the terminal status
        engine.observe(&event("DEVICE_2", "TransportState", "Stopped"));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(engine.expire_overdue(Instant::now()).is_empty());
        assert!(engine.all_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_after_deadline_does_not_pass() {
        let mut engine = AssertionEngine::start(&scenario(&[(
            "DEVICE_2",
            "TransportState",
            "Playing",
            1.0,
        )]));

        tokio::time::advance(Duration::from_secs(2)).await;

        // The event arrives after the deadline: it must not pass, the sweep
        // must time it out (never both)
        assert!(engine
            .observe(&event("DEVICE_2", "TransportState", "Playing"))
            .is_empty());
        assert_eq!(engine.expire_overdue(Instant::now()), vec![0]);
        assert!(!engine.all_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_assertions_on_different_devices_are_independent() {
        let mut engine = AssertionEngine::start(&scenario(&[
            ("DEVICE_2", "TransportState", "Playing", 1.0),
            ("DEVICE_3", "TransportState", "Playing", 10.0),
        ]));

        // Force the first to time out
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(engine.expire_overdue(Instant::now()), vec![0]);
        assert!(!engine.is_terminal());

        // The second still passes on its own event
        let passed = engine.observe(&event("DEVICE_3", "TransportState", "Playing"));
        assert_eq!(passed, vec![1]);
        assert!(engine.is_terminal());
        assert_eq!(engine.assertions()[0].status(), &AssertionStatus::TimedOut);
        assert!(engine.assertions()[1].passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_deadline_is_earliest_pending() {
        let mut engine = AssertionEngine::start(&scenario(&[
            ("DEVICE_2", "A", "1", 5.0),
            ("DEVICE_2", "B", "1", 2.0),
        ]));

        let first = engine.next_deadline().unwrap();
        assert_eq!(first, engine.assertions()[1].deadline());

        engine.observe(&event("DEVICE_2", "B", "1"));
        let second = engine.next_deadline().unwrap();
        assert_eq!(second, engine.assertions()[0].deadline());
    }
}
