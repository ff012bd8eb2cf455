//! Report sinks: where fanned-in events and assertion results go.

use std::io::Write;

use chrono::Local;
use lpec_state::StateChangeEvent;

use crate::assertions::{Assertion, AssertionStatus};

/// Consumer of the monitor's ordered output stream.
///
/// Exactly one sink instance receives every state-change event, in arrival
/// order (per-device FIFO). The orchestrator owns the sink; sessions never
/// write to it directly.
pub trait ReportSink: Send {
    /// A state change was observed on a device.
    fn state_change(&mut self, event: &StateChangeEvent);

    /// An assertion was matched before its deadline.
    fn assertion_passed(&mut self, assertion: &Assertion);

    /// An assertion reached its deadline unmatched.
    fn assertion_timed_out(&mut self, assertion: &Assertion);

    /// The run is over; report final results.
    fn summary(&mut self, assertions: &[Assertion]);
}

/// Human-readable sink writing timestamped lines to stdout.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// Create a sink writing to stdout.
    pub fn new() -> Self {
        Self {
            out: Box::new(std::io::stdout()),
        }
    }

    /// Create a sink writing to an arbitrary writer.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    fn line(&mut self, text: &str) {
        let timestamp = Local::now().format("%H:%M:%S%.3f");
        // Output failures are not actionable mid-run; ignore them
        let _ = writeln!(self.out, "[{timestamp}] {text}");
        let _ = self.out.flush();
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSink for ConsoleSink {
    fn state_change(&mut self, event: &StateChangeEvent) {
        let heading = if event.initial {
            format!("[{}] initial state (seq={})", event.device, event.seq)
        } else {
            format!("[{}] state change (seq={})", event.device, event.seq)
        };
        self.line(&heading);
        for change in &event.changes {
            let old = change
                .old
                .as_deref()
                .map(abbreviate)
                .unwrap_or_else(|| "(unset)".to_string());
            let new = abbreviate(&change.new);
            self.line(&format!(
                "[{}]   {}: {} -> {}",
                event.device, change.variable, old, new
            ));
        }
    }

    fn assertion_passed(&mut self, assertion: &Assertion) {
        if let AssertionStatus::Passed { elapsed } = assertion.status() {
            self.line(&format!(
                "PASS {}.{} = '{}' ({:.2}s)",
                assertion.device,
                assertion.variable,
                assertion.expected,
                elapsed.as_secs_f64()
            ));
        }
    }

    fn assertion_timed_out(&mut self, assertion: &Assertion) {
        self.line(&format!(
            "TIMEOUT {}.{} = '{}' (not met within {:.1}s)",
            assertion.device,
            assertion.variable,
            assertion.expected,
            assertion.timeout.as_secs_f64()
        ));
    }

    fn summary(&mut self, assertions: &[Assertion]) {
        if assertions.is_empty() {
            return;
        }
        let passed = assertions.iter().filter(|a| a.passed()).count();
        self.line("---- results ----");
        for assertion in assertions {
            let status = match assertion.status() {
                AssertionStatus::Passed { elapsed } => {
                    format!("PASS ({:.2}s)", elapsed.as_secs_f64())
                }
                AssertionStatus::TimedOut => {
                    format!("TIMEOUT ({:.1}s)", assertion.timeout.as_secs_f64())
                }
                AssertionStatus::Pending => "PENDING".to_string(),
            };
            self.line(&format!(
                "{status} {}.{} = '{}'",
                assertion.device, assertion.variable, assertion.expected
            ));
        }
        self.line(&format!("passed: {passed}/{}", assertions.len()));
    }
}

/// Abbreviate long values (typically Songcast sender URIs) for display.
fn abbreviate(value: &str) -> String {
    const MAX: usize = 60;
    if value.is_empty() {
        return "(empty)".to_string();
    }
    if value.len() <= MAX {
        return value.to_string();
    }
    if let Some(rest) = value.strip_prefix("ohz://") {
        let host = rest.split('/').next().unwrap_or(rest);
        return format!("ohz://{host}/...");
    }
    if value.starts_with("ohSongcast://") {
        return "ohSongcast://...".to_string();
    }
    let mut end = MAX;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
