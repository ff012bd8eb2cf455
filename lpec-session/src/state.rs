//! Session lifecycle states.

/// Lifecycle state of a device session.
///
/// Transitions are linear: `Idle → Connecting → Subscribing → Streaming`,
/// ending in either `Closed` (graceful: peer close or requested stop) or
/// `Failed` (connection or subscription error). Both terminal states are
/// final; a session is never restarted in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet started
    Idle,
    /// TCP connection in progress
    Connecting,
    /// Waiting for the subscribe acknowledgement and initial state
    Subscribing,
    /// Receiving the live event stream
    Streaming,
    /// Terminal: closed gracefully (peer close or requested stop)
    Closed,
    /// Terminal: ended by a connection or subscription error
    Failed,
}

impl SessionState {
    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Connecting.is_terminal());
        assert!(!SessionState::Subscribing.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Streaming.to_string(), "streaming");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }
}
