//! Session lifecycle

/// Lifecycle of the single client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No client, listener not yet armed
    Idle,
    /// Waiting on the listener for a client
    AwaitingClient,
    /// Client connected, sweeping the event sources
    Active,
    /// Client gone, waiting to be reset
    Closed,
}

/// Events driving the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// Listener armed
    Listen,
    /// Client accepted
    Accept,
    /// Client hung up or the connection failed
    Disconnect,
    /// Ready for the next client
    Reset,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply to the current state leave it unchanged.
    pub fn transition(self, event: SessionEvent) -> Self {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Idle, Listen) => AwaitingClient,
            (AwaitingClient, Accept) => Active,
            (Active, Disconnect) => Closed,
            (Closed, Reset) => Idle,

            // Abandoning a listener
            (AwaitingClient, Reset) => Idle,

            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let state = SessionState::Idle;
        let state = state.transition(SessionEvent::Listen);
        assert_eq!(state, SessionState::AwaitingClient);
        let state = state.transition(SessionEvent::Accept);
        assert_eq!(state, SessionState::Active);
        assert!(state.is_active());
        let state = state.transition(SessionEvent::Disconnect);
        assert_eq!(state, SessionState::Closed);
        let state = state.transition(SessionEvent::Reset);
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn test_invalid_events_ignored() {
        assert_eq!(
            SessionState::Idle.transition(SessionEvent::Accept),
            SessionState::Idle
        );
        assert_eq!(
            SessionState::Active.transition(SessionEvent::Listen),
            SessionState::Active
        );
        assert_eq!(
            SessionState::Active.transition(SessionEvent::Reset),
            SessionState::Active
        );
        assert_eq!(
            SessionState::Closed.transition(SessionEvent::Accept),
            SessionState::Closed
        );
    }
}
