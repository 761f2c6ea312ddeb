//! Run lifecycle state machine.

/// Lifecycle of a single `run` call.
///
/// `Running` and `Draining` overlap in wall-clock time; `Exited` is only
/// reached once both the process wait and the reader join have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Call-site options were merged and validated.
    OptionsResolved,
    /// Direct or pseudo-terminal execution was chosen.
    StrategySelected,
    /// The child was spawned (or failed to spawn).
    Running,
    /// Waiting for the readers to observe end-of-stream.
    Draining,
    /// Exit status collected and every reader joined.
    Exited,
    /// A result was handed back to the caller.
    Returned,
    /// A failure was raised to the caller.
    Failed,
}

impl RunState {
    /// Check if transition to target state is valid.
    ///
    /// The lifecycle is strictly linear up to `Exited`, which branches into
    /// `Returned` or `Failed`.
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;
        matches!(
            (*self, target),
            (Idle, OptionsResolved)
                | (OptionsResolved, StrategySelected)
                | (StrategySelected, Running)
                | (Running, Draining)
                | (Draining, Exited)
                | (Exited, Returned)
                | (Exited, Failed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: RunState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::RunError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Returned | RunState::Failed)
    }

    /// Check if a child process may exist in this state.
    pub fn has_child(&self) -> bool {
        matches!(self, RunState::Running | RunState::Draining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut state = RunState::Idle;
        for next in [
            RunState::OptionsResolved,
            RunState::StrategySelected,
            RunState::Running,
            RunState::Draining,
            RunState::Exited,
            RunState::Returned,
        ] {
            assert!(state.transition_to(next).is_ok(), "{state:?} -> {next:?}");
            assert_eq!(state, next);
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn test_exited_can_fail() {
        let mut state = RunState::Exited;
        assert!(state.transition_to(RunState::Failed).is_ok());
        assert!(state.is_terminal());
    }

    #[test]
    fn test_no_state_is_skipped() {
        let mut state = RunState::Idle;
        assert!(state.transition_to(RunState::Running).is_err());
        assert_eq!(state, RunState::Idle);

        let mut state = RunState::Running;
        assert!(state.transition_to(RunState::Exited).is_err());
        assert_eq!(state, RunState::Running);
    }

    #[test]
    fn test_invalid_from_terminal() {
        let mut state = RunState::Returned;
        assert!(state.transition_to(RunState::Idle).is_err());
        assert!(state.transition_to(RunState::Failed).is_err());
    }

    #[test]
    fn test_has_child() {
        assert!(!RunState::StrategySelected.has_child());
        assert!(RunState::Running.has_child());
        assert!(RunState::Draining.has_child());
        assert!(!RunState::Exited.has_child());
    }

    #[test]
    fn test_default() {
        assert_eq!(RunState::default(), RunState::Idle);
    }
}
