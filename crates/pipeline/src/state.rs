use std::fmt;

/// Per-invocation pipeline state.
///
/// A run advances strictly forward through `Idle → ExtractingText →
/// Classifying → ExtractingFields → AwaitingStructuring → Ready`; `Error` is
/// terminal and reachable from any non-terminal state. Retrying is the
/// caller's decision — re-invoke from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Idle,
    ExtractingText,
    Classifying,
    ExtractingFields,
    AwaitingStructuring,
    Ready,
    Error,
}

impl ProcessingState {
    /// The next state on the success path, or `None` from a terminal state.
    pub fn next(self) -> Option<ProcessingState> {
        match self {
            ProcessingState::Idle => Some(ProcessingState::ExtractingText),
            ProcessingState::ExtractingText => Some(ProcessingState::Classifying),
            ProcessingState::Classifying => Some(ProcessingState::ExtractingFields),
            ProcessingState::ExtractingFields => Some(ProcessingState::AwaitingStructuring),
            ProcessingState::AwaitingStructuring => Some(ProcessingState::Ready),
            ProcessingState::Ready | ProcessingState::Error => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingState::Ready | ProcessingState::Error)
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingState::Idle => write!(f, "idle"),
            ProcessingState::ExtractingText => write!(f, "extracting_text"),
            ProcessingState::Classifying => write!(f, "classifying"),
            ProcessingState::ExtractingFields => write!(f, "extracting_fields"),
            ProcessingState::AwaitingStructuring => write!(f, "awaiting_structuring"),
            ProcessingState::Ready => write!(f, "ready"),
            ProcessingState::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_walks_all_states() {
        let mut state = ProcessingState::Idle;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ProcessingState::Idle,
                ProcessingState::ExtractingText,
                ProcessingState::Classifying,
                ProcessingState::ExtractingFields,
                ProcessingState::AwaitingStructuring,
                ProcessingState::Ready,
            ]
        );
    }

    #[test]
    fn terminal_states_have_no_successor() {
        assert!(ProcessingState::Ready.next().is_none());
        assert!(ProcessingState::Error.next().is_none());
        assert!(ProcessingState::Ready.is_terminal());
        assert!(ProcessingState::Error.is_terminal());
        assert!(!ProcessingState::Classifying.is_terminal());
    }
}
