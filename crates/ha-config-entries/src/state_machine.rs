//! Config entry lifecycle transitions
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//!                                      ↘ FailedUnload (terminal)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
}

impl ConfigEntryState {
    pub fn can_transition(self, to: ConfigEntryState) -> bool {
        use ConfigEntryState::*;

        matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded)
                | (SetupInProgress, SetupError)
                | (SetupError, SetupInProgress)
                | (SetupError, UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded)
                | (UnloadInProgress, FailedUnload)
        )
    }

    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigEntryState::*;

    #[test]
    fn test_setup_path() {
        assert_eq!(NotLoaded.try_transition(SetupInProgress), Ok(SetupInProgress));
        assert!(SetupInProgress.can_transition(Loaded));
        assert!(SetupInProgress.can_transition(SetupError));
        assert!(SetupError.can_transition(SetupInProgress));
    }

    #[test]
    fn test_unload_path() {
        assert!(Loaded.can_transition(UnloadInProgress));
        assert!(SetupError.can_transition(UnloadInProgress));
        assert!(UnloadInProgress.can_transition(NotLoaded));
        assert!(UnloadInProgress.can_transition(FailedUnload));
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(
            NotLoaded.try_transition(Loaded),
            Err(InvalidTransition {
                from: NotLoaded,
                to: Loaded
            })
        );
        assert!(!Loaded.can_transition(SetupInProgress));
        assert!(!FailedUnload.can_transition(NotLoaded));
        assert!(!NotLoaded.can_transition(UnloadInProgress));
    }
}
