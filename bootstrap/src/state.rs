use std::fmt;

use serde::Serialize;

use crate::error::BootError;

/// Boot lifecycle.
///
/// ```text
/// Uninitialized -> LoadingCore -> ModulesReady -> FeaturesReady
///                       |              |
///                       +----> Fallback <----+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootState {
    #[default]
    Uninitialized,
    LoadingCore,
    ModulesReady,
    FeaturesReady,
    Fallback,
}

impl BootState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::LoadingCore => "loading_core",
            Self::ModulesReady => "modules_ready",
            Self::FeaturesReady => "features_ready",
            Self::Fallback => "fallback",
        }
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::LoadingCore)
                | (Self::LoadingCore, Self::ModulesReady | Self::Fallback)
                | (Self::ModulesReady, Self::FeaturesReady | Self::Fallback)
        )
    }

    /// No transition leaves a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::FeaturesReady | Self::Fallback)
    }

    /// Move to `next`, or fail without changing state.
    pub(crate) fn advance(&mut self, next: Self) -> Result<(), BootError> {
        if !self.can_transition_to(next) {
            return Err(BootError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!(from = %self, to = %next, "Boot state transition");
        *self = next;
        Ok(())
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BootState; 5] = [
        BootState::Uninitialized,
        BootState::LoadingCore,
        BootState::ModulesReady,
        BootState::FeaturesReady,
        BootState::Fallback,
    ];

    #[test]
    fn success_path_is_linear() {
        let mut state = BootState::default();
        state.advance(BootState::LoadingCore).unwrap();
        state.advance(BootState::ModulesReady).unwrap();
        state.advance(BootState::FeaturesReady).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn fallback_only_from_loading_states() {
        for from in ALL {
            let allowed = matches!(from, BootState::LoadingCore | BootState::ModulesReady);
            assert_eq!(from.can_transition_to(BootState::Fallback), allowed, "{from}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(ALL.into_iter().all(|to| !from.can_transition_to(to)));
        }
    }

    #[test]
    fn illegal_transition_leaves_state_unchanged() {
        let mut state = BootState::Uninitialized;
        let err = state.advance(BootState::FeaturesReady).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid boot transition uninitialized -> features_ready"
        );
        assert_eq!(state, BootState::Uninitialized);
    }
}
