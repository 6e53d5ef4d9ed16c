//! Configuration pass state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which build attempt of a pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attempt {
    First,
    /// Photo resolution degraded to the video resolution
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationState {
    #[default]
    Idle,
    Opening,
    Negotiating(Attempt),
    Building(Attempt),
    ErrorRetry,
    Active,
    Failed,
}

/// Something that happened during a configuration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassEvent {
    ConfigurationChanged,
    DeviceOpened,
    DeviceUnavailable,
    Negotiated,
    SessionReady,
    ConfigurationRejected,
    RetryScheduled,
    Error,
    DeviceLost,
    SessionClosed,
}

impl ConfigurationState {
    /// Apply an event, returning `None` when the transition is not allowed.
    pub fn next(self, event: PassEvent) -> Option<ConfigurationState> {
        use ConfigurationState::*;

        match (self, event) {
            (Idle | Active | Failed, PassEvent::ConfigurationChanged) => Some(Opening),
            (Opening, PassEvent::DeviceOpened) => Some(Negotiating(Attempt::First)),
            (Opening, PassEvent::DeviceUnavailable) => Some(Failed),
            (Negotiating(attempt), PassEvent::Negotiated) => Some(Building(attempt)),
            (Building(_), PassEvent::SessionReady) => Some(Active),
            (Building(Attempt::First), PassEvent::ConfigurationRejected) => Some(ErrorRetry),
            (Building(Attempt::Retry), PassEvent::ConfigurationRejected) => Some(Failed),
            (ErrorRetry, PassEvent::RetryScheduled) => Some(Negotiating(Attempt::Retry)),
            (Opening | Negotiating(_) | Building(_) | ErrorRetry, PassEvent::Error) => Some(Failed),
            (Active, PassEvent::DeviceLost) => Some(Failed),
            (Idle | Active | Failed, PassEvent::SessionClosed) => Some(Idle),
            _ => None,
        }
    }

    /// No pass is in progress
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ConfigurationState::Idle | ConfigurationState::Active | ConfigurationState::Failed
        )
    }
}

impl fmt::Display for ConfigurationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationState::Idle => write!(f, "idle"),
            ConfigurationState::Opening => write!(f, "opening"),
            ConfigurationState::Negotiating(Attempt::First) => write!(f, "negotiating"),
            ConfigurationState::Negotiating(Attempt::Retry) => write!(f, "negotiating (retry)"),
            ConfigurationState::Building(Attempt::First) => write!(f, "building"),
            ConfigurationState::Building(Attempt::Retry) => write!(f, "building (retry)"),
            ConfigurationState::ErrorRetry => write!(f, "error-retry"),
            ConfigurationState::Active => write!(f, "active"),
            ConfigurationState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConfigurationState::*;

    fn run(events: &[PassEvent]) -> Option<ConfigurationState> {
        events
            .iter()
            .try_fold(Idle, |state, event| state.next(*event))
    }

    #[test]
    fn test_happy_path() {
        let end = run(&[
            PassEvent::ConfigurationChanged,
            PassEvent::DeviceOpened,
            PassEvent::Negotiated,
            PassEvent::SessionReady,
        ]);
        assert_eq!(end, Some(Active));
    }

    #[test]
    fn test_single_retry_then_success() {
        let end = run(&[
            PassEvent::ConfigurationChanged,
            PassEvent::DeviceOpened,
            PassEvent::Negotiated,
            PassEvent::ConfigurationRejected,
            PassEvent::RetryScheduled,
            PassEvent::Negotiated,
            PassEvent::SessionReady,
        ]);
        assert_eq!(end, Some(Active));
    }

    #[test]
    fn test_second_rejection_fails() {
        let end = run(&[
            PassEvent::ConfigurationChanged,
            PassEvent::DeviceOpened,
            PassEvent::Negotiated,
            PassEvent::ConfigurationRejected,
            PassEvent::RetryScheduled,
            PassEvent::Negotiated,
            PassEvent::ConfigurationRejected,
        ]);
        assert_eq!(end, Some(Failed));
    }

    #[test]
    fn test_no_second_retry() {
        assert_eq!(Building(Attempt::Retry).next(PassEvent::ConfigurationRejected), Some(Failed));
        assert_eq!(Failed.next(PassEvent::RetryScheduled), None);
    }

    #[test]
    fn test_illegal_transitions() {
        assert_eq!(Idle.next(PassEvent::SessionReady), None);
        assert_eq!(Opening.next(PassEvent::ConfigurationChanged), None);
        assert_eq!(Negotiating(Attempt::First).next(PassEvent::SessionReady), None);
    }

    #[test]
    fn test_device_loss_and_close() {
        assert_eq!(Active.next(PassEvent::DeviceLost), Some(Failed));
        assert_eq!(Failed.next(PassEvent::SessionClosed), Some(Idle));
        assert_eq!(Failed.next(PassEvent::ConfigurationChanged), Some(Opening));
    }
}
