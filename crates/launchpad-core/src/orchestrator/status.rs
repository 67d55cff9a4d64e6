use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a bootstrap session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    #[default]
    Idle,
    Booting,
    Mounting,
    Installing,
    Running,
    Ready,
    Error,
}

impl ContainerStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Booting => "booting",
            Self::Mounting => "mounting",
            Self::Installing => "installing",
            Self::Running => "running",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Whether a run is in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Booting | Self::Mounting | Self::Installing | Self::Running
        )
    }

    /// Whether `self -> next` is a legal step.
    ///
    /// Phases only move forward; `error` is reachable from every active phase
    /// and teardown returns to `idle` from anywhere.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Idle) => true,
            (from, Self::Error) => from.is_active(),
            (Self::Idle, Self::Booting)
            | (Self::Booting, Self::Mounting)
            | (Self::Mounting, Self::Installing)
            | (Self::Installing, Self::Running)
            | (Self::Running, Self::Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let path = [
            ContainerStatus::Idle,
            ContainerStatus::Booting,
            ContainerStatus::Mounting,
            ContainerStatus::Installing,
            ContainerStatus::Running,
            ContainerStatus::Ready,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!ContainerStatus::Booting.can_transition_to(ContainerStatus::Installing));
        assert!(!ContainerStatus::Ready.can_transition_to(ContainerStatus::Running));
    }

    #[test]
    fn test_error_and_idle_edges() {
        assert!(ContainerStatus::Mounting.can_transition_to(ContainerStatus::Error));
        assert!(!ContainerStatus::Idle.can_transition_to(ContainerStatus::Error));
        assert!(!ContainerStatus::Ready.can_transition_to(ContainerStatus::Error));
        assert!(ContainerStatus::Error.can_transition_to(ContainerStatus::Idle));
        assert!(ContainerStatus::Idle.can_transition_to(ContainerStatus::Idle));
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Installing).unwrap(),
            "\"installing\""
        );
    }
}
