//! Engine configuration.

use serde::{Deserialize, Serialize};

/// What the engine does with an event that no transition handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Record a diagnostic, discard the queue and refuse further events
    /// until the machine is reinitialized.
    #[default]
    Halt,
    /// Treat the event as handled by moving to the default state without
    /// running any transition action. Stays put if no default state exists.
    FallToDefault,
}

impl std::str::FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(UnresolvedPolicy::Halt),
            "fall_to_default" | "fall-to-default" => Ok(UnresolvedPolicy::FallToDefault),
            other => Err(format!("unknown unresolved-event policy: {}", other)),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy for unresolved events.
    pub unresolved: UnresolvedPolicy,

    /// Start the machine even when validation reported errors, as long as
    /// the initial state itself is valid. Off by default: any definition
    /// error leaves the machine un-started.
    pub start_with_errors: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unresolved_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }

    pub fn with_start_with_errors(mut self, enabled: bool) -> Self {
        self.start_with_errors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.unresolved, UnresolvedPolicy::Halt);
        assert!(!config.start_with_errors);
    }

    #[test]
    fn test_yaml_partial() {
        let config: EngineConfig = serde_yaml::from_str("unresolved: fall_to_default").unwrap();
        assert_eq!(config.unresolved, UnresolvedPolicy::FallToDefault);
        assert!(!config.start_with_errors);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("HALT".parse::<UnresolvedPolicy>(), Ok(UnresolvedPolicy::Halt));
        assert_eq!(
            "fall-to-default".parse::<UnresolvedPolicy>(),
            Ok(UnresolvedPolicy::FallToDefault)
        );
        assert!("ignore".parse::<UnresolvedPolicy>().is_err());
    }
}
