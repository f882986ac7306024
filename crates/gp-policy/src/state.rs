// state.rs — The policy state machine.
//
// A policy is observed in one of four states and written to one of three.
// Inference turns registry evidence into weighted enabled/disabled scores
// and `Evidence::decide` maps the scores to a state:
//
//   enabled > disabled            → Enabled
//   disabled > enabled            → Disabled
//   both zero                     → NotConfigured
//   equal and positive            → Unknown
//
// Unknown is a legitimate observation (the registry contradicts itself); it
// is reported as-is and can never be a mutation target.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MutationError;

/// The observed state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    NotConfigured,
    Disabled,
    Enabled,
    Unknown,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyState::NotConfigured => "not_configured",
            PolicyState::Disabled => "disabled",
            PolicyState::Enabled => "enabled",
            PolicyState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PolicyState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "not_configured" | "notconfigured" => Ok(PolicyState::NotConfigured),
            "disabled" => Ok(PolicyState::Disabled),
            "enabled" => Ok(PolicyState::Enabled),
            "unknown" => Ok(PolicyState::Unknown),
            _ => Err(format!(
                "unknown policy state '{s}' (expected enabled, disabled or not_configured)"
            )),
        }
    }
}

/// A state the mutation engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    NotConfigured,
    Disabled,
    Enabled,
}

impl TargetState {
    /// The state inference reports after this target has been applied.
    pub fn observed(self) -> PolicyState {
        match self {
            TargetState::NotConfigured => PolicyState::NotConfigured,
            TargetState::Disabled => PolicyState::Disabled,
            TargetState::Enabled => PolicyState::Enabled,
        }
    }
}

impl TryFrom<PolicyState> for TargetState {
    type Error = MutationError;

    fn try_from(state: PolicyState) -> Result<Self, Self::Error> {
        match state {
            PolicyState::NotConfigured => Ok(TargetState::NotConfigured),
            PolicyState::Disabled => Ok(TargetState::Disabled),
            PolicyState::Enabled => Ok(TargetState::Enabled),
            PolicyState::Unknown => Err(MutationError::InvalidTarget { state }),
        }
    }
}

impl From<TargetState> for PolicyState {
    fn from(target: TargetState) -> Self {
        target.observed()
    }
}

/// Weighted evidence scores accumulated during inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub enabled: f64,
    pub disabled: f64,
}

impl Evidence {
    pub fn decide(&self) -> PolicyState {
        if self.enabled > self.disabled {
            PolicyState::Enabled
        } else if self.disabled > self.enabled {
            PolicyState::Disabled
        } else if self.enabled == 0.0 {
            PolicyState::NotConfigured
        } else {
            PolicyState::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(enabled: f64, disabled: f64) -> Evidence {
        Evidence { enabled, disabled }
    }

    #[test]
    fn decision_table() {
        assert_eq!(ev(0.0, 0.0).decide(), PolicyState::NotConfigured);
        assert_eq!(ev(1.0, 0.0).decide(), PolicyState::Enabled);
        assert_eq!(ev(0.0, 0.1).decide(), PolicyState::Disabled);
        assert_eq!(ev(2.0, 1.0).decide(), PolicyState::Enabled);
        assert_eq!(ev(1.0, 1.1).decide(), PolicyState::Disabled);
        assert_eq!(ev(1.0, 1.0).decide(), PolicyState::Unknown);
    }

    #[test]
    fn unknown_is_not_a_target() {
        assert!(matches!(
            TargetState::try_from(PolicyState::Unknown),
            Err(MutationError::InvalidTarget { .. })
        ));
        for target in [
            TargetState::Enabled,
            TargetState::Disabled,
            TargetState::NotConfigured,
        ] {
            assert_eq!(TargetState::try_from(target.observed()).unwrap(), target);
        }
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("Enabled".parse::<PolicyState>().unwrap(), PolicyState::Enabled);
        assert_eq!(
            "not-configured".parse::<PolicyState>().unwrap(),
            PolicyState::NotConfigured
        );
        assert!("on".parse::<PolicyState>().is_err());
        assert_eq!(PolicyState::NotConfigured.to_string(), "not_configured");
    }
}
