//! Advanced prep steps and the meal-plan options they are derived from.
//!
//! # Invariants
//! - `finished`, `ignored` and `canceled` are terminal.
//! - `settled_at` is set exactly when the status becomes `finished`.
//! - `cannot_complete_before <= cannot_complete_after`.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancedPrepStepStatus {
    Unfinished,
    Postponed,
    Ignored,
    Canceled,
    Finished,
}

impl AdvancedPrepStepStatus {
    pub const ALL: [Self; 5] = [
        Self::Unfinished,
        Self::Postponed,
        Self::Ignored,
        Self::Canceled,
        Self::Finished,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unfinished => "unfinished",
            Self::Postponed => "postponed",
            Self::Ignored => "ignored",
            Self::Canceled => "canceled",
            Self::Finished => "finished",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ignored | Self::Canceled | Self::Finished)
    }

    /// Statuses a step may move to `self` from.
    pub fn allowed_sources(self) -> &'static [Self] {
        match self {
            Self::Unfinished => &[Self::Postponed],
            Self::Postponed => &[Self::Unfinished],
            Self::Ignored | Self::Canceled | Self::Finished => {
                &[Self::Unfinished, Self::Postponed]
            }
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        next.allowed_sources().contains(&self)
    }
}

impl fmt::Display for AdvancedPrepStepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdvancedPrepStepStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unfinished" => Ok(Self::Unfinished),
            "postponed" => Ok(Self::Postponed),
            "ignored" => Ok(Self::Ignored),
            "canceled" => Ok(Self::Canceled),
            "finished" => Ok(Self::Finished),
            other => Err(StoreError::invalid_input(format!(
                "unknown advanced prep step status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPrepStep {
    pub id: String,
    pub belongs_to_meal_plan_option: String,
    pub recipe_step_id: String,
    pub status: AdvancedPrepStepStatus,
    pub status_explanation: String,
    pub creation_explanation: String,
    pub cannot_complete_before: DateTime<Utc>,
    pub cannot_complete_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPrepStepCreationInput {
    pub id: String,
    pub recipe_step_id: String,
    pub status: AdvancedPrepStepStatus,
    pub status_explanation: String,
    pub creation_explanation: String,
    pub cannot_complete_before: DateTime<Utc>,
    pub cannot_complete_after: DateTime<Utc>,
}

impl AdvancedPrepStepCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::invalid_input("advanced prep step id must not be empty"));
        }
        if self.recipe_step_id.trim().is_empty() {
            return Err(StoreError::invalid_input("recipe step id must not be empty"));
        }
        if self.cannot_complete_before > self.cannot_complete_after {
            return Err(StoreError::invalid_input(format!(
                "advanced prep step {} has an inverted completion window",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedPrepStepStatusChangeInput {
    pub id: String,
    pub status: AdvancedPrepStepStatus,
    pub status_explanation: String,
}

/// A chosen option whose prep steps have not been materialized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOptionAwaitingPrepSteps {
    pub meal_plan_option_id: String,
    pub meal_plan_id: String,
    pub household_id: String,
    pub recipe_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::AdvancedPrepStepStatus::{self, *};

    #[test]
    fn terminal_statuses_never_transition() {
        for from in [Finished, Ignored, Canceled] {
            for to in AdvancedPrepStepStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn live_statuses_follow_the_transition_table() {
        assert!(Unfinished.can_transition_to(Postponed));
        assert!(Unfinished.can_transition_to(Finished));
        assert!(Postponed.can_transition_to(Unfinished));
        assert!(Postponed.can_transition_to(Canceled));
        assert!(!Unfinished.can_transition_to(Unfinished));
        assert!(!Postponed.can_transition_to(Postponed));
    }

    #[test]
    fn unknown_spelling_is_rejected() {
        assert!("cancelled".parse::<AdvancedPrepStepStatus>().is_err());
        assert_eq!("ignored".parse::<AdvancedPrepStepStatus>().unwrap(), Ignored);
    }
}
