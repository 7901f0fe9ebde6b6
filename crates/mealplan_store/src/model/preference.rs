//! User ingredient preferences.

use super::valid::ValidIngredient;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreference {
    pub id: String,
    pub ingredient: ValidIngredient,
    pub rating: i16,
    pub notes: String,
    pub allergy: bool,
    pub belongs_to_user: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Targets either one ingredient or every member of an ingredient group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreferenceCreationInput {
    pub valid_ingredient_id: Option<String>,
    pub valid_ingredient_group_id: Option<String>,
    pub rating: i16,
    pub notes: String,
    pub allergy: bool,
    pub belongs_to_user: String,
}

impl UserIngredientPreferenceCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.belongs_to_user.trim().is_empty() {
            return Err(StoreError::invalid_input("preference owner must not be empty"));
        }
        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
        match (blank(&self.valid_ingredient_id), blank(&self.valid_ingredient_group_id)) {
            (false, false) => Err(StoreError::invalid_input(
                "preference targets either an ingredient or a group, not both",
            )),
            (true, true) => Err(StoreError::invalid_input(
                "preference needs an ingredient or an ingredient group",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreferenceUpdateInput {
    pub valid_ingredient_id: Option<String>,
    pub rating: Option<i16>,
    pub notes: Option<String>,
    pub allergy: Option<bool>,
}
