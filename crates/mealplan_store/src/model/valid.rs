//! Canonical ("valid") vocabulary: ingredients, instruments, units,
//! preparations, ingredient states and the join records between them.
//!
//! # Invariants
//! - Slugs are lowercase kebab case.
//! - Join records are returned as nested aggregates, never as bare ids.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// Rejects anything that is not lowercase kebab case.
pub fn validate_slug(slug: &str) -> StoreResult<()> {
    if SLUG_RE.is_match(slug) {
        return Ok(());
    }
    Err(StoreError::invalid_input(format!(
        "slug `{slug}` must be lowercase kebab case"
    )))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredient {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidInstrument {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnit {
    pub id: String,
    pub name: String,
    pub plural_name: String,
    pub description: String,
    pub slug: String,
    pub volumetric: bool,
    pub universal: bool,
    pub metric: bool,
    pub imperial: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

// Preparations

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon_path: String,
    pub past_tense: String,
    pub slug: String,
    pub yields_nothing: bool,
    pub restrict_to_ingredients: bool,
    pub minimum_ingredient_count: u32,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: u32,
    pub maximum_instrument_count: Option<u32>,
    pub temperature_required: bool,
    pub time_estimate_required: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationCreationInput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon_path: String,
    pub past_tense: String,
    pub slug: String,
    pub yields_nothing: bool,
    pub restrict_to_ingredients: bool,
    pub minimum_ingredient_count: u32,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: u32,
    pub maximum_instrument_count: Option<u32>,
    pub temperature_required: bool,
    pub time_estimate_required: bool,
}

impl ValidPreparationCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("preparation id and name are required"));
        }
        validate_slug(&self.slug)?;
        validate_count_range(
            "ingredient",
            self.minimum_ingredient_count,
            self.maximum_ingredient_count,
        )?;
        validate_count_range(
            "instrument",
            self.minimum_instrument_count,
            self.maximum_instrument_count,
        )
    }
}

pub(crate) fn validate_count_range(
    what: &str,
    minimum: u32,
    maximum: Option<u32>,
) -> StoreResult<()> {
    match maximum {
        Some(maximum) if maximum < minimum => Err(StoreError::invalid_input(format!(
            "maximum {what} count is below the minimum"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationUpdateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub past_tense: Option<String>,
    pub slug: Option<String>,
    pub yields_nothing: Option<bool>,
    pub restrict_to_ingredients: Option<bool>,
    pub minimum_ingredient_count: Option<u32>,
    pub maximum_ingredient_count: Option<u32>,
    pub minimum_instrument_count: Option<u32>,
    pub maximum_instrument_count: Option<u32>,
    pub temperature_required: Option<bool>,
    pub time_estimate_required: Option<bool>,
}

// Ingredient states

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientAttributeType {
    Texture,
    Consistency,
    Color,
    Appearance,
    Odor,
    Taste,
    Sound,
    Temperature,
    Other,
}

impl IngredientAttributeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Consistency => "consistency",
            Self::Color => "color",
            Self::Appearance => "appearance",
            Self::Odor => "odor",
            Self::Taste => "taste",
            Self::Sound => "sound",
            Self::Temperature => "temperature",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IngredientAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngredientAttributeType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "texture" => Ok(Self::Texture),
            "consistency" => Ok(Self::Consistency),
            "color" => Ok(Self::Color),
            "appearance" => Ok(Self::Appearance),
            "odor" => Ok(Self::Odor),
            "taste" => Ok(Self::Taste),
            "sound" => Ok(Self::Sound),
            "temperature" => Ok(Self::Temperature),
            "other" => Ok(Self::Other),
            other => Err(StoreError::invalid_input(format!(
                "unknown ingredient attribute type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientState {
    pub id: String,
    pub name: String,
    pub past_tense: String,
    pub slug: String,
    pub description: String,
    pub icon_path: String,
    pub attribute_type: IngredientAttributeType,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateCreationInput {
    pub id: String,
    pub name: String,
    pub past_tense: String,
    pub slug: String,
    pub description: String,
    pub icon_path: String,
    pub attribute_type: IngredientAttributeType,
}

impl ValidIngredientStateCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("ingredient state id and name are required"));
        }
        validate_slug(&self.slug)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateUpdateInput {
    pub name: Option<String>,
    pub past_tense: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon_path: Option<String>,
    pub attribute_type: Option<IngredientAttributeType>,
}

// Ingredient groups

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroupMember {
    pub id: String,
    pub belongs_to_group: String,
    pub valid_ingredient: ValidIngredient,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroup {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub members: Vec<ValidIngredientGroupMember>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroupMemberCreationInput {
    pub id: String,
    pub valid_ingredient_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroupCreationInput {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub members: Vec<ValidIngredientGroupMemberCreationInput>,
}

impl ValidIngredientGroupCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("ingredient group id and name are required"));
        }
        validate_slug(&self.slug)?;
        let mut seen = HashSet::new();
        for member in &self.members {
            if member.id.trim().is_empty() || member.valid_ingredient_id.trim().is_empty() {
                return Err(StoreError::invalid_input(
                    "ingredient group member id and ingredient are required",
                ));
            }
            if !seen.insert(member.valid_ingredient_id.as_str()) {
                return Err(StoreError::invalid_input(format!(
                    "ingredient {} appears twice in group {}",
                    member.valid_ingredient_id, self.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientGroupUpdateInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
}

// Join records

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientPreparation {
    pub id: String,
    pub notes: String,
    pub preparation: ValidPreparation,
    pub ingredient: ValidIngredient,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientPreparationCreationInput {
    pub id: String,
    pub notes: String,
    pub valid_preparation_id: String,
    pub valid_ingredient_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientPreparationUpdateInput {
    pub notes: Option<String>,
    pub valid_preparation_id: Option<String>,
    pub valid_ingredient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateIngredient {
    pub id: String,
    pub notes: String,
    pub ingredient_state: ValidIngredientState,
    pub ingredient: ValidIngredient,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateIngredientCreationInput {
    pub id: String,
    pub notes: String,
    pub valid_ingredient_state_id: String,
    pub valid_ingredient_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidIngredientStateIngredientUpdateInput {
    pub notes: Option<String>,
    pub valid_ingredient_state_id: Option<String>,
    pub valid_ingredient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationInstrument {
    pub id: String,
    pub notes: String,
    pub preparation: ValidPreparation,
    pub instrument: ValidInstrument,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationInstrumentCreationInput {
    pub id: String,
    pub notes: String,
    pub valid_preparation_id: String,
    pub valid_instrument_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPreparationInstrumentUpdateInput {
    pub notes: Option<String>,
    pub valid_preparation_id: Option<String>,
    pub valid_instrument_id: Option<String>,
}

// Measurement unit conversions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitConversion {
    pub id: String,
    pub from: ValidMeasurementUnit,
    pub to: ValidMeasurementUnit,
    pub only_for_ingredient: Option<ValidIngredient>,
    pub modifier: f32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitConversionCreationInput {
    pub id: String,
    pub from_unit: String,
    pub to_unit: String,
    pub only_for_ingredient: Option<String>,
    pub modifier: f32,
    pub notes: String,
}

impl ValidMeasurementUnitConversionCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty()
            || self.from_unit.trim().is_empty()
            || self.to_unit.trim().is_empty()
        {
            return Err(StoreError::invalid_input("conversion id and both units are required"));
        }
        if self.from_unit == self.to_unit {
            return Err(StoreError::invalid_input(
                "conversion must be between two different units",
            ));
        }
        if !self.modifier.is_finite() || self.modifier == 0.0 {
            return Err(StoreError::invalid_input("conversion modifier must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidMeasurementUnitConversionUpdateInput {
    pub from_unit: Option<String>,
    pub to_unit: Option<String>,
    /// `Some(None)` clears the ingredient restriction.
    pub only_for_ingredient: Option<Option<String>>,
    pub modifier: Option<f32>,
    pub notes: Option<String>,
}
