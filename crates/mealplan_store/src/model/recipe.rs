//! Recipe media and recipe prep tasks.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMedia {
    pub id: String,
    pub belongs_to_recipe: Option<String>,
    pub belongs_to_recipe_step: Option<String>,
    pub mime_type: String,
    pub internal_path: String,
    pub external_path: String,
    pub index: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMediaCreationInput {
    pub id: String,
    pub belongs_to_recipe: Option<String>,
    pub belongs_to_recipe_step: Option<String>,
    pub mime_type: String,
    pub internal_path: String,
    pub external_path: String,
    pub index: u32,
}

impl RecipeMediaCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(StoreError::invalid_input("recipe media id must not be empty"));
        }
        if self.belongs_to_recipe.is_none() && self.belongs_to_recipe_step.is_none() {
            return Err(StoreError::invalid_input(
                "recipe media must belong to a recipe or a recipe step",
            ));
        }
        if self.mime_type.trim().is_empty() || self.internal_path.trim().is_empty() {
            return Err(StoreError::invalid_input(
                "recipe media needs a mime type and an internal path",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMediaUpdateInput {
    pub mime_type: Option<String>,
    pub internal_path: Option<String>,
    pub external_path: Option<String>,
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageContainerType {
    #[serde(rename = "uncovered")]
    Uncovered,
    #[serde(rename = "covered")]
    Covered,
    #[serde(rename = "on a wire rack")]
    WireRack,
    #[serde(rename = "in an airtight container")]
    AirtightContainer,
}

impl StorageContainerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uncovered => "uncovered",
            Self::Covered => "covered",
            Self::WireRack => "on a wire rack",
            Self::AirtightContainer => "in an airtight container",
        }
    }
}

impl fmt::Display for StorageContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageContainerType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "uncovered" => Ok(Self::Uncovered),
            "covered" => Ok(Self::Covered),
            "on a wire rack" => Ok(Self::WireRack),
            "in an airtight container" => Ok(Self::AirtightContainer),
            other => Err(StoreError::invalid_input(format!(
                "unknown storage container type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskStep {
    pub id: String,
    pub belongs_to_recipe_step: String,
    pub belongs_to_recipe_prep_task: String,
    pub satisfies_recipe_step: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTask {
    pub id: String,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub optional: bool,
    pub explicit_storage_instructions: String,
    pub minimum_time_buffer_before_recipe_in_seconds: u32,
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub storage_type: Option<StorageContainerType>,
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    pub maximum_storage_temperature_in_celsius: Option<f32>,
    pub belongs_to_recipe: String,
    pub task_steps: Vec<RecipePrepTaskStep>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskStepCreationInput {
    pub id: String,
    pub belongs_to_recipe_step: String,
    pub satisfies_recipe_step: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskCreationInput {
    pub id: String,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub optional: bool,
    pub explicit_storage_instructions: String,
    pub minimum_time_buffer_before_recipe_in_seconds: u32,
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub storage_type: Option<StorageContainerType>,
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    pub maximum_storage_temperature_in_celsius: Option<f32>,
    pub belongs_to_recipe: String,
    pub task_steps: Vec<RecipePrepTaskStepCreationInput>,
}

impl RecipePrepTaskCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.belongs_to_recipe.trim().is_empty() {
            return Err(StoreError::invalid_input("prep task id and recipe are required"));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("prep task name must not be empty"));
        }
        if self.task_steps.is_empty() {
            return Err(StoreError::invalid_input("prep task needs at least one step"));
        }
        if let Some(maximum) = self.maximum_time_buffer_before_recipe_in_seconds {
            if maximum < self.minimum_time_buffer_before_recipe_in_seconds {
                return Err(StoreError::invalid_input("prep task time buffer is inverted"));
            }
        }
        if let (Some(minimum), Some(maximum)) = (
            self.minimum_storage_temperature_in_celsius,
            self.maximum_storage_temperature_in_celsius,
        ) {
            if maximum < minimum {
                return Err(StoreError::invalid_input(
                    "prep task storage temperature range is inverted",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskUpdateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub optional: Option<bool>,
    pub explicit_storage_instructions: Option<String>,
    pub minimum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub storage_type: Option<StorageContainerType>,
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    pub maximum_storage_temperature_in_celsius: Option<f32>,
}
