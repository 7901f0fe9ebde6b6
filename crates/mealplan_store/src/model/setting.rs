//! Service settings and their per-user or per-household configurations.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between options in the stored `enumeration` column.
pub const ENUMERATION_DELIMITER: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSettingType {
    User,
    Household,
    Membership,
}

impl ServiceSettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Household => "household",
            Self::Membership => "membership",
        }
    }
}

impl fmt::Display for ServiceSettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceSettingType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "household" => Ok(Self::Household),
            "membership" => Ok(Self::Membership),
            other => Err(StoreError::invalid_input(format!(
                "unknown service setting type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSetting {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ServiceSettingType,
    pub description: String,
    pub default_value: Option<String>,
    /// Legal values, in declaration order. Empty means free-form.
    pub enumeration: Vec<String>,
    pub admins_only: bool,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl ServiceSetting {
    pub fn accepts(&self, value: &str) -> bool {
        self.enumeration.is_empty() || self.enumeration.iter().any(|option| option == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingCreationInput {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ServiceSettingType,
    pub description: String,
    pub default_value: Option<String>,
    pub enumeration: Vec<String>,
    pub admins_only: bool,
}

impl ServiceSettingCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("service setting id and name are required"));
        }
        if self.enumeration.iter().any(|option| option.trim().is_empty()) {
            return Err(StoreError::invalid_input("service setting options must not be blank"));
        }
        if let Some(option) = self
            .enumeration
            .iter()
            .find(|option| option.contains(ENUMERATION_DELIMITER))
        {
            return Err(StoreError::invalid_input(format!(
                "service setting option `{option}` contains the reserved delimiter"
            )));
        }
        if let Some(default_value) = &self.default_value {
            let known = self.enumeration.is_empty()
                || self.enumeration.iter().any(|option| option == default_value);
            if !known {
                return Err(StoreError::invalid_input(
                    "service setting default is not one of its options",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfiguration {
    pub id: String,
    pub value: String,
    pub notes: String,
    pub service_setting: ServiceSetting,
    pub belongs_to_user: Option<String>,
    pub belongs_to_household: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfigurationCreationInput {
    pub id: String,
    pub value: String,
    pub notes: String,
    pub service_setting_id: String,
    pub belongs_to_user: Option<String>,
    pub belongs_to_household: Option<String>,
}

impl ServiceSettingConfigurationCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.service_setting_id.trim().is_empty() {
            return Err(StoreError::invalid_input(
                "configuration id and service setting id are required",
            ));
        }
        match (&self.belongs_to_user, &self.belongs_to_household) {
            (Some(_), Some(_)) => Err(StoreError::invalid_input(
                "configuration cannot belong to both a user and a household",
            )),
            (None, None) => Err(StoreError::invalid_input(
                "configuration must belong to a user or a household",
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfigurationUpdateInput {
    pub value: Option<String>,
    pub notes: Option<String>,
}
