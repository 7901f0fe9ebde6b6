//! Households, memberships and household invitations.
//!
//! # Invariants
//! - Invitations start `pending` and make exactly one terminal transition.
//! - Invitation e-mail addresses are compared lower-cased.

use super::valid::ValidInstrument;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdRole {
    HouseholdAdmin,
    HouseholdMember,
}

impl HouseholdRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HouseholdAdmin => "household_admin",
            Self::HouseholdMember => "household_member",
        }
    }
}

impl fmt::Display for HouseholdRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HouseholdRole {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "household_admin" => Ok(Self::HouseholdAdmin),
            "household_member" => Ok(Self::HouseholdMember),
            other => Err(StoreError::invalid_input(format!(
                "unknown household role `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub id: String,
    pub name: String,
    pub contact_phone: String,
    pub time_zone: String,
    pub belongs_to_user: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdCreationInput {
    pub id: String,
    pub name: String,
    pub contact_phone: String,
    pub time_zone: String,
    pub belongs_to_user: String,
}

impl HouseholdCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty() || self.belongs_to_user.trim().is_empty() {
            return Err(StoreError::invalid_input("household id and owner are required"));
        }
        if self.name.trim().is_empty() {
            return Err(StoreError::invalid_input("household name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdUpdateInput {
    pub name: Option<String>,
    pub contact_phone: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdUserMembership {
    pub id: String,
    pub belongs_to_household: String,
    pub belongs_to_user: String,
    pub default_household: bool,
    pub household_role: HouseholdRole,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Arguments for one membership insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseholdMembershipCreationInput {
    pub id: String,
    pub household_id: String,
    pub user_id: String,
    pub default_household: bool,
    pub role: HouseholdRole,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdInvitationStatus {
    Pending,
    Cancelled,
    Accepted,
    Rejected,
}

impl HouseholdInvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Cancelled => "cancelled",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for HouseholdInvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HouseholdInvitationStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "cancelled" => Ok(Self::Cancelled),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(StoreError::invalid_input(format!(
                "unknown household invitation status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitation {
    pub id: String,
    pub destination_household: String,
    pub from_user: String,
    pub to_user: Option<String>,
    pub to_name: String,
    pub to_email: String,
    pub token: String,
    pub note: String,
    pub status_note: String,
    pub status: HouseholdInvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitationCreationInput {
    pub id: String,
    pub from_user: String,
    pub to_user: Option<String>,
    pub to_name: String,
    pub to_email: String,
    pub note: String,
    pub token: String,
    pub destination_household: String,
    pub expires_at: DateTime<Utc>,
}

impl HouseholdInvitationCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        let required = [
            ("invitation id", &self.id),
            ("from user", &self.from_user),
            ("to email", &self.to_email),
            ("token", &self.token),
            ("destination household", &self.destination_household),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(StoreError::invalid_input(format!("{field} must not be empty")));
            }
        }
        if !self.to_email.contains('@') {
            return Err(StoreError::invalid_input("to email is not an e-mail address"));
        }
        Ok(())
    }
}

/// Registration-time acceptance: the new user redeems an invitation they
/// were sent by e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationAcceptanceForUserInput {
    pub user_id: String,
    pub email_address: String,
    pub invitation_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInstrumentOwnership {
    pub id: String,
    pub notes: String,
    pub quantity: u32,
    pub instrument: ValidInstrument,
    pub belongs_to_household: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInstrumentOwnershipCreationInput {
    pub id: String,
    pub notes: String,
    pub quantity: u32,
    pub valid_instrument_id: String,
    pub belongs_to_household: String,
}

impl HouseholdInstrumentOwnershipCreationInput {
    pub fn validate(&self) -> StoreResult<()> {
        if self.id.trim().is_empty()
            || self.valid_instrument_id.trim().is_empty()
            || self.belongs_to_household.trim().is_empty()
        {
            return Err(StoreError::invalid_input(
                "ownership id, instrument and household are required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInstrumentOwnershipUpdateInput {
    pub notes: Option<String>,
    pub quantity: Option<u32>,
    pub valid_instrument_id: Option<String>,
}

/// Canonical form used for storage and matching.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}
