//! Repository contracts and their SQLite implementations.
//!
//! # Responsibility
//! - One trait per entity group, implemented over a borrowed connection.
//! - Multi-statement mutations run inside a `Session`.
//! - Every public operation annotates its errors with operation and id.
//!
//! # Invariants
//! - Repositories are only constructed over connections whose schema is at
//!   the latest migration (`try_new` checks it).
//! - Archived rows are never returned unless a filter opts in.
//! - Secrets are encrypted before they reach SQL and never logged.

pub mod advanced_prep_step_repo;
pub mod household_instrument_ownership_repo;
pub mod household_invitation_repo;
pub mod household_repo;
pub(crate) mod list;
pub(crate) mod mapping;
pub mod oauth2_client_token_repo;
pub mod password_reset_token_repo;
pub mod recipe_media_repo;
pub mod recipe_prep_task_repo;
pub(crate) mod rows;
pub mod service_setting_repo;
pub mod user_ingredient_preference_repo;
pub mod valid_ingredient_group_repo;
pub mod valid_ingredient_preparation_repo;
pub mod valid_ingredient_state_ingredient_repo;
pub mod valid_ingredient_state_repo;
pub mod valid_measurement_unit_conversion_repo;
pub mod valid_preparation_instrument_repo;
pub mod valid_preparation_repo;

use crate::db::migrations::{current_user_version, latest_version};
use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;

pub use advanced_prep_step_repo::{AdvancedPrepStepRepository, SqliteAdvancedPrepStepRepository};
pub use household_instrument_ownership_repo::{
    HouseholdInstrumentOwnershipRepository, SqliteHouseholdInstrumentOwnershipRepository,
};
pub use household_invitation_repo::{
    HouseholdInvitationRepository, SqliteHouseholdInvitationRepository,
};
pub use household_repo::{add_user_to_household, HouseholdRepository, SqliteHouseholdRepository};
pub use oauth2_client_token_repo::{OAuth2ClientTokenRepository, SqliteOAuth2ClientTokenRepository};
pub use password_reset_token_repo::{
    PasswordResetTokenRepository, SqlitePasswordResetTokenRepository,
};
pub use recipe_media_repo::{RecipeMediaRepository, SqliteRecipeMediaRepository};
pub use recipe_prep_task_repo::{RecipePrepTaskRepository, SqliteRecipePrepTaskRepository};
pub use service_setting_repo::{ServiceSettingRepository, SqliteServiceSettingRepository};
pub use user_ingredient_preference_repo::{
    SqliteUserIngredientPreferenceRepository, UserIngredientPreferenceRepository,
};
pub use valid_ingredient_group_repo::{
    SqliteValidIngredientGroupRepository, ValidIngredientGroupRepository,
};
pub use valid_ingredient_preparation_repo::{
    SqliteValidIngredientPreparationRepository, ValidIngredientPreparationRepository,
};
pub use valid_ingredient_state_ingredient_repo::{
    SqliteValidIngredientStateIngredientRepository, ValidIngredientStateIngredientRepository,
};
pub use valid_ingredient_state_repo::{
    SqliteValidIngredientStateRepository, ValidIngredientStateRepository,
};
pub use valid_measurement_unit_conversion_repo::{
    SqliteValidMeasurementUnitConversionRepository, ValidMeasurementUnitConversionRepository,
};
pub use valid_preparation_instrument_repo::{
    SqliteValidPreparationInstrumentRepository, ValidPreparationInstrumentRepository,
};
pub use valid_preparation_repo::{SqliteValidPreparationRepository, ValidPreparationRepository};

/// Verifies schema version and the tables/columns a repository relies on.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    required: &[(&'static str, &[&'static str])],
) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(StoreError::invalid_data(format!(
            "connection schema version {actual_version} does not match expected {expected_version}"
        )));
    }

    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(StoreError::invalid_data(format!(
                "required table `{table}` is missing"
            )));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::invalid_data(format!(
                    "required column `{table}.{column}` is missing"
                )));
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
