//! Household and household-membership persistence.
//!
//! # Responsibility
//! - Create households together with the owner's admin membership.
//! - Add, list and archive memberships.
//!
//! # Invariants
//! - A user holds at most one live membership per household (partial unique
//!   index); a second add is `Conflict`.
//! - Archiving a household archives its memberships in the same session.

use crate::db::{run_in_session, QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    Household, HouseholdCreationInput, HouseholdMembershipCreationInput, HouseholdRole,
    HouseholdUpdateInput, HouseholdUserMembership, ListPage, QueryFilter,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{bool_to_int, get_bool, get_enum, get_opt_time, get_time, time_to_db};
use crate::runtime::StoreRuntime;
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

const HOUSEHOLD_COLUMNS: &str = "households.id,
    households.name,
    households.contact_phone,
    households.time_zone,
    households.belongs_to_user,
    households.created_at,
    households.last_updated_at,
    households.archived_at";

const MEMBERSHIP_COLUMNS: &str = "household_user_memberships.id,
    household_user_memberships.belongs_to_household,
    household_user_memberships.belongs_to_user,
    household_user_memberships.default_household,
    household_user_memberships.household_role,
    household_user_memberships.reason,
    household_user_memberships.created_at,
    household_user_memberships.last_updated_at,
    household_user_memberships.archived_at";

pub trait HouseholdRepository {
    fn household_exists(&self, ctx: &QueryContext, household_id: &str) -> StoreResult<bool>;
    fn get_household(&self, ctx: &QueryContext, household_id: &str) -> StoreResult<Household>;
    /// Households the user holds a live membership in.
    fn list_households_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<Household>>;
    fn create_household(
        &self,
        ctx: &QueryContext,
        input: &HouseholdCreationInput,
    ) -> StoreResult<Household>;
    fn update_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        input: &HouseholdUpdateInput,
    ) -> StoreResult<Household>;
    /// Only the owning user may archive a household.
    fn archive_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        owner_user_id: &str,
    ) -> StoreResult<()>;
    fn list_memberships_for_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdUserMembership>>;
    fn user_is_household_member(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        user_id: &str,
    ) -> StoreResult<bool>;
    fn add_user_to_household(
        &self,
        ctx: &QueryContext,
        input: &HouseholdMembershipCreationInput,
    ) -> StoreResult<HouseholdUserMembership>;
    fn remove_user_from_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        user_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteHouseholdRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteHouseholdRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("households", &["name", "belongs_to_user", "archived_at"]),
                (
                    "household_user_memberships",
                    &["belongs_to_household", "belongs_to_user", "household_role", "reason"],
                ),
            ],
        )?;
        Ok(Self { conn, runtime })
    }
}

impl HouseholdRepository for SqliteHouseholdRepository<'_> {
    fn household_exists(&self, ctx: &QueryContext, household_id: &str) -> StoreResult<bool> {
        require_id(household_id, "household id")?;
        self.conn
            .read_exists(
                ctx,
                "household existence",
                "SELECT EXISTS (
                    SELECT 1 FROM households WHERE id = ?1 AND archived_at IS NULL
                );",
                [household_id],
            )
            .annotate("check household existence", household_id)
    }

    fn get_household(&self, ctx: &QueryContext, household_id: &str) -> StoreResult<Household> {
        require_id(household_id, "household id")?;
        fetch_household(self.conn, ctx, household_id).annotate("get household", household_id)
    }

    fn list_households_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<Household>> {
        require_id(user_id, "user id")?;
        let spec = ListSpec::new("households", HOUSEHOLD_COLUMNS, "households").scoped(
            "households.id IN (
                SELECT belongs_to_household
                FROM household_user_memberships
                WHERE belongs_to_user = ? AND archived_at IS NULL
            )",
            vec![Value::Text(user_id.to_string())],
        );
        list_page(self.conn, ctx, "household", &spec, filter, household_from_row)
            .annotate("list households for user", user_id)
    }

    fn create_household(
        &self,
        ctx: &QueryContext,
        input: &HouseholdCreationInput,
    ) -> StoreResult<Household> {
        input.validate()?;
        let now = self.runtime.now();
        let household = Household {
            id: input.id.clone(),
            name: input.name.clone(),
            contact_phone: input.contact_phone.clone(),
            time_zone: input.time_zone.clone(),
            belongs_to_user: input.belongs_to_user.clone(),
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        };
        let membership = HouseholdMembershipCreationInput {
            id: self.runtime.new_id(),
            household_id: household.id.clone(),
            user_id: household.belongs_to_user.clone(),
            default_household: true,
            role: HouseholdRole::HouseholdAdmin,
            reason: "created household".to_string(),
        };

        run_in_session(self.conn, ctx, "create household", |session| {
            session.execute_write(
                ctx,
                "household creation",
                "INSERT INTO households (
                    id, name, contact_phone, time_zone, belongs_to_user, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    household.id,
                    household.name,
                    household.contact_phone,
                    household.time_zone,
                    household.belongs_to_user,
                    time_to_db(now),
                ],
            )?;
            add_user_to_household(session, ctx, now, &membership)?;
            Ok(())
        })
        .annotate("create household", &input.id)?;

        info!("event=household_create module=repo status=ok id={}", household.id);
        Ok(household)
    }

    fn update_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        input: &HouseholdUpdateInput,
    ) -> StoreResult<Household> {
        require_id(household_id, "household id")?;
        if input.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(StoreError::invalid_input("household name must not be empty"));
        }
        let changed = self
            .conn
            .execute_write(
                ctx,
                "household update",
                "UPDATE households
                 SET name = COALESCE(?2, name),
                     contact_phone = COALESCE(?3, contact_phone),
                     time_zone = COALESCE(?4, time_zone),
                     last_updated_at = ?5
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    household_id,
                    input.name,
                    input.contact_phone,
                    input.time_zone,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update household", household_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("household")).annotate("update household", household_id);
        }
        fetch_household(self.conn, ctx, household_id).annotate("update household", household_id)
    }

    fn archive_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        owner_user_id: &str,
    ) -> StoreResult<()> {
        require_id(household_id, "household id")?;
        require_id(owner_user_id, "user id")?;
        let now = time_to_db(self.runtime.now());
        run_in_session(self.conn, ctx, "archive household", |session| {
            let archived = session.execute_write(
                ctx,
                "household archive",
                "UPDATE households
                 SET archived_at = ?3, last_updated_at = ?3
                 WHERE id = ?1 AND belongs_to_user = ?2 AND archived_at IS NULL;",
                params![household_id, owner_user_id, now],
            )?;
            if archived == 0 {
                return Err(StoreError::NotFound("household"));
            }
            session.execute_write(
                ctx,
                "household membership archive",
                "UPDATE household_user_memberships
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE belongs_to_household = ?1 AND archived_at IS NULL;",
                params![household_id, now],
            )?;
            Ok(())
        })
        .annotate("archive household", household_id)?;

        info!("event=household_archive module=repo status=ok id={household_id}");
        Ok(())
    }

    fn list_memberships_for_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdUserMembership>> {
        require_id(household_id, "household id")?;
        let spec = ListSpec::new(
            "household_user_memberships",
            MEMBERSHIP_COLUMNS,
            "household_user_memberships",
        )
        .scoped(
            "household_user_memberships.belongs_to_household = ?",
            vec![Value::Text(household_id.to_string())],
        );
        list_page(self.conn, ctx, "household membership", &spec, filter, membership_from_row)
            .annotate("list memberships for household", household_id)
    }

    fn user_is_household_member(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        user_id: &str,
    ) -> StoreResult<bool> {
        require_id(household_id, "household id")?;
        require_id(user_id, "user id")?;
        self.conn
            .read_exists(
                ctx,
                "household membership existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM household_user_memberships
                    WHERE belongs_to_household = ?1
                      AND belongs_to_user = ?2
                      AND archived_at IS NULL
                );",
                params![household_id, user_id],
            )
            .annotate("check household membership", household_id)
    }

    fn add_user_to_household(
        &self,
        ctx: &QueryContext,
        input: &HouseholdMembershipCreationInput,
    ) -> StoreResult<HouseholdUserMembership> {
        add_user_to_household(self.conn, ctx, self.runtime.now(), input)
            .annotate("add user to household", &input.household_id)
    }

    fn remove_user_from_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        user_id: &str,
    ) -> StoreResult<()> {
        require_id(household_id, "household id")?;
        require_id(user_id, "user id")?;
        let removed = self
            .conn
            .execute_write(
                ctx,
                "household membership removal",
                "UPDATE household_user_memberships
                 SET archived_at = ?3, last_updated_at = ?3
                 WHERE belongs_to_household = ?1
                   AND belongs_to_user = ?2
                   AND archived_at IS NULL;",
                params![household_id, user_id, time_to_db(self.runtime.now())],
            )
            .annotate("remove user from household", household_id)?;
        if removed == 0 {
            return Err(StoreError::NotFound("household membership"))
                .annotate("remove user from household", household_id);
        }
        info!("event=household_member_remove module=repo status=ok household_id={household_id}");
        Ok(())
    }
}

/// Inserts one membership on any executor, so invitation acceptance can run
/// it inside its own session.
pub fn add_user_to_household<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    now: DateTime<Utc>,
    input: &HouseholdMembershipCreationInput,
) -> StoreResult<HouseholdUserMembership> {
    require_id(&input.id, "membership id")?;
    require_id(&input.household_id, "household id")?;
    require_id(&input.user_id, "user id")?;

    exec.execute_write(
        ctx,
        "household membership creation",
        "INSERT INTO household_user_memberships (
            id,
            belongs_to_household,
            belongs_to_user,
            default_household,
            household_role,
            reason,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            input.id,
            input.household_id,
            input.user_id,
            bool_to_int(input.default_household),
            input.role.as_str(),
            input.reason,
            time_to_db(now),
        ],
    )?;

    info!(
        "event=household_member_add module=repo status=ok household_id={} role={}",
        input.household_id, input.role
    );
    Ok(HouseholdUserMembership {
        id: input.id.clone(),
        belongs_to_household: input.household_id.clone(),
        belongs_to_user: input.user_id.clone(),
        default_household: input.default_household,
        household_role: input.role,
        reason: input.reason.clone(),
        created_at: now,
        last_updated_at: None,
        archived_at: None,
    })
}

fn fetch_household<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    household_id: &str,
) -> StoreResult<Household> {
    let sql = format!(
        "SELECT {HOUSEHOLD_COLUMNS}
         FROM households
         WHERE households.id = ?1 AND households.archived_at IS NULL;"
    );
    exec.read_one(ctx, "household", &sql, [household_id], household_from_row)
}

fn household_from_row(row: &Row<'_>) -> StoreResult<Household> {
    Ok(Household {
        id: row.get("id")?,
        name: row.get("name")?,
        contact_phone: row.get("contact_phone")?,
        time_zone: row.get("time_zone")?,
        belongs_to_user: row.get("belongs_to_user")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}

fn membership_from_row(row: &Row<'_>) -> StoreResult<HouseholdUserMembership> {
    Ok(HouseholdUserMembership {
        id: row.get("id")?,
        belongs_to_household: row.get("belongs_to_household")?,
        belongs_to_user: row.get("belongs_to_user")?,
        default_household: get_bool(row, "default_household")?,
        household_role: get_enum(row, "household_role")?,
        reason: row.get("reason")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
