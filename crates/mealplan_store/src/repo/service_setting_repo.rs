//! Service settings and their per-user or per-household configurations.
//!
//! # Responsibility
//! - Store settings with their closed enumeration of legal values.
//! - Store configurations owned by exactly one user or one household.
//!
//! # Invariants
//! - The enumeration is written joined by `ENUMERATION_DELIMITER` and read
//!   back with empty segments dropped.
//! - A configuration value must be one of its setting's options when the
//!   setting declares any.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    ListPage, QueryFilter, ServiceSetting, ServiceSettingConfiguration,
    ServiceSettingConfigurationCreationInput, ServiceSettingConfigurationUpdateInput,
    ServiceSettingCreationInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{
    bool_to_int, get_bool, get_enum, get_opt_time, get_time, join_enumeration,
    split_enumeration, time_to_db,
};
use crate::runtime::StoreRuntime;
use log::info;
use once_cell::sync::Lazy;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Params, Row};

const SETTING_FIELDS: &[&str] = &[
    "id",
    "name",
    "type",
    "description",
    "default_value",
    "enumeration",
    "admins_only",
    "created_at",
    "last_updated_at",
    "archived_at",
];

static SETTING_COLUMNS: Lazy<String> = Lazy::new(|| setting_columns(""));

const CONFIGURATION_FROM: &str = "service_setting_configurations
    INNER JOIN service_settings
        ON service_settings.id = service_setting_configurations.service_setting_id";

static CONFIGURATION_COLUMNS: Lazy<String> = Lazy::new(|| {
    format!(
        "service_setting_configurations.id,
         service_setting_configurations.value,
         service_setting_configurations.notes,
         service_setting_configurations.belongs_to_user,
         service_setting_configurations.belongs_to_household,
         service_setting_configurations.created_at,
         service_setting_configurations.last_updated_at,
         service_setting_configurations.archived_at,
         {}",
        setting_columns("setting_")
    )
});

fn setting_columns(prefix: &str) -> String {
    SETTING_FIELDS
        .iter()
        .map(|field| format!("service_settings.{field} AS {prefix}{field}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub trait ServiceSettingRepository {
    fn service_setting_exists(&self, ctx: &QueryContext, setting_id: &str) -> StoreResult<bool>;
    fn get_service_setting(&self, ctx: &QueryContext, setting_id: &str)
        -> StoreResult<ServiceSetting>;
    fn get_service_setting_by_name(&self, ctx: &QueryContext, name: &str)
        -> StoreResult<ServiceSetting>;
    fn list_service_settings(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSetting>>;
    fn create_service_setting(
        &self,
        ctx: &QueryContext,
        input: &ServiceSettingCreationInput,
    ) -> StoreResult<ServiceSetting>;
    fn archive_service_setting(&self, ctx: &QueryContext, setting_id: &str) -> StoreResult<()>;

    fn service_setting_configuration_exists(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<bool>;
    fn get_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<ServiceSettingConfiguration>;
    fn get_service_setting_configuration_for_user_by_setting_name(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        setting_name: &str,
    ) -> StoreResult<ServiceSettingConfiguration>;
    fn get_service_setting_configuration_for_household_by_setting_name(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        setting_name: &str,
    ) -> StoreResult<ServiceSettingConfiguration>;
    fn list_service_setting_configurations_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSettingConfiguration>>;
    fn list_service_setting_configurations_for_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSettingConfiguration>>;
    fn create_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        input: &ServiceSettingConfigurationCreationInput,
    ) -> StoreResult<ServiceSettingConfiguration>;
    fn update_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
        input: &ServiceSettingConfigurationUpdateInput,
    ) -> StoreResult<ServiceSettingConfiguration>;
    fn archive_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteServiceSettingRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteServiceSettingRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("service_settings", &["name", "type", "enumeration", "default_value"]),
                (
                    "service_setting_configurations",
                    &["value", "service_setting_id", "belongs_to_user", "belongs_to_household"],
                ),
            ],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch_setting<P: Params>(
        &self,
        ctx: &QueryContext,
        predicate: &str,
        params: P,
    ) -> StoreResult<ServiceSetting> {
        let sql = format!(
            "SELECT {}
             FROM service_settings
             WHERE {predicate} AND service_settings.archived_at IS NULL;",
            SETTING_COLUMNS.as_str()
        );
        self.conn
            .read_one(ctx, "service setting", &sql, params, |row| setting_from_row(row, ""))
    }

    fn fetch_configuration<P: Params>(
        &self,
        ctx: &QueryContext,
        predicate: &str,
        params: P,
    ) -> StoreResult<ServiceSettingConfiguration> {
        let sql = format!(
            "SELECT {}
             FROM {CONFIGURATION_FROM}
             WHERE {predicate}
               AND service_setting_configurations.archived_at IS NULL
               AND service_settings.archived_at IS NULL;",
            CONFIGURATION_COLUMNS.as_str()
        );
        self.conn
            .read_one(ctx, "service setting configuration", &sql, params, configuration_from_row)
    }

    fn list_configurations(
        &self,
        ctx: &QueryContext,
        owner_column: &'static str,
        owner_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSettingConfiguration>> {
        let scope = format!(
            "service_setting_configurations.{owner_column} = ?
             AND service_setting_configurations.service_setting_id IN (
                 SELECT live.id FROM service_settings AS live WHERE live.archived_at IS NULL
             )"
        );
        let spec = ListSpec::new(
            "service_setting_configurations",
            CONFIGURATION_COLUMNS.as_str(),
            CONFIGURATION_FROM,
        )
        .scoped(&scope, vec![Value::Text(owner_id.to_string())]);
        list_page(
            self.conn,
            ctx,
            "service setting configuration",
            &spec,
            filter,
            configuration_from_row,
        )
    }

    fn ensure_accepted(&self, setting: &ServiceSetting, value: &str) -> StoreResult<()> {
        if setting.accepts(value) {
            return Ok(());
        }
        Err(StoreError::invalid_input(format!(
            "value is not one of the options of service setting {}",
            setting.name
        )))
    }
}

impl ServiceSettingRepository for SqliteServiceSettingRepository<'_> {
    fn service_setting_exists(&self, ctx: &QueryContext, setting_id: &str) -> StoreResult<bool> {
        require_id(setting_id, "service setting id")?;
        self.conn
            .read_exists(
                ctx,
                "service setting existence",
                "SELECT EXISTS (
                    SELECT 1 FROM service_settings WHERE id = ?1 AND archived_at IS NULL
                );",
                [setting_id],
            )
            .annotate("check service setting existence", setting_id)
    }

    fn get_service_setting(
        &self,
        ctx: &QueryContext,
        setting_id: &str,
    ) -> StoreResult<ServiceSetting> {
        require_id(setting_id, "service setting id")?;
        self.fetch_setting(ctx, "service_settings.id = ?1", [setting_id])
            .annotate("get service setting", setting_id)
    }

    fn get_service_setting_by_name(
        &self,
        ctx: &QueryContext,
        name: &str,
    ) -> StoreResult<ServiceSetting> {
        require_id(name, "service setting name")?;
        self.fetch_setting(ctx, "service_settings.name = ?1", [name])
            .annotate("get service setting by name", name)
    }

    fn list_service_settings(
        &self,
        ctx: &QueryContext,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSetting>> {
        let spec = ListSpec::new("service_settings", SETTING_COLUMNS.as_str(), "service_settings");
        list_page(self.conn, ctx, "service setting", &spec, filter, |row| {
            setting_from_row(row, "")
        })
        .annotate("list service settings", "*")
    }

    fn create_service_setting(
        &self,
        ctx: &QueryContext,
        input: &ServiceSettingCreationInput,
    ) -> StoreResult<ServiceSetting> {
        input.validate()?;
        let now = self.runtime.now();
        let enumeration = join_enumeration(&input.enumeration);
        self.conn
            .execute_write(
                ctx,
                "service setting creation",
                "INSERT INTO service_settings (
                    id, name, type, description, default_value, enumeration, admins_only, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    input.id,
                    input.name,
                    input.kind.as_str(),
                    input.description,
                    input.default_value,
                    enumeration,
                    bool_to_int(input.admins_only),
                    time_to_db(now),
                ],
            )
            .annotate("create service setting", &input.id)?;

        info!("event=service_setting_create module=repo status=ok id={}", input.id);
        Ok(ServiceSetting {
            id: input.id.clone(),
            name: input.name.clone(),
            kind: input.kind,
            description: input.description.clone(),
            default_value: input.default_value.clone(),
            enumeration: split_enumeration(&enumeration),
            admins_only: input.admins_only,
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        })
    }

    fn archive_service_setting(&self, ctx: &QueryContext, setting_id: &str) -> StoreResult<()> {
        require_id(setting_id, "service setting id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "service setting archive",
                "UPDATE service_settings
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![setting_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive service setting", setting_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("service setting"))
                .annotate("archive service setting", setting_id);
        }
        Ok(())
    }

    fn service_setting_configuration_exists(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<bool> {
        require_id(configuration_id, "service setting configuration id")?;
        self.conn
            .read_exists(
                ctx,
                "service setting configuration existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM service_setting_configurations
                    WHERE id = ?1 AND archived_at IS NULL
                );",
                [configuration_id],
            )
            .annotate("check service setting configuration existence", configuration_id)
    }

    fn get_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<ServiceSettingConfiguration> {
        require_id(configuration_id, "service setting configuration id")?;
        self.fetch_configuration(ctx, "service_setting_configurations.id = ?1", [configuration_id])
            .annotate("get service setting configuration", configuration_id)
    }

    fn get_service_setting_configuration_for_user_by_setting_name(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        setting_name: &str,
    ) -> StoreResult<ServiceSettingConfiguration> {
        require_id(user_id, "user id")?;
        require_id(setting_name, "service setting name")?;
        self.fetch_configuration(
            ctx,
            "service_setting_configurations.belongs_to_user = ?1 AND service_settings.name = ?2",
            params![user_id, setting_name],
        )
        .annotate("get service setting configuration for user", setting_name)
    }

    fn get_service_setting_configuration_for_household_by_setting_name(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        setting_name: &str,
    ) -> StoreResult<ServiceSettingConfiguration> {
        require_id(household_id, "household id")?;
        require_id(setting_name, "service setting name")?;
        self.fetch_configuration(
            ctx,
            "service_setting_configurations.belongs_to_household = ?1 AND service_settings.name = ?2",
            params![household_id, setting_name],
        )
        .annotate("get service setting configuration for household", setting_name)
    }

    fn list_service_setting_configurations_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSettingConfiguration>> {
        require_id(user_id, "user id")?;
        self.list_configurations(ctx, "belongs_to_user", user_id, filter)
            .annotate("list service setting configurations for user", user_id)
    }

    fn list_service_setting_configurations_for_household(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<ServiceSettingConfiguration>> {
        require_id(household_id, "household id")?;
        self.list_configurations(ctx, "belongs_to_household", household_id, filter)
            .annotate("list service setting configurations for household", household_id)
    }

    fn create_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        input: &ServiceSettingConfigurationCreationInput,
    ) -> StoreResult<ServiceSettingConfiguration> {
        input.validate()?;
        let setting = self
            .fetch_setting(ctx, "service_settings.id = ?1", [input.service_setting_id.as_str()])
            .annotate("create service setting configuration", &input.id)?;
        self.ensure_accepted(&setting, &input.value)?;

        let now = self.runtime.now();
        self.conn
            .execute_write(
                ctx,
                "service setting configuration creation",
                "INSERT INTO service_setting_configurations (
                    id,
                    value,
                    notes,
                    service_setting_id,
                    belongs_to_user,
                    belongs_to_household,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    input.id,
                    input.value,
                    input.notes,
                    input.service_setting_id,
                    input.belongs_to_user,
                    input.belongs_to_household,
                    time_to_db(now),
                ],
            )
            .annotate("create service setting configuration", &input.id)?;

        info!(
            "event=service_setting_configuration_create module=repo status=ok id={} setting_id={}",
            input.id, input.service_setting_id
        );
        Ok(ServiceSettingConfiguration {
            id: input.id.clone(),
            value: input.value.clone(),
            notes: input.notes.clone(),
            service_setting: setting,
            belongs_to_user: input.belongs_to_user.clone(),
            belongs_to_household: input.belongs_to_household.clone(),
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        })
    }

    fn update_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
        input: &ServiceSettingConfigurationUpdateInput,
    ) -> StoreResult<ServiceSettingConfiguration> {
        require_id(configuration_id, "service setting configuration id")?;
        let current = self
            .fetch_configuration(ctx, "service_setting_configurations.id = ?1", [configuration_id])
            .annotate("update service setting configuration", configuration_id)?;
        if let Some(value) = &input.value {
            self.ensure_accepted(&current.service_setting, value)?;
        }

        self.conn
            .execute_write(
                ctx,
                "service setting configuration update",
                "UPDATE service_setting_configurations
                 SET value = COALESCE(?2, value),
                     notes = COALESCE(?3, notes),
                     last_updated_at = ?4
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    configuration_id,
                    input.value,
                    input.notes,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update service setting configuration", configuration_id)?;
        self.fetch_configuration(ctx, "service_setting_configurations.id = ?1", [configuration_id])
            .annotate("update service setting configuration", configuration_id)
    }

    fn archive_service_setting_configuration(
        &self,
        ctx: &QueryContext,
        configuration_id: &str,
    ) -> StoreResult<()> {
        require_id(configuration_id, "service setting configuration id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "service setting configuration archive",
                "UPDATE service_setting_configurations
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![configuration_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive service setting configuration", configuration_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("service setting configuration"))
                .annotate("archive service setting configuration", configuration_id);
        }
        Ok(())
    }
}

fn setting_from_row(row: &Row<'_>, prefix: &str) -> StoreResult<ServiceSetting> {
    let col = |field: &str| format!("{prefix}{field}");
    let enumeration: String = row.get(col("enumeration").as_str())?;
    Ok(ServiceSetting {
        id: row.get(col("id").as_str())?,
        name: row.get(col("name").as_str())?,
        kind: get_enum(row, &col("type"))?,
        description: row.get(col("description").as_str())?,
        default_value: row.get(col("default_value").as_str())?,
        enumeration: split_enumeration(&enumeration),
        admins_only: get_bool(row, &col("admins_only"))?,
        created_at: get_time(row, &col("created_at"))?,
        last_updated_at: get_opt_time(row, &col("last_updated_at"))?,
        archived_at: get_opt_time(row, &col("archived_at"))?,
    })
}

fn configuration_from_row(row: &Row<'_>) -> StoreResult<ServiceSettingConfiguration> {
    Ok(ServiceSettingConfiguration {
        id: row.get("id")?,
        value: row.get("value")?,
        notes: row.get("notes")?,
        service_setting: setting_from_row(row, "setting_")?,
        belongs_to_user: row.get("belongs_to_user")?,
        belongs_to_household: row.get("belongs_to_household")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::setting_from_row;
    use rusqlite::Connection;

    #[test]
    fn enumeration_column_decodes_to_ordered_non_empty_options() {
        let conn = Connection::open_in_memory().unwrap();
        let setting = conn
            .query_row(
                "SELECT 'ss-1' AS id, 'units' AS name, 'user' AS type, '' AS description,
                        NULL AS default_value, 'one|two||three' AS enumeration,
                        0 AS admins_only, 0 AS created_at,
                        NULL AS last_updated_at, NULL AS archived_at;",
                [],
                |row| Ok(setting_from_row(row, "")),
            )
            .unwrap()
            .unwrap();
        assert_eq!(setting.enumeration, vec!["one", "two", "three"]);
        assert!(setting.accepts("two"));
        assert!(!setting.accepts("four"));
    }
}
