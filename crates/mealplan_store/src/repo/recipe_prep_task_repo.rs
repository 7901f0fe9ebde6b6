//! Recipe prep tasks and the recipe steps they cover.
//!
//! # Invariants
//! - A task and its task steps are written in one session.
//! - Joined rows are folded into tasks through a map keyed by task id, so
//!   each task appears once with every one of its steps.

use crate::db::{run_in_session, QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    RecipePrepTask, RecipePrepTaskCreationInput, RecipePrepTaskStep, RecipePrepTaskUpdateInput,
};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{
    bool_to_int, get_bool, get_opt_enum, get_opt_time, get_opt_u32, get_time, get_u32, time_to_db,
};
use crate::runtime::StoreRuntime;
use log::info;
use rusqlite::{params, Connection, Params, Row};
use std::collections::BTreeMap;

const TASK_WITH_STEPS_SELECT: &str = "SELECT
        recipe_prep_tasks.id,
        recipe_prep_tasks.name,
        recipe_prep_tasks.description,
        recipe_prep_tasks.notes,
        recipe_prep_tasks.optional,
        recipe_prep_tasks.explicit_storage_instructions,
        recipe_prep_tasks.minimum_time_buffer_before_recipe_in_seconds,
        recipe_prep_tasks.maximum_time_buffer_before_recipe_in_seconds,
        recipe_prep_tasks.storage_type,
        recipe_prep_tasks.minimum_storage_temperature_in_celsius,
        recipe_prep_tasks.maximum_storage_temperature_in_celsius,
        recipe_prep_tasks.belongs_to_recipe,
        recipe_prep_tasks.created_at,
        recipe_prep_tasks.last_updated_at,
        recipe_prep_tasks.archived_at,
        recipe_prep_task_steps.id AS task_step_id,
        recipe_prep_task_steps.belongs_to_recipe_step AS task_step_recipe_step,
        recipe_prep_task_steps.satisfies_recipe_step AS task_step_satisfies
    FROM recipe_prep_tasks
    LEFT JOIN recipe_prep_task_steps
        ON recipe_prep_task_steps.belongs_to_recipe_prep_task = recipe_prep_tasks.id";

pub trait RecipePrepTaskRepository {
    fn recipe_prep_task_exists(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<bool>;
    fn get_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<RecipePrepTask>;
    /// Every live task of the recipe, ordered by task id.
    fn list_recipe_prep_tasks_for_recipe(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
    ) -> StoreResult<Vec<RecipePrepTask>>;
    fn create_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        input: &RecipePrepTaskCreationInput,
    ) -> StoreResult<RecipePrepTask>;
    fn update_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
        input: &RecipePrepTaskUpdateInput,
    ) -> StoreResult<RecipePrepTask>;
    fn archive_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<()>;
}

pub struct SqliteRecipePrepTaskRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteRecipePrepTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                ("recipe_prep_tasks", &["belongs_to_recipe", "storage_type", "optional"]),
                (
                    "recipe_prep_task_steps",
                    &["belongs_to_recipe_step", "belongs_to_recipe_prep_task", "satisfies_recipe_step"],
                ),
            ],
        )?;
        Ok(Self { conn, runtime })
    }
}

impl RecipePrepTaskRepository for SqliteRecipePrepTaskRepository<'_> {
    fn recipe_prep_task_exists(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<bool> {
        require_id(recipe_id, "recipe id")?;
        require_id(task_id, "recipe prep task id")?;
        self.conn
            .read_exists(
                ctx,
                "recipe prep task existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM recipe_prep_tasks
                    WHERE id = ?2 AND belongs_to_recipe = ?1 AND archived_at IS NULL
                );",
                params![recipe_id, task_id],
            )
            .annotate("check recipe prep task existence", task_id)
    }

    fn get_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<RecipePrepTask> {
        require_id(recipe_id, "recipe id")?;
        require_id(task_id, "recipe prep task id")?;
        fetch_task(self.conn, ctx, recipe_id, task_id).annotate("get recipe prep task", task_id)
    }

    fn list_recipe_prep_tasks_for_recipe(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
    ) -> StoreResult<Vec<RecipePrepTask>> {
        require_id(recipe_id, "recipe id")?;
        fetch_tasks(
            self.conn,
            ctx,
            "recipe_prep_tasks.belongs_to_recipe = ?1",
            [recipe_id],
        )
        .annotate("list recipe prep tasks for recipe", recipe_id)
    }

    fn create_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        input: &RecipePrepTaskCreationInput,
    ) -> StoreResult<RecipePrepTask> {
        input.validate()?;
        let now = time_to_db(self.runtime.now());

        let task = run_in_session(self.conn, ctx, "create recipe prep task", |session| {
            session.execute_write(
                ctx,
                "recipe prep task creation",
                "INSERT INTO recipe_prep_tasks (
                    id,
                    name,
                    description,
                    notes,
                    optional,
                    explicit_storage_instructions,
                    minimum_time_buffer_before_recipe_in_seconds,
                    maximum_time_buffer_before_recipe_in_seconds,
                    storage_type,
                    minimum_storage_temperature_in_celsius,
                    maximum_storage_temperature_in_celsius,
                    belongs_to_recipe,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
                params![
                    input.id,
                    input.name,
                    input.description,
                    input.notes,
                    bool_to_int(input.optional),
                    input.explicit_storage_instructions,
                    input.minimum_time_buffer_before_recipe_in_seconds,
                    input.maximum_time_buffer_before_recipe_in_seconds,
                    input.storage_type.map(|kind| kind.as_str()),
                    input.minimum_storage_temperature_in_celsius,
                    input.maximum_storage_temperature_in_celsius,
                    input.belongs_to_recipe,
                    now,
                ],
            )?;
            for step in &input.task_steps {
                require_id(&step.id, "recipe prep task step id")?;
                require_id(&step.belongs_to_recipe_step, "recipe step id")?;
                session.execute_write(
                    ctx,
                    "recipe prep task step creation",
                    "INSERT INTO recipe_prep_task_steps (
                        id, belongs_to_recipe_step, belongs_to_recipe_prep_task, satisfies_recipe_step
                    ) VALUES (?1, ?2, ?3, ?4);",
                    params![
                        step.id,
                        step.belongs_to_recipe_step,
                        input.id,
                        bool_to_int(step.satisfies_recipe_step),
                    ],
                )?;
            }
            fetch_task(session, ctx, &input.belongs_to_recipe, &input.id)
        })
        .annotate("create recipe prep task", &input.id)?;

        info!(
            "event=recipe_prep_task_create module=repo status=ok id={} steps={}",
            task.id,
            task.task_steps.len()
        );
        Ok(task)
    }

    fn update_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
        input: &RecipePrepTaskUpdateInput,
    ) -> StoreResult<RecipePrepTask> {
        require_id(recipe_id, "recipe id")?;
        require_id(task_id, "recipe prep task id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "recipe prep task update",
                "UPDATE recipe_prep_tasks
                 SET name = COALESCE(?3, name),
                     description = COALESCE(?4, description),
                     notes = COALESCE(?5, notes),
                     optional = COALESCE(?6, optional),
                     explicit_storage_instructions = COALESCE(?7, explicit_storage_instructions),
                     minimum_time_buffer_before_recipe_in_seconds =
                         COALESCE(?8, minimum_time_buffer_before_recipe_in_seconds),
                     maximum_time_buffer_before_recipe_in_seconds =
                         COALESCE(?9, maximum_time_buffer_before_recipe_in_seconds),
                     storage_type = COALESCE(?10, storage_type),
                     minimum_storage_temperature_in_celsius =
                         COALESCE(?11, minimum_storage_temperature_in_celsius),
                     maximum_storage_temperature_in_celsius =
                         COALESCE(?12, maximum_storage_temperature_in_celsius),
                     last_updated_at = ?13
                 WHERE id = ?2 AND belongs_to_recipe = ?1 AND archived_at IS NULL;",
                params![
                    recipe_id,
                    task_id,
                    input.name,
                    input.description,
                    input.notes,
                    input.optional.map(bool_to_int),
                    input.explicit_storage_instructions,
                    input.minimum_time_buffer_before_recipe_in_seconds,
                    input.maximum_time_buffer_before_recipe_in_seconds,
                    input.storage_type.map(|kind| kind.as_str()),
                    input.minimum_storage_temperature_in_celsius,
                    input.maximum_storage_temperature_in_celsius,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update recipe prep task", task_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("recipe prep task"))
                .annotate("update recipe prep task", task_id);
        }
        fetch_task(self.conn, ctx, recipe_id, task_id).annotate("update recipe prep task", task_id)
    }

    fn archive_recipe_prep_task(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
        task_id: &str,
    ) -> StoreResult<()> {
        require_id(recipe_id, "recipe id")?;
        require_id(task_id, "recipe prep task id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "recipe prep task archive",
                "UPDATE recipe_prep_tasks
                 SET archived_at = ?3, last_updated_at = ?3
                 WHERE id = ?2 AND belongs_to_recipe = ?1 AND archived_at IS NULL;",
                params![recipe_id, task_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive recipe prep task", task_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("recipe prep task"))
                .annotate("archive recipe prep task", task_id);
        }
        Ok(())
    }
}

fn fetch_task<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    recipe_id: &str,
    task_id: &str,
) -> StoreResult<RecipePrepTask> {
    fetch_tasks(
        exec,
        ctx,
        "recipe_prep_tasks.belongs_to_recipe = ?1 AND recipe_prep_tasks.id = ?2",
        params![recipe_id, task_id],
    )?
    .into_iter()
    .next()
    .ok_or(StoreError::NotFound("recipe prep task"))
}

fn fetch_tasks<E: QueryExecutor, P: Params>(
    exec: &E,
    ctx: &QueryContext,
    predicate: &str,
    params: P,
) -> StoreResult<Vec<RecipePrepTask>> {
    let sql = format!(
        "{TASK_WITH_STEPS_SELECT}
         WHERE {predicate} AND recipe_prep_tasks.archived_at IS NULL
         ORDER BY recipe_prep_tasks.id ASC, recipe_prep_task_steps.id ASC;"
    );
    let rows = exec.read_many(ctx, "recipe prep task", &sql, params, |row| {
        Ok((task_from_row(row)?, task_step_from_row(row)?))
    })?;

    let mut tasks: BTreeMap<String, RecipePrepTask> = BTreeMap::new();
    for (task, step) in rows {
        let entry = tasks.entry(task.id.clone()).or_insert(task);
        if let Some(step) = step {
            entry.task_steps.push(step);
        }
    }
    Ok(tasks.into_values().collect())
}

fn task_from_row(row: &Row<'_>) -> StoreResult<RecipePrepTask> {
    Ok(RecipePrepTask {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        notes: row.get("notes")?,
        optional: get_bool(row, "optional")?,
        explicit_storage_instructions: row.get("explicit_storage_instructions")?,
        minimum_time_buffer_before_recipe_in_seconds: get_u32(
            row,
            "minimum_time_buffer_before_recipe_in_seconds",
        )?,
        maximum_time_buffer_before_recipe_in_seconds: get_opt_u32(
            row,
            "maximum_time_buffer_before_recipe_in_seconds",
        )?,
        storage_type: get_opt_enum(row, "storage_type")?,
        minimum_storage_temperature_in_celsius: row.get("minimum_storage_temperature_in_celsius")?,
        maximum_storage_temperature_in_celsius: row.get("maximum_storage_temperature_in_celsius")?,
        belongs_to_recipe: row.get("belongs_to_recipe")?,
        task_steps: Vec::new(),
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}

fn task_step_from_row(row: &Row<'_>) -> StoreResult<Option<RecipePrepTaskStep>> {
    let Some(id) = row.get::<_, Option<String>>("task_step_id")? else {
        return Ok(None);
    };
    Ok(Some(RecipePrepTaskStep {
        id,
        belongs_to_recipe_step: row.get("task_step_recipe_step")?,
        belongs_to_recipe_prep_task: row.get("id")?,
        satisfies_recipe_step: get_bool(row, "task_step_satisfies")?,
    }))
}
