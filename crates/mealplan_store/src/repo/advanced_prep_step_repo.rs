//! Advanced prep-step materialization and status lifecycle.
//!
//! # Responsibility
//! - Materialize the prep steps of a meal-plan option exactly once.
//! - Drive step statuses forward through the transition table.
//!
//! # Invariants
//! - Materialization inserts every step and flips `prep_steps_created` in one
//!   session; an option whose sentinel is already set is rejected.
//! - Status changes validate the source status inside the single `UPDATE`
//!   that writes the new status, so a concurrent terminal transition wins.
//! - `settled_at` is written only when the new status is `finished`.

use crate::clock::truncate_to_seconds;
use crate::db::{run_in_session, QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    AdvancedPrepStep, AdvancedPrepStepCreationInput, AdvancedPrepStepStatus,
    AdvancedPrepStepStatusChangeInput, MealPlanOptionAwaitingPrepSteps,
};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{get_bool, get_enum, get_opt_time, get_time, time_to_db};
use crate::runtime::StoreRuntime;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const STEP_COLUMNS: &str = "advanced_prep_steps.id,
    advanced_prep_steps.belongs_to_meal_plan_option,
    advanced_prep_steps.belongs_to_recipe_step,
    advanced_prep_steps.status,
    advanced_prep_steps.status_explanation,
    advanced_prep_steps.creation_explanation,
    advanced_prep_steps.cannot_complete_before,
    advanced_prep_steps.cannot_complete_after,
    advanced_prep_steps.created_at,
    advanced_prep_steps.settled_at";

pub trait AdvancedPrepStepRepository {
    /// True when the step exists and belongs to an option of `meal_plan_id`.
    fn advanced_prep_step_exists(
        &self,
        ctx: &QueryContext,
        meal_plan_id: &str,
        step_id: &str,
    ) -> StoreResult<bool>;

    /// Fetches one step without an ownership check; trusted callers only.
    fn get_advanced_prep_step(&self, ctx: &QueryContext, step_id: &str)
        -> StoreResult<AdvancedPrepStep>;

    /// Every live step under any option of `meal_plan_id`, by creation time then id.
    fn list_advanced_prep_steps_for_meal_plan(
        &self,
        ctx: &QueryContext,
        meal_plan_id: &str,
    ) -> StoreResult<Vec<AdvancedPrepStep>>;

    /// Inserts `inputs` in order and marks the option materialized.
    fn create_advanced_prep_steps_for_meal_plan_option(
        &self,
        ctx: &QueryContext,
        meal_plan_option_id: &str,
        inputs: &[AdvancedPrepStepCreationInput],
    ) -> StoreResult<Vec<AdvancedPrepStep>>;

    fn change_advanced_prep_step_status(
        &self,
        ctx: &QueryContext,
        input: &AdvancedPrepStepStatusChangeInput,
    ) -> StoreResult<AdvancedPrepStep>;

    /// Chosen options of live meal plans whose steps are not materialized yet.
    fn list_meal_plan_options_awaiting_prep_steps(
        &self,
        ctx: &QueryContext,
    ) -> StoreResult<Vec<MealPlanOptionAwaitingPrepSteps>>;
}

pub struct SqliteAdvancedPrepStepRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteAdvancedPrepStepRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "advanced_prep_steps",
                    &[
                        "belongs_to_meal_plan_option",
                        "belongs_to_recipe_step",
                        "status",
                        "settled_at",
                    ],
                ),
                ("meal_plan_options", &["prep_steps_created", "chosen"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }
}

impl AdvancedPrepStepRepository for SqliteAdvancedPrepStepRepository<'_> {
    fn advanced_prep_step_exists(
        &self,
        ctx: &QueryContext,
        meal_plan_id: &str,
        step_id: &str,
    ) -> StoreResult<bool> {
        require_id(meal_plan_id, "meal plan id")?;
        require_id(step_id, "advanced prep step id")?;
        self.conn
            .read_exists(
                ctx,
                "advanced prep step existence",
                "SELECT EXISTS (
                    SELECT 1
                    FROM advanced_prep_steps
                    INNER JOIN meal_plan_options
                        ON meal_plan_options.id = advanced_prep_steps.belongs_to_meal_plan_option
                    INNER JOIN meal_plans
                        ON meal_plans.id = meal_plan_options.belongs_to_meal_plan
                    WHERE advanced_prep_steps.id = ?2
                      AND advanced_prep_steps.archived_at IS NULL
                      AND meal_plan_options.belongs_to_meal_plan = ?1
                      AND meal_plan_options.archived_at IS NULL
                      AND meal_plans.archived_at IS NULL
                );",
                params![meal_plan_id, step_id],
            )
            .annotate("check advanced prep step existence", step_id)
    }

    fn get_advanced_prep_step(
        &self,
        ctx: &QueryContext,
        step_id: &str,
    ) -> StoreResult<AdvancedPrepStep> {
        require_id(step_id, "advanced prep step id")?;
        fetch_step(self.conn, ctx, step_id).annotate("get advanced prep step", step_id)
    }

    fn list_advanced_prep_steps_for_meal_plan(
        &self,
        ctx: &QueryContext,
        meal_plan_id: &str,
    ) -> StoreResult<Vec<AdvancedPrepStep>> {
        require_id(meal_plan_id, "meal plan id")?;
        let sql = format!(
            "SELECT {STEP_COLUMNS}
             FROM advanced_prep_steps
             INNER JOIN meal_plan_options
                 ON meal_plan_options.id = advanced_prep_steps.belongs_to_meal_plan_option
             INNER JOIN meal_plans
                 ON meal_plans.id = meal_plan_options.belongs_to_meal_plan
             WHERE meal_plan_options.belongs_to_meal_plan = ?1
               AND advanced_prep_steps.archived_at IS NULL
               AND meal_plan_options.archived_at IS NULL
               AND meal_plans.archived_at IS NULL
             ORDER BY advanced_prep_steps.created_at ASC, advanced_prep_steps.id ASC;"
        );
        self.conn
            .read_many(ctx, "advanced prep step", &sql, [meal_plan_id], step_from_row)
            .annotate("list advanced prep steps for meal plan", meal_plan_id)
    }

    fn create_advanced_prep_steps_for_meal_plan_option(
        &self,
        ctx: &QueryContext,
        meal_plan_option_id: &str,
        inputs: &[AdvancedPrepStepCreationInput],
    ) -> StoreResult<Vec<AdvancedPrepStep>> {
        require_id(meal_plan_option_id, "meal plan option id")?;
        if inputs.is_empty() {
            return Err(StoreError::invalid_input(
                "at least one advanced prep step is required",
            ));
        }
        for input in inputs {
            input.validate()?;
        }

        let now = self.runtime.now();
        let steps = run_in_session(self.conn, ctx, "create advanced prep steps", |session| {
            let already_created = session.read_one(
                ctx,
                "meal plan option",
                "SELECT prep_steps_created
                 FROM meal_plan_options
                 WHERE id = ?1
                   AND archived_at IS NULL;",
                [meal_plan_option_id],
                |row| get_bool(row, "prep_steps_created"),
            )?;
            if already_created {
                return Err(StoreError::conflict(format!(
                    "advanced prep steps already created for meal plan option {meal_plan_option_id}"
                )));
            }

            let mut steps = Vec::with_capacity(inputs.len());
            for input in inputs {
                let step = AdvancedPrepStep {
                    id: input.id.clone(),
                    belongs_to_meal_plan_option: meal_plan_option_id.to_string(),
                    recipe_step_id: input.recipe_step_id.clone(),
                    status: input.status,
                    status_explanation: input.status_explanation.clone(),
                    creation_explanation: input.creation_explanation.clone(),
                    cannot_complete_before: truncate_to_seconds(input.cannot_complete_before),
                    cannot_complete_after: truncate_to_seconds(input.cannot_complete_after),
                    created_at: now,
                    settled_at: (input.status == AdvancedPrepStepStatus::Finished).then_some(now),
                };
                session.execute_write(
                    ctx,
                    "advanced prep step creation",
                    "INSERT INTO advanced_prep_steps (
                        id,
                        belongs_to_meal_plan_option,
                        belongs_to_recipe_step,
                        status,
                        status_explanation,
                        creation_explanation,
                        cannot_complete_before,
                        cannot_complete_after,
                        created_at,
                        settled_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                    params![
                        step.id,
                        step.belongs_to_meal_plan_option,
                        step.recipe_step_id,
                        step.status.as_str(),
                        step.status_explanation,
                        step.creation_explanation,
                        time_to_db(step.cannot_complete_before),
                        time_to_db(step.cannot_complete_after),
                        time_to_db(step.created_at),
                        step.settled_at.map(time_to_db),
                    ],
                )?;
                steps.push(step);
            }

            let marked = session.execute_write(
                ctx,
                "meal plan option prep steps sentinel",
                "UPDATE meal_plan_options
                 SET prep_steps_created = 1,
                     last_updated_at = ?2
                 WHERE id = ?1
                   AND prep_steps_created = 0
                   AND archived_at IS NULL;",
                params![meal_plan_option_id, time_to_db(now)],
            )?;
            if marked != 1 {
                return Err(StoreError::conflict(format!(
                    "meal plan option {meal_plan_option_id} was materialized concurrently"
                )));
            }

            Ok(steps)
        })
        .annotate("create advanced prep steps for meal plan option", meal_plan_option_id)?;

        info!(
            "event=advanced_prep_steps_create module=repo status=ok meal_plan_option_id={meal_plan_option_id} count={}",
            steps.len()
        );
        Ok(steps)
    }

    fn change_advanced_prep_step_status(
        &self,
        ctx: &QueryContext,
        input: &AdvancedPrepStepStatusChangeInput,
    ) -> StoreResult<AdvancedPrepStep> {
        require_id(&input.id, "advanced prep step id")?;
        let result = change_status(self.conn, ctx, &self.runtime, input);
        if result.is_ok() {
            info!(
                "event=advanced_prep_step_status module=repo status=ok id={} new_status={}",
                input.id, input.status
            );
        }
        result.annotate("change advanced prep step status", &input.id)
    }

    fn list_meal_plan_options_awaiting_prep_steps(
        &self,
        ctx: &QueryContext,
    ) -> StoreResult<Vec<MealPlanOptionAwaitingPrepSteps>> {
        self.conn
            .read_many(
                ctx,
                "meal plan option awaiting prep steps",
                "SELECT
                    meal_plan_options.id,
                    meal_plan_options.belongs_to_meal_plan,
                    meal_plans.belongs_to_household,
                    meal_plan_options.recipe_id
                 FROM meal_plan_options
                 INNER JOIN meal_plans
                     ON meal_plans.id = meal_plan_options.belongs_to_meal_plan
                 WHERE meal_plan_options.chosen = 1
                   AND meal_plan_options.prep_steps_created = 0
                   AND meal_plan_options.archived_at IS NULL
                   AND meal_plans.archived_at IS NULL
                 ORDER BY meal_plan_options.created_at ASC, meal_plan_options.id ASC;",
                [],
                |row| {
                    Ok(MealPlanOptionAwaitingPrepSteps {
                        meal_plan_option_id: row.get("id")?,
                        meal_plan_id: row.get("belongs_to_meal_plan")?,
                        household_id: row.get("belongs_to_household")?,
                        recipe_id: row.get("recipe_id")?,
                    })
                },
            )
            .annotate("list meal plan options awaiting prep steps", "*")
    }
}

fn change_status(
    conn: &Connection,
    ctx: &QueryContext,
    runtime: &StoreRuntime,
    input: &AdvancedPrepStepStatusChangeInput,
) -> StoreResult<AdvancedPrepStep> {
    let next = input.status;
    let sources = next.allowed_sources();
    let placeholders = (0..sources.len())
        .map(|offset| format!("?{}", offset + 5))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE advanced_prep_steps
         SET status = ?2,
             status_explanation = ?3,
             settled_at = CASE WHEN ?2 = 'finished' THEN ?4 ELSE NULL END,
             last_updated_at = ?4
         WHERE id = ?1
           AND archived_at IS NULL
           AND status IN ({placeholders});"
    );

    let now = time_to_db(runtime.now());
    let mut bind = vec![
        Value::Text(input.id.clone()),
        Value::Text(next.as_str().to_string()),
        Value::Text(input.status_explanation.clone()),
        Value::Integer(now),
    ];
    bind.extend(
        sources
            .iter()
            .map(|source| Value::Text(source.as_str().to_string())),
    );

    let changed = conn.execute_write(
        ctx,
        "advanced prep step status change",
        &sql,
        params_from_iter(bind),
    )?;
    if changed == 0 {
        let current = fetch_step(conn, ctx, &input.id)?;
        return Err(StoreError::conflict(format!(
            "advanced prep step {} cannot move from {} to {}",
            input.id, current.status, next
        )));
    }

    fetch_step(conn, ctx, &input.id)
}

fn fetch_step<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    step_id: &str,
) -> StoreResult<AdvancedPrepStep> {
    let sql = format!(
        "SELECT {STEP_COLUMNS}
         FROM advanced_prep_steps
         WHERE advanced_prep_steps.id = ?1
           AND advanced_prep_steps.archived_at IS NULL;"
    );
    exec.read_one(ctx, "advanced prep step", &sql, [step_id], step_from_row)
}

fn step_from_row(row: &Row<'_>) -> StoreResult<AdvancedPrepStep> {
    Ok(AdvancedPrepStep {
        id: row.get("id")?,
        belongs_to_meal_plan_option: row.get("belongs_to_meal_plan_option")?,
        recipe_step_id: row.get("belongs_to_recipe_step")?,
        status: get_enum(row, "status")?,
        status_explanation: row.get("status_explanation")?,
        creation_explanation: row.get("creation_explanation")?,
        cannot_complete_before: get_time(row, "cannot_complete_before")?,
        cannot_complete_after: get_time(row, "cannot_complete_after")?,
        created_at: get_time(row, "created_at")?,
        settled_at: get_opt_time(row, "settled_at")?,
    })
}
