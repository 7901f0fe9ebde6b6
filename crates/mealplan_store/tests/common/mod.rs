#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use mealplan_store::db::open_db_in_memory;
use mealplan_store::{
    AesGcmSecretCipher, FixedClock, QueryContext, SequentialIdGenerator, StoreRuntime,
};
use rusqlite::{params, Connection};
use std::sync::Arc;

pub const TEST_KEY: [u8; 32] = [7u8; 32];

pub struct Fixture {
    pub conn: Connection,
    pub clock: Arc<FixedClock>,
    pub runtime: StoreRuntime,
    pub ctx: QueryContext,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn fixture() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    let clock = Arc::new(FixedClock::new(start()));
    let runtime = StoreRuntime::new(
        clock.clone(),
        Arc::new(SequentialIdGenerator::new("gen")),
        Arc::new(AesGcmSecretCipher::new(&TEST_KEY).unwrap()),
    );
    Fixture {
        conn,
        clock,
        runtime,
        ctx: QueryContext::background(),
    }
}

pub fn ts(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

pub fn seed_user(conn: &Connection, id: &str, email: &str) {
    conn.execute(
        "INSERT INTO users (id, username, email_address, created_at) VALUES (?1, ?1, ?2, ?3);",
        params![id, email, ts(start())],
    )
    .unwrap();
}

pub fn seed_household(conn: &Connection, id: &str, owner: &str) {
    conn.execute(
        "INSERT INTO households (id, name, belongs_to_user, created_at) VALUES (?1, ?1, ?2, ?3);",
        params![id, owner, ts(start())],
    )
    .unwrap();
}

pub fn seed_membership(conn: &Connection, id: &str, household: &str, user: &str) {
    conn.execute(
        "INSERT INTO household_user_memberships (
            id, belongs_to_household, belongs_to_user, default_household, household_role, created_at
        ) VALUES (?1, ?2, ?3, 1, 'household_admin', ?4);",
        params![id, household, user, ts(start())],
    )
    .unwrap();
}

pub fn seed_ingredient(conn: &Connection, id: &str, name: &str) {
    conn.execute(
        "INSERT INTO valid_ingredients (id, name, slug, created_at) VALUES (?1, ?2, ?1, ?3);",
        params![id, name, ts(start())],
    )
    .unwrap();
}

pub fn seed_instrument(conn: &Connection, id: &str, name: &str) {
    conn.execute(
        "INSERT INTO valid_instruments (id, name, slug, created_at) VALUES (?1, ?2, ?1, ?3);",
        params![id, name, ts(start())],
    )
    .unwrap();
}

pub fn seed_unit(conn: &Connection, id: &str, name: &str) {
    conn.execute(
        "INSERT INTO valid_measurement_units (id, name, slug, volumetric, created_at)
         VALUES (?1, ?2, ?1, 1, ?3);",
        params![id, name, ts(start())],
    )
    .unwrap();
}

pub fn seed_recipe(conn: &Connection, id: &str, author: &str) {
    conn.execute(
        "INSERT INTO recipes (id, name, created_by_user, created_at) VALUES (?1, ?1, ?2, ?3);",
        params![id, author, ts(start())],
    )
    .unwrap();
}

pub fn seed_recipe_step(conn: &Connection, id: &str, recipe: &str, index: u32) {
    conn.execute(
        "INSERT INTO recipe_steps (id, belongs_to_recipe, step_index, created_at)
         VALUES (?1, ?2, ?3, ?4);",
        params![id, recipe, index, ts(start())],
    )
    .unwrap();
}

pub fn seed_meal_plan(conn: &Connection, id: &str, household: &str) {
    conn.execute(
        "INSERT INTO meal_plans (id, belongs_to_household, created_at) VALUES (?1, ?2, ?3);",
        params![id, household, ts(start())],
    )
    .unwrap();
}

pub fn seed_meal_plan_option(conn: &Connection, id: &str, meal_plan: &str, recipe: &str, chosen: bool) {
    conn.execute(
        "INSERT INTO meal_plan_options (id, belongs_to_meal_plan, recipe_id, chosen, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![id, meal_plan, recipe, i64::from(chosen), ts(start())],
    )
    .unwrap();
}

/// User, household, recipe with two steps, meal plan and one chosen option.
pub fn seed_meal_plan_world(conn: &Connection) {
    seed_user(conn, "user-1", "cook@example.com");
    seed_household(conn, "household-1", "user-1");
    seed_membership(conn, "membership-1", "household-1", "user-1");
    seed_recipe(conn, "recipe-1", "user-1");
    seed_recipe_step(conn, "step-1", "recipe-1", 0);
    seed_recipe_step(conn, "step-2", "recipe-1", 1);
    seed_meal_plan(conn, "plan-1", "household-1");
    seed_meal_plan_option(conn, "option-1", "plan-1", "recipe-1", true);
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}
