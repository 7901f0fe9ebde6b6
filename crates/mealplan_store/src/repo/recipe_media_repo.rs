//! Media attached to a recipe or to one of its steps.

use crate::db::{QueryContext, QueryExecutor};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{RecipeMedia, RecipeMediaCreationInput, RecipeMediaUpdateInput};
use crate::repo::ensure_connection_ready;
use crate::repo::mapping::{get_opt_time, get_time, get_u32, time_to_db};
use crate::runtime::StoreRuntime;
use log::info;
use rusqlite::{params, Connection, Row};

const MEDIA_COLUMNS: &str = "id,
    belongs_to_recipe,
    belongs_to_recipe_step,
    mime_type,
    internal_path,
    external_path,
    media_index,
    created_at,
    last_updated_at,
    archived_at";

pub trait RecipeMediaRepository {
    fn recipe_media_exists(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<bool>;
    fn get_recipe_media(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<RecipeMedia>;
    /// Media attached directly to the recipe, by index.
    fn list_recipe_media_for_recipe(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
    ) -> StoreResult<Vec<RecipeMedia>>;
    fn list_recipe_media_for_recipe_step(
        &self,
        ctx: &QueryContext,
        recipe_step_id: &str,
    ) -> StoreResult<Vec<RecipeMedia>>;
    fn create_recipe_media(
        &self,
        ctx: &QueryContext,
        input: &RecipeMediaCreationInput,
    ) -> StoreResult<RecipeMedia>;
    fn update_recipe_media(
        &self,
        ctx: &QueryContext,
        media_id: &str,
        input: &RecipeMediaUpdateInput,
    ) -> StoreResult<RecipeMedia>;
    fn archive_recipe_media(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<()>;
}

pub struct SqliteRecipeMediaRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteRecipeMediaRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[(
                "recipe_media",
                &["belongs_to_recipe", "belongs_to_recipe_step", "mime_type", "media_index"],
            )],
        )?;
        Ok(Self { conn, runtime })
    }

    fn fetch(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<RecipeMedia> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS}
             FROM recipe_media
             WHERE id = ?1 AND archived_at IS NULL;"
        );
        self.conn
            .read_one(ctx, "recipe media", &sql, [media_id], media_from_row)
    }

    fn list_by(
        &self,
        ctx: &QueryContext,
        owner_column: &'static str,
        owner_id: &str,
    ) -> StoreResult<Vec<RecipeMedia>> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS}
             FROM recipe_media
             WHERE {owner_column} = ?1 AND archived_at IS NULL
             ORDER BY media_index ASC, id ASC;"
        );
        self.conn
            .read_many(ctx, "recipe media", &sql, [owner_id], media_from_row)
    }
}

impl RecipeMediaRepository for SqliteRecipeMediaRepository<'_> {
    fn recipe_media_exists(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<bool> {
        require_id(media_id, "recipe media id")?;
        self.conn
            .read_exists(
                ctx,
                "recipe media existence",
                "SELECT EXISTS (
                    SELECT 1 FROM recipe_media WHERE id = ?1 AND archived_at IS NULL
                );",
                [media_id],
            )
            .annotate("check recipe media existence", media_id)
    }

    fn get_recipe_media(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<RecipeMedia> {
        require_id(media_id, "recipe media id")?;
        self.fetch(ctx, media_id).annotate("get recipe media", media_id)
    }

    fn list_recipe_media_for_recipe(
        &self,
        ctx: &QueryContext,
        recipe_id: &str,
    ) -> StoreResult<Vec<RecipeMedia>> {
        require_id(recipe_id, "recipe id")?;
        self.list_by(ctx, "belongs_to_recipe", recipe_id)
            .annotate("list recipe media for recipe", recipe_id)
    }

    fn list_recipe_media_for_recipe_step(
        &self,
        ctx: &QueryContext,
        recipe_step_id: &str,
    ) -> StoreResult<Vec<RecipeMedia>> {
        require_id(recipe_step_id, "recipe step id")?;
        self.list_by(ctx, "belongs_to_recipe_step", recipe_step_id)
            .annotate("list recipe media for recipe step", recipe_step_id)
    }

    fn create_recipe_media(
        &self,
        ctx: &QueryContext,
        input: &RecipeMediaCreationInput,
    ) -> StoreResult<RecipeMedia> {
        input.validate()?;
        let now = self.runtime.now();
        self.conn
            .execute_write(
                ctx,
                "recipe media creation",
                "INSERT INTO recipe_media (
                    id,
                    belongs_to_recipe,
                    belongs_to_recipe_step,
                    mime_type,
                    internal_path,
                    external_path,
                    media_index,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    input.id,
                    input.belongs_to_recipe,
                    input.belongs_to_recipe_step,
                    input.mime_type,
                    input.internal_path,
                    input.external_path,
                    input.index,
                    time_to_db(now),
                ],
            )
            .annotate("create recipe media", &input.id)?;

        info!("event=recipe_media_create module=repo status=ok id={}", input.id);
        Ok(RecipeMedia {
            id: input.id.clone(),
            belongs_to_recipe: input.belongs_to_recipe.clone(),
            belongs_to_recipe_step: input.belongs_to_recipe_step.clone(),
            mime_type: input.mime_type.clone(),
            internal_path: input.internal_path.clone(),
            external_path: input.external_path.clone(),
            index: input.index,
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        })
    }

    fn update_recipe_media(
        &self,
        ctx: &QueryContext,
        media_id: &str,
        input: &RecipeMediaUpdateInput,
    ) -> StoreResult<RecipeMedia> {
        require_id(media_id, "recipe media id")?;
        let changed = self
            .conn
            .execute_write(
                ctx,
                "recipe media update",
                "UPDATE recipe_media
                 SET mime_type = COALESCE(?2, mime_type),
                     internal_path = COALESCE(?3, internal_path),
                     external_path = COALESCE(?4, external_path),
                     media_index = COALESCE(?5, media_index),
                     last_updated_at = ?6
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![
                    media_id,
                    input.mime_type,
                    input.internal_path,
                    input.external_path,
                    input.index,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("update recipe media", media_id)?;
        if changed == 0 {
            return Err(StoreError::NotFound("recipe media")).annotate("update recipe media", media_id);
        }
        self.fetch(ctx, media_id).annotate("update recipe media", media_id)
    }

    fn archive_recipe_media(&self, ctx: &QueryContext, media_id: &str) -> StoreResult<()> {
        require_id(media_id, "recipe media id")?;
        let archived = self
            .conn
            .execute_write(
                ctx,
                "recipe media archive",
                "UPDATE recipe_media
                 SET archived_at = ?2, last_updated_at = ?2
                 WHERE id = ?1 AND archived_at IS NULL;",
                params![media_id, time_to_db(self.runtime.now())],
            )
            .annotate("archive recipe media", media_id)?;
        if archived == 0 {
            return Err(StoreError::NotFound("recipe media")).annotate("archive recipe media", media_id);
        }
        Ok(())
    }
}

fn media_from_row(row: &Row<'_>) -> StoreResult<RecipeMedia> {
    Ok(RecipeMedia {
        id: row.get("id")?,
        belongs_to_recipe: row.get("belongs_to_recipe")?,
        belongs_to_recipe_step: row.get("belongs_to_recipe_step")?,
        mime_type: row.get("mime_type")?,
        internal_path: row.get("internal_path")?,
        external_path: row.get("external_path")?,
        index: get_u32(row, "media_index")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}
