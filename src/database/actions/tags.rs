use crate::{
    error::ServiceError,
    form::NewTag,
    schema::{Id, RecipeTag, Tag},
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ServiceError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, ServiceError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    tag.ok_or_else(|| ServiceError::not_found(format!("Tag with id={id} not found")))
}

/// Ids from `ids` that have no tag row.
pub async fn find_missing_tags(
    ids: &[Id],
    conn: &mut PgConnection,
) -> Result<Vec<Id>, ServiceError> {
    let missing: Vec<(Id,)> = sqlx::query_as(
        "
        SELECT requested.id
        FROM UNNEST($1::INTEGER[]) AS requested(id)
        LEFT JOIN tags t ON t.id = requested.id
        WHERE t.id IS NULL
    ",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(missing.into_iter().map(|row| row.0).collect())
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeTag>, ServiceError> {
    let list: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY rt.recipe_id, t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

pub async fn set_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

/// Inserts reference tags, skipping slugs that already exist. Returns the
/// number of new rows.
pub async fn insert_tags(tags: &[NewTag], pool: &Pool<Postgres>) -> Result<u64, ServiceError> {
    if tags.is_empty() {
        return Ok(0);
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO tags (name, color, slug) ");
    query_builder.push_values(tags, |mut b, tag| {
        b.push_bind(&tag.name)
            .push_bind(&tag.color)
            .push_bind(&tag.slug);
    });
    query_builder.push(" ON CONFLICT DO NOTHING");

    let result = query_builder.build().execute(pool).await?;

    Ok(result.rows_affected())
}
