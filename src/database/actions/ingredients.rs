use crate::{
    constants::INGREDIENT_INSERT_CHUNK,
    error::ServiceError,
    form::NewIngredient,
    schema::{Id, Ingredient, RecipePart},
    validation::escape_like,
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, ServiceError> {
    let list: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

/// Case-insensitive prefix search; wildcards in `prefix` match literally.
pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ServiceError> {
    let pattern = format!("{}%", escape_like(prefix));

    let list: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 ESCAPE '\\' ORDER BY name",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(list)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, ServiceError> {
    let ingredient: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    ingredient.ok_or_else(|| ServiceError::not_found(format!("Ingredient with id={id} not found")))
}

pub async fn find_missing_ingredients(
    ids: &[Id],
    conn: &mut PgConnection,
) -> Result<Vec<Id>, ServiceError> {
    let missing: Vec<(Id,)> = sqlx::query_as(
        "
        SELECT requested.id
        FROM UNNEST($1::INTEGER[]) AS requested(id)
        LEFT JOIN ingredients i ON i.id = requested.id
        WHERE i.id IS NULL
    ",
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(missing.into_iter().map(|row| row.0).collect())
}

pub async fn list_recipe_parts(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, ServiceError> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.recipe_id, ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts reference ingredients in chunks, skipping (name, unit) pairs that
/// already exist. Returns the number of new rows.
pub async fn insert_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
) -> Result<u64, ServiceError> {
    let mut inserted = 0;

    for chunk in ingredients.chunks(INGREDIENT_INSERT_CHUNK) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        query_builder.push_values(chunk, |mut b, ingredient| {
            b.push_bind(&ingredient.name)
                .push_bind(&ingredient.measurement_unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        inserted += query_builder.build().execute(pool).await?.rows_affected();
    }

    Ok(inserted)
}
