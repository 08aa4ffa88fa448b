use std::collections::BTreeSet;

use crate::{
    authentication::permissions::ActionType,
    config::Settings,
    error::ServiceError,
    form::{IngredientAmount, RecipeFilter, RecipeForm},
    jwt::SessionData,
    pagination::{sanitize_offset, PageContext},
    schema::{Id, Recipe, RecipeIdRow, RecipeRow},
    validation::join_values,
    views::{assemble_recipe_views, RecipeView},
};

use super::{
    ingredients::{find_missing_ingredients, list_recipe_parts},
    tags::{find_missing_tags, list_recipe_tags, set_recipe_tags},
    users::list_user_rows,
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

/// Persists an uploaded image payload and returns the reference stored on the
/// recipe row.
pub trait ImageStore: Send + Sync {
    fn store(&self, payload: &str) -> Result<String, ServiceError>;
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ServiceError> {
    let row: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, text, cooking_time, image FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ServiceError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| recipe_not_found(id))?;

    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

pub(crate) fn recipe_not_found(id: Id) -> ServiceError {
    ServiceError::not_found(format!("Recipe with id={id} not found"))
}

/// Maps unresolved references to the error the caller sees; ingredients are
/// checked first.
pub fn check_references(
    missing_ingredients: &[Id],
    missing_tags: &[Id],
) -> Result<(), ServiceError> {
    if !missing_ingredients.is_empty() {
        return Err(ServiceError::not_found(format!(
            "Ingredients {} not found",
            join_values(missing_ingredients)
        )));
    }
    if !missing_tags.is_empty() {
        return Err(ServiceError::validation(
            "tags",
            format!("Tags {} do not exist", join_values(missing_tags)),
        ));
    }
    Ok(())
}

async fn resolve_references(
    ingredients: &[IngredientAmount],
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    let ingredient_ids: Vec<Id> = ingredients.iter().map(|i| i.id).collect();

    let missing_ingredients = find_missing_ingredients(&ingredient_ids, &mut *conn).await?;
    let missing_tags = find_missing_tags(tags, &mut *conn).await?;

    check_references(&missing_ingredients, &missing_tags)
}

async fn replace_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmount],
    conn: &mut PgConnection,
) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query_builder.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn create_recipe(
    form: RecipeForm,
    session: &SessionData,
    images: &dyn ImageStore,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ServiceError> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = form.into_new_recipe(settings)?;

    let mut tr = pool.begin().await?;

    resolve_references(&recipe.ingredients, &recipe.tags, &mut *tr).await?;
    let image = images.store(&recipe.image)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image)
    .fetch_one(&mut *tr)
    .await?;

    replace_recipe_ingredients(id.0, &recipe.ingredients, &mut *tr).await?;
    set_recipe_tags(id.0, &recipe.tags, &mut *tr).await?;

    tr.commit().await?;

    log::info!(
        "Recipe {} (id: {}) created by {}",
        recipe.name,
        id.0,
        session.username
    );

    get_recipe_view(id.0, Some(session), pool).await
}

/// Scalars missing from the form keep their stored value; ingredients and tags
/// are always replaced.
pub async fn update_recipe(
    id: Id,
    form: RecipeForm,
    session: &SessionData,
    images: &dyn ImageStore,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ServiceError> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    let patch = form.into_patch(settings)?;

    let mut tr = pool.begin().await?;

    resolve_references(&patch.ingredients, &patch.tags, &mut *tr).await?;
    let image = match &patch.image {
        Some(payload) => Some(images.store(payload)?),
        None => None,
    };

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($2, name),
            text = COALESCE($3, text),
            cooking_time = COALESCE($4, cooking_time),
            image = COALESCE($5, image)
        WHERE id = $1
    ",
    )
    .bind(recipe.id)
    .bind(&patch.name)
    .bind(&patch.text)
    .bind(patch.cooking_time)
    .bind(image)
    .execute(&mut *tr)
    .await?;

    replace_recipe_ingredients(recipe.id, &patch.ingredients, &mut *tr).await?;
    set_recipe_tags(recipe.id, &patch.tags, &mut *tr).await?;

    tr.commit().await?;

    log::info!("Recipe {} updated by {}", recipe.id, session.username);

    get_recipe_view(recipe.id, Some(session), pool).await
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await?;

    log::info!("Recipe {} deleted by {}", recipe.id, session.username);

    Ok(())
}

/// Loads full projections for `ids`, newest first.
pub async fn load_recipe_views(
    ids: &[Id],
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, ServiceError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let recipes: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.image,
            EXISTS (
                SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $2
            ) AS is_favorited,
            EXISTS (
                SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = $2
            ) AS is_in_shopping_cart
        FROM recipes r
        WHERE r.id = ANY($1)
        ORDER BY r.id DESC
    ",
    )
    .bind(ids)
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    let author_ids: Vec<Id> = recipes
        .iter()
        .map(|recipe| recipe.author_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let tags = list_recipe_tags(ids, pool).await?;
    let parts = list_recipe_parts(ids, pool).await?;
    let authors = list_user_rows(&author_ids, viewer, pool).await?;

    Ok(assemble_recipe_views(recipes, tags, parts, authors))
}

pub async fn get_recipe_view(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, ServiceError> {
    load_recipe_views(&[id], viewer.map(|session| session.user_id), pool)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| recipe_not_found(id))
}

fn push_recipe_conditions(
    query_builder: &mut QueryBuilder<'static, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
) {
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }

    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(
                    " AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ",
                )
                .push_bind(viewer)
                .push(")");
        }
    }
}

/// Builds the id page query for a recipe listing. Relation flags only apply
/// when there is a viewer.
pub fn recipe_filter_query(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.id, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    push_recipe_conditions(&mut query_builder, filter, viewer);

    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    query_builder
}

/// Total matches of a listing; used when the requested page is past the end.
pub fn recipe_count_query(
    filter: &RecipeFilter,
    viewer: Option<Id>,
) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");

    push_recipe_conditions(&mut query_builder, filter, viewer);

    query_builder
}

/// Negative offsets are clamped to the first page.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    offset: i64,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, ServiceError> {
    let viewer = viewer.map(|session| session.user_id);
    let offset = sanitize_offset(Some(offset));

    let mut query_builder =
        recipe_filter_query(filter, viewer, settings.recipe_page_size, offset);
    let rows = query_builder
        .build_query_as::<RecipeIdRow>()
        .fetch_all(pool)
        .await?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if offset > 0 => {
            let (count,) = recipe_count_query(filter, viewer)
                .build_query_as::<(i64,)>()
                .fetch_one(pool)
                .await?;
            count
        }
        None => 0,
    };

    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let views = load_recipe_views(&ids, viewer, pool).await?;

    Ok(PageContext::from_rows(
        views,
        total_count,
        settings.recipe_page_size,
        offset,
    ))
}

#[cfg(test)]
mod tests {
    use crate::database::actions::testing::{InlineImages, TestDb};

    use super::*;

    fn settings() -> Settings {
        Settings {
            recipe_page_size: 2,
            ..Settings::new("test-secret")
        }
    }

    fn recipe_form(name: &str, ingredients: &[(Id, i32)], tags: &[Id]) -> RecipeForm {
        RecipeForm {
            name: Some(name.to_string()),
            text: Some(String::from("Whisk and fry")),
            cooking_time: Some(10),
            image: Some(String::from("data:image/png;base64,AAAA")),
            ingredients: Some(
                ingredients
                    .iter()
                    .map(|&(id, amount)| IngredientAmount { id, amount })
                    .collect(),
            ),
            tags: Some(tags.to_vec()),
        }
    }

    #[test]
    fn plain_listing_only_pages() {
        let query = recipe_filter_query(&RecipeFilter::default(), None, 6, 0);

        assert_eq!(
            query.sql(),
            "SELECT r.id, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE \
             ORDER BY r.id DESC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn author_and_tags_narrow_the_listing() {
        let filter = RecipeFilter {
            tags: vec![String::from("breakfast"), String::from("lunch")],
            author: Some(3),
            ..Default::default()
        };
        let query = recipe_filter_query(&filter, None, 6, 12);
        let sql = query.sql();

        assert!(sql.contains("r.author_id = $1"));
        assert!(sql.contains("t.slug = ANY($2)"));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn relation_flags_need_a_viewer() {
        let filter = RecipeFilter {
            is_favorited: true,
            is_in_shopping_cart: true,
            ..Default::default()
        };

        let anonymous = recipe_filter_query(&filter, None, 6, 0);
        assert!(!anonymous.sql().contains("favorites"));
        assert!(!anonymous.sql().contains("shopping_carts"));

        let signed_in = recipe_filter_query(&filter, Some(9), 6, 0);
        assert!(signed_in.sql().contains("FROM favorites f"));
        assert!(signed_in.sql().contains("FROM shopping_carts c"));
        assert!(signed_in.sql().ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn count_query_shares_the_listing_conditions() {
        let filter = RecipeFilter {
            author: Some(3),
            is_favorited: true,
            ..Default::default()
        };
        let query = recipe_count_query(&filter, Some(9));

        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM recipes r WHERE TRUE AND r.author_id = $1 \
             AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $2)"
        );
    }

    #[test]
    fn missing_ingredients_are_not_found() {
        let error = check_references(&[7, 9], &[4]).unwrap_err();

        assert!(matches!(error, ServiceError::NotFound(_)));
        assert_eq!(error.to_string(), "Ingredients 7, 9 not found");
    }

    #[test]
    fn missing_tags_fail_validation() {
        let error = check_references(&[], &[4]).unwrap_err();

        assert!(matches!(
            error,
            ServiceError::Validation { ref field, .. } if field == "tags"
        ));
    }

    #[test]
    fn resolved_references_pass() {
        assert!(check_references(&[], &[]).is_ok());
    }

    #[tokio::test]
    async fn created_recipe_comes_back_as_a_projection() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;
        let eggs = db.create_ingredient("eggs", "pcs").await;
        let milk = db.create_ingredient("milk", "ml").await;
        let breakfast = db.create_tag("breakfast").await;

        let view = create_recipe(
            recipe_form("Omelette", &[(eggs, 2), (milk, 100)], &[breakfast]),
            &anna,
            &InlineImages,
            &settings(),
            &db.pool,
        )
        .await
        .unwrap();

        assert_eq!(view.name, "Omelette");
        assert_eq!(view.author.id, anna.user_id);
        assert_eq!(view.image, "data:image/png;base64,AAAA");
        assert_eq!(view.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![breakfast]);

        let mut amounts: Vec<(Id, i32)> =
            view.ingredients.iter().map(|i| (i.id, i.amount)).collect();
        amounts.sort();
        assert_eq!(amounts, vec![(eggs, 2), (milk, 100)]);
        assert!(!view.is_favorited);
        assert!(!view.is_in_shopping_cart);

        db.finish().await;
    }

    #[tokio::test]
    async fn rejected_update_leaves_the_recipe_alone() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;
        let eggs = db.create_ingredient("eggs", "pcs").await;
        let breakfast = db.create_tag("breakfast").await;

        let created = create_recipe(
            recipe_form("Omelette", &[(eggs, 2)], &[breakfast]),
            &anna,
            &InlineImages,
            &settings(),
            &db.pool,
        )
        .await
        .unwrap();

        let mut form = recipe_form("Scramble", &[(eggs, 3), (eggs, 1)], &[breakfast]);
        form.text = None;
        let error = update_recipe(created.id, form, &anna, &InlineImages, &settings(), &db.pool)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            ServiceError::Validation { ref field, .. } if field == "ingredients"
        ));

        let stored = get_recipe_view(created.id, Some(&anna), &db.pool)
            .await
            .unwrap();
        assert_eq!(stored, created);

        db.finish().await;
    }

    #[tokio::test]
    async fn update_replaces_ingredients_and_tags() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;
        let eggs = db.create_ingredient("eggs", "pcs").await;
        let flour = db.create_ingredient("flour", "g").await;
        let breakfast = db.create_tag("breakfast").await;
        let dinner = db.create_tag("dinner").await;

        let created = create_recipe(
            recipe_form("Omelette", &[(eggs, 2)], &[breakfast]),
            &anna,
            &InlineImages,
            &settings(),
            &db.pool,
        )
        .await
        .unwrap();

        let form = RecipeForm {
            name: None,
            text: None,
            cooking_time: Some(25),
            image: None,
            ingredients: Some(vec![IngredientAmount { id: flour, amount: 200 }]),
            tags: Some(vec![dinner]),
        };
        let updated = update_recipe(created.id, form, &anna, &InlineImages, &settings(), &db.pool)
            .await
            .unwrap();

        assert_eq!(updated.name, "Omelette");
        assert_eq!(updated.cooking_time, 25);
        assert_eq!(updated.image, created.image);
        assert_eq!(
            updated.ingredients.iter().map(|i| (i.id, i.amount)).collect::<Vec<_>>(),
            vec![(flour, 200)]
        );
        assert_eq!(updated.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![dinner]);

        db.finish().await;
    }

    #[tokio::test]
    async fn listing_clamps_offsets_and_keeps_the_total() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;
        let eggs = db.create_ingredient("eggs", "pcs").await;
        let breakfast = db.create_tag("breakfast").await;

        for name in ["Omelette", "Pancakes", "Frittata"] {
            create_recipe(
                recipe_form(name, &[(eggs, 2)], &[breakfast]),
                &anna,
                &InlineImages,
                &settings(),
                &db.pool,
            )
            .await
            .unwrap();
        }

        let filter = RecipeFilter::default();

        let first = fetch_recipes(&filter, None, -1, &settings(), &db.pool)
            .await
            .unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.total_rows, 3);
        assert_eq!(
            first.rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["Frittata", "Pancakes"]
        );
        assert_eq!(first.next_offset, Some(2));

        let past_the_end = fetch_recipes(&filter, None, 10, &settings(), &db.pool)
            .await
            .unwrap();
        assert!(past_the_end.rows.is_empty());
        assert_eq!(past_the_end.total_rows, 3);

        db.finish().await;
    }
}
