//! Favorites, shopping cart entries and subscriptions.
//!
//! All three are (user, target) join rows guarded by a unique constraint, so
//! a duplicate add is detected from the affected row count rather than a
//! prior lookup.

use crate::{
    authentication::permissions::ActionType,
    error::ServiceError,
    jwt::SessionData,
    schema::{AuthorRecipeRow, Id, SubscribedAuthorRow},
    views::{RecipeSummary, SubscriptionView},
};

use super::{recipes::recipe_not_found, users::build_subscription_views};

use serde::Serialize;
use sqlx::{Pool, Postgres};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Favorite,
    ShoppingCart,
    Subscription,
}

/// What an add returns: the recipe card or the followed author.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RelationTarget {
    Recipe(RecipeSummary),
    Author(SubscriptionView),
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping_carts",
            Relation::Subscription => "subscriptions",
        }
    }

    pub fn target_column(self) -> &'static str {
        match self {
            Relation::Favorite | Relation::ShoppingCart => "recipe_id",
            Relation::Subscription => "author_id",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "the shopping cart",
            Relation::Subscription => "subscriptions",
        }
    }

    pub fn conflict(self, username: &str, target: &str) -> ServiceError {
        match self {
            Relation::Subscription => ServiceError::conflict(format!(
                "User {username} is already subscribed to {target}"
            )),
            _ => ServiceError::conflict(format!(
                "Recipe {target} is already in {} of user {username}",
                self.label()
            )),
        }
    }

    pub fn missing(self, username: &str, target_id: Id) -> ServiceError {
        match self {
            Relation::Subscription => ServiceError::not_found(format!(
                "User {username} is not subscribed to user with id={target_id}"
            )),
            _ => ServiceError::not_found(format!(
                "Recipe with id={target_id} is not in {} of user {username}",
                self.label()
            )),
        }
    }
}

pub fn check_self_subscription(user_id: Id, author_id: Id) -> Result<(), ServiceError> {
    if user_id == author_id {
        return Err(ServiceError::validation(
            "author",
            "You can't subscribe to yourself",
        ));
    }
    Ok(())
}

async fn get_recipe_summary(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<AuthorRecipeRow, ServiceError> {
    let row: Option<AuthorRecipeRow> = sqlx::query_as(
        "SELECT author_id, id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| recipe_not_found(id))
}

async fn get_author(id: Id, pool: &Pool<Postgres>) -> Result<SubscribedAuthorRow, ServiceError> {
    let row: Option<SubscribedAuthorRow> = sqlx::query_as(
        "
        SELECT id, username, email, first_name, last_name, 0::BIGINT AS count
        FROM users WHERE id = $1
    ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| ServiceError::not_found(format!("User with id={id} not found")))
}

async fn insert_relation(
    relation: Relation,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ServiceError> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table(),
        relation.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Adds the relation and returns its target. `recipes_limit` caps the recipe
/// cards of a followed author.
pub async fn add_relation(
    relation: Relation,
    session: &SessionData,
    target_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<RelationTarget, ServiceError> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    match relation {
        Relation::Favorite | Relation::ShoppingCart => {
            let recipe = get_recipe_summary(target_id, pool).await?;

            if !insert_relation(relation, session.user_id, target_id, pool).await? {
                return Err(relation.conflict(&session.username, &recipe.name));
            }

            Ok(RelationTarget::Recipe(recipe.into()))
        }
        Relation::Subscription => {
            let author = get_author(target_id, pool).await?;
            check_self_subscription(session.user_id, author.id)?;

            if !insert_relation(relation, session.user_id, target_id, pool).await? {
                return Err(relation.conflict(&session.username, &author.username));
            }

            log::info!("{} subscribed to {}", session.username, author.username);

            let view = build_subscription_views(vec![author], recipes_limit, pool).await?;

            match view.into_iter().next() {
                Some(view) => Ok(RelationTarget::Author(view)),
                None => Err(ServiceError::not_found(format!(
                    "User with id={target_id} not found"
                ))),
            }
        }
    }
}

pub async fn remove_relation(
    relation: Relation,
    session: &SessionData,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        relation.table(),
        relation.target_column()
    ))
    .bind(session.user_id)
    .bind(target_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(relation.missing(&session.username, target_id));
    }

    Ok(())
}

pub async fn add_to_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RelationTarget, ServiceError> {
    add_relation(Relation::Favorite, session, recipe_id, None, pool).await
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    remove_relation(Relation::Favorite, session, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RelationTarget, ServiceError> {
    add_relation(Relation::ShoppingCart, session, recipe_id, None, pool).await
}

pub async fn remove_from_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    remove_relation(Relation::ShoppingCart, session, recipe_id, pool).await
}

pub async fn subscribe(
    author_id: Id,
    session: &SessionData,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<RelationTarget, ServiceError> {
    add_relation(Relation::Subscription, session, author_id, recipes_limit, pool).await
}

pub async fn unsubscribe(
    author_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    remove_relation(Relation::Subscription, session, author_id, pool).await
}

pub async fn list_favorites(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeSummary>, ServiceError> {
    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT r.author_id, r.id, r.name, r.image, r.cooking_time
        FROM favorites f
        INNER JOIN recipes r ON r.id = f.recipe_id
        WHERE f.user_id = $1
        ORDER BY f.id
    ",
    )
    .bind(session.user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RecipeSummary::from).collect())
}
