use serde::{Deserialize, Serialize};

use super::error::TypeError;

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoppingListOrder {
    Amount,
    Name,
    Recipe,
}

impl TryFrom<&str> for ShoppingListOrder {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "amount" => Ok(Self::Amount),
            "name" => Ok(Self::Name),
            "recipe" => Ok(Self::Recipe),
            _ => Err(TypeError::new("Invalid shopping list order")),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

/// User row joined with the viewer's subscription flag.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscribedAuthorRow {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecipeTag {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<RecipeTag> for Tag {
    fn from(value: RecipeTag) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
            slug: value.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
}

/// Recipe row joined with the viewer's favorite and shopping cart flags.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIdRow {
    pub id: Id,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub author_id: Id,
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecipePart {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// One ingredient line contributed by one recipe in a shopping cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct CartPart {
    pub recipe_id: Id,
    pub recipe_name: String,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shopping_list_orders() {
        assert_eq!(
            ShoppingListOrder::try_from("amount").unwrap(),
            ShoppingListOrder::Amount
        );
        assert_eq!(
            ShoppingListOrder::try_from("name").unwrap(),
            ShoppingListOrder::Name
        );
        assert_eq!(
            ShoppingListOrder::try_from("recipe").unwrap(),
            ShoppingListOrder::Recipe
        );
        assert!(ShoppingListOrder::try_from("price").is_err());
    }
}
