//! Read projections returned to API callers.
//!
//! Rows are fetched in batches and stitched together here, so listing a page
//! of recipes costs a fixed number of queries regardless of page size.

use std::collections::HashMap;

use serde::Serialize;

use crate::schema::{
    AuthorRecipeRow, Id, RecipePart, RecipeRow, RecipeTag, SubscribedAuthorRow, Tag, UserRow,
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: row.is_subscribed,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Short recipe card used by favorites, shopping cart and subscriptions.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeSummary {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<AuthorRecipeRow> for RecipeSummary {
    fn from(row: AuthorRecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

/// Joins recipe rows with their tags, ingredients and authors, keeping the
/// order of `recipes`. Recipes whose author row is missing are skipped.
pub fn assemble_recipe_views(
    recipes: Vec<RecipeRow>,
    tags: Vec<RecipeTag>,
    parts: Vec<RecipePart>,
    authors: Vec<UserRow>,
) -> Vec<RecipeView> {
    let mut tags_by_recipe: HashMap<Id, Vec<Tag>> = HashMap::new();
    tags.into_iter().for_each(|tag| {
        tags_by_recipe
            .entry(tag.recipe_id)
            .or_default()
            .push(tag.into())
    });

    let mut parts_by_recipe: HashMap<Id, Vec<RecipeIngredientView>> = HashMap::new();
    parts.into_iter().for_each(|part| {
        parts_by_recipe
            .entry(part.recipe_id)
            .or_default()
            .push(part.into())
    });

    let authors: HashMap<Id, UserView> = authors
        .into_iter()
        .map(|row| (row.id, UserView::from(row)))
        .collect();

    recipes
        .into_iter()
        .filter_map(|recipe| {
            let author = match authors.get(&recipe.author_id) {
                Some(author) => author.clone(),
                None => {
                    log::warn!(
                        "Recipe {} references missing author {}",
                        recipe.id,
                        recipe.author_id
                    );
                    return None;
                }
            };

            Some(RecipeView {
                id: recipe.id,
                tags: tags_by_recipe.remove(&recipe.id).unwrap_or_default(),
                author,
                ingredients: parts_by_recipe.remove(&recipe.id).unwrap_or_default(),
                name: recipe.name,
                image: recipe.image,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                is_favorited: recipe.is_favorited,
                is_in_shopping_cart: recipe.is_in_shopping_cart,
            })
        })
        .collect()
}

/// Attaches recipe cards and counts to subscribed authors, keeping the order
/// of `authors`.
pub fn assemble_subscription_views(
    authors: Vec<SubscribedAuthorRow>,
    recipes: Vec<AuthorRecipeRow>,
    counts: Vec<(Id, i64)>,
) -> Vec<SubscriptionView> {
    let mut recipes_by_author: HashMap<Id, Vec<RecipeSummary>> = HashMap::new();
    recipes.into_iter().for_each(|recipe| {
        recipes_by_author
            .entry(recipe.author_id)
            .or_default()
            .push(recipe.into())
    });
    let counts: HashMap<Id, i64> = counts.into_iter().collect();

    authors
        .into_iter()
        .map(|author| SubscriptionView {
            recipes: recipes_by_author.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author: UserView {
                email: author.email,
                id: author.id,
                username: author.username,
                first_name: author.first_name,
                last_name: author.last_name,
                is_subscribed: true,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn recipe_row(id: Id, author_id: Id) -> RecipeRow {
        RecipeRow {
            id,
            author_id,
            name: format!("Recipe {id}"),
            text: String::from("Cook it."),
            cooking_time: 10,
            image: format!("recipes/images/{id}.png"),
            is_favorited: false,
            is_in_shopping_cart: false,
        }
    }

    fn user_row(id: Id) -> UserRow {
        UserRow {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            first_name: String::from("Anna"),
            last_name: String::from("Ivanova"),
            is_subscribed: false,
        }
    }

    fn recipe_tag(recipe_id: Id, id: Id) -> RecipeTag {
        RecipeTag {
            recipe_id,
            id,
            name: String::from("Breakfast"),
            color: String::from("#E26C2D"),
            slug: String::from("breakfast"),
        }
    }

    fn part(recipe_id: Id, ingredient_id: Id, amount: i32) -> RecipePart {
        RecipePart {
            recipe_id,
            ingredient_id,
            name: String::from("eggs"),
            measurement_unit: String::from("pcs"),
            amount,
        }
    }

    #[test]
    fn nests_tags_ingredients_and_author() {
        let views = assemble_recipe_views(
            vec![recipe_row(2, 1), recipe_row(1, 1)],
            vec![recipe_tag(1, 1), recipe_tag(2, 1)],
            vec![part(1, 5, 3)],
            vec![user_row(1)],
        );

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, 2);
        assert!(views[0].ingredients.is_empty());
        assert_eq!(views[1].ingredients[0].id, 5);
        assert_eq!(views[1].ingredients[0].amount, 3);
        assert_eq!(views[1].tags[0].id, 1);
        assert_eq!(views[1].author.username, "user1");
    }

    #[test]
    fn skips_recipes_without_an_author() {
        let views = assemble_recipe_views(vec![recipe_row(1, 9)], vec![], vec![], vec![]);
        assert!(views.is_empty());
    }

    #[test]
    fn recipe_view_serializes_flat_fields() {
        let views = assemble_recipe_views(
            vec![recipe_row(1, 1)],
            vec![recipe_tag(1, 1)],
            vec![part(1, 5, 3)],
            vec![user_row(1)],
        );
        let value = serde_json::to_value(&views[0]).unwrap();

        assert_eq!(value["is_favorited"], json!(false));
        assert_eq!(value["ingredients"][0], json!({
            "id": 5, "name": "eggs", "measurement_unit": "pcs", "amount": 3
        }));
        assert_eq!(value["tags"][0]["slug"], json!("breakfast"));
        assert_eq!(value["author"]["is_subscribed"], json!(false));
    }

    #[test]
    fn subscription_view_flattens_the_author() {
        let views = assemble_subscription_views(
            vec![SubscribedAuthorRow {
                id: 3,
                username: String::from("chef"),
                email: String::from("chef@example.com"),
                first_name: String::from("Ivan"),
                last_name: String::from("Petrov"),
                count: 1,
            }],
            vec![AuthorRecipeRow {
                author_id: 3,
                id: 11,
                name: String::from("Borscht"),
                image: String::from("recipes/images/11.png"),
                cooking_time: 90,
            }],
            vec![(3, 4)],
        );

        let value = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(value["username"], json!("chef"));
        assert_eq!(value["is_subscribed"], json!(true));
        assert_eq!(value["recipes_count"], json!(4));
        assert_eq!(value["recipes"][0]["name"], json!("Borscht"));
    }
}
