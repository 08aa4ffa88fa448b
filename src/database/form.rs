use serde::Deserialize;

use crate::{
    config::Settings,
    constants::{MAX_AMOUNT, MIN_AMOUNT, MIN_COOKING_TIME},
    error::ServiceError,
    schema::Id,
    validation::{
        find_duplicates, join_values, require_text, validate_color, validate_email, validate_slug,
        validate_username,
    },
};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

/// Raw recipe payload as sent by the client for both create and update.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RecipeForm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<Id>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
}

/// Update payload; `None` scalars keep their stored value, the ingredient and
/// tag sets are always replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
}

impl RecipeForm {
    pub fn into_new_recipe(self, settings: &Settings) -> Result<NewRecipe, ServiceError> {
        let name = self.name.clone().ok_or_else(|| required("name"))?;
        let text = self.text.clone().ok_or_else(|| required("text"))?;
        let cooking_time = self.cooking_time.ok_or_else(|| required("cooking_time"))?;
        let image = self
            .image
            .clone()
            .ok_or_else(|| ServiceError::validation("image", "Image is required"))?;

        let patch = self.into_patch(settings)?;

        Ok(NewRecipe {
            name,
            text,
            cooking_time,
            image,
            ingredients: patch.ingredients,
            tags: patch.tags,
        })
    }

    pub fn into_patch(self, settings: &Settings) -> Result<RecipePatch, ServiceError> {
        if let Some(name) = &self.name {
            require_text("name", name, settings.limits.recipe_name)?;
        }
        if let Some(text) = &self.text {
            require_text("text", text, usize::MAX)?;
        }
        if let Some(cooking_time) = self.cooking_time {
            validate_cooking_time(cooking_time)?;
        }
        if let Some(image) = &self.image {
            if image.trim().is_empty() {
                return Err(ServiceError::validation("image", "Image is required"));
            }
        }

        let ingredients = validate_ingredients(self.ingredients)?;
        let tags = validate_tags(self.tags)?;

        Ok(RecipePatch {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image: self.image,
            ingredients,
            tags,
        })
    }
}

fn required(field: &str) -> ServiceError {
    ServiceError::validation(field, "This field is required")
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<i32, ServiceError> {
    if cooking_time < MIN_COOKING_TIME {
        return Err(ServiceError::validation(
            "cooking_time",
            format!(
                "Cooking time must be at least {MIN_COOKING_TIME} minute, got {cooking_time}"
            ),
        ));
    }
    Ok(cooking_time)
}

pub fn validate_ingredients(
    ingredients: Option<Vec<IngredientAmount>>,
) -> Result<Vec<IngredientAmount>, ServiceError> {
    let ingredients = match ingredients {
        Some(ingredients) if !ingredients.is_empty() => ingredients,
        _ => {
            return Err(ServiceError::validation(
                "ingredients",
                "At least one ingredient is required",
            ))
        }
    };

    if let Some(part) = ingredients
        .iter()
        .find(|part| part.amount < MIN_AMOUNT || part.amount > MAX_AMOUNT)
    {
        return Err(ServiceError::validation(
            "ingredients",
            format!(
                "Amount of ingredient {} must be between {MIN_AMOUNT} and {MAX_AMOUNT}, got {}",
                part.id, part.amount
            ),
        ));
    }

    let ids: Vec<Id> = ingredients.iter().map(|part| part.id).collect();
    let duplicates = find_duplicates(&ids);
    if !duplicates.is_empty() {
        return Err(ServiceError::validation(
            "ingredients",
            format!("Ingredients {} are repeated", join_values(&duplicates)),
        ));
    }

    Ok(ingredients)
}

pub fn validate_tags(tags: Option<Vec<Id>>) -> Result<Vec<Id>, ServiceError> {
    let tags = match tags {
        Some(tags) if !tags.is_empty() => tags,
        _ => {
            return Err(ServiceError::validation(
                "tags",
                "At least one tag is required",
            ))
        }
    };

    let duplicates = find_duplicates(&tags);
    if !duplicates.is_empty() {
        return Err(ServiceError::validation(
            "tags",
            format!("Tags {} are repeated", join_values(&duplicates)),
        ));
    }

    Ok(tags)
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(&self, settings: &Settings) -> Result<(), ServiceError> {
        let limits = &settings.limits;

        validate_email(&self.email, limits.email)?;
        validate_username(&self.username, &settings.reserved_username, limits.username)?;
        require_text("first_name", &self.first_name, limits.first_name)?;
        require_text("last_name", &self.last_name, limits.last_name)?;
        require_text("password", &self.password, limits.password)?;

        Ok(())
    }
}

/// Query filter for recipe listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    /// Builds the filter from decoded query pairs; `tags` may repeat.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ServiceError> {
        let mut filter = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "tags" => {
                    if !value.is_empty() && !filter.tags.contains(&value) {
                        filter.tags.push(value);
                    }
                }
                "author" if value.is_empty() => {}
                "author" => {
                    let author = value.parse::<Id>().map_err(|_| {
                        ServiceError::validation("author", format!("Invalid author id: {value}"))
                    })?;
                    filter.author = Some(author);
                }
                "is_favorited" => filter.is_favorited = parse_flag("is_favorited", &value)?,
                "is_in_shopping_cart" => {
                    filter.is_in_shopping_cart = parse_flag("is_in_shopping_cart", &value)?
                }
                _ => {}
            }
        }

        Ok(filter)
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ServiceError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(ServiceError::validation(
            field,
            format!("Expected 0 or 1, got {value}"),
        )),
    }
}

pub fn parse_recipes_limit(value: Option<&str>) -> Result<Option<i64>, ServiceError> {
    match value {
        None | Some("") => Ok(None),
        Some(value) => match value.parse::<i64>() {
            Ok(limit) if limit >= 0 => Ok(Some(limit)),
            _ => Err(ServiceError::validation(
                "recipes_limit",
                format!("Expected a non-negative integer, got {value}"),
            )),
        },
    }
}

/// Reference tag as read from the loader's CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl NewTag {
    pub fn validate(&self, settings: &Settings) -> Result<(), ServiceError> {
        require_text("name", &self.name, settings.limits.tag_name)?;
        validate_color(&self.color)?;
        validate_slug(&self.slug, settings.limits.slug)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl NewIngredient {
    pub fn validate(&self, settings: &Settings) -> Result<(), ServiceError> {
        require_text("name", &self.name, settings.limits.ingredient_name)?;
        require_text(
            "measurement_unit",
            &self.measurement_unit,
            settings.limits.measurement_unit,
        )
    }
}
