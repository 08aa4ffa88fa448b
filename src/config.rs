use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use log::{info, warn};

use crate::{
    constants::{
        DEFAULT_INGREDIENTS_CSV, DEFAULT_TAGS_CSV, MAX_LENGTH_EMAIL, MAX_LENGTH_FIRSTNAME,
        MAX_LENGTH_LASTNAME, MAX_LENGTH_MEASUREMENT_UNIT, MAX_LENGTH_NAME_INGREDIENT,
        MAX_LENGTH_NAME_RECIPE, MAX_LENGTH_NAME_TAG, MAX_LENGTH_PASSWORD, MAX_LENGTH_SLUG,
        MAX_LENGTH_USERNAME, RECIPE_COUNT_PER_PAGE, RESERVED_USERNAME,
        SUBSCRIPTION_COUNT_PER_PAGE,
    },
    error::TypeError,
    schema::ShoppingListOrder,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLimits {
    pub username: usize,
    pub email: usize,
    pub first_name: usize,
    pub last_name: usize,
    pub password: usize,
    pub recipe_name: usize,
    pub tag_name: usize,
    pub slug: usize,
    pub ingredient_name: usize,
    pub measurement_unit: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            username: MAX_LENGTH_USERNAME,
            email: MAX_LENGTH_EMAIL,
            first_name: MAX_LENGTH_FIRSTNAME,
            last_name: MAX_LENGTH_LASTNAME,
            password: MAX_LENGTH_PASSWORD,
            recipe_name: MAX_LENGTH_NAME_RECIPE,
            tag_name: MAX_LENGTH_NAME_TAG,
            slug: MAX_LENGTH_SLUG,
            ingredient_name: MAX_LENGTH_NAME_INGREDIENT,
            measurement_unit: MAX_LENGTH_MEASUREMENT_UNIT,
        }
    }
}

/// Process-wide settings, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub recipe_page_size: i64,
    pub subscription_page_size: i64,
    pub shopping_list_order: ShoppingListOrder,
    pub tags_csv: PathBuf,
    pub ingredients_csv: PathBuf,
    pub reserved_username: String,
    pub limits: FieldLimits,
}

impl Settings {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            recipe_page_size: RECIPE_COUNT_PER_PAGE,
            subscription_page_size: SUBSCRIPTION_COUNT_PER_PAGE,
            shopping_list_order: ShoppingListOrder::Amount,
            tags_csv: PathBuf::from(DEFAULT_TAGS_CSV),
            ingredients_csv: PathBuf::from(DEFAULT_INGREDIENTS_CSV),
            reserved_username: RESERVED_USERNAME.to_string(),
            limits: FieldLimits::default(),
        }
    }

    pub fn from_env() -> Result<Self, TypeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, TypeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| TypeError::new("JWT_SECRET must be set"))?;

        let mut settings = Self::new(&jwt_secret);
        settings.database_url = lookup("DATABASE_URL");
        settings.recipe_page_size =
            try_load(&lookup, "RECIPE_PAGE_SIZE", settings.recipe_page_size)?;
        settings.subscription_page_size = try_load(
            &lookup,
            "SUBSCRIPTION_PAGE_SIZE",
            settings.subscription_page_size,
        )?;

        if settings.recipe_page_size < 1 || settings.subscription_page_size < 1 {
            return Err(TypeError::new("Page sizes must be positive"));
        }

        if let Some(order) = lookup("SHOPPING_LIST_ORDER") {
            settings.shopping_list_order = ShoppingListOrder::try_from(order.as_str())?;
        }
        if let Some(path) = lookup("TAGS_CSV") {
            settings.tags_csv = PathBuf::from(path);
        }
        if let Some(path) = lookup("INGREDIENTS_CSV") {
            settings.ingredients_csv = PathBuf::from(path);
        }

        Ok(settings)
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> Result<T, TypeError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            TypeError::new(&format!("Invalid value for {key}"))
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
