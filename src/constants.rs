pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 6;
pub const INGREDIENT_INSERT_CHUNK: usize = 1000;

pub const RESERVED_USERNAME: &str = "me";

pub const MAX_LENGTH_USERNAME: usize = 150;
pub const MAX_LENGTH_EMAIL: usize = 254;
pub const MAX_LENGTH_FIRSTNAME: usize = 150;
pub const MAX_LENGTH_LASTNAME: usize = 150;
pub const MAX_LENGTH_PASSWORD: usize = 150;
pub const MAX_LENGTH_NAME_RECIPE: usize = 200;
pub const MAX_LENGTH_NAME_TAG: usize = 200;
pub const MAX_LENGTH_SLUG: usize = 200;
pub const MAX_LENGTH_NAME_INGREDIENT: usize = 200;
pub const MAX_LENGTH_MEASUREMENT_UNIT: usize = 200;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_AMOUNT: i32 = 1;
// amount keeps the SMALLINT range of the reference data
pub const MAX_AMOUNT: i32 = i16::MAX as i32;

pub const DEFAULT_TAGS_CSV: &str = "data/tags.csv";
pub const DEFAULT_INGREDIENTS_CSV: &str = "data/ingredients.csv";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
