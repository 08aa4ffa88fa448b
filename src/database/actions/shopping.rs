use std::collections::HashMap;

use chrono::{Local, NaiveDate};
use sqlx::{Pool, Postgres};
use warp::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    Reply,
};

use crate::{
    authentication::permissions::ActionType,
    config::Settings,
    constants::SHOPPING_LIST_FILENAME,
    error::ServiceError,
    jwt::SessionData,
    schema::{CartPart, Id, ShoppingListOrder},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingList {
    pub lines: Vec<ShoppingLine>,
    pub recipes: Vec<String>,
    pub date: NaiveDate,
}

/// Sums amounts per (name, unit) pair; a shared ingredient ends up on one line.
pub fn aggregate_cart(parts: &[CartPart], order: ShoppingListOrder) -> Vec<ShoppingLine> {
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
    let mut lines: Vec<ShoppingLine> = Vec::new();

    for part in parts {
        let key = (part.name.as_str(), part.measurement_unit.as_str());
        match positions.get(&key) {
            Some(&index) => lines[index].amount += i64::from(part.amount),
            None => {
                positions.insert(key, lines.len());
                lines.push(ShoppingLine {
                    name: part.name.clone(),
                    measurement_unit: part.measurement_unit.clone(),
                    amount: i64::from(part.amount),
                });
            }
        }
    }

    match order {
        ShoppingListOrder::Amount => lines.sort_by(|a, b| {
            a.amount
                .cmp(&b.amount)
                .then_with(|| a.name.cmp(&b.name))
        }),
        ShoppingListOrder::Name => lines.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
        }),
        // first appearance in the cart
        ShoppingListOrder::Recipe => {}
    }

    lines
}

/// Distinct recipe names in cart order.
pub fn cart_recipe_names(parts: &[CartPart]) -> Vec<String> {
    let mut seen: Vec<Id> = Vec::new();
    let mut names = Vec::new();

    for part in parts {
        if !seen.contains(&part.recipe_id) {
            seen.push(part.recipe_id);
            names.push(part.recipe_name.clone());
        }
    }

    names
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl ShoppingList {
    pub fn new(parts: Vec<CartPart>, order: ShoppingListOrder, date: NaiveDate) -> Self {
        Self {
            lines: aggregate_cart(&parts, order),
            recipes: cart_recipe_names(&parts),
            date,
        }
    }

    pub fn render(&self) -> String {
        let mut document = vec![format!(
            "Shopping list for {}:",
            self.date.format("%d-%m-%Y")
        )];

        document.extend(self.lines.iter().enumerate().map(|(i, line)| {
            format!(
                "{}) {}: {} {}",
                i + 1,
                capitalize(&line.name),
                line.amount,
                line.measurement_unit
            )
        }));

        document.push(String::new());
        document.push(String::from("Ingredients are needed for the following recipes:"));
        document.extend(
            self.recipes
                .iter()
                .enumerate()
                .map(|(i, recipe)| format!("{}) {}", i + 1, recipe)),
        );

        document.join("\n")
    }

    pub fn into_reply(self) -> impl Reply {
        let reply = warp::reply::with_header(
            self.render(),
            CONTENT_TYPE,
            "text/plain; charset=utf-8",
        );

        warp::reply::with_header(
            reply,
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
        )
    }
}

pub async fn list_cart_parts(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartPart>, ServiceError> {
    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT r.id AS recipe_id, r.name AS recipe_name, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_carts c
        INNER JOIN recipes r ON r.id = c.recipe_id
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = r.id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        ORDER BY c.id, ri.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn build_shopping_list(
    session: &SessionData,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<ShoppingList, ServiceError> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    let parts = list_cart_parts(session.user_id, pool).await?;
    if parts.is_empty() {
        return Err(ServiceError::not_found(format!(
            "Shopping cart of user {} is empty",
            session.username
        )));
    }

    log::info!(
        "Building shopping list for {} from {} recipe parts",
        session.username,
        parts.len()
    );

    Ok(ShoppingList::new(
        parts,
        settings.shopping_list_order,
        Local::now().date_naive(),
    ))
}
