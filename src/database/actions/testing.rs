//! Postgres fixtures for action tests. Each `TestDb` gets its own schema, so
//! tests run in parallel against one database. Without `DATABASE_URL` the
//! tests return early.

use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::{postgres::PgPoolOptions, Executor, PgPool};

use crate::{
    error::ServiceError,
    jwt::SessionData,
    schema::{Id, UserRole},
};

use super::ImageStore;

const SCHEMA: &str = include_str!("../../../sql/schema.sql");

static SCHEMA_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub struct TestDb {
    pub pool: PgPool,
    admin: PgPool,
    schema: String,
}

impl TestDb {
    pub async fn connect() -> Option<TestDb> {
        let url = std::env::var("DATABASE_URL").ok()?;

        let schema = format!(
            "test_{}_{}",
            std::process::id(),
            SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        let admin = PgPool::connect(&url).await.unwrap();
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await
            .unwrap();

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .unwrap();

        pool.execute(SCHEMA).await.unwrap();

        Some(TestDb {
            pool,
            admin,
            schema,
        })
    }

    pub async fn finish(self) {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await
            .unwrap();
    }

    pub async fn create_user(&self, username: &str) -> SessionData {
        let (user_id,): (Id,) = sqlx::query_as(
            "
            INSERT INTO users (email, username, first_name, last_name, password)
            VALUES ($1, $2, $2, $2, 'unused')
            RETURNING id
        ",
        )
        .bind(format!("{username}@example.com"))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        SessionData {
            user_id,
            username: username.to_string(),
            role: UserRole::User,
            is_admin: false,
        }
    }

    pub async fn create_tag(&self, slug: &str) -> Id {
        let (id,): (Id,) = sqlx::query_as(
            "INSERT INTO tags (name, color, slug) VALUES ($1, '#E26C2D', $1) RETURNING id",
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        id
    }

    pub async fn create_ingredient(&self, name: &str, measurement_unit: &str) -> Id {
        let (id,): (Id,) = sqlx::query_as(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(measurement_unit)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        id
    }

    /// Inserts a recipe row with its ingredient amounts, skipping validation.
    pub async fn insert_recipe(&self, author: &SessionData, name: &str, parts: &[(Id, i32)]) -> Id {
        let (id,): (Id,) = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image)
            VALUES ($1, $2, 'Mix', 10, 'image.png')
            RETURNING id
        ",
        )
        .bind(author.user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        for &(ingredient_id, amount) in parts {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(ingredient_id)
            .bind(amount)
            .execute(&self.pool)
            .await
            .unwrap();
        }

        id
    }
}

/// Stores the payload itself as the image reference.
pub struct InlineImages;

impl ImageStore for InlineImages {
    fn store(&self, payload: &str) -> Result<String, ServiceError> {
        Ok(payload.to_string())
    }
}
