use crate::{
    authentication::cryptography::{hash_password, verify_password},
    config::Settings,
    error::ServiceError,
    form::RegistrationForm,
    jwt::SessionData,
    pagination::{sanitize_offset, PageContext},
    schema::{AuthorRecipeRow, Id, SubscribedAuthorRow, User, UserRow},
    views::{assemble_subscription_views, SubscriptionView, UserView},
};

use sqlx::{Pool, Postgres};

/// Fetches users with `is_subscribed` computed for `viewer`.
pub async fn list_user_rows(
    ids: &[Id],
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserRow>, ServiceError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name,
            EXISTS (
                SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = $2
            ) AS is_subscribed
        FROM users u
        WHERE u.id = ANY($1)
    ",
    )
    .bind(ids)
    .bind(viewer)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get_user_profile(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserView, ServiceError> {
    let row = list_user_rows(&[id], viewer.map(|session| session.user_id), pool)
        .await?
        .into_iter()
        .next();

    match row {
        Some(row) => Ok(row.into()),
        None => Err(ServiceError::not_found(format!("User with id={id} not found"))),
    }
}

/// Checks an email/password pair for the identity provider. Unknown emails
/// and wrong passwords look the same to the caller.
pub async fn verify_credentials(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, ServiceError> {
    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(pool)
            .await?;

    match user {
        Some(user) if verify_password(password, &user.password)? => Ok(user),
        _ => Err(ServiceError::Unauthorized),
    }
}

/// Creates a user; the password is stored as an argon2 hash.
pub async fn register_user(
    form: RegistrationForm,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<UserView, ServiceError> {
    form.validate(settings)?;

    let password = hash_password(&form.password)?;

    let row: Option<(Id,)> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await?;

    let id = match row {
        Some((id,)) => id,
        None => {
            return Err(ServiceError::conflict(format!(
                "A user with username {} or email {} already exists",
                form.username, form.email
            )))
        }
    };

    log::info!("Registered user {} (id: {id})", form.username);

    Ok(UserView {
        email: form.email,
        id,
        username: form.username,
        first_name: form.first_name,
        last_name: form.last_name,
        is_subscribed: false,
    })
}

/// Recipe cards of each author, newest first, at most `limit` per author.
pub async fn list_author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorRecipeRow>, ServiceError> {
    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, id DESC
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn count_author_recipes(
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<(Id, i64)>, ServiceError> {
    let rows: Vec<(Id, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn build_subscription_views(
    authors: Vec<SubscribedAuthorRow>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionView>, ServiceError> {
    let ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    let recipes = list_author_recipes(&ids, recipes_limit, pool).await?;
    let counts = count_author_recipes(&ids, pool).await?;

    Ok(assemble_subscription_views(authors, recipes, counts))
}

/// Authors the caller follows, ordered by username. Negative offsets are
/// clamped to the first page.
pub async fn fetch_subscriptions(
    session: &SessionData,
    offset: i64,
    recipes_limit: Option<i64>,
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, ServiceError> {
    let offset = sanitize_offset(Some(offset));

    let authors: Vec<SubscribedAuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(settings.subscription_page_size)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = match authors.first() {
        Some(author) => author.count,
        None if offset > 0 => {
            let (count,) = sqlx::query_as::<_, (i64,)>(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1",
            )
            .bind(session.user_id)
            .fetch_one(pool)
            .await?;
            count
        }
        None => 0,
    };
    let views = build_subscription_views(authors, recipes_limit, pool).await?;

    Ok(PageContext::from_rows(
        views,
        total_count,
        settings.subscription_page_size,
        offset,
    ))
}

#[cfg(test)]
mod tests {
    use crate::database::actions::{subscribe, testing::TestDb};

    use super::*;

    #[tokio::test]
    async fn subscription_pages_clamp_offsets_and_keep_the_total() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;
        for username in ["boris", "clara", "dmitri"] {
            let author = db.create_user(username).await;
            subscribe(author.user_id, &anna, None, &db.pool)
                .await
                .unwrap();
        }

        let settings = Settings {
            subscription_page_size: 2,
            ..Settings::new("test-secret")
        };

        let first = fetch_subscriptions(&anna, -5, None, &settings, &db.pool)
            .await
            .unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.total_rows, 3);
        assert_eq!(
            first
                .rows
                .iter()
                .map(|view| view.author.username.as_str())
                .collect::<Vec<_>>(),
            vec!["boris", "clara"]
        );

        let past_the_end = fetch_subscriptions(&anna, 6, None, &settings, &db.pool)
            .await
            .unwrap();
        assert!(past_the_end.rows.is_empty());
        assert_eq!(past_the_end.total_rows, 3);

        db.finish().await;
    }

    #[tokio::test]
    async fn no_subscriptions_is_an_empty_page() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let anna = db.create_user("anna").await;

        let page = fetch_subscriptions(&anna, 0, None, &Settings::new("test-secret"), &db.pool)
            .await
            .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total_rows, 0);

        db.finish().await;
    }

    #[tokio::test]
    async fn registered_users_sign_in_by_email() {
        let Some(db) = TestDb::connect().await else {
            return;
        };
        let settings = Settings::new("test-secret");
        let form = RegistrationForm {
            email: String::from("anna@example.com"),
            username: String::from("anna"),
            first_name: String::from("Anna"),
            last_name: String::from("Ivanova"),
            password: String::from("correct horse"),
        };

        let view = register_user(form.clone(), &settings, &db.pool).await.unwrap();
        let user = verify_credentials("ANNA@example.com", "correct horse", &db.pool)
            .await
            .unwrap();
        assert_eq!(user.id, view.id);

        assert!(matches!(
            verify_credentials("anna@example.com", "wrong", &db.pool).await,
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(
            register_user(form, &settings, &db.pool).await,
            Err(ServiceError::Conflict(_))
        ));

        db.finish().await;
    }
}
