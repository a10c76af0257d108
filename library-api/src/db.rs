use crate::errors::{Error, Result};
use crate::model::{NewReview, NewUser, Page, PageRequest, Review, User};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, username, fullname, email, hashed_password, disabled";

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    info!("Connecting to database...");
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    // An in-memory database lives only as long as its connection, so never recycle it.
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Fresh private in-memory database with migrations applied.
///
/// Test support for unit tests and `tests/api.rs`; the server itself always
/// goes through [`make_pool`] with the configured URL.
pub async fn memory_pool() -> Result<SqlitePool> {
    make_pool("sqlite::memory:", 1).await
}

pub async fn find_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ? ORDER BY id LIMIT 1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_hashed_password(
    pool: &SqlitePool,
    hashed_password: &str,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE hashed_password = ? ORDER BY id LIMIT 1",
        USER_COLUMNS
    ))
    .bind(hashed_password)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let created = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, fullname, email, hashed_password, disabled) \
         VALUES (?, ?, ?, ?, FALSE) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&user.username)
    .bind(&user.fullname)
    .bind(&user.email)
    .bind(&user.hashed_password)
    .fetch_one(pool)
    .await?;

    debug!("Created user {} ({:?})", created.id, created.username);
    Ok(created)
}

pub async fn create_review(pool: &SqlitePool, review: &NewReview) -> Result<Review> {
    let created = sqlx::query_as::<_, Review>(
        "INSERT INTO reviews (name, description) VALUES (?, ?) RETURNING id, name, description",
    )
    .bind(&review.name)
    .bind(&review.description)
    .fetch_one(pool)
    .await?;

    debug!("Created review {}", created.id);
    Ok(created)
}

pub async fn list_reviews(pool: &SqlitePool, page: PageRequest) -> Result<Page<Review>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, Review>(
        "SELECT id, name, description FROM reviews ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok(Page {
        items,
        total,
        limit: page.limit,
        offset: page.offset,
    })
}

pub async fn get_review(pool: &SqlitePool, review_id: i64) -> Result<Review> {
    sqlx::query_as::<_, Review>("SELECT id, name, description FROM reviews WHERE id = ?")
        .bind(review_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(Error::object_does_not_exist)
}

pub async fn delete_review(pool: &SqlitePool, review_id: i64) -> Result<()> {
    let deleted = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review_id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(Error::review_not_found(review_id));
    }

    debug!("Deleted review {}", review_id);
    Ok(())
}
