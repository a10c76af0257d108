use crate::auth::{self, CurrentUser};
use crate::db;
use crate::errors::Result;
use crate::model::{
    InitStatus, NewReview, Page, PageQuery, Review, Status, Token, TokenForm, UserInfo,
};
use crate::validate;
use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get, post},
    Form, Json, Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

pub fn create_router(pool: SqlitePool) -> Router {
    let state = AppState { pool };

    Router::new()
        .route("/", get(entrypoint))
        .route("/init/", get(init_demo_user))
        .route("/token", post(get_token))
        .route("/users/me", get(current_user_info))
        .route("/reviews/", get(list_reviews))
        .route("/review/:review_id", get(get_review))
        .route("/add/", post(create_review))
        .route("/delete/:review_id", delete(delete_review))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn entrypoint() -> Json<Status> {
    Json(Status::new("Hello World"))
}

async fn init_demo_user(State(state): State<AppState>) -> Result<Json<InitStatus>> {
    auth::bootstrap_demo_user(&state.pool).await?;
    Ok(Json(InitStatus {
        status: "ok".to_string(),
    }))
}

async fn get_token(
    State(state): State<AppState>,
    form: std::result::Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<Token>> {
    let Form(form) = form?;
    let token = auth::issue_token(&state.pool, &form.username, &form.password).await?;
    info!("Token issued for {:?}", form.username);
    Ok(Json(token))
}

async fn current_user_info(CurrentUser(user): CurrentUser) -> Json<UserInfo> {
    Json(UserInfo::from(user))
}

async fn list_reviews(
    State(state): State<AppState>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<Review>>> {
    let Query(query) = query?;
    let page = validate::page_request(&query)?;

    Ok(Json(db::list_reviews(&state.pool, page).await?))
}

async fn get_review(
    State(state): State<AppState>,
    review_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Review>> {
    let Path(review_id) = review_id?;
    Ok(Json(db::get_review(&state.pool, review_id).await?))
}

async fn create_review(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewReview>, JsonRejection>,
) -> Result<Json<Review>> {
    let Json(review) = payload?;
    validate::validate_new_review(&review)?;

    let created = db::create_review(&state.pool, &review).await?;
    info!("Review {} created", created.id);
    Ok(Json(created))
}

async fn delete_review(
    State(state): State<AppState>,
    review_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Status>> {
    let Path(review_id) = review_id?;
    db::delete_review(&state.pool, review_id).await?;
    info!("Review {} deleted", review_id);

    Ok(Json(Status::new(format!("Deleted review {}", review_id))))
}
