use crate::db;
use crate::errors::Result;
use crate::metrics;
use crate::model::{NewReading, NewSensor, Page, PageQuery, Reading, Sensor, SensorPatch, Status};
use crate::validate;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
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
        .route("/create/", post(create_sensor))
        .route("/sensors/", get(list_sensors))
        .route(
            "/sensor/:sensor_id",
            get(get_sensor).put(update_sensor).delete(delete_sensor),
        )
        .route("/data/:sensor_id", get(get_sensor_data))
        .route("/add/", post(add_reading))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn entrypoint() -> Json<Status> {
    Json(Status::new("Hello World"))
}

async fn create_sensor(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewSensor>, JsonRejection>,
) -> Result<Json<Sensor>> {
    let Json(sensor) = payload?;
    validate::validate_new_sensor(&sensor)?;

    let created = db::create_sensor(&state.pool, &sensor).await?;
    info!("Sensor {} created", created.id);
    Ok(Json(created))
}

async fn list_sensors(
    State(state): State<AppState>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Page<Sensor>>> {
    let Query(query) = query?;
    let page = validate::page_request(&query)?;

    Ok(Json(db::list_sensors(&state.pool, page).await?))
}

async fn get_sensor(
    State(state): State<AppState>,
    sensor_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Sensor>> {
    let Path(sensor_id) = sensor_id?;
    Ok(Json(db::get_sensor(&state.pool, sensor_id).await?))
}

async fn update_sensor(
    State(state): State<AppState>,
    sensor_id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<SensorPatch>, JsonRejection>,
) -> Result<Json<Sensor>> {
    let Path(sensor_id) = sensor_id?;
    let Json(patch) = payload?;
    validate::validate_patch(&patch)?;

    Ok(Json(db::update_sensor(&state.pool, sensor_id, patch).await?))
}

async fn delete_sensor(
    State(state): State<AppState>,
    sensor_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Status>> {
    let Path(sensor_id) = sensor_id?;
    let readings = db::delete_sensor(&state.pool, sensor_id).await?;
    info!("Sensor {} deleted along with {} readings", sensor_id, readings);

    Ok(Json(Status::new(format!("Deleted sensor {}", sensor_id))))
}

async fn get_sensor_data(
    State(state): State<AppState>,
    sensor_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Reading>>> {
    let Path(sensor_id) = sensor_id?;
    Ok(Json(db::list_readings(&state.pool, sensor_id).await?))
}

async fn add_reading(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewReading>, JsonRejection>,
) -> Result<Json<Reading>> {
    let Json(reading) = payload?;
    Ok(Json(db::add_reading(&state.pool, &reading).await?))
}

async fn metrics_handler() -> Result<String> {
    metrics::gather_metrics()
}
