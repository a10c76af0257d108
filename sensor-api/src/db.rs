use crate::errors::{Error, Result};
use crate::metrics::{READINGS_ADDED_TOTAL, READINGS_PRUNED_TOTAL, SENSORS_CREATED_TOTAL};
use crate::model::{NewReading, NewSensor, Page, PageRequest, Reading, Sensor, SensorPatch};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

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

pub async fn create_sensor(pool: &SqlitePool, sensor: &NewSensor) -> Result<Sensor> {
    let created = sqlx::query_as::<_, Sensor>(
        "INSERT INTO sensor (name, n) VALUES (?, ?) RETURNING id, name, n",
    )
    .bind(&sensor.name)
    .bind(sensor.window())
    .fetch_one(pool)
    .await?;

    SENSORS_CREATED_TOTAL.inc();
    debug!("Created sensor {} ({:?}, n={})", created.id, created.name, created.n);
    Ok(created)
}

pub async fn list_sensors(pool: &SqlitePool, page: PageRequest) -> Result<Page<Sensor>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor")
        .fetch_one(pool)
        .await?;

    let items = sqlx::query_as::<_, Sensor>(
        "SELECT id, name, n FROM sensor ORDER BY id LIMIT ? OFFSET ?",
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

pub async fn find_sensor(pool: &SqlitePool, sensor_id: i64) -> Result<Option<Sensor>> {
    let sensor = sqlx::query_as::<_, Sensor>("SELECT id, name, n FROM sensor WHERE id = ?")
        .bind(sensor_id)
        .fetch_optional(pool)
        .await?;
    Ok(sensor)
}

pub async fn get_sensor(pool: &SqlitePool, sensor_id: i64) -> Result<Sensor> {
    find_sensor(pool, sensor_id)
        .await?
        .ok_or_else(Error::object_does_not_exist)
}

pub async fn update_sensor(pool: &SqlitePool, sensor_id: i64, patch: SensorPatch) -> Result<Sensor> {
    let mut sensor = get_sensor(pool, sensor_id).await?;
    if patch.is_empty() {
        return Ok(sensor);
    }

    patch.apply(&mut sensor);
    sqlx::query("UPDATE sensor SET name = ?, n = ? WHERE id = ?")
        .bind(&sensor.name)
        .bind(sensor.n)
        .bind(sensor.id)
        .execute(pool)
        .await?;

    debug!("Updated sensor {} ({:?}, n={})", sensor.id, sensor.name, sensor.n);
    Ok(sensor)
}

/// Deletes the sensor and every reading recorded for it.
/// Returns how many readings went with it.
pub async fn delete_sensor(pool: &SqlitePool, sensor_id: i64) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM sensor WHERE id = ?")
        .bind(sensor_id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(Error::sensor_not_found(sensor_id));
    }

    let readings = sqlx::query("DELETE FROM data WHERE sensor_id = ?")
        .bind(sensor_id)
        .execute(pool)
        .await?
        .rows_affected();

    debug!("Deleted sensor {} with {} readings", sensor_id, readings);
    Ok(readings)
}

/// Picks the id at or below which a sensor's readings are pruned before an insert.
///
/// `window` holds the newest ids for the sensor, newest first, fetched with
/// `LIMIT n`. Only a full window prunes, and the cut-off is the oldest id in it,
/// so the insert that follows leaves exactly `n` readings.
pub fn prune_threshold(window: &[i64], n: i64) -> Option<i64> {
    if (window.len() as i64) < n {
        return None;
    }
    window.last().copied()
}

/// Stores a reading, first dropping whatever falls out of the sensor's window.
///
/// The lookup, prune and insert are separate statements; concurrent writers to
/// the same sensor may briefly leave more than `n` readings behind.
pub async fn add_reading(pool: &SqlitePool, reading: &NewReading) -> Result<Reading> {
    let sensor = find_sensor(pool, reading.sensor_id)
        .await?
        .ok_or_else(|| Error::sensor_not_found(reading.sensor_id))?;

    let window: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM data WHERE sensor_id = ? ORDER BY id DESC LIMIT ?")
            .bind(sensor.id)
            .bind(sensor.n)
            .fetch_all(pool)
            .await?;

    if let Some(oldest) = prune_threshold(&window, sensor.n) {
        let pruned = sqlx::query("DELETE FROM data WHERE sensor_id = ? AND id <= ?")
            .bind(sensor.id)
            .bind(oldest)
            .execute(pool)
            .await?
            .rows_affected();
        READINGS_PRUNED_TOTAL.inc_by(pruned as f64);
        debug!("Pruned {} readings of sensor {} at id <= {}", pruned, sensor.id, oldest);
    }

    let stored = sqlx::query_as::<_, Reading>(
        "INSERT INTO data (sensor_id, value) VALUES (?, ?) RETURNING id, sensor_id, value",
    )
    .bind(sensor.id)
    .bind(reading.value.hundredths())
    .fetch_one(pool)
    .await?;

    READINGS_ADDED_TOTAL.inc();
    Ok(stored)
}

/// Newest readings of a sensor, at most its window size, newest first.
pub async fn list_readings(pool: &SqlitePool, sensor_id: i64) -> Result<Vec<Reading>> {
    let sensor = find_sensor(pool, sensor_id)
        .await?
        .ok_or_else(|| Error::sensor_not_found(sensor_id))?;

    let readings = sqlx::query_as::<_, Reading>(
        "SELECT id, sensor_id, value FROM data WHERE sensor_id = ? ORDER BY id DESC LIMIT ?",
    )
    .bind(sensor.id)
    .bind(sensor.n)
    .fetch_all(pool)
    .await?;

    Ok(readings)
}

/// Number of stored readings for a sensor id, whether or not the sensor exists.
///
/// Test support: unlike [`list_readings`] it is not capped by the window, so
/// tests use it to see rows still stored and orphans left by a delete.
pub async fn count_readings(pool: &SqlitePool, sensor_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM data WHERE sensor_id = ?")
        .bind(sensor_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
