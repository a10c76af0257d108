use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rand::Rng;
use sensor_api::{db, metrics, rest};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

async fn setup() -> (Router, SqlitePool) {
    let pool = db::memory_pool().await.unwrap();
    (rest::create_router(pool.clone()), pool)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, sensor) = send(app, Method::POST, "/create/", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{}", sensor);
    sensor
}

#[tokio::test]
async fn test_read_main() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Hello World"}));
}

#[tokio::test]
async fn test_create_and_fetch_sensor() {
    let (app, _) = setup().await;
    let sensor = create(&app, json!({"name": "kitchen"})).await;
    assert_eq!(sensor["n"], 10);
    assert_eq!(sensor["name"], "kitchen");

    let uri = format!("/sensor/{}", sensor["id"]);
    let (status, fetched) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, sensor);
}

#[tokio::test]
async fn test_create_rejects_long_name() {
    let (app, _) = setup().await;
    let body = json!({"name": "n".repeat(33)});
    let (status, error) = send(&app, Method::POST, "/create/", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error["detail"].is_string());
}

#[tokio::test]
async fn test_create_rejects_missing_name() {
    let (app, _) = setup().await;
    let (status, _) = send(&app, Method::POST, "/create/", Some(json!({"n": 4}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_missing_sensor_is_404() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, Method::GET, "/sensor/99", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Object does not exist"}));
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let (app, _) = setup().await;
    let sensor = create(&app, json!({"name": "porch", "n": 4})).await;
    let uri = format!("/sensor/{}", sensor["id"]);

    let (status, updated) = send(&app, Method::PUT, &uri, Some(json!({"name": "veranda"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "veranda");
    assert_eq!(updated["n"], 4);

    let (_, fetched) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_update_missing_sensor() {
    let (app, _) = setup().await;
    let (status, _) = send(&app, Method::PUT, "/sensor/5", Some(json!({"n": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination_in_insertion_order() {
    let (app, _) = setup().await;
    let first = create(&app, json!({"name": "first"})).await;
    let second = create(&app, json!({"name": "second"})).await;
    create(&app, json!({"name": "third"})).await;

    let (status, page0) = send(&app, Method::GET, "/sensors/?limit=1&offset=0", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, page1) = send(&app, Method::GET, "/sensors/?limit=1&offset=1", None).await;

    assert_eq!(page0["items"], json!([first]));
    assert_eq!(page1["items"], json!([second]));
    assert_eq!(page0["total"], 3);
    assert_eq!(page1["limit"], 1);
    assert_eq!(page1["offset"], 1);
}

#[tokio::test]
async fn test_pagination_bounds() {
    let (app, _) = setup().await;
    let (status, page) = send(&app, Method::GET, "/sensors/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page, json!({"items": [], "total": 0, "limit": 50, "offset": 0}));

    let (status, _) = send(&app, Method::GET, "/sensors/?limit=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::GET, "/sensors/?offset=-2", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_add_and_list_readings() {
    let (app, _) = setup().await;
    let sensor = create(&app, json!({"name": "boiler", "n": 2})).await;

    for value in [json!(20.5), json!("21.25"), json!(22)] {
        let body = json!({"sensor_id": sensor["id"], "value": value});
        let (status, reading) = send(&app, Method::POST, "/add/", Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{}", reading);
        assert_eq!(reading["sensor_id"], sensor["id"]);
    }

    let uri = format!("/data/{}", sensor["id"]);
    let (status, readings) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let values: Vec<f64> = readings
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["value"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![22.0, 21.25]);
}

#[tokio::test]
async fn test_add_reading_unknown_sensor() {
    let (app, _) = setup().await;
    let body = json!({"sensor_id": 3, "value": 1.5});
    let (status, error) = send(&app, Method::POST, "/add/", Some(body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error, json!({"detail": "Sensor 3 not found"}));
}

#[tokio::test]
async fn test_add_reading_rejects_extra_decimals() {
    let (app, _) = setup().await;
    let sensor = create(&app, json!({"name": "scale"})).await;
    let body = json!({"sensor_id": sensor["id"], "value": "1.005"});
    let (status, _) = send(&app, Method::POST, "/add/", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_random_sequences_stay_within_window() {
    let (app, pool) = setup().await;
    let mut rng = rand::thread_rng();

    for _ in 0..3 {
        let n: i64 = rng.gen_range(1..6);
        let sensor = create(&app, json!({"name": "random", "n": n})).await;
        let sensor_id = sensor["id"].as_i64().unwrap();

        for _ in 0..rng.gen_range(1..20) {
            let hundredths: i64 = rng.gen_range(-10_000..10_000);
            let body = json!({"sensor_id": sensor_id, "value": hundredths as f64 / 100.0});
            let (status, _) = send(&app, Method::POST, "/add/", Some(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert!(db::count_readings(&pool, sensor_id).await.unwrap() <= n);
        }
    }
}

#[tokio::test]
async fn test_delete_sensor_cascades() {
    let (app, pool) = setup().await;
    let sensor = create(&app, json!({"name": "doomed"})).await;
    let sensor_id = sensor["id"].as_i64().unwrap();
    for value in [1, 2, 3] {
        let body = json!({"sensor_id": sensor_id, "value": value});
        send(&app, Method::POST, "/add/", Some(body)).await;
    }

    let uri = format!("/sensor/{}", sensor_id);
    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": format!("Deleted sensor {}", sensor_id)}));

    let (status, _) = send(&app, Method::GET, &format!("/data/{}", sensor_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(db::count_readings(&pool, sensor_id).await.unwrap(), 0);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": format!("Sensor {} not found", sensor_id)}));
}

#[tokio::test]
async fn test_metrics_endpoint_counts_readings() {
    metrics::init_metrics().unwrap();
    let (app, _) = setup().await;
    let sensor = create(&app, json!({"name": "counted"})).await;
    let body = json!({"sensor_id": sensor["id"], "value": 4.2});
    let (status, _) = send(&app, Method::POST, "/add/", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("sensor_api_readings_added_total"));
    assert!(text.contains("sensor_api_sensors_created_total"));
}

#[tokio::test]
async fn test_shrunk_window_limits_listing_until_next_insert() {
    let (app, pool) = setup().await;
    let sensor = create(&app, json!({"name": "shrinking", "n": 5})).await;
    let sensor_id = sensor["id"].as_i64().unwrap();
    for value in 1..=5 {
        let body = json!({"sensor_id": sensor_id, "value": value});
        send(&app, Method::POST, "/add/", Some(body)).await;
    }

    let uri = format!("/sensor/{}", sensor_id);
    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({"n": 2}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, readings) = send(&app, Method::GET, &format!("/data/{}", sensor_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<f64> = readings
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["value"].as_f64().unwrap())
        .collect();
    assert_eq!(values, vec![5.0, 4.0]);
    assert_eq!(db::count_readings(&pool, sensor_id).await.unwrap(), 5);
}

#[tokio::test]
async fn test_add_reading_rejects_float_with_hidden_decimals() {
    let (app, pool) = setup().await;
    let sensor = create(&app, json!({"name": "precise"})).await;
    let body = json!({"sensor_id": sensor["id"], "value": 1.000000001});
    let (status, _) = send(&app, Method::POST, "/add/", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let sensor_id = sensor["id"].as_i64().unwrap();
    assert_eq!(db::count_readings(&pool, sensor_id).await.unwrap(), 0);
}
