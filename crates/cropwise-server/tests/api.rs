use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use cropwise_io::{ComparisonReport, DatasetReader, ModelScore, ReportWriter};
use cropwise_ml::{CropExplainer, CropPredictor, TrainingOptions, train_model};
use cropwise_server::db::{self, UserRepository};
use cropwise_server::{AppState, ModelSlot, ServerConfig, SharedState, build_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const PROFILES: [(&str, [f64; 7]); 3] = [
    ("rice", [80.0, 45.0, 40.0, 23.5, 82.0, 6.4, 235.0]),
    ("maize", [78.0, 48.0, 20.0, 22.0, 65.0, 6.2, 85.0]),
    ("chickpea", [40.0, 68.0, 80.0, 18.5, 16.5, 7.3, 80.0]),
];

const PASSWORD: &str = "TestPassword123";

fn write_dataset(path: &Path) {
    let mut csv = String::from("N,P,K,temperature,humidity,ph,rainfall,label\n");
    for (crop, base) in PROFILES {
        for i in 0..12 {
            let wobble = (f64::from(i) * 0.41).sin();
            let row: Vec<String> = base.iter().map(|v| format!("{:.3}", v + wobble * v * 0.03)).collect();
            writeln!(csv, "{},{crop}", row.join(",")).unwrap();
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, csv).unwrap();
}

fn predictor(dir: &TempDir) -> CropPredictor {
    let path = dir.path().join("train.csv");
    write_dataset(&path);
    let dataset = DatasetReader::new(&path).read().unwrap();
    let (model, scaler, _) = train_model(&dataset, &TrainingOptions::default().with_n_trees(20)).unwrap();
    CropPredictor::new(model, scaler).with_explainer(Some(CropExplainer::default()))
}

async fn state(dir: &TempDir, model: ModelSlot) -> SharedState {
    let config = ServerConfig::local(dir.path());
    let pool = db::connect(&config.database_url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    AppState::new(config, pool, model)
}

async fn ready_app(dir: &TempDir) -> (Router, SharedState) {
    let state = state(dir, ModelSlot::Ready(Arc::new(predictor(dir)))).await;
    (build_router(state.clone()), state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    send_request(app, request.body(body).unwrap()).await
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register(app: &Router, email: &str, username: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": email, "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

fn measurements(values: [f64; 7]) -> Value {
    json!({
        "N": values[0], "P": values[1], "K": values[2],
        "temperature": values[3], "humidity": values[4], "ph": values[5], "rainfall": values[6],
    })
}

#[tokio::test]
async fn index_and_health() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;

    let (status, body) = send(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Crop Recommendation API is running");
    assert_eq!(body["environment"], "development");

    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["scaler_loaded"], true);
    assert_eq!(body["explainer_enabled"], true);
    assert!(body["timestamp"].is_string());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&html).contains("/api/v1/predict"));
}

#[tokio::test]
async fn register_login_refresh_and_me() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;

    let body = register(&app, " Farmer@Example.com ", "farmer_1").await;
    assert_eq!(body["user"]["email"], "farmer@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["refresh_token"].is_string());

    for identifier in ["farmer@example.com", "FARMER@example.com", "farmer_1"] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": identifier, "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{identifier}: {body}");
        assert!(body["user"]["last_login"].is_string());
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": "farmer_1", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "farmer_1");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let renewed = body["access_token"].as_str().unwrap();
    let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(renewed), None).await;
    assert_eq!(status, StatusCode::OK);

    // An access token is not a refresh token, and vice versa.
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": access })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Refresh Token");
    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Token");
}

#[tokio::test]
async fn registration_rejects_bad_and_duplicate_accounts() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": "not-an-email", "username": "ab", "password": "weak" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Failed");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["email", "username", "password"]);

    register(&app, "first@example.com", "first").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": "FIRST@example.com", "username": "second", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email Already Registered");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({ "email": "second@example.com", "username": "first", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username Already Taken");
}

#[tokio::test]
async fn login_failures() {
    let dir = TempDir::new().unwrap();
    let (app, state) = ready_app(&dir).await;
    let body = register(&app, "grower@example.com", "grower").await;
    let user_id = body["user"]["id"].as_i64().unwrap();
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "grower@example.com", "password": "WrongPassword1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Credentials");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "", "username": "grower", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["username"], "grower");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "  ", "username": "", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "email");

    UserRepository::set_active(&state.pool, user_id, false).await.unwrap();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "grower", "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account Disabled");

    UserRepository::delete(&state.pool, user_id).await.unwrap();
    let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User Not Found");
}

#[tokio::test]
async fn predict_requires_a_valid_access_token() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;
    let input = measurements(PROFILES[0].1);

    let (status, body) = send(&app, "POST", "/api/v1/predict", None, Some(input.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication Required");

    let (status, body) = send(&app, "POST", "/api/v1/predict", Some("invalid_token_here"), Some(input)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Token");

    let (status, _) = send(&app, "GET", "/api/v1/history", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, "GET", "/api/v1/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn predict_then_history_and_stats() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;
    let alice = register(&app, "alice@example.com", "alice").await;
    let alice = alice["access_token"].as_str().unwrap().to_string();
    let bob = register(&app, "bob@example.com", "bob").await;
    let bob = bob["access_token"].as_str().unwrap().to_string();

    for (crop, values) in PROFILES {
        let (status, body) = send(&app, "POST", "/api/v1/predict", Some(&alice), Some(measurements(values))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "success");
        assert_eq!(body["predicted_crop"], crop);
        assert!(body["request_id"].is_string());
        assert_eq!(body["input_data"]["N"], values[0]);
        assert_eq!(body["reasons"].as_array().unwrap().len(), 3);
        let confidence = body["confidence"].as_f64().unwrap();
        for alt in body["alternatives"].as_array().unwrap() {
            let p = alt["confidence"].as_f64().unwrap();
            assert!(p > 0.01 && p <= confidence);
            let expected = if p > 0.1 { "Moderate" } else { "Low" };
            assert_eq!(alt["suitability"], expected);
        }
    }
    // Numeric strings are accepted.
    let mut as_strings = measurements(PROFILES[1].1);
    as_strings["ph"] = json!(" 6.2 ");
    let (status, _) = send(&app, "POST", "/api/v1/predict", Some(&bob), Some(as_strings)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/v1/history?limit=2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["predicted_crop"], "chickpea");
    assert_eq!(body["data"][1]["predicted_crop"], "maize");
    assert_eq!(body["data"][0]["input"]["rainfall"], PROFILES[2].1[6]);

    let (_, body) = send(&app, "GET", "/api/v1/history", Some(&bob), None).await;
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, "GET", "/api/v1/stats", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_predictions"], 4);
    assert_eq!(body["user_predictions"], 3);
    assert_eq!(body["crop_distribution"]["maize"], 2);
    assert_eq!(body["crop_distribution"]["rice"], 1);
}

#[tokio::test]
async fn predict_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let (app, _) = ready_app(&dir).await;
    let token = register(&app, "carol@example.com", "carol").await;
    let token = token["access_token"].as_str().unwrap().to_string();

    let mut input = measurements(PROFILES[0].1);
    input["ph"] = json!(15.0);
    input.as_object_mut().unwrap().remove("rainfall");
    let (status, body) = send(&app, "POST", "/api/v1/predict", Some(&token), Some(input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation Failed");
    let details = body["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["field"], "ph");
    assert_eq!(details[1]["field"], "rainfall");
    assert_eq!(details[1]["kind"], "missing");
    assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_request(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON payload");
    assert!(body["request_id"].is_string());

    let (status, body) = send(&app, "POST", "/api/v1/predict", Some(&token), Some(json!([1, 2, 3]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON payload");

    let (_, body) = send(&app, "GET", "/api/v1/stats", Some(&token), None).await;
    assert_eq!(body["total_predictions"], 0);
}

#[tokio::test]
async fn unavailable_model_fails_predictions() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir, ModelSlot::Unavailable("dataset missing".into())).await;
    let app = build_router(state);
    let token = register(&app, "dave@example.com", "dave").await;
    let token = token["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(&token),
        Some(measurements(PROFILES[0].1)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ML Integrity Check Failed");
    assert_eq!(body["details"], "Model not initialized. Startup error: dataset missing");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn reports_served_from_cache_or_missing() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir, ModelSlot::Unavailable("unused".into())).await;
    let app = build_router(state);

    let (status, body) = send(&app, "GET", "/api/v1/model-comparison", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Model comparison results not found and dataset unavailable for training."
    );
    let (status, _) = send(&app, "GET", "/api/v1/ml-maturity-report", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut report = ComparisonReport::new();
    report.insert(
        "Random Forest".to_string(),
        ModelScore::Scored {
            mean_accuracy: 0.99,
            std_accuracy: 0.01,
            scores: vec![0.98, 1.0],
        },
    );
    ReportWriter::new(dir.path()).write_comparison(&report).unwrap();
    let (status, body) = send(&app, "GET", "/api/v1/model-comparison", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["Random Forest"]["mean_accuracy"], 0.99);
}

#[tokio::test]
async fn predict_succeeds_when_the_record_cannot_be_saved() {
    let dir = TempDir::new().unwrap();
    let (app, state) = ready_app(&dir).await;
    let erin = register(&app, "erin@example.com", "erin").await;
    let erin_id = erin["user"]["id"].as_i64().unwrap();
    let erin_token = erin["access_token"].as_str().unwrap().to_string();
    let frank = register(&app, "frank@example.com", "frank").await;
    let frank_token = frank["access_token"].as_str().unwrap().to_string();

    // The token outlives the account, so the insert breaks the user foreign key.
    UserRepository::delete(&state.pool, erin_id).await.unwrap();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(&erin_token),
        Some(measurements(PROFILES[0].1)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["predicted_crop"], "rice");
    assert!(body["request_id"].is_string());

    let (status, body) = send(&app, "GET", "/api/v1/stats", Some(&frank_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_predictions"], 0);

    sqlx::query("DROP TABLE predictions").execute(&state.pool).await.unwrap();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/predict",
        Some(&frank_token),
        Some(measurements(PROFILES[2].1)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["predicted_crop"], "chickpea");
}

#[tokio::test]
async fn reports_computed_from_dataset_and_cached() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir, ModelSlot::Unavailable("unused".into())).await;
    write_dataset(&state.config.dataset_path);
    let writer = ReportWriter::new(&state.config.reports_dir);
    let app = build_router(state);
    assert!(!writer.comparison_path().exists());
    assert!(!writer.maturity_path().exists());

    let (status, body) = send(&app, "GET", "/api/v1/model-comparison", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert!(body["data"]["Random Forest"]["mean_accuracy"].is_f64());
    let cached = writer.read_comparison().unwrap().unwrap();
    assert!(cached.contains_key("Random Forest"));

    let (status, body) = send(&app, "GET", "/api/v1/ml-maturity-report", None, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert!(body["data"]["best_params"].is_object());
    assert!(writer.maturity_path().exists());
    assert!(writer.read_maturity().unwrap().is_some());
}
