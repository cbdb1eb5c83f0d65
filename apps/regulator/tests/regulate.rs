use http_body_util::BodyExt;
use solar_power_regulator_lib::http::router;
use solar_power_regulator_lib::state::AppState;
use solarreg_core::{EngineConfig, FastDropConfig, FastRiseConfig, RegulationState, RegulationWindows, ThresholdTable};
use solarreg_modbus::{FakeTransport, ModbusPort, RegisterTransport};
use solarreg_telemetry::{TelemetryMode, TelemetryPublisher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

const POWER_LIMIT_REGISTER: u16 = 188;

fn test_app(initial_register: Option<u16>) -> AppState {
    let fake = match initial_register {
        Some(v) => FakeTransport::with_register(POWER_LIMIT_REGISTER, v),
        None => FakeTransport::default(),
    };
    let modbus = ModbusPort::with_transport(Box::new(fake) as Box<dyn RegisterTransport>);
    let (telemetry, _handle) = TelemetryPublisher::connect(TelemetryMode::Disabled, "127.0.0.1", 1883, "test", "solar_power_regulator");

    AppState {
        state: Arc::new(Mutex::new(RegulationState::unknown())),
        modbus: Arc::new(Mutex::new(modbus)),
        telemetry: Arc::new(telemetry),
        engine_cfg: Arc::new(EngineConfig {
            fast_rise: FastRiseConfig::default(),
            fast_drop: FastDropConfig::default(),
            table: ThresholdTable::default(),
            total_rated_w: 2640,
        }),
        windows: Arc::new(RegulationWindows::default()),
        last_measurement_at: Arc::new(Mutex::new(None)),
        watchdog_timeout: Duration::from_secs(3600),
    }
}

async fn post_json(app: AppState, body: serde_json::Value) -> (u16, serde_json::Value) {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = router(app).oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = test_app(Some(500));
    let request = axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap();
    let response = router(app).oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn malformed_body_returns_code_nine() {
    let app = test_app(Some(500));
    let (status, body) = post_json(app, serde_json::json!({"solar_power": 10})).await;
    assert_eq!(status, 400);
    assert_eq!(body["return_code"], 9);
}

#[tokio::test]
async fn first_request_reconciles_unknown_limit_then_regulates() {
    let app = test_app(Some(500));
    let (status, body) = post_json(app, serde_json::json!({"injection_power": 10, "solar_power": -1})).await;
    assert_eq!(status, 200);
    // threshold row for injection=10 is the 0W..<30W zero row: no change from the reconciled 500.
    assert_eq!(body["power_limit_value"], 500);
}

#[tokio::test]
async fn heavy_injection_ramps_limit_down() {
    let app = test_app(Some(900));
    let (status, body) = post_json(app, serde_json::json!({"injection_power": 700, "solar_power": -1})).await;
    assert_eq!(status, 200);
    assert_eq!(body["power_limit_value"], 700);
}

#[tokio::test]
async fn deep_import_twice_triggers_fast_rise() {
    let app = test_app(Some(500));
    let _ = post_json(app.clone(), serde_json::json!({"injection_power": -900, "solar_power": -1})).await;
    let (_status, body) = post_json(app, serde_json::json!({"injection_power": -900, "solar_power": -1})).await;
    assert_eq!(body["power_limit_value"], 1000);
}

#[tokio::test]
async fn outside_regulation_window_is_a_no_op() {
    let mut app = test_app(Some(500));
    app.windows = Arc::new(RegulationWindows::parse(&["00:00-00:01".to_string()]).unwrap());
    let (status, body) = post_json(app, serde_json::json!({"injection_power": 700, "solar_power": -1})).await;
    assert_eq!(status, 200);
    assert_eq!(body["return_code"], 0);
}
