use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use solarreg_core::constants::{BUGGY_LIMIT, MAX_LIMIT};
use solarreg_core::{decide, Measurement, ReturnCode};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(regulate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(serde::Serialize)]
struct RegulateResponse {
    return_code: i32,
    message: String,
    power_limit_value: i32,
    power_limit_increment: i32,
    sensor_read_interval: i32,
}

/// Implements the HTTP intake sequence: parse, reconcile the ECU's limit if
/// it isn't known yet, run one control-engine decision, publish the `run`
/// sample, write the result if it changed, publish any event, and report
/// back what actually ended up on the ECU.
async fn regulate(State(app): State<AppState>, body: axum::body::Bytes) -> impl IntoResponse {
    let parsed: Result<serde_json::Value, _> = serde_json::from_slice(&body);
    let value = match parsed {
        Ok(v) => v,
        Err(err) => return respond(ReturnCode::OtherError, 0, 0, 0, err.to_string()),
    };

    let measurement = match Measurement::from_json(&value) {
        Ok(m) => m,
        Err(err) => return respond(ReturnCode::OtherError, 0, 0, 0, err.to_string()),
    };

    app.note_measurement_received().await;

    let in_window = app.windows.is_active(Local::now().time());
    if !in_window {
        return respond(ReturnCode::Ok, 0, 0, 0, "outside regulation window, no action taken".to_string());
    }

    let mut state = app.state.lock().await;
    let mut modbus = app.modbus.lock().await;

    let mut corrected_on_reconcile = false;
    if !state.limit_is_known() {
        match modbus.read_power_limit_raw().await {
            Ok(raw) if raw != BUGGY_LIMIT => {
                state.current_limit = raw;
            }
            Ok(_) => {
                // The ECU reported the spurious BUGGY_LIMIT value on the very
                // first read, before we have any trustworthy reference point;
                // fail safe to MAX_LIMIT rather than adopt it.
                if let Err(err) = modbus.write_power_limit(MAX_LIMIT).await {
                    warn!(%err, "failed to write fail-safe limit during initial reconciliation");
                    return respond(ReturnCode::ModbusFailure, state.current_limit.max(0), 0, 0, err.to_string());
                }
                state.current_limit = MAX_LIMIT;
                corrected_on_reconcile = true;
                app.telemetry.publish_event(solarreg_core::RegulatorEvent::PowerLimitThirtyPercent, "");
            }
            Err(err) => {
                warn!(%err, "failed to read initial power limit");
                return respond(ReturnCode::ModbusFailure, 0, 0, 0, err.to_string());
            }
        }
    }

    let previous_limit = state.current_limit;
    state.watchdog_triggered = false;
    let (decision, event) = decide(&mut state, measurement.injection_power, measurement.solar_power, &app.engine_cfg);

    let run_payload = solarreg_telemetry::TelemetryPublisher::render_run_payload(
        measurement.solar_power,
        measurement.injection_power,
        decision.new_limit,
        decision.next_sample_delay_s,
    );
    if state.last_published_run_payload.as_deref() != Some(run_payload.as_str()) {
        app.telemetry.publish_run(run_payload.clone());
        state.last_published_run_payload = Some(run_payload);
    }

    let return_code = if decision.new_limit != previous_limit {
        match modbus.write_power_limit(decision.new_limit).await {
            Ok(()) => {
                let was_failing = state.record_modbus_success();
                if was_failing {
                    app.telemetry.publish_event(solarreg_core::RegulatorEvent::ModbusErrorEnd, "");
                }
                if corrected_on_reconcile {
                    ReturnCode::DifferentPowerLimit
                } else {
                    ReturnCode::Ok
                }
            }
            Err(err) => {
                let is_first_failure = state.record_modbus_failure();
                if is_first_failure {
                    app.telemetry.publish_event(solarreg_core::RegulatorEvent::ModbusErrorStart, &err.to_string());
                }
                warn!(%err, consecutive_errors = state.consec_modbus_errors, "failed to write power limit");
                if state.consec_modbus_errors >= solarreg_core::constants::MODBUS_RECURRENT_ERROR_COUNT {
                    ReturnCode::ModbusRecurrentFailure
                } else {
                    ReturnCode::ModbusFailure
                }
            }
        }
    } else if corrected_on_reconcile {
        ReturnCode::DifferentPowerLimit
    } else {
        ReturnCode::Ok
    };

    if let Some(event) = event {
        app.telemetry.publish_event(event, &decision.reason);
    }

    info!(
        injection = measurement.injection_power,
        solar = measurement.solar_power,
        new_limit = decision.new_limit,
        reason = %decision.reason,
        "regulation decision"
    );

    respond(return_code, decision.new_limit, decision.increment, decision.next_sample_delay_s, decision.reason)
}

fn respond(code: ReturnCode, power_limit_value: i32, power_limit_increment: i32, sensor_read_interval: i32, message: String) -> impl IntoResponse {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(RegulateResponse {
            return_code: code.code(),
            message,
            power_limit_value,
            power_limit_increment,
            sensor_read_interval,
        }),
    )
}
