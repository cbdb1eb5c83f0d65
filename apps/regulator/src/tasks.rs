use crate::state::AppState;
use chrono::Local;
use solarreg_core::constants::{MAX_LIMIT, PERIODIC_READ_INTERVAL_S, PERIODIC_TASK_INTERVAL_S};
use solarreg_core::RegulatorEvent;
use std::time::Duration;
use tracing::{error, info, warn};

/// Ticks every [`PERIODIC_TASK_INTERVAL_S`]: detects regulation-window
/// transitions and, every [`PERIODIC_READ_INTERVAL_S`], reconciles the
/// limit actually sitting on the ECU against what the state machine expects.
pub async fn run_periodic_task(app: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(PERIODIC_TASK_INTERVAL_S));
    let mut ticks_since_read: u64 = 0;
    let read_every_n_ticks = PERIODIC_READ_INTERVAL_S / PERIODIC_TASK_INTERVAL_S;

    loop {
        ticker.tick().await;

        let now_in_window = app.windows.is_active(Local::now().time());
        {
            let mut state = app.state.lock().await;
            if now_in_window != state.was_in_window {
                let event = if now_in_window { RegulatorEvent::RegulationWindowsIn } else { RegulatorEvent::RegulationWindowsOut };
                app.telemetry.publish_event(event, "");
                info!(now_in_window, "regulation window transition");
                state.was_in_window = now_in_window;
            }
        }

        ticks_since_read += 1;
        if !now_in_window || ticks_since_read < read_every_n_ticks {
            continue;
        }
        ticks_since_read = 0;

        let mut state = app.state.lock().await;
        if !state.limit_is_known() {
            continue;
        }
        let mut modbus = app.modbus.lock().await;
        match modbus.read_and_reconcile_power_limit(state.current_limit).await {
            Ok(outcome) => {
                let was_failing = state.record_modbus_success();
                if was_failing {
                    app.telemetry.publish_event(RegulatorEvent::ModbusErrorEnd, "");
                }
                if outcome.was_buggy {
                    warn!(expected = state.current_limit, "periodic reconciliation observed the buggy sentinel, forced to maximum");
                    app.telemetry.publish_event(RegulatorEvent::PowerLimitThirtyPercent, "");
                } else if outcome.corrected {
                    warn!(expected = state.current_limit, observed = outcome.limit, "periodic reconciliation found a drifted power limit, adopting the ECU's value");
                    app.telemetry.publish_event(RegulatorEvent::PowerLimitDiff, "");
                }
                state.current_limit = outcome.limit;
            }
            Err(err) => {
                let is_first_failure = state.record_modbus_failure();
                if is_first_failure {
                    app.telemetry.publish_event(RegulatorEvent::ModbusErrorStart, &err.to_string());
                }
                warn!(%err, "periodic reconciliation read failed");
            }
        }
    }
}

/// Ticks every [`PERIODIC_TASK_INTERVAL_S`]: if no measurement has arrived
/// within `app.watchdog_timeout`, forces the limit to [`MAX_LIMIT`] so a
/// dead measurement source cannot leave the installation throttled forever.
pub async fn run_watchdog(app: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(PERIODIC_TASK_INTERVAL_S));

    loop {
        ticker.tick().await;

        let Some(silence) = app.silence_duration().await else { continue };
        if silence < app.watchdog_timeout {
            continue;
        }

        let mut state = app.state.lock().await;
        if state.watchdog_triggered {
            continue;
        }

        let mut modbus = app.modbus.lock().await;
        match modbus.write_power_limit(MAX_LIMIT).await {
            Ok(()) => {
                state.current_limit = MAX_LIMIT;
                state.watchdog_triggered = true;
                error!(silence_s = silence.as_secs(), "watchdog: no measurement received, forcing limit to maximum");
            }
            Err(err) => {
                error!(%err, "watchdog: failed to force limit to maximum");
            }
        }
    }
}
