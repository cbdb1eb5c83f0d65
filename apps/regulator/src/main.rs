use anyhow::{Context, Result};
use clap::Parser;
use solar_power_regulator_lib::config::Config;
use solar_power_regulator_lib::state::AppState;
use solar_power_regulator_lib::{http, tasks};
use solarreg_core::{EngineConfig, FastDropConfig, FastRiseConfig, RegulationState, RegulationWindows, ThresholdTable};
use solarreg_logging::LogSink;
use solarreg_modbus::{ModbusPort, RegisterTransport};
use solarreg_telemetry::{TelemetryMode, TelemetryPublisher};
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    let sink = match (&config.logfile, &config.syslog_facility) {
        (Some(path), None) => LogSink::File(path.clone()),
        (None, Some(facility)) => LogSink::Syslog(parse_facility(facility)?),
        (None, None) => LogSink::Stdout,
        (Some(_), Some(_)) => unreachable!("clap ArgGroup forbids both --logfile and --syslog-facility"),
    };
    let _log_guard = solarreg_logging::init("solar-power-regulator", sink, &config.loglevel).context("failed to initialize logging")?;

    info!(ecu_host = %config.ecu_host, http_port = config.http_port, "starting solar power regulator");

    let ecu_addr = format!("{}:{}", config.ecu_host, config.modbus_port)
        .to_socket_addrs()
        .context("failed to resolve ECU address")?
        .next()
        .context("ECU address resolved to no candidates")?;

    let windows = RegulationWindows::parse(&config.windows).context("invalid --window value")?;

    let engine_cfg = EngineConfig {
        fast_rise: FastRiseConfig::default(),
        fast_drop: FastDropConfig::default(),
        table: ThresholdTable::default(),
        total_rated_w: config.total_rated_w,
    };

    let modbus = ModbusPort::with_transport(Box::new(solarreg_modbus::TcpTransport::new(ecu_addr, config.modbus_slave)) as Box<dyn RegisterTransport>);

    let telemetry_mode: TelemetryMode = config.telemetry_mode.into();
    let (telemetry, telemetry_handle) = TelemetryPublisher::connect(
        telemetry_mode,
        config.mqtt_host.as_deref().unwrap_or("127.0.0.1"),
        config.mqtt_port,
        "solar-power-regulator",
        &config.mqtt_root_topic,
    );

    let app_state = AppState {
        state: Arc::new(Mutex::new(RegulationState::unknown())),
        modbus: Arc::new(Mutex::new(modbus)),
        telemetry: Arc::new(telemetry),
        engine_cfg: Arc::new(engine_cfg),
        windows: Arc::new(windows),
        last_measurement_at: Arc::new(Mutex::new(None)),
        watchdog_timeout: Duration::from_secs(config.watchdog_timeout_s),
    };

    let router = http::router(app_state.clone());
    let listener = tokio::net::TcpListener::bind((config.http_host.as_str(), config.http_port))
        .await
        .context("failed to bind HTTP listener")?;

    let mut http_handle = tokio::spawn(async move {
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await
    });
    let mut periodic_handle = tokio::spawn(tasks::run_periodic_task(app_state.clone()));
    let mut watchdog_handle = tokio::spawn(tasks::run_watchdog(app_state.clone()));

    // A dead periodic/watchdog task degrades protection but must not take
    // the HTTP intake down with it, since a live measurement stream can
    // still regulate on every request; only the HTTP server (or a signal)
    // ends the process. `*_done` keeps a finished task's handle out of
    // further `select!` polls.
    let mut periodic_done = false;
    let mut watchdog_done = false;
    loop {
        tokio::select! {
            result = &mut http_handle => {
                match result {
                    Ok(Ok(())) => info!("http server shut down"),
                    Ok(Err(err)) => error!(%err, "http server exited with an error"),
                    Err(err) => error!(%err, "http server task panicked"),
                }
                break;
            }
            result = &mut periodic_handle, if !periodic_done => {
                periodic_done = true;
                if let Err(err) = result {
                    error!(%err, "periodic task panicked");
                } else {
                    error!("periodic task exited unexpectedly");
                }
                error!("continuing to serve HTTP with degraded window/reconciliation tracking");
            }
            result = &mut watchdog_handle, if !watchdog_done => {
                watchdog_done = true;
                if let Err(err) = result {
                    error!(%err, "watchdog task panicked");
                } else {
                    error!("watchdog task exited unexpectedly");
                }
                error!("continuing to serve HTTP without watchdog protection");
            }
        }
    }

    if !periodic_done {
        periodic_handle.abort();
    }
    if !watchdog_done {
        watchdog_handle.abort();
    }
    if let Some(handle) = telemetry_handle {
        handle.abort();
    }

    info!("solar power regulator shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

fn parse_facility(name: &str) -> Result<syslog::Facility> {
    name.parse::<syslog::Facility>().map_err(|_| anyhow::anyhow!("unknown syslog facility `{name}`"))
}
