use clap::Parser;
use solarreg_telemetry::TelemetryMode;
use std::path::PathBuf;

/// Regulates grid injection of a residential solar installation behind an
/// APSystems ECU, driven by measurements posted by a grid meter.
#[derive(Debug, Parser)]
#[command(name = "solar-power-regulator", version, about)]
#[command(group(clap::ArgGroup::new("log_sink").args(["logfile", "syslog_facility"]).multiple(false)))]
pub struct Config {
    /// IP address or hostname of the APSystems ECU.
    #[arg(env = "SOLARREG_ECU_HOST")]
    pub ecu_host: String,

    /// Modbus/TCP port of the ECU.
    #[arg(long, env = "SOLARREG_MODBUS_PORT", default_value_t = 502)]
    pub modbus_port: u16,

    /// Modbus slave/unit id of the ECU.
    #[arg(long, env = "SOLARREG_MODBUS_SLAVE", default_value_t = 1)]
    pub modbus_slave: u8,

    /// Total nameplate AC power of the installation, in watts.
    #[arg(long, env = "SOLARREG_TOTAL_RATED_W")]
    pub total_rated_w: i32,

    /// Address the HTTP intake listens on.
    #[arg(long, env = "SOLARREG_HTTP_HOST", default_value = "0.0.0.0")]
    pub http_host: String,

    /// Port the HTTP intake listens on.
    #[arg(long, env = "SOLARREG_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Daily regulation windows as `HH:MM-HH:MM`; repeatable. Empty means
    /// "always active".
    #[arg(long = "window", env = "SOLARREG_WINDOWS", value_delimiter = ',')]
    pub windows: Vec<String>,

    /// Seconds of HTTP silence before the watchdog forces the limit to maximum.
    #[arg(long, env = "SOLARREG_WATCHDOG_TIMEOUT_S", default_value_t = solarreg_core::constants::WATCHDOG_TIMEOUT_S)]
    pub watchdog_timeout_s: u64,

    /// MQTT broker host. Telemetry is disabled if omitted.
    #[arg(long, env = "SOLARREG_MQTT_HOST")]
    pub mqtt_host: Option<String>,

    #[arg(long, env = "SOLARREG_MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    #[arg(long, env = "SOLARREG_MQTT_ROOT_TOPIC", default_value = "solar_power_regulator")]
    pub mqtt_root_topic: String,

    #[arg(long, env = "SOLARREG_TELEMETRY_MODE", default_value = "full")]
    pub telemetry_mode: TelemetryModeArg,

    /// Run in the foreground. The regulator never daemonizes itself; this
    /// flag exists only to mirror the ancestor tool's CLI surface and is a
    /// no-op.
    #[arg(long)]
    pub no_daemon: bool,

    #[arg(long, env = "SOLARREG_LOGLEVEL", default_value = "info")]
    pub loglevel: String,

    /// Write logs to this file instead of stdout.
    #[arg(long, env = "SOLARREG_LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Write logs to syslog at this facility (e.g. `daemon`, `local0`) instead of stdout.
    #[arg(long, env = "SOLARREG_SYSLOG_FACILITY")]
    pub syslog_facility: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum TelemetryModeArg {
    Disabled,
    Full,
    EventsOnly,
}

impl From<TelemetryModeArg> for TelemetryMode {
    fn from(v: TelemetryModeArg) -> Self {
        match v {
            TelemetryModeArg::Disabled => TelemetryMode::Disabled,
            TelemetryModeArg::Full => TelemetryMode::Full,
            TelemetryModeArg::EventsOnly => TelemetryMode::EventsOnly,
        }
    }
}
