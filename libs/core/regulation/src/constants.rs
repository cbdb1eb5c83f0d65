//! Authoritative constants for the regulation control loop.

/// Lowest permille the ECU is ever asked to apply (1.0 %).
pub const MIN_LIMIT: i32 = 10;
/// Highest permille the ECU is ever asked to apply (100.0 %).
pub const MAX_LIMIT: i32 = 1000;
/// Permille value the ECU occasionally reports spuriously; never trusted, never written.
pub const BUGGY_LIMIT: i32 = 300;

/// Consecutive Modbus failures before a request is reported as a recurrent failure.
pub const MODBUS_RECURRENT_ERROR_COUNT: u32 = 5;
/// Consecutive import measurements before the import-lock algorithm snaps to `MAX_LIMIT`.
pub const CONSECUTIVE_IMPORT_COUNT_FOR_RESET: u32 = 15;
/// Decisions a fast-path algorithm must wait after firing before either fast path can fire again.
pub const FAST_COOLDOWN_NB: u32 = 5;

/// Cadence of the periodic window/reconciliation task.
pub const PERIODIC_TASK_INTERVAL_S: u64 = 60;
/// Cadence of the reconciling Modbus read while inside a regulation window.
pub const PERIODIC_READ_INTERVAL_S: u64 = 15 * 60;
/// Default silence interval after which the watchdog forces `MAX_LIMIT`.
pub const WATCHDOG_TIMEOUT_S: u64 = 60 * 60;

/// Sentinel advisory delay meaning "use the meter's own default cadence".
pub const METER_DEFAULT_DELAY_S: i32 = -1;

/// Sentinel for `RegulationState::current_limit` meaning "not yet known".
pub const UNKNOWN_LIMIT: i32 = -1;
/// Sentinel for `Measurement::solar_power` meaning "not reported".
pub const UNKNOWN_SOLAR_POWER: i32 = -1;
