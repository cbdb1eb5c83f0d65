use crate::constants::UNKNOWN_LIMIT;

/// The control loop's entire memory between invocations.
///
/// Owned exclusively by the supervisor and shared with the HTTP handler,
/// the periodic task and the watchdog behind a single lock; nothing in this
/// crate assumes anything about how that sharing happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegulationState {
    /// Last permille limit known to be applied on the ECU, or
    /// [`UNKNOWN_LIMIT`] before the first reconciling read.
    pub current_limit: i32,
    /// Consecutive Modbus transaction failures.
    pub consec_modbus_errors: u32,
    /// Consecutive measurements with `injection_power < 0`, feeding the
    /// import-lock algorithm.
    pub consec_import: u32,
    /// Consecutive measurements below the fast-rise deep-import threshold.
    pub consec_deep_import: u32,
    /// Consecutive measurements above the fast-drop high-injection threshold.
    pub consec_high_injection: u32,
    /// Decisions remaining before either fast-path algorithm may fire again.
    pub fast_cooldown: u32,
    /// Whether the last periodic tick observed an active regulation window.
    pub was_in_window: bool,
    /// Whether watchdog already forced `MAX_LIMIT` for the current silence episode.
    pub watchdog_triggered: bool,
    /// Serialised body of the last `run` telemetry sample published, so a
    /// repeat decision with an identical outcome doesn't re-publish.
    pub last_published_run_payload: Option<String>,
}

impl RegulationState {
    /// The state before anything is known about the ECU.
    pub fn unknown() -> Self {
        RegulationState {
            current_limit: UNKNOWN_LIMIT,
            consec_modbus_errors: 0,
            consec_import: 0,
            consec_deep_import: 0,
            consec_high_injection: 0,
            fast_cooldown: 0,
            was_in_window: true,
            watchdog_triggered: false,
            last_published_run_payload: None,
        }
    }

    pub fn limit_is_known(&self) -> bool {
        self.current_limit != UNKNOWN_LIMIT
    }

    /// Records a successful Modbus transaction, clearing the error streak.
    /// Returns `true` if this transition ends a recorded error episode.
    pub fn record_modbus_success(&mut self) -> bool {
        let was_failing = self.consec_modbus_errors > 0;
        self.consec_modbus_errors = 0;
        was_failing
    }

    /// Records a failed Modbus transaction. Returns `true` the first time
    /// the streak starts (used to emit a single `ModbusErrorStart` event).
    pub fn record_modbus_failure(&mut self) -> bool {
        self.consec_modbus_errors += 1;
        self.consec_modbus_errors == 1
    }
}

impl Default for RegulationState {
    fn default() -> Self {
        Self::unknown()
    }
}
