use crate::constants::UNKNOWN_SOLAR_POWER;
use crate::error::CoreError;
use serde_json::Value;

/// A single reading posted to the HTTP intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// Instantaneous grid injection in watts. Negative means importing from the grid.
    pub injection_power: i32,
    /// Instantaneous solar production in watts, or [`UNKNOWN_SOLAR_POWER`] if the
    /// sender did not report it.
    pub solar_power: i32,
}

impl Measurement {
    /// Parses a JSON body of the form `{"injection_power": N, "solar_power": N}`.
    ///
    /// `solar_power` may be omitted, in which case it is treated as unknown.
    pub fn from_json(body: &Value) -> Result<Self, CoreError> {
        let injection_power = read_required_i32(body, "injection_power")?;
        let solar_power = match body.get("solar_power") {
            None | Some(Value::Null) => UNKNOWN_SOLAR_POWER,
            Some(_) => read_required_i32(body, "solar_power")?,
        };
        Ok(Measurement { injection_power, solar_power })
    }
}

fn read_required_i32(body: &Value, field: &'static str) -> Result<i32, CoreError> {
    let value = body.get(field).ok_or(CoreError::MissingField(field))?;
    value
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| CoreError::NotAnInteger { field, value: value.to_string() })
}

/// Outcome of the HTTP intake's processing of one [`Measurement`], mirrored
/// back to the caller as an HTTP status plus a short code in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// The limit was already correct on the ECU; nothing written.
    Ok = 0,
    /// The limit read back from the ECU differed from what the state machine
    /// expected; corrected in place.
    DifferentPowerLimit = 1,
    /// A single Modbus transaction failed.
    ModbusFailure = 2,
    /// Modbus has now failed `MODBUS_RECURRENT_ERROR_COUNT` times in a row.
    ModbusRecurrentFailure = 3,
    /// Malformed input or an unexpected internal error.
    OtherError = 9,
}

impl ReturnCode {
    /// HTTP 400 on malformed input; HTTP 200 otherwise regardless of
    /// regulation outcome, including Modbus failures.
    pub fn http_status(self) -> u16 {
        match self {
            ReturnCode::OtherError => 400,
            ReturnCode::Ok | ReturnCode::DifferentPowerLimit | ReturnCode::ModbusFailure | ReturnCode::ModbusRecurrentFailure => 200,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The output of one control-engine decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Permille limit to write to the ECU, already clamped to
    /// `[MIN_LIMIT, MAX_LIMIT]`.
    pub new_limit: i32,
    /// `new_limit - previous_limit`, signed.
    pub increment: i32,
    /// Short human-readable tag identifying which algorithm fired and why.
    pub reason: String,
    /// Advisory delay in seconds before the next sample is expected, or
    /// [`crate::constants::METER_DEFAULT_DELAY_S`] to defer to the meter's
    /// own cadence.
    pub next_sample_delay_s: i32,
}

/// Telemetry events the control engine can ask the caller to publish.
/// Numbering matches the wire event codes used on the `.../evt` MQTT topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulatorEvent {
    RegulationWindowsIn = 1,
    RegulationWindowsOut = 2,
    ModbusErrorStart = 3,
    ModbusErrorEnd = 4,
    PowerLimitThirtyPercent = 5,
    PowerLimitDiff = 6,
    FastDrop = 7,
    FastRise = 8,
}

impl RegulatorEvent {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_measurement() {
        let body = json!({"injection_power": -120, "solar_power": 2400});
        let m = Measurement::from_json(&body).unwrap();
        assert_eq!(m.injection_power, -120);
        assert_eq!(m.solar_power, 2400);
    }

    #[test]
    fn solar_power_defaults_to_unknown() {
        let body = json!({"injection_power": 50});
        let m = Measurement::from_json(&body).unwrap();
        assert_eq!(m.solar_power, UNKNOWN_SOLAR_POWER);
    }

    #[test]
    fn missing_injection_power_is_rejected() {
        let body = json!({"solar_power": 10});
        assert_eq!(
            Measurement::from_json(&body),
            Err(CoreError::MissingField("injection_power"))
        );
    }

    #[test]
    fn non_integer_field_is_rejected() {
        let body = json!({"injection_power": "fast"});
        assert!(matches!(
            Measurement::from_json(&body),
            Err(CoreError::NotAnInteger { field: "injection_power", .. })
        ));
    }
}
