use anyhow::{bail, Result};
use solarreg_modbus::ModbusPort;

/// Holding register map for one APSystems ECU-bound inverter, 0-based
/// offsets (register `40189` in vendor documentation is offset `188` here).
pub const REG_MANUFACTURER: u16 = 100;
pub const REG_MANUFACTURER_LEN: u16 = 16;
pub const REG_MODEL: u16 = 116;
pub const REG_MODEL_LEN: u16 = 16;
pub const REG_VERSION: u16 = 132;
pub const REG_VERSION_LEN: u16 = 8;
pub const REG_SERIAL: u16 = 140;
pub const REG_SERIAL_LEN: u16 = 16;

pub const REG_CURRENT: u16 = 0;
pub const REG_VOLTAGE: u16 = 1;
pub const REG_POWER_AC: u16 = 2;
pub const REG_FREQUENCY: u16 = 3;
pub const REG_POWER_APPARENT: u16 = 4;
pub const REG_POWER_REACTIVE: u16 = 5;
pub const REG_POWER_FACTOR: u16 = 6;
pub const REG_ENERGY_TOTAL: u16 = 7;
pub const REG_TEMPERATURE: u16 = 8;
pub const REG_STATUS: u16 = 9;
pub const REG_DC1_VOLTAGE: u16 = 10;
pub const REG_DC1_CURRENT: u16 = 11;
pub const REG_DC1_POWER: u16 = 12;
pub const REG_DC2_VOLTAGE: u16 = 13;
pub const REG_DC2_CURRENT: u16 = 14;
pub const REG_DC2_POWER: u16 = 15;

pub const REG_CONNECTED: u16 = 187;
pub const REG_POWER_LIMIT: u16 = 188;
pub const REG_POWER_LIMIT_ENA: u16 = 192;

/// `read_all_MO.py`'s inverter status enumeration.
pub fn status_label(code: u16) -> &'static str {
    match code {
        0 => "Undefined",
        1 => "Off",
        2 => "Sleeping",
        3 => "Grid Monitoring",
        4 => "Producing",
        5 => "Producing (Throttled)",
        6 => "Shutting Down",
        7 => "Fault",
        8 => "Standby",
        _ => "Unknown",
    }
}

/// Decodes a SunSpec-style packed-ASCII string: two characters per register,
/// high byte first, trimmed of trailing NUL padding.
fn decode_ascii(registers: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for reg in registers {
        bytes.push((reg >> 8) as u8);
        bytes.push((reg & 0xff) as u8);
    }
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).trim().to_string()
}

#[derive(Debug)]
pub struct InverterSnapshot {
    pub unit: u8,
    pub manufacturer: String,
    pub model: String,
    pub version: String,
    pub serial: String,
    pub current_a: f64,
    pub voltage_v: f64,
    pub power_ac_w: f64,
    pub frequency_hz: f64,
    pub power_apparent_va: f64,
    pub power_reactive_var: f64,
    pub power_factor: f64,
    pub energy_total_kwh: f64,
    pub temperature_c: f64,
    pub status: u16,
    pub connected: bool,
    pub power_max_lim_pct: f64,
    pub power_max_lim_ena: bool,
    pub dc1_voltage_v: f64,
    pub dc1_current_a: f64,
    pub dc1_power_w: f64,
    pub dc2_voltage_v: f64,
    pub dc2_current_a: f64,
    pub dc2_power_w: f64,
}

async fn scaled(port: &mut ModbusPort, address: u16, scale: f64) -> Result<f64> {
    Ok(port.read_holding_register_raw(address).await? as f64 / scale)
}

pub async fn read_full_snapshot(port: &mut ModbusPort, unit: u8) -> Result<InverterSnapshot> {
    let manufacturer = decode_ascii(&port.read_holding_registers_raw(REG_MANUFACTURER, REG_MANUFACTURER_LEN).await?);
    let model = decode_ascii(&port.read_holding_registers_raw(REG_MODEL, REG_MODEL_LEN).await?);
    let version = decode_ascii(&port.read_holding_registers_raw(REG_VERSION, REG_VERSION_LEN).await?);
    let serial = decode_ascii(&port.read_holding_registers_raw(REG_SERIAL, REG_SERIAL_LEN).await?);

    Ok(InverterSnapshot {
        unit,
        manufacturer,
        model,
        version,
        serial,
        current_a: scaled(port, REG_CURRENT, 100.0).await?,
        voltage_v: scaled(port, REG_VOLTAGE, 10.0).await?,
        power_ac_w: scaled(port, REG_POWER_AC, 1.0).await?,
        frequency_hz: scaled(port, REG_FREQUENCY, 100.0).await?,
        power_apparent_va: scaled(port, REG_POWER_APPARENT, 1.0).await?,
        power_reactive_var: scaled(port, REG_POWER_REACTIVE, 1.0).await?,
        power_factor: scaled(port, REG_POWER_FACTOR, 1000.0).await?,
        energy_total_kwh: scaled(port, REG_ENERGY_TOTAL, 10.0).await?,
        temperature_c: scaled(port, REG_TEMPERATURE, 10.0).await?,
        status: port.read_holding_register_raw(REG_STATUS).await?,
        connected: port.read_holding_register_raw(REG_CONNECTED).await? != 0,
        power_max_lim_pct: scaled(port, REG_POWER_LIMIT, 10.0).await?,
        power_max_lim_ena: port.read_holding_register_raw(REG_POWER_LIMIT_ENA).await? != 0,
        dc1_voltage_v: scaled(port, REG_DC1_VOLTAGE, 10.0).await?,
        dc1_current_a: scaled(port, REG_DC1_CURRENT, 100.0).await?,
        dc1_power_w: scaled(port, REG_DC1_POWER, 1.0).await?,
        dc2_voltage_v: scaled(port, REG_DC2_VOLTAGE, 10.0).await?,
        dc2_current_a: scaled(port, REG_DC2_CURRENT, 100.0).await?,
        dc2_power_w: scaled(port, REG_DC2_POWER, 1.0).await?,
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum WritableRegister {
    Connected,
    PowerLimit,
    PowerLimitEna,
}

/// Mirrors `write_MO.py`'s validation: booleans are strictly 0/1, `power_limit`
/// is a 0-100 percentage multiplied by 10 before the wire write.
pub fn validate_and_encode(register: WritableRegister, value: i64) -> Result<(u16, u16)> {
    match register {
        WritableRegister::Connected => {
            if value != 0 && value != 1 {
                bail!("connected must be 0 or 1");
            }
            Ok((REG_CONNECTED, value as u16))
        }
        WritableRegister::PowerLimitEna => {
            if value != 0 && value != 1 {
                bail!("power_limit_ena must be 0 or 1");
            }
            Ok((REG_POWER_LIMIT_ENA, value as u16))
        }
        WritableRegister::PowerLimit => {
            if !(0..=100).contains(&value) {
                bail!("power_limit must be between 0 and 100");
            }
            Ok((REG_POWER_LIMIT, (value * 10) as u16))
        }
    }
}
