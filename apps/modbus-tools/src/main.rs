mod registers;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use registers::WritableRegister;
use solarreg_logging::LogSink;
use solarreg_modbus::ModbusPort;
use std::net::ToSocketAddrs;

/// Ad-hoc register inspection and single-register writes against an
/// APSystems ECU, independent of the regulator daemon.
#[derive(Debug, Parser)]
#[command(name = "solar-modbus-tools", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Modbus/TCP port.
    #[arg(long, global = true, default_value_t = 502)]
    port: u16,

    /// Modbus slave/unit id.
    #[arg(long, global = true, default_value_t = 1)]
    unit: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dump the full register set of one inverter.
    Read { host: String },
    /// Dump a reduced register set across several inverters.
    ReadAll {
        host: String,
        #[arg(long, value_delimiter = ',')]
        units: Vec<u8>,
    },
    /// Write a single register.
    Write {
        host: String,
        #[arg(long, value_enum)]
        register: WritableRegister,
        #[arg(long)]
        value: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = solarreg_logging::init("solar-modbus-tools", LogSink::Stdout, "info")?;
    let cli = Cli::parse();

    match cli.command {
        Command::Read { host } => {
            let addr = resolve(&host, cli.port)?;
            let mut port = ModbusPort::connect_tcp(addr, cli.unit);
            let snapshot = registers::read_full_snapshot(&mut port, cli.unit).await.context("failed to read inverter registers")?;
            println!("{snapshot:#?}");
        }
        Command::ReadAll { host, units } => {
            let addr = resolve(&host, cli.port)?;
            let mut total_power_ac = 0.0;
            for unit in units {
                let mut port = ModbusPort::connect_tcp(addr, unit);
                let status = port.read_holding_register_raw(registers::REG_STATUS).await?;
                let power_ac = port.read_holding_register_raw(registers::REG_POWER_AC).await? as f64;
                let current = port.read_holding_register_raw(registers::REG_CURRENT).await? as f64 / 100.0;
                let voltage = port.read_holding_register_raw(registers::REG_VOLTAGE).await? as f64 / 10.0;
                let power_max_lim = port.read_holding_register_raw(registers::REG_POWER_LIMIT).await? as f64 / 10.0;
                total_power_ac += power_ac;
                println!(
                    "unit {unit:>3}: status={:<22} power_ac={power_ac:>7}W current={current:>6.2}A voltage={voltage:>6.1}V power_max_lim={power_max_lim:>5.1}%",
                    registers::status_label(status)
                );
            }
            println!("total power_ac = {total_power_ac}W");
        }
        Command::Write { host, register, value } => {
            let addr = resolve(&host, cli.port)?;
            let (address, encoded) = registers::validate_and_encode(register, value)?;
            let mut port = ModbusPort::connect_tcp(addr, cli.unit);
            port.write_holding_register_raw(address, encoded).await.context("failed to write register")?;
            println!("wrote {encoded} to register {address}");
        }
    }

    Ok(())
}

fn resolve(host: &str, port: u16) -> Result<std::net::SocketAddr> {
    format!("{host}:{port}")
        .to_socket_addrs()
        .context("failed to resolve host")?
        .next()
        .context("host resolved to no candidates")
}
