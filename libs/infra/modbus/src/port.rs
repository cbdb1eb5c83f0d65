use crate::error::ModbusError;
use crate::transport::{RegisterTransport, TcpTransport};
use solarreg_core::constants::{BUGGY_LIMIT, MAX_LIMIT};
use std::net::SocketAddr;

/// Holding register addresses, 0-based (Modbus convention: register `40189`
/// in documentation is offset `188` on the wire).
const CONNECTED_REGISTER: u16 = 187;
const POWER_LIMIT_REGISTER: u16 = 188;
const POWER_LIMIT_ENABLE_REGISTER: u16 = 192;

/// Outcome of reading back the power limit and reconciling it against what
/// the regulator last wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// The limit now believed to be in effect. The ECU is authoritative: on
    /// an ordinary mismatch this is the value it reported, not what was
    /// expected; on the buggy sentinel it is `MAX_LIMIT`, the corrective value.
    pub limit: i32,
    /// Whether the observed value differed from `expected_limit` at all
    /// (including the buggy sentinel case).
    pub corrected: bool,
    /// Whether the observed value was specifically the spurious `BUGGY_LIMIT`
    /// sentinel, which is never trusted and always corrected to `MAX_LIMIT`.
    pub was_buggy: bool,
}

/// Stateful Modbus/TCP link to one ECU. Generic over the transport so tests
/// can substitute an in-memory fake.
pub struct ModbusPort<T: RegisterTransport = TcpTransport> {
    transport: T,
}

impl ModbusPort<TcpTransport> {
    pub fn connect_tcp(addr: SocketAddr, slave_id: u8) -> Self {
        ModbusPort { transport: TcpTransport::new(addr, slave_id) }
    }
}

impl<T: RegisterTransport> ModbusPort<T> {
    pub fn with_transport(transport: T) -> Self {
        ModbusPort { transport }
    }

    pub async fn is_connected(&mut self) -> Result<bool, ModbusError> {
        Ok(self.transport.read_holding_register(CONNECTED_REGISTER).await? != 0)
    }

    pub async fn write_power_limit(&mut self, permille: i32) -> Result<(), ModbusError> {
        debug_assert!((0..=1000).contains(&permille), "permille out of ECU range: {permille}");
        self.transport.write_single_register(POWER_LIMIT_REGISTER, permille as u16).await
    }

    pub async fn set_power_limit_enabled(&mut self, enabled: bool) -> Result<(), ModbusError> {
        self.transport.write_single_register(POWER_LIMIT_ENABLE_REGISTER, enabled as u16).await
    }

    pub async fn read_power_limit_raw(&mut self) -> Result<i32, ModbusError> {
        Ok(self.transport.read_holding_register(POWER_LIMIT_REGISTER).await? as i32)
    }

    /// Reads an arbitrary holding register. Used by ad-hoc inspection tools
    /// that need the full register map rather than just the power limit.
    pub async fn read_holding_register_raw(&mut self, address: u16) -> Result<u16, ModbusError> {
        self.transport.read_holding_register(address).await
    }

    /// Reads a contiguous block of holding registers in one transaction, e.g.
    /// the packed-ASCII identification registers ad-hoc tools dump.
    pub async fn read_holding_registers_raw(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        self.transport.read_holding_registers(address, count).await
    }

    /// Writes an arbitrary holding register. Used by ad-hoc write tools.
    pub async fn write_holding_register_raw(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        self.transport.write_single_register(address, value).await
    }

    /// Reads the ECU's power limit and reconciles it against `expected_limit`.
    ///
    /// The spurious `BUGGY_LIMIT` sentinel is never trusted: it triggers an
    /// immediate corrective write to `MAX_LIMIT`, reported as the new limit.
    /// Any other mismatch is *not* overwritten — the ECU is authoritative, so
    /// the observed value is adopted as-is and reported back so the caller can
    /// emit `POWER_LIMIT_DIFF` and surface return code 1.
    pub async fn read_and_reconcile_power_limit(&mut self, expected_limit: i32) -> Result<ReadOutcome, ModbusError> {
        let raw = self.read_power_limit_raw().await?;

        if raw == BUGGY_LIMIT {
            self.write_power_limit(MAX_LIMIT).await?;
            return Ok(ReadOutcome { limit: MAX_LIMIT, corrected: true, was_buggy: true });
        }

        if raw != expected_limit {
            return Ok(ReadOutcome { limit: raw, corrected: true, was_buggy: false });
        }

        Ok(ReadOutcome { limit: raw, corrected: false, was_buggy: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FakeTransport;

    #[tokio::test]
    async fn reconcile_accepts_matching_reading() {
        let fake = FakeTransport::with_register(POWER_LIMIT_REGISTER, 400);
        let mut port = ModbusPort::with_transport(fake);
        let outcome = port.read_and_reconcile_power_limit(400).await.unwrap();
        assert_eq!(outcome, ReadOutcome { limit: 400, corrected: false, was_buggy: false });
    }

    #[tokio::test]
    async fn reconcile_adopts_ecu_as_authoritative_on_mismatch() {
        // The ECU wins on an ordinary mismatch: the observed value is adopted,
        // not overwritten back to what was expected.
        let fake = FakeTransport::with_register(POWER_LIMIT_REGISTER, 250);
        let mut port = ModbusPort::with_transport(fake);
        let outcome = port.read_and_reconcile_power_limit(400).await.unwrap();
        assert_eq!(outcome, ReadOutcome { limit: 250, corrected: true, was_buggy: false });
    }

    #[tokio::test]
    async fn reconcile_never_trusts_buggy_limit_even_when_it_matches_expectation() {
        let fake = FakeTransport::with_register(POWER_LIMIT_REGISTER, BUGGY_LIMIT as u16);
        let mut port = ModbusPort::with_transport(fake);
        let outcome = port.read_and_reconcile_power_limit(BUGGY_LIMIT).await.unwrap();
        assert!(outcome.was_buggy);
        assert_eq!(outcome.limit, MAX_LIMIT);
    }

    #[tokio::test]
    async fn transient_failure_surfaces_as_communication_error() {
        let fake = FakeTransport { fail_next_n: 1, ..Default::default() };
        let mut port = ModbusPort::with_transport(fake);
        let err = port.read_and_reconcile_power_limit(400).await.unwrap_err();
        assert_eq!(err.status(), crate::error::ModbusStatus::CommunicationError);
    }
}
