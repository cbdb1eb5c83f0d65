use crate::error::ModbusError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_modbus::client::{tcp, Context, Reader, Writer};
use tokio_modbus::slave::Slave;

/// The register-level operations the port needs, abstracted so the control
/// loop can be tested without a real ECU on the network.
#[async_trait]
pub trait RegisterTransport: Send {
    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ModbusError>;
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError>;
    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Real transport: a single `tokio-modbus` TCP context, reconnected on demand.
pub struct TcpTransport {
    addr: SocketAddr,
    slave: Slave,
    ctx: Option<Context>,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr, slave_id: u8) -> Self {
        TcpTransport { addr, slave: Slave(slave_id), ctx: None }
    }

    async fn context(&mut self) -> Result<&mut Context, ModbusError> {
        if self.ctx.is_none() {
            let ctx = tokio::time::timeout(CONNECT_TIMEOUT, tcp::connect_slave(self.addr, self.slave))
                .await
                .map_err(|_| ModbusError::ConnectTimeout(self.addr))?
                .map_err(ModbusError::Io)?;
            self.ctx = Some(ctx);
        }
        Ok(self.ctx.as_mut().expect("just populated"))
    }

    /// Drops the current connection so the next transaction reconnects from scratch.
    fn reset(&mut self) {
        self.ctx = None;
    }
}

#[async_trait]
impl RegisterTransport for TcpTransport {
    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ModbusError> {
        let result = async {
            let ctx = self.context().await?;
            let regs = ctx.read_holding_registers(address, 1).await.map_err(ModbusError::Io)?;
            let regs = regs.map_err(ModbusError::Exception)?;
            Ok(regs[0])
        }
        .await;
        if result.is_err() {
            self.reset();
        }
        result
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        let result = async {
            let ctx = self.context().await?;
            let regs = ctx.read_holding_registers(address, count).await.map_err(ModbusError::Io)?;
            regs.map_err(ModbusError::Exception)
        }
        .await;
        if result.is_err() {
            self.reset();
        }
        result
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        let result = async {
            let ctx = self.context().await?;
            ctx.write_single_register(address, value).await.map_err(ModbusError::Io)?.map_err(ModbusError::Exception)
        }
        .await;
        if result.is_err() {
            self.reset();
        }
        result
    }
}

#[async_trait]
impl RegisterTransport for Box<dyn RegisterTransport> {
    async fn read_holding_register(&mut self, address: u16) -> Result<u16, ModbusError> {
        (**self).read_holding_register(address).await
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
        (**self).read_holding_registers(address, count).await
    }

    async fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
        (**self).write_single_register(address, value).await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeTransport;

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use super::*;
    use std::collections::HashMap;

    /// In-memory register map used by `solarreg-modbus`'s own tests and by
    /// `solarreg-core`'s control-engine tests that need to drive a port.
    #[derive(Default)]
    pub struct FakeTransport {
        pub registers: HashMap<u16, u16>,
        pub fail_next_n: u32,
    }

    impl FakeTransport {
        pub fn with_register(address: u16, value: u16) -> Self {
            let mut registers = HashMap::new();
            registers.insert(address, value);
            FakeTransport { registers, fail_next_n: 0 }
        }

        fn maybe_fail(&mut self) -> Result<(), ModbusError> {
            if self.fail_next_n > 0 {
                self.fail_next_n -= 1;
                return Err(ModbusError::Status(crate::error::ModbusStatus::CommunicationError));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RegisterTransport for FakeTransport {
        async fn read_holding_register(&mut self, address: u16) -> Result<u16, ModbusError> {
            self.maybe_fail()?;
            Ok(*self.registers.get(&address).unwrap_or(&0))
        }

        async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ModbusError> {
            self.maybe_fail()?;
            Ok((address..address + count).map(|a| *self.registers.get(&a).unwrap_or(&0)).collect())
        }

        async fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
            self.maybe_fail()?;
            self.registers.insert(address, value);
            Ok(())
        }
    }
}
