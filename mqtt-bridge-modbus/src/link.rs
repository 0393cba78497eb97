//! Modbus TCP link with lazy redialing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;
use tracing::debug;

use crate::config::ModbusConfig;

/// Error type for register reads.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Read failed: {0}")]
    Transport(String),
    #[error("Modbus exception: {0}")]
    Exception(String),
}

/// Source of holding-register pairs, the seam between the polling cycle
/// and the wire.
pub trait RegisterSource {
    /// Read two consecutive holding registers starting at `address`.
    fn read_pair(
        &mut self,
        address: u16,
    ) -> impl Future<Output = Result<[u16; 2], ReadError>> + Send;
}

/// A Modbus TCP link that redials lazily after transport failures.
///
/// The initial [`connect`](ModbusLink::connect) is the caller's one fatal
/// failure point. After that, a transport-level read failure drops the
/// context and the next read redials, bounded by the configured retry
/// count; while redialing fails the read reports an error and the field
/// degrades to unavailable.
#[derive(Debug)]
pub struct ModbusLink {
    addr: SocketAddr,
    slave: Slave,
    timeout: Duration,
    retries: u32,
    ctx: Option<Context>,
}

impl ModbusLink {
    /// Create an unconnected link from configuration.
    pub fn new(config: &ModbusConfig) -> Result<Self, ReadError> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ReadError::Connect(format!("Invalid address: {}", e)))?;

        Ok(Self {
            addr,
            slave: Slave(config.unit_id),
            timeout: Duration::from_millis(config.timeout_ms),
            retries: config.retries,
            ctx: None,
        })
    }

    /// Establish the connection.
    pub async fn connect(&mut self) -> Result<(), ReadError> {
        let ctx = tokio::time::timeout(self.timeout, tcp::connect_slave(self.addr, self.slave))
            .await
            .map_err(|_| ReadError::Connect("Connection timeout".to_string()))?
            .map_err(|e| ReadError::Connect(e.to_string()))?;

        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_once(&mut self, address: u16) -> Result<[u16; 2], ReadError> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(ReadError::Connect("Not connected".to_string()));
        };

        let words = tokio::time::timeout(self.timeout, ctx.read_holding_registers(address, 2))
            .await
            .map_err(|_| ReadError::Transport("Read timeout".to_string()))?
            .map_err(|e| ReadError::Transport(e.to_string()))?
            .map_err(|e| ReadError::Exception(format!("{:?}", e)))?;

        if words.len() != 2 {
            return Err(ReadError::Transport(format!(
                "Short response: {} register(s)",
                words.len()
            )));
        }

        Ok([words[0], words[1]])
    }
}

impl RegisterSource for ModbusLink {
    async fn read_pair(&mut self, address: u16) -> Result<[u16; 2], ReadError> {
        let mut last_err: Option<ReadError> = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                debug!(attempt, address, "Redialing Modbus slave");
            }

            if self.ctx.is_none() {
                if let Err(e) = self.connect().await {
                    last_err = Some(e);
                    continue;
                }
            }

            match self.read_once(address).await {
                Ok(pair) => return Ok(pair),
                // The slave answered; redialing will not change the outcome.
                Err(ReadError::Exception(e)) => return Err(ReadError::Exception(e)),
                Err(e) => {
                    // Transport failure: drop the context so the next attempt redials.
                    self.ctx = None;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ReadError::Transport("Retries exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> ModbusConfig {
        ModbusConfig {
            host: host.to_string(),
            port: 502,
            unit_id: 1,
            timeout_ms: 1000,
            retries: 3,
        }
    }

    #[test]
    fn test_new_rejects_invalid_address() {
        let err = ModbusLink::new(&config("not an address")).unwrap_err();
        assert!(matches!(err, ReadError::Connect(_)));
    }

    #[test]
    fn test_new_accepts_ip_address() {
        assert!(ModbusLink::new(&config("192.168.100.1")).is_ok());
    }

    #[test]
    fn test_read_error_display() {
        let err = ReadError::Exception("IllegalDataAddress".to_string());
        assert_eq!(err.to_string(), "Modbus exception: IllegalDataAddress");
    }
}
