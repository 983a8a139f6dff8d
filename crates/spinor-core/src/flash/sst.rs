//! SST byte and AAI word programming
//!
//! SST25 parts have no page program. They take either one byte per
//! command, or a stream of byte pairs through auto address increment (AAI)
//! where only the first pair carries an address.

use super::ops::wire_addr;
use super::NorSession;
use crate::error::Result;
use crate::protocol::spi25;
use crate::spi::{opcodes, SpiCommand};
use crate::time::Clock;
use crate::transport::{SpiFeatures, SpiMaster};
use maybe_async::maybe_async;

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// Send one byte-program or AAI command
    ///
    /// `addr` is `None` for the AAI continuation pairs.
    async fn sst_program(&mut self, opcode: u8, addr: Option<u64>, data: &[u8]) -> Result<()> {
        let fmt = self.op_format(self.program.proto);
        let mut cmd = match addr {
            Some(addr) => SpiCommand::write(opcode, self.addr_width, wire_addr(addr)?, data),
            None => SpiCommand::write_reg(opcode, data),
        }
        .with_format(&fmt);
        self.master.execute(&mut cmd).await?;

        let timeout = self.config.timeouts.program_ms as u64;
        self.wait_till_ready_timeout(timeout).await
    }

    /// Program one byte per command
    async fn sst_write_bytes(&mut self, to: u64, data: &[u8], done: &mut usize) -> Result<()> {
        let fmt = self.reg_format;

        while *done < data.len() {
            spi25::write_enable(&mut self.master, &fmt).await?;
            let at = *done;
            self.sst_program(opcodes::BP, Some(to + at as u64), &data[at..at + 1])
                .await?;
            *done += 1;
        }

        Ok(())
    }

    /// Program through SST byte or AAI word commands
    ///
    /// The caller sends the closing write disable.
    pub(crate) async fn sst_write(&mut self, to: u64, data: &[u8], done: &mut usize) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.master.features().contains(SpiFeatures::BYTE_PROGRAM) {
            return self.sst_write_bytes(to, data, done).await;
        }

        let fmt = self.reg_format;
        let len = data.len();
        spi25::write_enable(&mut self.master, &fmt).await?;

        // AAI pairs start on an even address
        if to % 2 == 1 {
            self.sst_program(opcodes::BP, Some(to), &data[..1]).await?;
            *done = 1;
            if len > 2 {
                // Byte program clears the write enable latch
                spi25::write_enable(&mut self.master, &fmt).await?;
            }
        }

        let mut first = true;
        while *done + 1 < len {
            let at = *done;
            let addr = if first { Some(to + at as u64) } else { None };
            self.sst_program(opcodes::AAI_WP, addr, &data[at..at + 2])
                .await?;
            first = false;
            *done += 2;
        }

        spi25::write_disable(&mut self.master, &fmt).await?;
        self.wait_till_ready().await?;

        if *done < len {
            let at = *done;
            spi25::write_enable(&mut self.master, &fmt).await?;
            self.sst_program(opcodes::BP, Some(to + at as u64), &data[at..])
                .await?;
            *done += 1;
        }

        Ok(())
    }
}
