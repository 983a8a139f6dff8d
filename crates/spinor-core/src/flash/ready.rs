//! Status polling

use super::{NorSession, SessionFlags};
use crate::error::{DeviceFault, Error, Result};
use crate::fixups::{die_reg, reg_width, ReadyHook, DIE_SIZE};
use crate::protocol::spi25;
use crate::spi::opcodes;
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Fault encoded in the status register error bits, if any
fn sr_fault(sr: u8) -> Option<DeviceFault> {
    if sr & opcodes::SR_E_ERR != 0 {
        log::error!("Erase Error occurred");
        Some(DeviceFault::EraseFailed)
    } else if sr & opcodes::SR_P_ERR != 0 {
        log::error!("Programming Error occurred");
        Some(DeviceFault::ProgramFailed)
    } else {
        None
    }
}

/// Fault encoded in the flag status register error bits, if any
fn fsr_fault(fsr: u8) -> Option<DeviceFault> {
    if fsr & (opcodes::FSR_E_ERR | opcodes::FSR_P_ERR) == 0 {
        return None;
    }

    if fsr & opcodes::FSR_E_ERR != 0 {
        log::error!("Erase operation failed.");
    } else {
        log::error!("Program operation failed.");
    }

    if fsr & opcodes::FSR_PT_ERR != 0 {
        log::error!("Attempted to modify a protected sector.");
        Some(DeviceFault::ProtectedSector)
    } else if fsr & opcodes::FSR_E_ERR != 0 {
        Some(DeviceFault::EraseFailed)
    } else {
        Some(DeviceFault::ProgramFailed)
    }
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    async fn sr_ready(&mut self) -> Result<bool> {
        let fmt = self.reg_format;
        let sr = spi25::read_sr(&mut self.master, &fmt).await?;

        if self.flags.contains(SessionFlags::USE_CLSR) {
            if let Some(fault) = sr_fault(sr) {
                spi25::write_reg(&mut self.master, &fmt, opcodes::CLSR, &[]).await?;
                return Err(Error::DeviceError(fault));
            }
        }

        Ok(sr & opcodes::SR_WIP == 0)
    }

    async fn fsr_ready(&mut self) -> Result<bool> {
        let fmt = self.reg_format;
        let fsr = spi25::read_fsr(&mut self.master, &fmt).await?;

        if let Some(fault) = fsr_fault(fsr) {
            spi25::write_reg(&mut self.master, &fmt, opcodes::CLFSR, &[]).await?;
            return Err(Error::DeviceError(fault));
        }

        Ok(fsr & opcodes::FSR_READY != 0)
    }

    async fn default_ready(&mut self) -> Result<bool> {
        let sr = self.sr_ready().await?;
        let fsr = if self.flags.contains(SessionFlags::USE_FSR) {
            self.fsr_ready().await?
        } else {
            true
        };
        Ok(sr && fsr)
    }

    /// Every die must be idle; the first busy one ends the check
    async fn multi_die_ready(&mut self) -> Result<bool> {
        let width = reg_width(self.addr_mode_nbytes)?;
        let mut die = 0;

        while die < self.size {
            let addr = die_reg(die, opcodes::SPANSION_STR1V)?;
            let sr = spi25::read_any_reg(&mut self.master, width, addr, 0).await?;

            if let Some(fault) = sr_fault(sr) {
                let fmt = self.reg_format;
                spi25::write_reg(&mut self.master, &fmt, opcodes::CLSR, &[]).await?;
                return Err(Error::DeviceError(fault));
            }
            if sr & opcodes::SR_WIP != 0 {
                return Ok(false);
            }
            die += DIE_SIZE;
        }

        Ok(true)
    }

    /// One readiness check through the installed hook
    pub(crate) async fn ready(&mut self) -> Result<bool> {
        match self.hooks.ready {
            ReadyHook::Status => self.default_ready().await,
            ReadyHook::MultiDie => self.multi_die_ready().await,
        }
    }

    /// Poll until ready, for at most `timeout_ms` of wall-clock time
    pub(crate) async fn wait_till_ready_timeout(&mut self, timeout_ms: u64) -> Result<()> {
        let deadline = self.clock.now_us().saturating_add(timeout_ms.saturating_mul(1000));
        let poll_us = self.config.timeouts.poll_us;

        while self.clock.now_us() < deadline {
            if self.ready().await? {
                return Ok(());
            }
            self.master.delay_us(poll_us).await;
        }

        log::error!("flash operation timed out");
        Err(Error::Timeout)
    }

    /// Poll with the default timeout
    pub(crate) async fn wait_till_ready(&mut self) -> Result<()> {
        let timeout = self.config.timeouts.default_ms as u64;
        self.wait_till_ready_timeout(timeout).await
    }
}
