//! Octal DTR entry and soft reset
//!
//! The enable sequences are written in 1-1-1. The last register write of
//! each sequence switches the chip over, so nothing is polled after it;
//! the next command already goes out in 8D-8D-8D.

use super::{NorSession, SessionFlags};
use crate::chip::CatalogFlags;
use crate::error::Result;
use crate::fixups::OctalDtrEnable;
use crate::protocol::spi25;
use crate::spi::{opcodes, AddressWidth, CmdExtension, CmdFormat, SpiProtocol};
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Time a chip needs to come back from a soft reset
pub const SOFT_RESET_DELAY_US: u32 = 200;

/// Format for the reset pair in 8D-8D-8D
///
/// A chip that never advertised its command extension gets the repeated
/// opcode, or the inverted one when `invert` is set.
pub(crate) fn reset_format(mut fmt: CmdFormat, invert: bool) -> CmdFormat {
    if fmt.ext == CmdExtension::None {
        fmt.ext = if invert {
            CmdExtension::Invert
        } else {
            CmdExtension::Repeat
        };
    }
    fmt
}

/// Send the reset pair and give the chip time to recover
#[maybe_async]
pub(crate) async fn send_soft_reset<M: SpiMaster + ?Sized>(master: &mut M, fmt: &CmdFormat) -> Result<()> {
    if let Err(e) = spi25::soft_reset(master, fmt).await {
        log::warn!("Software reset failed: {}", e);
        return Err(e);
    }
    master.delay_us(SOFT_RESET_DELAY_US).await;
    Ok(())
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// Run the vendor sequence that enters 8D-8D-8D
    pub(crate) async fn octal_dtr_enable(&mut self, seq: OctalDtrEnable) -> Result<()> {
        let single = CmdFormat::new(SpiProtocol::P1_1_1);

        let (opcode, width, first, second, dummy) = match seq {
            OctalDtrEnable::Cypress => (
                opcodes::WRAR,
                AddressWidth::ThreeByte,
                (opcodes::CYPRESS_CFR2V, opcodes::CFR2V_MEMLAT_11_24),
                (opcodes::CYPRESS_CFR5V, opcodes::CFR5V_OCT_DTR_EN),
                24,
            ),
            OctalDtrEnable::Micron => (
                opcodes::MT_WR_ANY_REG,
                AddressWidth::ThreeByte,
                (opcodes::MT_CFR1V, 20),
                (opcodes::MT_CFR0V, opcodes::MT_OCT_DTR),
                20,
            ),
            OctalDtrEnable::Macronix => (
                opcodes::WR_CR2,
                AddressWidth::FourByte,
                (opcodes::MXIC_CR2_DC, opcodes::MXIC_DC_20),
                (opcodes::MXIC_CR2_MODE, opcodes::MXIC_OPI_DTR_EN),
                20,
            ),
        };

        // Memory array read latency first
        spi25::write_enable(&mut self.master, &single).await?;
        spi25::write_any_reg(&mut self.master, opcode, width, first.0, first.1).await?;
        self.wait_till_ready().await?;
        self.read_dummy = dummy;

        spi25::write_enable(&mut self.master, &single).await?;
        spi25::write_any_reg(&mut self.master, opcode, width, second.0, second.1).await?;

        log::debug!("{:?} octal DTR enabled, {} dummy cycles", seq, dummy);
        Ok(())
    }

    /// Soft reset in the current register protocol
    pub(crate) async fn soft_reset(&mut self) -> Result<()> {
        let fmt = reset_format(self.reg_format, self.config.soft_reset_invert);
        send_soft_reset(&mut self.master, &fmt).await
    }

    /// Return the chip to its power-on state and hand back the transport
    ///
    /// The bank register goes back to bank 0, and a chip that was switched
    /// to octal DTR is soft reset so that the next user finds it in 1-1-1.
    pub async fn remove(mut self) -> Result<M> {
        self.master.claim_bus().await?;
        let clean = self.clean_bar().await;

        let reset = if self.entry.flags.contains(CatalogFlags::OCTAL_DTR_READ)
            && self.flags.contains(SessionFlags::SOFT_RESET)
            && self.read.proto == SpiProtocol::P8_8_8_DTR
        {
            self.soft_reset().await
        } else {
            Ok(())
        };

        let release = self.master.release_bus().await;
        clean.and(reset).and(release)?;
        Ok(self.master)
    }
}
