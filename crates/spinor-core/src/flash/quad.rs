//! Quad enable
//!
//! Chips that share IO2/IO3 with WP#/HOLD# only switch those pins to data
//! lines once a vendor-specific bit is set. Every method reads the bit
//! back and fails with [`Error::QuadEnableFailed`] if it did not stick.

use super::NorSession;
use crate::error::{Error, Result};
use crate::fixups::{die_reg, reg_width, DIE_SIZE};
use crate::params::QuadEnable;
use crate::protocol::spi25;
use crate::spi::opcodes;
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// WREN, WRSR with `data`, then wait
    pub(crate) async fn write_sr_wait(&mut self, data: &[u8]) -> Result<()> {
        let fmt = self.reg_format;
        spi25::write_enable(&mut self.master, &fmt).await?;
        spi25::write_sr(&mut self.master, &fmt, data).await?;
        self.wait_till_ready().await
    }

    /// Set the quad enable bit with the given method
    pub(crate) async fn quad_enable(&mut self, method: QuadEnable) -> Result<()> {
        match method {
            QuadEnable::NotRequired => Ok(()),
            QuadEnable::Macronix => self.macronix_quad_enable().await,
            QuadEnable::SpansionReadCr => self.spansion_read_cr_quad_enable().await,
            QuadEnable::SpansionNoReadCr => self.spansion_no_read_cr_quad_enable().await,
            QuadEnable::Sr2Bit7 => self.sr2_bit7_quad_enable().await,
            QuadEnable::SpansionVolatile => self.spansion_volatile_quad_enable().await,
        }
    }

    async fn macronix_quad_enable(&mut self) -> Result<()> {
        let fmt = self.reg_format;
        let sr = spi25::read_sr(&mut self.master, &fmt).await?;
        if sr & opcodes::SR_QUAD_EN_MX != 0 {
            return Ok(());
        }

        self.write_sr_wait(&[sr | opcodes::SR_QUAD_EN_MX]).await?;

        let sr = spi25::read_sr(&mut self.master, &fmt).await?;
        if sr & opcodes::SR_QUAD_EN_MX == 0 {
            log::error!("Macronix Quad bit not set");
            return Err(Error::QuadEnableFailed);
        }
        Ok(())
    }

    async fn spansion_read_cr_quad_enable(&mut self) -> Result<()> {
        let fmt = self.reg_format;
        let cr = spi25::read_cr(&mut self.master, &fmt).await?;
        if cr & opcodes::CR_QUAD_EN_SPAN != 0 {
            return Ok(());
        }

        let sr = spi25::read_sr(&mut self.master, &fmt).await?;
        self.write_sr_wait(&[sr, cr | opcodes::CR_QUAD_EN_SPAN])
            .await?;

        let cr = spi25::read_cr(&mut self.master, &fmt).await?;
        if cr & opcodes::CR_QUAD_EN_SPAN == 0 {
            log::error!("Spansion Quad bit not set");
            return Err(Error::QuadEnableFailed);
        }
        Ok(())
    }

    /// The configuration register cannot be read, so it is written blind
    async fn spansion_no_read_cr_quad_enable(&mut self) -> Result<()> {
        let fmt = self.reg_format;
        let sr = spi25::read_sr(&mut self.master, &fmt).await?;
        self.write_sr_wait(&[sr, opcodes::CR_QUAD_EN_SPAN]).await
    }

    async fn sr2_bit7_quad_enable(&mut self) -> Result<()> {
        let fmt = self.reg_format;
        let mut sr2 = [0u8; 1];
        spi25::read_reg(&mut self.master, &fmt, opcodes::RDSR2, &mut sr2).await?;
        if sr2[0] & opcodes::SR2_QUAD_EN_BIT7 != 0 {
            return Ok(());
        }

        let value = sr2[0] | opcodes::SR2_QUAD_EN_BIT7;
        spi25::write_enable(&mut self.master, &fmt).await?;
        spi25::write_reg(&mut self.master, &fmt, opcodes::WRSR2, &[value]).await?;
        self.wait_till_ready().await?;

        spi25::read_reg(&mut self.master, &fmt, opcodes::RDSR2, &mut sr2).await?;
        if sr2[0] & opcodes::SR2_QUAD_EN_BIT7 == 0 {
            log::error!("SR2 Quad bit not set");
            return Err(Error::QuadEnableFailed);
        }
        Ok(())
    }

    /// Set the volatile QUAD bit in CFR1V of every die
    async fn spansion_volatile_quad_enable(&mut self) -> Result<()> {
        let width = reg_width(self.addr_mode_nbytes)?;
        let fmt = self.reg_format;
        let mut die = 0;

        while die < self.size {
            let addr = die_reg(die, opcodes::SPANSION_CFR1V)?;
            let cfr1v = spi25::read_any_reg(&mut self.master, width, addr, 0).await?;

            if cfr1v & opcodes::CR_QUAD_EN_SPAN == 0 {
                spi25::write_enable(&mut self.master, &fmt).await?;
                spi25::write_any_reg(
                    &mut self.master,
                    opcodes::WRAR,
                    width,
                    addr,
                    cfr1v | opcodes::CR_QUAD_EN_SPAN,
                )
                .await?;

                let written = spi25::read_any_reg(&mut self.master, width, addr, 0).await?;
                if written & opcodes::CR_QUAD_EN_SPAN == 0 {
                    log::error!("Quad bit not set in die at 0x{:x}", die);
                    return Err(Error::QuadEnableFailed);
                }
            }
            die += DIE_SIZE;
        }

        Ok(())
    }
}

#[cfg(all(test, feature = "is_sync", feature = "std"))]
mod tests {
    use super::super::mock::{scan_mock, MockChip};
    use crate::chip::find_by_name;
    use crate::config::NorConfig;
    use crate::error::Error;
    use crate::params::QuadEnable;
    use crate::spi::{opcodes, SpiProtocol};
    use crate::transport::SpiFeatures;
    use std::vec;

    #[test]
    fn test_macronix_quad_enable_on_scan() {
        let chip = MockChip::new(
            find_by_name("mx25l25635f").unwrap(),
            SpiFeatures::QUAD | SpiFeatures::DUAL | SpiFeatures::FOUR_BYTE_ADDR,
        );
        let nor = scan_mock(chip, NorConfig::default()).unwrap();

        assert_eq!(nor.read_command().proto, SpiProtocol::P1_1_4);
        assert_ne!(nor.master().sr() & opcodes::SR_QUAD_EN_MX, 0);
        let writes = nor.master().commands(opcodes::WRSR);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].write, vec![opcodes::SR_QUAD_EN_MX]);
    }

    #[test]
    fn test_spansion_cr_quad_enable() {
        let chip = MockChip::new(find_by_name("s25fl256s1").unwrap(), SpiFeatures::FOUR_BYTE_ADDR);
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.quad_enable(QuadEnable::SpansionReadCr).unwrap();
        let writes = nor.master().commands(opcodes::WRSR);
        assert_eq!(writes[0].write, vec![0x00, opcodes::CR_QUAD_EN_SPAN]);
        assert_ne!(nor.master().cr() & opcodes::CR_QUAD_EN_SPAN, 0);

        // Already set: nothing written
        nor.master_mut().clear_log();
        nor.quad_enable(QuadEnable::SpansionReadCr).unwrap();
        assert!(nor.master().commands(opcodes::WRSR).is_empty());
    }

    #[test]
    fn test_quad_bit_that_does_not_stick() {
        let mut chip = MockChip::new(find_by_name("s25fl256s1").unwrap(), SpiFeatures::FOUR_BYTE_ADDR);
        chip.sr_writable = false;
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        assert_eq!(
            nor.quad_enable(QuadEnable::SpansionReadCr),
            Err(Error::QuadEnableFailed)
        );
        assert_eq!(nor.quad_enable(QuadEnable::Macronix), Err(Error::QuadEnableFailed));
        // Blind write has nothing to verify
        assert_eq!(nor.quad_enable(QuadEnable::SpansionNoReadCr), Ok(()));
    }

    #[test]
    fn test_sr2_bit7_quad_enable() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.quad_enable(QuadEnable::Sr2Bit7).unwrap();
        let writes = nor.master().commands(opcodes::WRSR2);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].write, vec![opcodes::SR2_QUAD_EN_BIT7]);
        assert_eq!(nor.master().commands(opcodes::RDSR2).len(), 2);
    }
}
