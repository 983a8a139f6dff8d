//! Read, program and erase
//!
//! Each public operation runs its chunk loop between `claim_bus` and
//! `release_bus`. The bank register is returned to bank 0 once the loop
//! ends, whether it succeeded or not, and program and erase close with a
//! write disable.

use super::{NorSession, SessionFlags};
use crate::error::{Error, PartialError, PartialResult, Result};
use crate::protocol::spi25;
use crate::spi::{opcodes, SpiCommand};
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Address of an array access as sent on the wire
pub(crate) fn wire_addr(addr: u64) -> Result<u32> {
    u32::try_from(addr).map_err(|_| Error::AddressOutOfBounds)
}

/// Bytes of a program chunk starting at `addr`
///
/// A chunk never crosses a page boundary nor exceeds the controller's
/// transfer size.
pub(crate) fn program_chunk(addr: u64, remaining: usize, page_size: u32, max_write: usize) -> usize {
    let page_left = (page_size as u64 - addr % page_size as u64) as usize;
    page_left.min(remaining).min(max_write)
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// Release the bus and fold the outcome into a partial result
    ///
    /// An error from the operation wins over an error from the release.
    pub(crate) async fn finish(
        &mut self,
        result: Result<()>,
        completed: usize,
        total: usize,
    ) -> PartialResult<()> {
        let release = self.master.release_bus().await;
        match (result, release) {
            (Err(e), _) => Err(PartialError::new(e, completed)),
            (Ok(()), Err(e)) => Err(PartialError::new(e, total)),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Read `buf.len()` bytes starting at `from`
    pub async fn read(&mut self, from: u64, buf: &mut [u8]) -> PartialResult<()> {
        self.check_range(from, buf.len() as u64)?;
        self.master.claim_bus().await?;

        let mut done = 0;
        let result = self.read_chunks(from, buf, &mut done).await;
        let clean = self.clean_bar().await;
        self.finish(result.and(clean), done, buf.len()).await
    }

    async fn read_chunks(&mut self, from: u64, buf: &mut [u8], done: &mut usize) -> Result<()> {
        let max_read = self.master.max_read_len();
        if max_read == 0 {
            return Err(Error::InvalidParameter);
        }
        let read = self.read;
        let fmt = self.op_format(read.proto);

        while *done < buf.len() {
            let addr = from + *done as u64;
            let mut len = buf.len() - *done;

            if self.bank.is_some() {
                self.write_bar(addr).await?;
                // One transfer never spans two banks
                let bank_end = (super::addressing::bank_of(addr) as u64 + 1) * super::BANK_SIZE;
                len = len.min((bank_end - addr) as usize);
            }
            len = len.min(max_read);

            let chunk = &mut buf[*done..*done + len];
            let mut cmd = SpiCommand::read(read.opcode, self.addr_width, wire_addr(addr)?, chunk)
                .with_format(&fmt)
                .with_dummy_cycles(self.read_dummy);
            self.master.execute(&mut cmd).await?;

            *done += len;
        }

        Ok(())
    }

    /// Program `data` starting at `to`
    ///
    /// The target must have been erased; programming only clears bits.
    pub async fn write(&mut self, to: u64, data: &[u8]) -> PartialResult<()> {
        self.check_range(to, data.len() as u64)?;
        self.master.claim_bus().await?;

        let mut done = 0;
        let result = match self.range_unlocked(to, data.len() as u64).await {
            Ok(true) if self.flags.contains(SessionFlags::SST_WRITE) => {
                self.sst_write(to, data, &mut done).await
            }
            Ok(true) => self.page_program(to, data, &mut done).await,
            Ok(false) => {
                log::error!("cannot write 0x{:x}+0x{:x}: range is locked", to, data.len());
                Err(Error::WriteProtected)
            }
            Err(e) => Err(e),
        };
        let clean = self.clean_bar().await;
        let fmt = self.reg_format;
        let disable = spi25::write_disable(&mut self.master, &fmt).await;
        let result = result.and(clean).and(disable);
        self.finish(result, done, data.len()).await
    }

    async fn page_program(&mut self, to: u64, data: &[u8], done: &mut usize) -> Result<()> {
        let max_write = self.master.max_write_len();
        if max_write == 0 {
            return Err(Error::InvalidParameter);
        }
        let program = self.program;
        let fmt = self.op_format(program.proto);
        let reg_fmt = self.reg_format;
        let timeout = self.config.timeouts.program_ms as u64;

        while *done < data.len() {
            let addr = to + *done as u64;
            let len = program_chunk(addr, data.len() - *done, self.page_size, max_write);

            self.write_bar(addr).await?;
            spi25::write_enable(&mut self.master, &reg_fmt).await?;

            let chunk = &data[*done..*done + len];
            let mut cmd = SpiCommand::write(program.opcode, self.addr_width, wire_addr(addr)?, chunk)
                .with_format(&fmt);
            self.master.execute(&mut cmd).await?;
            self.wait_till_ready_timeout(timeout).await?;

            *done += len;
        }

        Ok(())
    }

    /// Erase `len` bytes starting at `addr`
    ///
    /// Both must be multiples of [`erase_size`](Self::erase_size). Erasing
    /// the whole chip uses the chip erase command when the chip has one.
    pub async fn erase(&mut self, addr: u64, len: u64) -> PartialResult<()> {
        self.erase_with_abort(addr, len, || false).await
    }

    /// Erase the whole chip
    pub async fn erase_chip(&mut self) -> PartialResult<()> {
        let size = self.size;
        self.erase(0, size).await
    }

    /// Erase, checking `abort` before every sector
    ///
    /// When `abort` returns true the operation stops with
    /// [`Error::Interrupted`]; `completed` then counts the bytes already
    /// erased from `addr` on.
    pub async fn erase_with_abort<F: FnMut() -> bool>(
        &mut self,
        addr: u64,
        len: u64,
        mut abort: F,
    ) -> PartialResult<()> {
        if self.flags.contains(SessionFlags::NO_ERASE) {
            return Err(Error::NotSupported.into());
        }
        self.check_range(addr, len)?;
        let erase_size = self.erase.size as u64;
        if addr % erase_size != 0 || len % erase_size != 0 {
            log::error!(
                "erase 0x{:x}+0x{:x} is not aligned to 0x{:x}",
                addr,
                len,
                erase_size
            );
            return Err(Error::InvalidAlignment.into());
        }

        self.master.claim_bus().await?;

        let mut done = 0u64;
        let result = match self.range_unlocked(addr, len).await {
            Ok(true) => self.erase_sectors(addr, len, &mut done, &mut abort).await,
            Ok(false) => {
                log::error!("cannot erase 0x{:x}+0x{:x}: range is locked", addr, len);
                Err(Error::WriteProtected)
            }
            Err(e) => Err(e),
        };

        let clean = self.clean_bar().await;
        let fmt = self.reg_format;
        let disable = spi25::write_disable(&mut self.master, &fmt).await;
        let result = result.and(clean).and(disable);
        self.finish(result, done as usize, len as usize).await
    }

    async fn erase_sectors<F: FnMut() -> bool>(
        &mut self,
        addr: u64,
        len: u64,
        done: &mut u64,
        abort: &mut F,
    ) -> Result<()> {
        let reg_fmt = self.reg_format;
        let fmt = self.op_format(self.program.proto);
        let timeouts = self.config.timeouts;

        while *done < len {
            if abort() {
                log::warn!("erase interrupted at 0x{:x}", addr + *done);
                return Err(Error::Interrupted);
            }

            let pos = addr + *done;
            self.write_bar(pos).await?;
            spi25::write_enable(&mut self.master, &reg_fmt).await?;

            if len == self.size && !self.flags.contains(SessionFlags::NO_CHIP_ERASE) {
                spi25::write_reg(&mut self.master, &reg_fmt, opcodes::CHIP_ERASE, &[]).await?;
                self.wait_till_ready_timeout(timeouts.chip_erase_ms(self.size))
                    .await?;
                *done = len;
                continue;
            }

            let step = self.hooks.erase.step(pos, self.size, self.erase);
            if step.size as u64 > len - *done {
                log::error!(
                    "erase step 0x{:x} at 0x{:x} overruns the request",
                    step.size,
                    pos
                );
                return Err(Error::InvalidAlignment);
            }

            let mut cmd = SpiCommand::erase(step.opcode, self.addr_width, wire_addr(pos)?)
                .with_format(&fmt);
            self.master.execute(&mut cmd).await?;
            self.wait_till_ready_timeout(timeouts.erase_ms as u64).await?;

            *done += step.size as u64;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_chunk_respects_pages() {
        assert_eq!(program_chunk(100, 300, 256, 4096), 156);
        assert_eq!(program_chunk(256, 144, 256, 4096), 144);
        assert_eq!(program_chunk(255, 2, 256, 4096), 1);
        assert_eq!(program_chunk(0, 1000, 256, 64), 64);
        assert_eq!(program_chunk(510, 10, 512, 4096), 2);
    }

    #[test]
    fn test_wire_addr() {
        assert_eq!(wire_addr(0x0100_0000), Ok(0x0100_0000));
        assert_eq!(wire_addr(1 << 32), Err(Error::AddressOutOfBounds));
    }
}

#[cfg(all(test, feature = "is_sync", feature = "std"))]
mod session_tests {
    use super::super::mock::{scan_mock, MockChip};
    use crate::chip::find_by_name;
    use crate::config::NorConfig;
    use crate::error::{DeviceFault, Error, PartialError};
    use crate::spi::{opcodes, AddressWidth};
    use crate::transport::SpiFeatures;
    use std::vec::Vec;

    #[test]
    fn test_program_splits_at_page_boundaries() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();
        let data = [0x5Au8; 300];

        nor.master_mut().clear_log();
        nor.write(100, &data).unwrap();

        let programs = nor.master().commands(opcodes::PP);
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].addr, Some(100));
        assert_eq!(programs[0].write.len(), 156);
        assert_eq!(programs[1].addr, Some(256));
        assert_eq!(programs[1].write.len(), 144);
        assert_eq!(nor.master().commands(opcodes::WREN).len(), 2);
        assert_eq!(&nor.master().memory()[100..400], &data[..]);
    }

    #[test]
    fn test_program_two_bytes_across_page() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.write(255, &[1, 2]).unwrap();

        let programs = nor.master().commands(opcodes::PP);
        assert_eq!(programs.len(), 2);
        assert_eq!((programs[0].addr, programs[0].write.len()), (Some(255), 1));
        assert_eq!((programs[1].addr, programs[1].write.len()), (Some(256), 1));
    }

    #[test]
    fn test_read_chunks_at_controller_limit() {
        let mut chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        chip.max_read = 100;
        for (i, b) in chip.memory_mut().iter_mut().enumerate().take(1024) {
            *b = i as u8;
        }
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        let mut buf = [0u8; 250];
        nor.read(10, &mut buf).unwrap();

        let reads = nor.master().commands(opcodes::FAST_READ);
        assert_eq!(reads.len(), 3);
        assert!(reads.iter().all(|c| c.dummy == 8 && c.width == AddressWidth::ThreeByte));
        assert_eq!(reads[2].read_len, 50);
        assert_eq!(buf[0], 10);
        assert_eq!(buf[249], 3);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();
        let mut buf = [0u8; 2];
        let size = nor.size();
        assert_eq!(
            nor.read(size - 1, &mut buf),
            Err(PartialError::new(Error::AddressOutOfBounds, 0))
        );
    }

    #[test]
    fn test_failed_bank_switch_is_not_cached() {
        let mut chip = MockChip::new(find_by_name("mx25l25635f").unwrap(), SpiFeatures::empty());
        let bank_size = super::super::BANK_SIZE as usize;
        chip.memory_mut()[..bank_size].fill(0x00);
        chip.memory_mut()[bank_size..2 * bank_size].fill(0x11);
        let config = NorConfig {
            bank_register: true,
            ..NorConfig::default()
        };
        let mut nor = scan_mock(chip, config).unwrap();

        // Switching to bank 1 works, returning to bank 0 fails
        nor.master_mut().fail = Some((opcodes::WREAR, 1));
        let mut buf = [0u8; 1];
        assert_eq!(
            nor.read(bank_size as u64, &mut buf),
            Err(PartialError::new(Error::TransferFailed, 1))
        );
        assert_eq!(buf[0], 0x11);
        assert_eq!(nor.bank_register().unwrap().current, None);

        nor.master_mut().clear_log();
        nor.read(0, &mut buf).unwrap();
        assert_eq!(buf[0], 0x00);
        let bank = nor.master().commands(opcodes::WREAR);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank[0].write, [0]);
        assert_eq!(nor.bank_register().unwrap().current, Some(0));
    }

    #[test]
    fn test_erase_alignment() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();
        assert_eq!(nor.erase_size(), 64 * 1024);

        assert_eq!(nor.erase(4096, 64 * 1024).unwrap_err().error, Error::InvalidAlignment);
        assert_eq!(nor.erase(0, 4096).unwrap_err().error, Error::InvalidAlignment);

        nor.master_mut().clear_log();
        nor.erase(64 * 1024, 128 * 1024).unwrap();
        let erases = nor.master().commands(opcodes::SE);
        assert_eq!(erases.len(), 2);
        assert_eq!(erases[1].addr, Some(128 * 1024));
        // Write disable closes every erase
        assert_eq!(nor.master().log().last().unwrap().opcode, opcodes::WRDI);
    }

    #[test]
    fn test_erase_4k_preference() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let config = NorConfig {
            use_4k_sectors: true,
            ..NorConfig::default()
        };
        let mut nor = scan_mock(chip, config).unwrap();
        assert_eq!(nor.erase_size(), 4096);

        nor.master_mut().clear_log();
        nor.erase(8192, 8192).unwrap();
        assert_eq!(nor.master().commands(opcodes::BE_4K).len(), 2);
    }

    #[test]
    fn test_full_erase_uses_chip_erase() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.erase_chip().unwrap();
        assert_eq!(nor.master().commands(opcodes::CHIP_ERASE).len(), 1);
        assert!(nor.master().commands(opcodes::SE).is_empty());
    }

    #[test]
    fn test_erase_abort_reports_progress() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        let mut calls = 0;
        let err = nor
            .erase_with_abort(0, 4 * 64 * 1024, || {
                calls += 1;
                calls > 2
            })
            .unwrap_err();
        assert_eq!(err, PartialError::new(Error::Interrupted, 2 * 64 * 1024));
        assert_eq!(nor.master().commands(opcodes::SE).len(), 2);
    }

    #[test]
    fn test_no_erase_flag() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();
        nor.flags |= super::SessionFlags::NO_ERASE;
        assert_eq!(nor.erase(0, 64 * 1024).unwrap_err().error, Error::NotSupported);
    }

    #[test]
    fn test_program_timeout() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.master_mut().busy_polls = usize::MAX;
        let err = nor.write(0, &[0u8; 16]).unwrap_err();
        assert_eq!(err, PartialError::new(Error::Timeout, 0));
        // One poll per 10 us over the 2 s program timeout
        assert_eq!(nor.master().commands(opcodes::RDSR).len(), 200_000);
        assert_eq!(nor.master().log().last().unwrap().opcode, opcodes::WRDI);
    }

    #[test]
    fn test_program_closes_with_write_disable() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.write(0, &[0u8; 16]).unwrap();
        assert_eq!(nor.master().log().last().unwrap().opcode, opcodes::WRDI);

        // A failed page program still drops the latch
        nor.master_mut().fail = Some((opcodes::PP, 0));
        nor.master_mut().clear_log();
        let err = nor.write(0x100, &[0u8; 16]).unwrap_err();
        assert_eq!(err, PartialError::new(Error::TransferFailed, 0));
        let ops: Vec<u8> = nor.master().log().iter().map(|c| c.opcode).collect();
        assert_eq!(ops, [opcodes::WREN, opcodes::PP, opcodes::WRDI]);
    }

    #[test]
    fn test_ready_after_n_polls() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().clear_log();
        nor.master_mut().busy_polls = 4;
        nor.write(0, &[0u8; 16]).unwrap();
        assert_eq!(nor.master().commands(opcodes::RDSR).len(), 5);
    }

    #[test]
    fn test_fsr_program_fault() {
        let chip = MockChip::new(find_by_name("n25q512a").unwrap(), SpiFeatures::FOUR_BYTE_ADDR);
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();

        nor.master_mut().fsr = opcodes::FSR_READY | opcodes::FSR_P_ERR;
        nor.master_mut().clear_log();
        let err = nor.write(0, &[0u8; 4]).unwrap_err();
        assert_eq!(err.error, Error::DeviceError(DeviceFault::ProgramFailed));
        assert_eq!(nor.master().commands(opcodes::CLFSR).len(), 1);
    }

    #[test]
    fn test_release_runs_on_error() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let mut nor = scan_mock(chip, NorConfig::default()).unwrap();
        let claims = nor.master().claims();

        nor.master_mut().busy_polls = usize::MAX;
        let _ = nor.write(0, &[0u8; 4]);
        assert_eq!(nor.master().claims(), claims + 1);
        assert_eq!(nor.master().releases(), nor.master().claims());
    }
}
