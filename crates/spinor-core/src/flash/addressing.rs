//! Address width handling
//!
//! Chips above 16 MiB are reached either with 4-byte addresses (a mode
//! switch or dedicated opcodes) or, on the legacy path, with 3-byte
//! addresses and a bank address register selecting the 16 MiB window.

use super::{NorSession, SessionFlags, BANK_SIZE};
use crate::chip::manufacturer;
use crate::error::{Error, Result};
use crate::params::{EraseSetting, PpCommand, ReadCommand};
use crate::protocol::spi25;
use crate::spi::opcodes;
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// State of the legacy bank address register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankRegister {
    /// Opcode reading the register
    pub read_opcode: u8,
    /// Opcode writing the register
    pub write_opcode: u8,
    /// Bank the chip currently decodes, `None` after a failed write
    pub current: Option<u8>,
}

impl BankRegister {
    /// Register opcodes used by chips from `mfr`
    pub const fn for_manufacturer(mfr: u8) -> Self {
        if mfr == manufacturer::SPANSION {
            Self {
                read_opcode: opcodes::BRRD,
                write_opcode: opcodes::BRWR,
                current: None,
            }
        } else {
            Self {
                read_opcode: opcodes::RDEAR,
                write_opcode: opcodes::WREAR,
                current: None,
            }
        }
    }
}

/// Bank holding `addr`
pub(crate) fn bank_of(addr: u64) -> u8 {
    (addr / BANK_SIZE) as u8
}

/// 4-byte address form of a read opcode
pub fn read_opcode_4b(opcode: u8) -> u8 {
    match opcode {
        opcodes::READ => opcodes::READ_4B,
        opcodes::FAST_READ => opcodes::FAST_READ_4B,
        opcodes::READ_1_1_2 => opcodes::READ_1_1_2_4B,
        opcodes::READ_1_2_2 => opcodes::READ_1_2_2_4B,
        opcodes::READ_1_1_4 => opcodes::READ_1_1_4_4B,
        opcodes::READ_1_4_4 => opcodes::READ_1_4_4_4B,
        opcodes::READ_1_1_8 => opcodes::READ_1_1_8_4B,
        opcodes::READ_1_8_8 => opcodes::READ_1_8_8_4B,
        opcodes::READ_1_1_1_DTR => opcodes::READ_1_1_1_DTR_4B,
        opcodes::READ_1_2_2_DTR => opcodes::READ_1_2_2_DTR_4B,
        opcodes::READ_1_4_4_DTR => opcodes::READ_1_4_4_DTR_4B,
        other => other,
    }
}

/// 4-byte address form of a page program opcode
pub fn program_opcode_4b(opcode: u8) -> u8 {
    match opcode {
        opcodes::PP => opcodes::PP_4B,
        opcodes::PP_1_1_4 => opcodes::PP_1_1_4_4B,
        opcodes::PP_1_4_4 => opcodes::PP_1_4_4_4B,
        opcodes::PP_1_1_8 => opcodes::PP_1_1_8_4B,
        opcodes::PP_1_8_8 => opcodes::PP_1_8_8_4B,
        other => other,
    }
}

/// 4-byte address form of an erase opcode
pub fn erase_opcode_4b(opcode: u8) -> u8 {
    match opcode {
        opcodes::BE_4K => opcodes::BE_4K_4B,
        opcodes::BE_32K => opcodes::BE_32K_4B,
        opcodes::SE => opcodes::SE_4B,
        other => other,
    }
}

/// Switch read, program and erase to their 4-byte opcodes
///
/// Spansion parts fall back to the full sector erase first, since their
/// 4 KiB erase only covers the parameter sectors.
pub(crate) fn to_4byte_opcodes(
    mfr: u8,
    sector_size: u32,
    read: &mut ReadCommand,
    program: &mut PpCommand,
    erase: &mut EraseSetting,
) {
    if mfr == manufacturer::SPANSION {
        *erase = EraseSetting::new(opcodes::SE, sector_size);
    }
    read.opcode = read_opcode_4b(read.opcode);
    program.opcode = program_opcode_4b(program.opcode);
    erase.opcode = erase_opcode_4b(erase.opcode);
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// Enter or leave 4-byte address mode
    pub(crate) async fn set_4byte(&mut self, enable: bool) -> Result<()> {
        let fmt = self.reg_format;
        let mfr = self.entry.manufacturer();

        match mfr {
            manufacturer::MICRON
            | manufacturer::ISSI
            | manufacturer::MACRONIX
            | manufacturer::WINBOND => {
                // Some Micron parts need WREN; all of them accept it
                let need_wren = mfr == manufacturer::MICRON;
                if need_wren {
                    spi25::write_enable(&mut self.master, &fmt).await?;
                }
                let opcode = if enable { opcodes::EN4B } else { opcodes::EX4B };
                spi25::write_reg(&mut self.master, &fmt, opcode, &[]).await?;
                if need_wren {
                    spi25::write_disable(&mut self.master, &fmt).await?;
                }

                if !enable && mfr == manufacturer::WINBOND {
                    // Leaving 4-byte mode sets the extended address
                    // register, so 3-byte reads would hit the second bank
                    spi25::write_enable(&mut self.master, &fmt).await?;
                    spi25::write_reg(&mut self.master, &fmt, opcodes::WREAR, &[0]).await?;
                    spi25::write_disable(&mut self.master, &fmt).await?;
                }
                Ok(())
            }
            manufacturer::CYPRESS => {
                let opcode = if enable {
                    opcodes::EN4B
                } else {
                    opcodes::EX4B_CYPRESS
                };
                spi25::write_reg(&mut self.master, &fmt, opcode, &[]).await
            }
            _ => {
                let value = (enable as u8) << 7;
                spi25::write_reg(&mut self.master, &fmt, opcodes::BRWR, &[value]).await
            }
        }
    }

    /// Read the bank register and start tracking it
    pub(crate) async fn read_bar(&mut self) -> Result<()> {
        let mut bank = BankRegister::for_manufacturer(self.entry.manufacturer());
        let mut buf = [0u8; 1];
        spi25::read_reg(&mut self.master, &self.reg_format, bank.read_opcode, &mut buf).await?;
        bank.current = Some(buf[0]);
        log::debug!("bank register 0x{:02X} = {}", bank.read_opcode, buf[0]);
        self.bank = Some(bank);
        Ok(())
    }

    /// Select the bank holding `addr`, if it is not selected already
    pub(crate) async fn write_bar(&mut self, addr: u64) -> Result<()> {
        let Some(bank) = self.bank else {
            return Ok(());
        };
        let sel = bank_of(addr);
        if bank.current == Some(sel) {
            return Ok(());
        }
        self.store_bar(bank, sel).await
    }

    /// Write `sel` to the bank register; the cached bank is unknown until
    /// the write succeeds
    async fn store_bar(&mut self, mut bank: BankRegister, sel: u8) -> Result<()> {
        bank.current = None;
        self.bank = Some(bank);
        let fmt = self.reg_format;
        spi25::write_enable(&mut self.master, &fmt).await?;
        spi25::write_reg(&mut self.master, &fmt, bank.write_opcode, &[sel]).await?;
        bank.current = Some(sel);
        self.bank = Some(bank);
        Ok(())
    }

    /// Return the bank register to bank 0
    pub(crate) async fn clean_bar(&mut self) -> Result<()> {
        let Some(bank) = self.bank else {
            return Ok(());
        };
        if bank.current == Some(0) {
            return Ok(());
        }
        self.store_bar(bank, 0).await
    }

    /// Pick the address width once the read protocol is known
    pub(crate) async fn setup_addr_width(&mut self, sfdp_width: u8) -> Result<()> {
        let mut width = if self.read.proto.dtr {
            4
        } else if sfdp_width != 0 {
            sfdp_width
        } else if self.entry.addr_width != 0 {
            self.entry.addr_width
        } else {
            3
        };

        if width == 3 && self.size > BANK_SIZE {
            if self.config.bank_register {
                self.read_bar().await?;
            } else {
                width = 4;
                let mfr = self.entry.manufacturer();
                if mfr == manufacturer::SPANSION
                    || self.flags.contains(SessionFlags::FOUR_B_OPCODES)
                {
                    to_4byte_opcodes(
                        mfr,
                        self.entry.sector_size,
                        &mut self.read,
                        &mut self.program,
                        &mut self.erase,
                    );
                }
            }
        }

        self.addr_width = crate::spi::AddressWidth::from_bytes(width)
            .filter(|w| w.bytes() >= 3)
            .ok_or_else(|| {
                log::error!("address width is too large: {}", width);
                Error::AddressWidthUnsupported(width)
            })?;
        Ok(())
    }
}
