//! Vendor fixups
//!
//! Some chips need corrections the generic parameter discovery cannot
//! derive: wrong or missing SFDP fields, volatile configuration that
//! changes page size or sector layout, or a private sequence to enter
//! octal DTR. Each family is one `Fixups` variant, picked once from the
//! catalog entry and consulted at three points of the scan:
//!
//! 1. `default_init` right after the legacy parameters are built
//! 2. `post_bfpt` once the BFPT has been decoded
//! 3. `post_sfdp` after every SFDP table (or none) was parsed
//!
//! The chip-specific setup step and the octal DTR enable sequences live
//! with the session in `flash`, since they need status polling.

use crate::chip::{manufacturer, CatalogEntry};
use crate::config::NorConfig;
use crate::error::{Error, Result};
use crate::params::{EraseSetting, FlashParameters, Hwcaps, PpCommand, QuadEnable, ReadCommand};
use crate::protocol::spi25;
use crate::sfdp::{Bfpt, BFPT_DWORD16_EX4B_PWRCYC};
use crate::spi::{opcodes, AddressWidth, CmdExtension, CmdFormat, SpiProtocol};
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Distance between the register maps of two dies in a multi-die package
pub const DIE_SIZE: u64 = 128 * 1024 * 1024;

/// Size of the 4 KiB sectors of a hybrid sector layout
pub const SMALL_SECTOR: u32 = 4 * 1024;

/// Vendor family of the attached chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fixups {
    /// Generic behavior only
    #[default]
    None,
    /// Infineon S25HL-T / S25HS-T quad parts
    S25hxT,
    /// Infineon S28HL-T / S28HS-T octal parts
    S28hxT,
    /// S25FL256L used with the bank register, which it does not have
    S25fl256lBar,
    /// Micron MT35XU512ABA
    Mt35xu512aba,
    /// Macronix parts, octal ones in particular
    MacronixOctal,
}

/// Sequence that switches the chip to 8D-8D-8D
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctalDtrEnable {
    /// CFR2V latency, then CFR5V through WRAR
    Cypress,
    /// CFR1V dummy cycles, then CFR0V through the Micron write-any-register
    Micron,
    /// CR2 dummy cycles, then CR2 mode through WR_CR2
    Macronix,
}

/// How one erase step picks its opcode and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseHook {
    /// Every step uses the negotiated erase
    #[default]
    Uniform,
    /// 4 KiB sectors overlay the top and/or bottom of the array
    NonUniform {
        /// Opcode for the 4 KiB sectors
        opcode_4k: u8,
        /// Bytes of 4 KiB sectors at the top
        top: u32,
        /// Bytes of 4 KiB sectors at the bottom
        bottom: u32,
    },
}

impl EraseHook {
    /// Opcode and size of the erase step starting at `addr`
    ///
    /// `size` is the device size, `erase` the negotiated uniform erase.
    pub fn step(&self, addr: u64, size: u64, erase: EraseSetting) -> EraseSetting {
        match *self {
            Self::Uniform => erase,
            Self::NonUniform {
                opcode_4k,
                top,
                bottom,
            } => {
                if addr < bottom as u64 || addr >= size - top as u64 {
                    EraseSetting::new(opcode_4k, SMALL_SECTOR)
                } else if addr == bottom as u64 {
                    EraseSetting::new(erase.opcode, erase.size - bottom)
                } else if addr == size - erase.size as u64 {
                    EraseSetting::new(erase.opcode, erase.size - top)
                } else {
                    erase
                }
            }
        }
    }
}

/// How readiness is checked after a program or erase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyHook {
    /// Status register, plus the flag status register when the chip has one
    #[default]
    Status,
    /// STR1V of every die through RDAR
    MultiDie,
}

/// Behaviors installed by the fixups and the setup step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hooks {
    /// Octal DTR enable sequence, if the chip has one
    pub octal_dtr_enable: Option<OctalDtrEnable>,
    /// Erase step selection
    pub erase: EraseHook,
    /// Readiness check
    pub ready: ReadyHook,
}

/// Address width for a register access of `nbytes` bytes
pub(crate) fn reg_width(nbytes: u8) -> Result<AddressWidth> {
    match AddressWidth::from_bytes(nbytes) {
        Some(AddressWidth::None) | None => Err(Error::AddressWidthUnsupported(nbytes)),
        Some(width) => Ok(width),
    }
}

/// Register address `reg` in the die starting at `die`
pub(crate) fn die_reg(die: u64, reg: u32) -> Result<u32> {
    u32::try_from(die + reg as u64).map_err(|_| Error::AddressOutOfBounds)
}

impl Fixups {
    /// Pick the fixups for a catalog entry
    pub fn detect(entry: &CatalogEntry, config: &NorConfig) -> Self {
        let mut fixups = Self::None;

        if entry.manufacturer() == manufacturer::CYPRESS {
            match entry.id[1] {
                0x2a | 0x2b => fixups = Self::S25hxT,
                0x5a | 0x5b => fixups = Self::S28hxT,
                _ => {}
            }
        }
        if config.bank_register && entry.name == "s25fl256l" {
            fixups = Self::S25fl256lBar;
        }
        if entry.name == "mt35xu512aba" {
            fixups = Self::Mt35xu512aba;
        }
        if entry.manufacturer() == manufacturer::MACRONIX {
            fixups = Self::MacronixOctal;
        }

        fixups
    }

    /// Adjust the hooks before any SFDP access
    pub fn default_init(&self, hooks: &mut Hooks) {
        hooks.octal_dtr_enable = match self {
            Self::S28hxT => Some(OctalDtrEnable::Cypress),
            Self::Mt35xu512aba => Some(OctalDtrEnable::Micron),
            Self::MacronixOctal => Some(OctalDtrEnable::Macronix),
            _ => hooks.octal_dtr_enable,
        };
    }

    /// Patch parameters after all SFDP tables were parsed
    ///
    /// Runs even when SFDP was absent or failed.
    pub fn post_sfdp(&self, params: &mut FlashParameters) {
        match self {
            Self::S25hxT => {
                // READ_FAST_4B needs mode cycles
                if let Some(slot) = Hwcaps::READ_FAST.read_slot() {
                    params.reads[slot].mode_clocks = 8;
                }
                params.hwcaps.remove(Hwcaps::PP_1_1_4);
                params.quad_enable = Some(QuadEnable::SpansionVolatile);
            }
            Self::S28hxT => {
                // Early parts report the 8D read opcode as zero
                if let Some(slot) = Hwcaps::READ_8_8_8_DTR.read_slot() {
                    if params.reads[slot].opcode == 0 {
                        params.reads[slot].opcode = opcodes::CYPRESS_RD_FAST;
                    }
                }
                params.set_pp(
                    Hwcaps::PP_8_8_8_DTR,
                    PpCommand::new(opcodes::PP_4B, SpiProtocol::P8_8_8_DTR),
                );
                params.set_pp(Hwcaps::PP, PpCommand::new(opcodes::PP_4B, SpiProtocol::P1_1_1));
                params.rdsr_addr_nbytes = 4;
            }
            Self::Mt35xu512aba => {
                params.set_read(
                    Hwcaps::READ_8_8_8_DTR,
                    ReadCommand::new(0, 20, opcodes::MT_DTR_RD, SpiProtocol::P8_8_8_DTR),
                );
                params.set_pp(
                    Hwcaps::PP_8_8_8_DTR,
                    PpCommand::new(opcodes::PP, SpiProtocol::P8_8_8_DTR),
                );
                params.cmd_ext = CmdExtension::Repeat;
                params.rdsr_dummy = 8;
                params.rdsr_addr_nbytes = 0;
                // The BFPT QER field holds a reserved value on this part
                params.quad_enable = Some(QuadEnable::NotRequired);
            }
            Self::MacronixOctal => {
                if params.hwcaps.contains(Hwcaps::READ_8_8_8_DTR) {
                    params.set_pp(
                        Hwcaps::PP_8_8_8_DTR,
                        PpCommand::new(opcodes::PP, SpiProtocol::P8_8_8_DTR),
                    );
                }
            }
            Self::None | Self::S25fl256lBar => {}
        }
    }
}

#[maybe_async(AFIT)]
impl Fixups {
    /// Patch parameters right after the BFPT was decoded
    ///
    /// May talk to the chip to read volatile configuration.
    pub async fn post_bfpt<M: SpiMaster + ?Sized>(
        &self,
        master: &mut M,
        entry: &CatalogEntry,
        bfpt: &Bfpt,
        params: &mut FlashParameters,
    ) -> Result<()> {
        match self {
            Self::S25hxT => {
                params.erase = Some(EraseSetting::new(opcodes::SE_4B, entry.sector_size));

                // Registers of the upper dies sit above 16 MiB
                if params.size > DIE_SIZE {
                    if bfpt.dword(16) & BFPT_DWORD16_EX4B_PWRCYC != 0 {
                        spi25::write_reg(master, &CmdFormat::default(), opcodes::EN4B, &[]).await?;
                    }
                    params.addr_mode_nbytes = 4;
                }

                // 512 byte pages only when every die is configured for them
                let width = reg_width(params.addr_mode_nbytes)?;
                params.page_size = 512;
                let mut die = 0;
                while die < params.size {
                    let addr = die_reg(die, opcodes::SPANSION_CFR3V)?;
                    let cfr3v = spi25::read_any_reg(master, width, addr, 0).await?;
                    if cfr3v & opcodes::CFR3V_PGMBUF == 0 {
                        params.page_size = 256;
                        break;
                    }
                    die += DIE_SIZE;
                }
                Ok(())
            }
            Self::S28hxT => {
                let cfr3v = spi25::read_any_reg(
                    master,
                    AddressWidth::ThreeByte,
                    opcodes::SPANSION_CFR3V,
                    0,
                )
                .await?;
                params.page_size = if cfr3v & opcodes::CFR3V_PGMBUF != 0 {
                    512
                } else {
                    256
                };
                params.erase = Some(EraseSetting::new(opcodes::SE_4B, entry.sector_size));
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::find_by_name;

    #[test]
    fn test_detect() {
        let config = NorConfig::default();
        let bar = NorConfig {
            bank_register: true,
            ..NorConfig::default()
        };
        let pick = |name: &str, config: &NorConfig| Fixups::detect(find_by_name(name).unwrap(), config);

        assert_eq!(pick("s25hs512t", &config), Fixups::S25hxT);
        assert_eq!(pick("s25hl02gt", &config), Fixups::S25hxT);
        assert_eq!(pick("s28hs512t", &config), Fixups::S28hxT);
        assert_eq!(pick("mt35xu512aba", &config), Fixups::Mt35xu512aba);
        assert_eq!(pick("mx66lm1g45g", &config), Fixups::MacronixOctal);
        assert_eq!(pick("s25fl256l", &config), Fixups::None);
        assert_eq!(pick("s25fl256l", &bar), Fixups::S25fl256lBar);
        assert_eq!(pick("w25q128fv", &config), Fixups::None);
    }

    #[test]
    fn test_default_init_octal_hooks() {
        let mut hooks = Hooks::default();
        Fixups::S28hxT.default_init(&mut hooks);
        assert_eq!(hooks.octal_dtr_enable, Some(OctalDtrEnable::Cypress));

        let mut hooks = Hooks::default();
        Fixups::None.default_init(&mut hooks);
        assert_eq!(hooks, Hooks::default());
    }

    #[test]
    fn test_non_uniform_erase_steps() {
        let size = 64 * 1024 * 1024;
        let erase = EraseSetting::new(opcodes::SE_4B, 256 * 1024);
        let hook = EraseHook::NonUniform {
            opcode_4k: opcodes::BE_4K_4B,
            top: 0,
            bottom: 128 * 1024,
        };

        assert_eq!(hook.step(0, size, erase), EraseSetting::new(0x21, 4096));
        assert_eq!(hook.step(124 * 1024, size, erase), EraseSetting::new(0x21, 4096));
        assert_eq!(
            hook.step(128 * 1024, size, erase),
            EraseSetting::new(0xDC, 128 * 1024)
        );
        assert_eq!(hook.step(256 * 1024, size, erase), erase);
        assert_eq!(hook.step(size - 256 * 1024, size, erase), erase);

        // The 4 KiB steps plus the remainder tile exactly one sector
        let mut addr = 0;
        while addr < 256 * 1024 {
            addr += hook.step(addr, size, erase).size as u64;
        }
        assert_eq!(addr, 256 * 1024);
    }

    #[test]
    fn test_top_overlay() {
        let size = 16 * 1024 * 1024;
        let erase = EraseSetting::new(opcodes::SE, 64 * 1024);
        let hook = EraseHook::NonUniform {
            opcode_4k: opcodes::BE_4K,
            top: 32 * 1024,
            bottom: 0,
        };
        assert_eq!(
            hook.step(size - 64 * 1024, size, erase),
            EraseSetting::new(opcodes::SE, 32 * 1024)
        );
        assert_eq!(
            hook.step(size - 4096, size, erase),
            EraseSetting::new(opcodes::BE_4K, 4096)
        );
        assert_eq!(EraseHook::Uniform.step(0, size, erase), erase);
    }

    #[test]
    fn test_post_sfdp_patches() {
        let config = NorConfig::default();

        let mut params = FlashParameters::from_catalog(find_by_name("s28hs512t").unwrap(), &config);
        Fixups::S28hxT.post_sfdp(&mut params);
        assert_eq!(params.read(Hwcaps::READ_8_8_8_DTR).unwrap().opcode, 0x0B);
        assert!(params.hwcaps.contains(Hwcaps::PP_8_8_8_DTR));
        assert_eq!(params.pp(Hwcaps::PP).unwrap().opcode, opcodes::PP_4B);
        assert_eq!(params.rdsr_addr_nbytes, 4);

        let mut params = FlashParameters::default();
        params.set_read(
            Hwcaps::READ_8_8_8_DTR,
            ReadCommand::new(0, 20, 0, SpiProtocol::P8_8_8_DTR),
        );
        Fixups::S28hxT.post_sfdp(&mut params);
        assert_eq!(
            params.read(Hwcaps::READ_8_8_8_DTR).unwrap().opcode,
            opcodes::CYPRESS_RD_FAST
        );

        let mut params = FlashParameters::from_catalog(find_by_name("mt35xu512aba").unwrap(), &config);
        Fixups::Mt35xu512aba.post_sfdp(&mut params);
        assert_eq!(params.read(Hwcaps::READ_8_8_8_DTR).unwrap().opcode, 0xFD);
        assert_eq!(params.cmd_ext, CmdExtension::Repeat);
        assert_eq!(params.rdsr_dummy, 8);
        assert_eq!(params.quad_enable, Some(QuadEnable::NotRequired));

        let mut params = FlashParameters::from_catalog(find_by_name("s25hs512t").unwrap(), &config);
        Fixups::S25hxT.post_sfdp(&mut params);
        assert!(!params.hwcaps.contains(Hwcaps::PP_1_1_4));
        assert_eq!(params.read(Hwcaps::READ_FAST).unwrap().mode_clocks, 8);
        assert_eq!(params.quad_enable, Some(QuadEnable::SpansionVolatile));

        let mut params = FlashParameters::from_catalog(find_by_name("mx25l6405d").unwrap(), &config);
        Fixups::MacronixOctal.post_sfdp(&mut params);
        assert!(!params.hwcaps.contains(Hwcaps::PP_8_8_8_DTR));
    }
}
