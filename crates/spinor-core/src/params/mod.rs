//! Flash parameters
//!
//! `FlashParameters` is what the driver knows about the attached chip
//! before protocol negotiation: geometry, every read and page program
//! setting the chip offers, the quad enable method and the status read
//! shape for octal DTR. It is seeded from the catalog and then refined by
//! SFDP and vendor fixups.

mod hwcaps;

pub use hwcaps::{Hwcaps, PP_SLOTS, READ_SLOTS};

use crate::chip::{manufacturer, CatalogEntry, CatalogFlags};
use crate::config::NorConfig;
use crate::spi::{opcodes, CmdExtension, SpiProtocol};
use bitflags::bitflags;

/// Maximum size of a raw vendor SFDP table kept around
pub const VENDOR_TABLE_MAX: usize = 256;

/// Settings of one read mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadCommand {
    /// Mode clock cycles following the address
    pub mode_clocks: u8,
    /// Wait states following the mode clocks
    pub wait_states: u8,
    /// Read opcode
    pub opcode: u8,
    /// Wire protocol
    pub proto: SpiProtocol,
}

impl ReadCommand {
    /// Create a read setting
    pub const fn new(mode_clocks: u8, wait_states: u8, opcode: u8, proto: SpiProtocol) -> Self {
        Self {
            mode_clocks,
            wait_states,
            opcode,
            proto,
        }
    }

    /// Total dummy cycles between address and data
    pub const fn dummy_cycles(&self) -> u8 {
        self.mode_clocks + self.wait_states
    }
}

/// Settings of one page program mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PpCommand {
    /// Program opcode
    pub opcode: u8,
    /// Wire protocol
    pub proto: SpiProtocol,
}

impl PpCommand {
    /// Create a page program setting
    pub const fn new(opcode: u8, proto: SpiProtocol) -> Self {
        Self { opcode, proto }
    }
}

/// One erase opcode and the region it clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseSetting {
    /// Erase opcode
    pub opcode: u8,
    /// Bytes erased by one command
    pub size: u32,
}

impl EraseSetting {
    /// Create an erase setting
    pub const fn new(opcode: u8, size: u32) -> Self {
        Self { opcode, size }
    }
}

/// How the quad enable bit is set before a 4-line transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadEnable {
    /// The chip needs no quad enable bit
    NotRequired,
    /// Bit 6 of the status register
    Macronix,
    /// Bit 1 of the configuration register, read back with 0x35
    SpansionReadCr,
    /// Bit 1 of the configuration register, which cannot be read
    SpansionNoReadCr,
    /// Bit 7 of status register 2 (0x3F / 0x3E)
    Sr2Bit7,
    /// Bit 1 of the volatile CFR1V of every die
    SpansionVolatile,
}

bitflags! {
    /// Facts learned while discovering parameters
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// The chip understands the 0x66 / 0x99 reset pair
        const SOFT_RESET = 1 << 0;
        /// Octal DTR can be entered through a volatile register
        const IO_MODE_EN_VOLATILE = 1 << 1;
    }
}

/// Parameters of the attached chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashParameters {
    /// Density in bytes
    pub size: u64,
    /// Page program buffer size in bytes
    pub page_size: u32,
    /// Read and page program modes the chip offers
    pub hwcaps: Hwcaps,
    /// Settings per read slot
    pub reads: [ReadCommand; READ_SLOTS],
    /// Settings per page program slot
    pub page_programs: [PpCommand; PP_SLOTS],
    /// Quad enable method; `None` rules out every quad mode
    pub quad_enable: Option<QuadEnable>,
    /// Address width advertised by SFDP, 0 when unknown
    pub addr_width: u8,
    /// Address width of register accesses such as RDAR
    pub addr_mode_nbytes: u8,
    /// Preferred erase, set by SFDP or a fixup
    pub erase: Option<EraseSetting>,
    /// Largest erase the chip advertises
    pub erase_max: Option<EraseSetting>,
    /// Command extension style for octal DTR
    pub cmd_ext: CmdExtension,
    /// Dummy cycles of a status read in octal DTR
    pub rdsr_dummy: u8,
    /// Address bytes of a status read in octal DTR
    pub rdsr_addr_nbytes: u8,
    /// Discovered facts
    pub flags: ParamFlags,
    /// Raw SST vendor table, if the chip has one
    pub vendor_table: Option<heapless::Vec<u8, VENDOR_TABLE_MAX>>,
}

impl Default for FlashParameters {
    fn default() -> Self {
        Self {
            size: 0,
            page_size: 256,
            hwcaps: Hwcaps::empty(),
            reads: [ReadCommand::default(); READ_SLOTS],
            page_programs: [PpCommand::default(); PP_SLOTS],
            quad_enable: None,
            addr_width: 0,
            addr_mode_nbytes: 3,
            erase: None,
            erase_max: None,
            cmd_ext: CmdExtension::None,
            rdsr_dummy: 0,
            rdsr_addr_nbytes: 0,
            flags: ParamFlags::empty(),
            vendor_table: None,
        }
    }
}

impl FlashParameters {
    /// Legacy parameters from a catalog entry
    ///
    /// These are used as-is when the chip has no usable SFDP.
    pub fn from_catalog(entry: &CatalogEntry, config: &NorConfig) -> Self {
        let flags = entry.flags;
        let mut params = Self {
            size: entry.total_size(),
            page_size: entry.page_size as u32,
            ..Self::default()
        };

        if !flags.contains(CatalogFlags::NO_FR) && config.fast_read {
            params.set_read(
                Hwcaps::READ_FAST,
                ReadCommand::new(0, 8, opcodes::FAST_READ, SpiProtocol::P1_1_1),
            );
        }
        params.set_read(
            Hwcaps::READ,
            ReadCommand::new(0, 0, opcodes::READ, SpiProtocol::P1_1_1),
        );
        if flags.contains(CatalogFlags::DUAL_READ) {
            params.set_read(
                Hwcaps::READ_1_1_2,
                ReadCommand::new(0, 8, opcodes::READ_1_1_2, SpiProtocol::P1_1_2),
            );
        }
        if flags.contains(CatalogFlags::QUAD_READ) {
            params.set_read(
                Hwcaps::READ_1_1_4,
                ReadCommand::new(0, 8, opcodes::READ_1_1_4, SpiProtocol::P1_1_4),
            );
        }
        if flags.contains(CatalogFlags::OCTAL_READ) {
            params.set_read(
                Hwcaps::READ_1_1_8,
                ReadCommand::new(0, 8, opcodes::READ_1_1_8, SpiProtocol::P1_1_8),
            );
        }
        if flags.contains(CatalogFlags::OCTAL_DTR_READ) {
            params.set_read(
                Hwcaps::READ_8_8_8_DTR,
                ReadCommand::new(0, 20, opcodes::FAST_READ, SpiProtocol::P8_8_8_DTR),
            );
        }

        params.set_pp(Hwcaps::PP, PpCommand::new(opcodes::PP, SpiProtocol::P1_1_1));
        // Slot only; fixups that know the chip programs in 8D enable the bit
        if let Some(slot) = Hwcaps::PP_8_8_8_DTR.pp_slot() {
            params.page_programs[slot] = PpCommand::new(opcodes::PP, SpiProtocol::P8_8_8_DTR);
        }
        if flags.contains(CatalogFlags::QUAD_READ) {
            params.set_pp(
                Hwcaps::PP_1_1_4,
                PpCommand::new(opcodes::PP_1_1_4, SpiProtocol::P1_1_4),
            );
        }

        if params.hwcaps.intersects(Hwcaps::QUAD) {
            params.quad_enable = Some(match entry.manufacturer() {
                manufacturer::MACRONIX | manufacturer::ISSI => QuadEnable::Macronix,
                manufacturer::MICRON => QuadEnable::NotRequired,
                _ => QuadEnable::SpansionReadCr,
            });
        }

        params
    }

    /// Enable a read capability with its settings
    pub fn set_read(&mut self, cap: Hwcaps, read: ReadCommand) {
        if let Some(slot) = cap.read_slot() {
            self.hwcaps |= cap;
            self.reads[slot] = read;
        }
    }

    /// Enable a page program capability with its settings
    pub fn set_pp(&mut self, cap: Hwcaps, pp: PpCommand) {
        if let Some(slot) = cap.pp_slot() {
            self.hwcaps |= cap;
            self.page_programs[slot] = pp;
        }
    }

    /// Settings of a read capability
    pub fn read(&self, cap: Hwcaps) -> Option<&ReadCommand> {
        cap.read_slot().map(|slot| &self.reads[slot])
    }

    /// Settings of a page program capability
    pub fn pp(&self, cap: Hwcaps) -> Option<&PpCommand> {
        cap.pp_slot().map(|slot| &self.page_programs[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::find_by_name;

    #[test]
    fn test_legacy_plain_chip() {
        let entry = find_by_name("mx25l6405d").unwrap();
        let params = FlashParameters::from_catalog(entry, &NorConfig::default());
        assert_eq!(params.size, 8 * 1024 * 1024);
        assert_eq!(params.page_size, 256);
        assert_eq!(
            params.hwcaps,
            Hwcaps::READ | Hwcaps::READ_FAST | Hwcaps::PP
        );
        assert_eq!(params.read(Hwcaps::READ_FAST).unwrap().dummy_cycles(), 8);
        assert_eq!(params.quad_enable, None);
        assert_eq!(params.erase, None);
    }

    #[test]
    fn test_legacy_fast_read_disabled() {
        let entry = find_by_name("mx25l6405d").unwrap();
        let config = NorConfig {
            fast_read: false,
            ..NorConfig::default()
        };
        let params = FlashParameters::from_catalog(entry, &config);
        assert!(!params.hwcaps.contains(Hwcaps::READ_FAST));
    }

    #[test]
    fn test_legacy_quad_enable_by_vendor() {
        let config = NorConfig::default();
        let mx = FlashParameters::from_catalog(find_by_name("mx25l25635f").unwrap(), &config);
        assert_eq!(mx.quad_enable, Some(QuadEnable::Macronix));
        assert!(mx.hwcaps.contains(Hwcaps::READ_1_1_2 | Hwcaps::READ_1_1_4 | Hwcaps::PP_1_1_4));
        assert_eq!(mx.pp(Hwcaps::PP_1_1_4).unwrap().opcode, 0x32);

        let micron = FlashParameters::from_catalog(find_by_name("n25q128a13").unwrap(), &config);
        assert_eq!(micron.quad_enable, Some(QuadEnable::NotRequired));

        let span = FlashParameters::from_catalog(find_by_name("s25fl256s1").unwrap(), &config);
        assert_eq!(span.quad_enable, Some(QuadEnable::SpansionReadCr));
    }

    #[test]
    fn test_legacy_octal_dtr() {
        let entry = find_by_name("mx66lm1g45g").unwrap();
        let params = FlashParameters::from_catalog(entry, &NorConfig::default());
        let read = params.read(Hwcaps::READ_8_8_8_DTR).unwrap();
        assert_eq!(read.wait_states, 20);
        assert_eq!(read.proto, SpiProtocol::P8_8_8_DTR);
        assert!(params.hwcaps.contains(Hwcaps::READ_1_1_8));
        assert!(!params.hwcaps.contains(Hwcaps::PP_8_8_8_DTR));
        assert_eq!(
            params.pp(Hwcaps::PP_8_8_8_DTR).unwrap().proto,
            SpiProtocol::P8_8_8_DTR
        );
    }
}
