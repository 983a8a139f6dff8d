//! NOR session
//!
//! A [`NorSession`] is one identified chip bound to its transport. It is
//! created by [`NorSession::scan`], which reads the JEDEC ID, looks the chip
//! up in the catalog, refines its parameters from SFDP and vendor fixups,
//! negotiates wire protocols with the controller and brings the chip into
//! its operating mode. After that the session offers byte-addressed
//! read, program and erase, plus the block protection operations in
//! [`crate::wp`].
//!
//! Every public operation claims the bus before the first command and
//! releases it afterwards, on error paths too. Multi-chunk operations
//! report how far they got through [`PartialError`](crate::PartialError).

mod addressing;
mod octal;
mod ops;
mod quad;
mod ready;
mod scan;
mod sst;

use crate::chip::CatalogEntry;
use crate::config::NorConfig;
use crate::fixups::{Fixups, Hooks};
use crate::params::{EraseSetting, PpCommand, ReadCommand, VENDOR_TABLE_MAX};
use crate::spi::{AddressWidth, CmdFormat, SpiProtocol};
use crate::wp::LockScheme;
use bitflags::bitflags;

pub use addressing::BankRegister;

/// Bank size of the legacy bank address register
pub const BANK_SIZE: u64 = 16 * 1024 * 1024;

bitflags! {
    /// Behaviors fixed at scan time
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SessionFlags: u16 {
        /// Readiness also needs the flag status register
        const USE_FSR = 1 << 0;
        /// Error bits in the status register are cleared with CLSR
        const USE_CLSR = 1 << 1;
        /// The status register has a top/bottom protection bit
        const HAS_TB = 1 << 2;
        /// SST byte / AAI word programming
        const SST_WRITE = 1 << 3;
        /// Whole-chip erase must go sector by sector
        const NO_CHIP_ERASE = 1 << 4;
        /// The chip cannot be erased
        const NO_ERASE = 1 << 5;
        /// The chip understands the 0x66 / 0x99 reset pair
        const SOFT_RESET = 1 << 6;
        /// The reset line is not wired
        const BROKEN_RESET = 1 << 7;
        /// Octal DTR can be entered through a volatile register
        const IO_MODE_EN_VOLATILE = 1 << 8;
        /// Dedicated 4-byte address opcodes are in use
        const FOUR_B_OPCODES = 1 << 9;
    }
}

/// One identified flash chip on its transport
///
/// `M` is the SPI controller, `C` the clock used for polling deadlines.
pub struct NorSession<M, C> {
    pub(crate) master: M,
    pub(crate) clock: C,
    pub(crate) config: NorConfig,
    pub(crate) entry: &'static CatalogEntry,
    pub(crate) fixups: Fixups,
    pub(crate) hooks: Hooks,
    pub(crate) flags: SessionFlags,
    pub(crate) size: u64,
    pub(crate) page_size: u32,
    pub(crate) erase: EraseSetting,
    pub(crate) read: ReadCommand,
    pub(crate) read_dummy: u8,
    pub(crate) program: PpCommand,
    pub(crate) reg_format: CmdFormat,
    pub(crate) addr_width: AddressWidth,
    pub(crate) addr_mode_nbytes: u8,
    pub(crate) bank: Option<BankRegister>,
    pub(crate) lock: Option<LockScheme>,
    pub(crate) vendor_table: Option<heapless::Vec<u8, VENDOR_TABLE_MAX>>,
}

impl<M, C> NorSession<M, C> {
    /// Catalog name of the chip
    pub fn name(&self) -> &'static str {
        self.entry.name
    }

    /// Catalog entry the chip matched
    pub fn entry(&self) -> &'static CatalogEntry {
        self.entry
    }

    /// Total size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Page program buffer size in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Erase granularity in bytes
    pub fn erase_size(&self) -> u32 {
        self.erase.size
    }

    /// Negotiated erase command
    pub fn erase_command(&self) -> EraseSetting {
        self.erase
    }

    /// Negotiated read command
    pub fn read_command(&self) -> ReadCommand {
        self.read
    }

    /// Dummy cycles sent with every read
    pub fn read_dummy(&self) -> u8 {
        self.read_dummy
    }

    /// Negotiated page program command
    pub fn program_command(&self) -> PpCommand {
        self.program
    }

    /// Protocol used for register accesses
    pub fn reg_proto(&self) -> SpiProtocol {
        self.reg_format.proto
    }

    /// Address width of array accesses
    pub fn addr_width(&self) -> AddressWidth {
        self.addr_width
    }

    /// Behaviors fixed at scan time
    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Vendor family fixups in effect
    pub fn fixups(&self) -> Fixups {
        self.fixups
    }

    /// Hooks installed by the fixups
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Legacy bank register state, when that path is active
    pub fn bank_register(&self) -> Option<&BankRegister> {
        self.bank.as_ref()
    }

    /// Block protection scheme of the chip
    pub fn lock_scheme(&self) -> Option<LockScheme> {
        self.lock
    }

    /// Raw SST vendor SFDP table, if the chip has one
    pub fn vendor_table(&self) -> Option<&[u8]> {
        self.vendor_table.as_deref()
    }

    /// Session configuration
    pub fn config(&self) -> &NorConfig {
        &self.config
    }

    /// The underlying transport
    pub fn master(&self) -> &M {
        &self.master
    }

    /// The underlying transport, mutably
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Register format with another protocol, for array accesses
    pub(crate) fn op_format(&self, proto: SpiProtocol) -> CmdFormat {
        self.reg_format.with_proto(proto)
    }

    pub(crate) fn check_range(&self, addr: u64, len: u64) -> crate::Result<()> {
        match addr.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(crate::Error::AddressOutOfBounds),
        }
    }
}

impl<M, C> core::fmt::Debug for NorSession<M, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NorSession")
            .field("name", &self.entry.name)
            .field("size", &self.size)
            .field("page_size", &self.page_size)
            .field("erase", &self.erase)
            .field("read", &self.read)
            .field("program", &self.program)
            .field("addr_width", &self.addr_width)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(all(test, feature = "is_sync", feature = "std"))]
pub(crate) mod mock;
