//! spinor-sim - Simulated SPI NOR flash chip
//!
//! [`SimFlash`] answers SPI NOR commands the way the catalog entry it was
//! built from would: it reports the entry's JEDEC ID, keeps a memory image
//! that programming can only clear bits in, tracks the write enable latch,
//! the status and configuration registers, the bank register and 4-byte
//! address mode, and stays busy for a configurable number of status polls
//! after every program or erase.
//!
//! Time only advances through `delay_us`, so a [`SimClock`] obtained from
//! the chip lets status polling run to its deadline without sleeping.
//!
//! ```ignore
//! use spinor_core::{flash::NorSession, NorConfig};
//! use spinor_sim::{SimConfig, SimFlash};
//!
//! let sim = SimFlash::for_chip("w25q128fv", SimConfig::default()).unwrap();
//! let clock = sim.clock();
//! let mut nor = NorSession::scan(sim, clock, NorConfig::default())?;
//! nor.write(0x1000, b"hello").map_err(|e| e.error)?;
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
mod error;

#[cfg(feature = "std")]
pub use error::{Result, SimError};

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;

use spinor_core::chip::{find_by_name, CatalogEntry, CatalogFlags};
use spinor_core::error::Error;
use spinor_core::spi::{opcodes, AddressWidth, SpiCommand};
use spinor_core::transport::{check_protocol_supported, SpiFeatures, SpiMaster};
use spinor_core::wp::locked_range;
use spinor_core::Clock;

/// Behaviour of the simulated controller and chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Capabilities the controller reports
    pub features: SpiFeatures,
    /// Largest read or write transfer, in bytes
    pub max_transfer: usize,
    /// Status reads that report busy after a program, erase or register write
    pub busy_polls: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            features: SpiFeatures::FOUR_BYTE_ADDR,
            max_transfer: 4096,
            busy_polls: 0,
        }
    }
}

/// Clock driven by the chip's `delay_us`
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now.get()
    }
}

/// Operations that end with the chip busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Busy {
    Idle,
    Polls(usize),
    Stuck,
}

fn is_read(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::READ
            | opcodes::FAST_READ
            | opcodes::READ_1_1_2
            | opcodes::READ_1_2_2
            | opcodes::READ_1_1_4
            | opcodes::READ_1_4_4
            | opcodes::READ_4B
            | opcodes::FAST_READ_4B
            | opcodes::READ_1_1_2_4B
            | opcodes::READ_1_2_2_4B
            | opcodes::READ_1_1_4_4B
            | opcodes::READ_1_4_4_4B
    )
}

fn is_program(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::PP
            | opcodes::PP_4B
            | opcodes::PP_1_1_4
            | opcodes::PP_1_4_4
            | opcodes::PP_1_1_4_4B
            | opcodes::PP_1_4_4_4B
    )
}

/// Size of the block an erase opcode clears
fn erase_block(opcode: u8, sector_size: u32) -> Option<usize> {
    match opcode {
        opcodes::BE_4K | opcodes::BE_4K_4B => Some(4 * 1024),
        opcodes::BE_32K | opcodes::BE_32K_4B => Some(32 * 1024),
        opcodes::SE | opcodes::SE_4B => Some(sector_size as usize),
        _ => None,
    }
}

/// Simulated SPI NOR chip behind a simulated controller
#[derive(Debug)]
pub struct SimFlash {
    entry: &'static CatalogEntry,
    config: SimConfig,
    memory: Vec<u8>,
    sfdp: Vec<u8>,
    sr: u8,
    cr: u8,
    sr2: u8,
    wel: bool,
    four_byte: bool,
    bank: u8,
    busy: Busy,
    stuck: bool,
    aai_addr: Option<usize>,
    counts: BTreeMap<u8, usize>,
    now: Rc<Cell<u64>>,
}

impl SimFlash {
    /// Erased chip modelled on `entry`
    pub fn new(entry: &'static CatalogEntry, config: SimConfig) -> Self {
        Self {
            entry,
            config,
            memory: vec![0xFF; entry.total_size() as usize],
            sfdp: Vec::new(),
            sr: 0,
            cr: 0,
            sr2: 0,
            wel: false,
            four_byte: false,
            bank: 0,
            busy: Busy::Idle,
            stuck: false,
            aai_addr: None,
            counts: BTreeMap::new(),
            now: Rc::new(Cell::new(0)),
        }
    }

    /// Erased chip modelled on the catalog entry called `name`
    pub fn for_chip(name: &str, config: SimConfig) -> Option<Self> {
        find_by_name(name).map(|entry| Self::new(entry, config))
    }

    /// Serve `table` for RDSFDP instead of erased bytes
    pub fn with_sfdp(mut self, table: Vec<u8>) -> Self {
        self.sfdp = table;
        self
    }

    /// Clock sharing this chip's time
    pub fn clock(&self) -> SimClock {
        SimClock {
            now: Rc::clone(&self.now),
        }
    }

    /// Catalog entry the chip answers as
    pub fn entry(&self) -> &'static CatalogEntry {
        self.entry
    }

    /// Memory image
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// Memory image, writable behind the session's back
    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Status register 1, without the busy bit
    pub fn status(&self) -> u8 {
        self.sr | if self.wel { opcodes::SR_WEL } else { 0 }
    }

    /// Bank register
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Whether EN4B was last seen
    pub fn is_four_byte(&self) -> bool {
        self.four_byte
    }

    /// Change the capabilities the controller reports
    pub fn set_features(&mut self, features: SpiFeatures) {
        self.config.features = features;
    }

    /// Keep the chip busy forever once the next operation starts
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck = stuck;
        if !stuck {
            self.busy = Busy::Idle;
        }
    }

    /// Times `opcode` was executed
    pub fn count(&self, opcode: u8) -> usize {
        self.counts.get(&opcode).copied().unwrap_or(0)
    }

    /// Forget executed command counts
    pub fn reset_counts(&mut self) {
        self.counts.clear();
    }

    fn start_busy(&mut self) {
        self.busy = if self.stuck {
            Busy::Stuck
        } else if self.config.busy_polls > 0 {
            Busy::Polls(self.config.busy_polls)
        } else {
            Busy::Idle
        };
    }

    /// WIP bit for one status read
    fn poll_busy(&mut self) -> u8 {
        match self.busy {
            Busy::Idle => 0,
            Busy::Stuck => opcodes::SR_WIP,
            Busy::Polls(n) => {
                self.busy = if n > 1 { Busy::Polls(n - 1) } else { Busy::Idle };
                opcodes::SR_WIP
            }
        }
    }

    /// Array offset an addressed command hits
    ///
    /// Three-byte addresses take their top byte from the bank register,
    /// and addresses past the end wrap like on the real part.
    fn offset(&self, cmd: &SpiCommand<'_>) -> usize {
        let addr = cmd.address.unwrap_or(0) as u64;
        let addr = match cmd.address_width {
            AddressWidth::FourByte => addr,
            _ => (addr & 0xFF_FFFF) | (((self.bank & 0x7F) as u64) << 24),
        };
        (addr % self.memory.len() as u64) as usize
    }

    /// Whether the block protect bits cover `len` bytes at `at`
    fn protected(&self, at: usize, len: usize) -> bool {
        if !self.entry.flags.contains(CatalogFlags::HAS_LOCK) {
            return false;
        }
        let has_tb = self.entry.flags.contains(CatalogFlags::HAS_TB);
        let locked = locked_range(self.sr, self.memory.len() as u64, has_tb);
        let (start, end) = (at as u64, (at + len) as u64);
        !locked.is_empty() && start < locked.end() && end > locked.ofs
    }

    /// Consume the write enable latch for a modifying command
    fn take_wel(&mut self, opcode: u8) -> bool {
        if !self.wel {
            log::warn!("opcode 0x{:02x} without write enable ignored", opcode);
            return false;
        }
        self.wel = false;
        true
    }

    fn program(&mut self, at: usize, data: &[u8]) {
        if self.protected(at, data.len()) {
            log::warn!("program at 0x{:x} hits a protected region", at);
            return;
        }
        let len = self.memory.len();
        for (i, b) in data.iter().enumerate() {
            self.memory[(at + i) % len] &= *b;
        }
        self.start_busy();
    }

    fn erase(&mut self, at: usize, block: usize) {
        let start = at - at % block;
        let end = (start + block).min(self.memory.len());
        if self.protected(start, end - start) {
            log::warn!("erase at 0x{:x} hits a protected region", start);
            return;
        }
        self.memory[start..end].fill(0xFF);
        self.start_busy();
    }

    fn write_status(&mut self, data: &[u8]) {
        if let Some(&sr) = data.first() {
            self.sr = sr & !(opcodes::SR_WIP | opcodes::SR_WEL);
        }
        if let Some(&cr) = data.get(1) {
            self.cr = cr;
        }
        self.start_busy();
    }

    fn run(&mut self, cmd: &mut SpiCommand<'_>) -> spinor_core::Result<()> {
        let first = cmd.write_data.first().copied().unwrap_or(0);
        match cmd.opcode {
            opcodes::RDID => {
                let id = self.entry.id_bytes();
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = id.get(i).copied().unwrap_or(0xFF);
                }
            }
            opcodes::RDSFDP => {
                let at = cmd.address.unwrap_or(0) as usize;
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = self.sfdp.get(at + i).copied().unwrap_or(0xFF);
                }
            }
            opcodes::RDSR => {
                let value = self.status() | self.poll_busy();
                cmd.read_buf.fill(value);
            }
            opcodes::RDCR => cmd.read_buf.fill(self.cr),
            opcodes::RDSR2 => cmd.read_buf.fill(self.sr2),
            opcodes::WRSR => {
                if self.take_wel(cmd.opcode) {
                    self.write_status(cmd.write_data);
                }
            }
            opcodes::WRSR2 if cmd.address.is_none() => {
                if self.take_wel(cmd.opcode) {
                    self.sr2 = first;
                    self.start_busy();
                }
            }
            opcodes::WREN => self.wel = true,
            opcodes::WRDI => {
                self.wel = false;
                self.aai_addr = None;
            }
            opcodes::EN4B => self.four_byte = true,
            opcodes::EX4B => self.four_byte = false,
            opcodes::BRRD | opcodes::RDEAR => cmd.read_buf.fill(self.bank),
            opcodes::BRWR | opcodes::WREAR => self.bank = first,
            opcodes::SRSTEN => {}
            opcodes::SRST => {
                self.four_byte = false;
                self.bank = 0;
                self.wel = false;
            }
            opcodes::CHIP_ERASE => {
                if self.take_wel(cmd.opcode) {
                    let len = self.memory.len();
                    self.erase(0, len);
                }
            }
            opcodes::AAI_WP => {
                let at = match cmd.address {
                    Some(_) => {
                        if !self.take_wel(cmd.opcode) {
                            return Ok(());
                        }
                        self.offset(cmd)
                    }
                    None => self.aai_addr.ok_or(Error::TransferFailed)?,
                };
                self.program(at, cmd.write_data);
                self.aai_addr = Some(at + 2);
                // The latch stays set until WRDI ends the sequence
                self.wel = true;
            }
            op if is_read(op) => {
                let at = self.offset(cmd);
                let len = self.memory.len();
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = self.memory[(at + i) % len];
                }
            }
            op if is_program(op) => {
                if self.take_wel(op) {
                    let at = self.offset(cmd);
                    self.program(at, cmd.write_data);
                }
            }
            op => match erase_block(op, self.entry.sector_size) {
                Some(block) => {
                    if self.take_wel(op) {
                        let at = self.offset(cmd);
                        self.erase(at, block);
                    }
                }
                None => {
                    log::debug!("unsupported opcode 0x{:02x}", op);
                    return Err(Error::OpcodeNotSupported);
                }
            },
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl SimFlash {
    /// Chip called `name` holding the image stored at `path`
    pub fn from_image(
        name: &str,
        config: SimConfig,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let mut flash = Self::for_chip(name, config)
            .ok_or_else(|| SimError::UnknownChip(name.to_string()))?;
        flash.load_image(path)?;
        Ok(flash)
    }

    /// Replace the memory with the file at `path`
    ///
    /// The file must be exactly as large as the chip.
    pub fn load_image(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        if data.len() != self.memory.len() {
            return Err(SimError::ImageSize {
                expected: self.memory.len(),
                actual: data.len(),
            });
        }
        log::debug!("loaded {} bytes from {}", data.len(), path.display());
        self.memory = data;
        Ok(())
    }

    /// Store the memory in the file at `path`
    pub fn save_image(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.memory)?;
        log::debug!("saved {} bytes to {}", self.memory.len(), path.display());
        Ok(())
    }
}

impl SpiMaster for SimFlash {
    fn features(&self) -> SpiFeatures {
        self.config.features
    }

    fn max_read_len(&self) -> usize {
        self.config.max_transfer
    }

    fn max_write_len(&self) -> usize {
        self.config.max_transfer
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> spinor_core::Result<()> {
        check_protocol_supported(cmd.proto, self.config.features)?;
        if cmd.address_width == AddressWidth::FourByte
            && !self.config.features.contains(SpiFeatures::FOUR_BYTE_ADDR)
        {
            return Err(Error::ProtocolNotSupported);
        }
        if cmd.read_buf.len() > self.config.max_transfer
            || cmd.write_data.len() > self.config.max_transfer
        {
            return Err(Error::InvalidParameter);
        }

        *self.counts.entry(cmd.opcode).or_insert(0) += 1;
        self.run(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        self.now.set(self.now.get() + us as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinor_core::protocol::spi25;
    use spinor_core::spi::CmdFormat;
    use spinor_core::spi::SpiProtocol;

    fn sim(name: &str) -> SimFlash {
        SimFlash::for_chip(name, SimConfig::default()).unwrap()
    }

    fn fmt() -> CmdFormat {
        CmdFormat::new(SpiProtocol::P1_1_1)
    }

    #[test]
    fn test_read_jedec_id() {
        let mut flash = sim("w25q128fv");
        let mut id = [0u8; 6];
        let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut id);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(id, [0xEF, 0x40, 0x18, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_program_needs_write_enable() {
        let mut flash = sim("w25q128fv");
        let data = [0x12, 0x34, 0x56, 0x78];

        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0x1000, &data);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(&flash.memory()[0x1000..0x1004], &[0xFF; 4]);

        spi25::write_enable(&mut flash, &fmt()).unwrap();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0x1000, &data);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(&flash.memory()[0x1000..0x1004], &data);
        assert_eq!(flash.status() & opcodes::SR_WEL, 0);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut flash = sim("w25q128fv");
        flash.memory_mut()[0] = 0xF0;
        spi25::write_enable(&mut flash, &fmt()).unwrap();
        let mut cmd = SpiCommand::write(opcodes::PP, AddressWidth::ThreeByte, 0, &[0x3C]);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(flash.memory()[0], 0x30);
    }

    #[test]
    fn test_erase_aligns_down() {
        let mut flash = sim("w25q128fv");
        flash.memory_mut()[..0x2000].fill(0);
        spi25::write_enable(&mut flash, &fmt()).unwrap();
        let mut cmd = SpiCommand::erase(opcodes::BE_4K, AddressWidth::ThreeByte, 0x1234);
        flash.execute(&mut cmd).unwrap();
        assert!(flash.memory()[0x1000..0x2000].iter().all(|&b| b == 0xFF));
        assert!(flash.memory()[..0x1000].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_busy_polls() {
        let config = SimConfig {
            busy_polls: 2,
            ..SimConfig::default()
        };
        let mut flash = SimFlash::for_chip("w25q128fv", config).unwrap();
        spi25::write_enable(&mut flash, &fmt()).unwrap();
        let mut cmd = SpiCommand::erase(opcodes::BE_4K, AddressWidth::ThreeByte, 0);
        flash.execute(&mut cmd).unwrap();

        let wip: Vec<bool> = (0..3)
            .map(|_| spi25::read_sr(&mut flash, &fmt()).unwrap() & opcodes::SR_WIP != 0)
            .collect();
        assert_eq!(wip, [true, true, false]);
    }

    #[test]
    fn test_bank_register_selects_upper_half() {
        let mut flash = sim("mx25l25635f");
        flash.memory_mut()[0x100_0010] = 0xA5;

        let mut cmd = SpiCommand::write_reg(opcodes::WREAR, &[1]);
        flash.execute(&mut cmd).unwrap();
        let mut buf = [0u8; 1];
        let mut cmd = SpiCommand::read(opcodes::READ, AddressWidth::ThreeByte, 0x10, &mut buf);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(buf, [0xA5]);
    }

    #[test]
    fn test_protocol_and_width_checks() {
        let mut flash = SimFlash::for_chip(
            "mx25l25635f",
            SimConfig {
                features: SpiFeatures::empty(),
                ..SimConfig::default()
            },
        )
        .unwrap();
        let mut buf = [0u8; 4];
        let mut cmd = SpiCommand::read(opcodes::READ_4B, AddressWidth::FourByte, 0, &mut buf);
        assert_eq!(flash.execute(&mut cmd), Err(Error::ProtocolNotSupported));

        let mut cmd = SpiCommand::read(opcodes::READ_1_1_4, AddressWidth::ThreeByte, 0, &mut buf)
            .with_proto(SpiProtocol::P1_1_4);
        assert_eq!(flash.execute(&mut cmd), Err(Error::ProtocolNotSupported));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut flash = sim("w25q128fv");
        let mut cmd = SpiCommand::simple(0x9B);
        assert_eq!(flash.execute(&mut cmd), Err(Error::OpcodeNotSupported));
    }
}
