//! Recording chip model for session tests
//!
//! Behaves like the catalog entry it was built from: answers RDID with the
//! entry's ID, has no SFDP, keeps status, configuration, bank and
//! any-address registers, and programs and erases a memory image. Every
//! command is logged.

use super::NorSession;
use crate::chip::{CatalogEntry, CatalogFlags};
use crate::config::NorConfig;
use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, SpiCommand, SpiProtocol};
use crate::time::Clock;
use crate::transport::{SpiFeatures, SpiMaster};
use maybe_async::maybe_async;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::vec;
use std::vec::Vec;

/// One logged command
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cmd {
    pub opcode: u8,
    pub ext: Option<u8>,
    pub addr: Option<u32>,
    pub width: AddressWidth,
    pub proto: SpiProtocol,
    pub dummy: u8,
    pub write: Vec<u8>,
    pub read_len: usize,
}

pub(crate) struct MockChip {
    pub id: [u8; 6],
    pub features: SpiFeatures,
    pub max_read: usize,
    pub max_write: usize,
    /// RDSR reports busy this many more times
    pub busy_polls: usize,
    pub fsr: u8,
    /// WRSR and WRSR2 are ignored when false
    pub sr_writable: bool,
    /// Fail the command with this opcode after letting this many through
    pub fail: Option<(u8, usize)>,
    sector_size: u32,
    memory: Vec<u8>,
    sr: u8,
    cr: u8,
    sr2: u8,
    four_byte: bool,
    bank: u8,
    regs: BTreeMap<u32, u8>,
    bpr: Vec<u8>,
    aai_addr: Option<u64>,
    log: Vec<Cmd>,
    claims: usize,
    releases: usize,
    now: Rc<Cell<u64>>,
}

/// Clock advanced by the chip's `delay_us`
pub(crate) struct MockClock {
    now: Rc<Cell<u64>>,
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now.get()
    }
}

/// Scan `chip` with a clock driven by its delays
pub(crate) fn scan_mock(chip: MockChip, config: NorConfig) -> Result<NorSession<MockChip, MockClock>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = MockClock {
        now: Rc::clone(&chip.now),
    };
    NorSession::scan(chip, clock, config)
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
            | opcodes::READ_1_1_8
            | opcodes::READ_1_8_8
            | opcodes::READ_4B
            | opcodes::FAST_READ_4B
            | opcodes::READ_1_1_2_4B
            | opcodes::READ_1_2_2_4B
            | opcodes::READ_1_1_4_4B
            | opcodes::READ_1_4_4_4B
            | opcodes::READ_1_1_8_4B
            | opcodes::READ_1_8_8_4B
            | opcodes::MT_DTR_RD
            | opcodes::CYPRESS_RD_FAST
    )
}

fn is_program(opcode: u8) -> bool {
    matches!(
        opcode,
        opcodes::PP
            | opcodes::PP_4B
            | opcodes::PP_1_1_4
            | opcodes::PP_1_4_4
            | opcodes::PP_1_1_8
            | opcodes::PP_1_8_8
            | opcodes::PP_1_1_4_4B
            | opcodes::PP_1_4_4_4B
            | opcodes::PP_1_1_8_4B
            | opcodes::PP_1_8_8_4B
    )
}

impl MockChip {
    pub(crate) fn new(entry: &'static CatalogEntry, features: SpiFeatures) -> Self {
        let mut id = [0xFF; 6];
        id[..entry.id_bytes().len()].copy_from_slice(entry.id_bytes());
        let size = entry.total_size();
        let bpr = if entry.flags.contains(CatalogFlags::HAS_SST26LOCK) {
            vec![0; 2 + (size / (64 * 1024) / 8) as usize]
        } else {
            Vec::new()
        };

        Self {
            id,
            features,
            max_read: 4096,
            max_write: 4096,
            busy_polls: 0,
            fsr: opcodes::FSR_READY,
            sr_writable: true,
            fail: None,
            sector_size: entry.sector_size,
            memory: vec![0xFF; size as usize],
            sr: 0,
            cr: 0,
            sr2: 0,
            four_byte: false,
            bank: 0,
            regs: BTreeMap::new(),
            bpr,
            aai_addr: None,
            log: Vec::new(),
            claims: 0,
            releases: 0,
            now: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    pub(crate) fn log(&self) -> &[Cmd] {
        &self.log
    }

    pub(crate) fn clear_log(&mut self) {
        self.log.clear();
    }

    pub(crate) fn commands(&self, opcode: u8) -> Vec<Cmd> {
        self.log.iter().filter(|c| c.opcode == opcode).cloned().collect()
    }

    pub(crate) fn sr(&self) -> u8 {
        self.sr
    }

    pub(crate) fn cr(&self) -> u8 {
        self.cr
    }

    pub(crate) fn bpr(&self) -> &[u8] {
        &self.bpr
    }

    pub(crate) fn claims(&self) -> usize {
        self.claims
    }

    pub(crate) fn releases(&self) -> usize {
        self.releases
    }

    /// Array offset of an addressed command
    fn offset(&self, cmd: &SpiCommand<'_>) -> usize {
        let addr = cmd.address.unwrap_or(0) as u64;
        let addr = if cmd.address_width == AddressWidth::FourByte {
            addr
        } else {
            (addr & 0xFF_FFFF) | (((self.bank & 0x7F) as u64) << 24)
        };
        (addr % self.memory.len() as u64) as usize
    }

    fn read_array(&self, at: usize, buf: &mut [u8]) {
        let len = self.memory.len();
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.memory[(at + i) % len];
        }
    }

    fn program_array(&mut self, at: usize, data: &[u8]) {
        let len = self.memory.len();
        for (i, b) in data.iter().enumerate() {
            self.memory[(at + i) % len] &= *b;
        }
    }

    fn erase_array(&mut self, at: usize, size: usize) {
        let start = at - at % size;
        let end = (start + size).min(self.memory.len());
        self.memory[start..end].fill(0xFF);
    }
}

#[maybe_async(AFIT)]
impl SpiMaster for MockChip {
    fn features(&self) -> SpiFeatures {
        self.features
    }

    fn max_read_len(&self) -> usize {
        self.max_read
    }

    fn max_write_len(&self) -> usize {
        self.max_write
    }

    async fn claim_bus(&mut self) -> Result<()> {
        self.claims += 1;
        Ok(())
    }

    async fn release_bus(&mut self) -> Result<()> {
        self.releases += 1;
        Ok(())
    }

    async fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        self.log.push(Cmd {
            opcode: cmd.opcode,
            ext: cmd.opcode_ext,
            addr: cmd.address,
            width: cmd.address_width,
            proto: cmd.proto,
            dummy: cmd.dummy_cycles,
            write: cmd.write_data.to_vec(),
            read_len: cmd.read_buf.len(),
        });

        if let Some((opcode, skip)) = self.fail {
            if opcode == cmd.opcode {
                if skip == 0 {
                    self.fail = None;
                    return Err(Error::TransferFailed);
                }
                self.fail = Some((opcode, skip - 1));
            }
        }

        let first = cmd.write_data.first().copied().unwrap_or(0);
        match cmd.opcode {
            opcodes::RDID => {
                let n = cmd.read_buf.len().min(self.id.len());
                cmd.read_buf[..n].copy_from_slice(&self.id[..n]);
                cmd.read_buf[n..].fill(0xFF);
            }
            opcodes::RDSFDP => cmd.read_buf.fill(0xFF),
            opcodes::RDSR => {
                let busy = if self.busy_polls > 0 {
                    self.busy_polls = self.busy_polls.saturating_sub(1);
                    opcodes::SR_WIP
                } else {
                    0
                };
                cmd.read_buf.fill(self.sr | busy);
            }
            opcodes::WRSR => {
                if self.sr_writable {
                    self.sr = first;
                    if let Some(&cr) = cmd.write_data.get(1) {
                        self.cr = cr;
                    }
                }
            }
            opcodes::RDCR => cmd.read_buf.fill(self.cr),
            opcodes::RDSR2 => cmd.read_buf.fill(self.sr2),
            opcodes::WRSR2 if cmd.address.is_none() => {
                if self.sr_writable {
                    self.sr2 = first;
                }
            }
            opcodes::RDFSR => cmd.read_buf.fill(self.fsr),
            opcodes::CLFSR => self.fsr = opcodes::FSR_READY,
            opcodes::CLSR | opcodes::WREN => {}
            opcodes::WRDI => self.aai_addr = None,
            opcodes::EN4B => self.four_byte = true,
            opcodes::EX4B | opcodes::EX4B_CYPRESS => self.four_byte = false,
            opcodes::BRRD | opcodes::RDEAR => cmd.read_buf.fill(self.bank),
            opcodes::BRWR | opcodes::WREAR => self.bank = first,
            opcodes::SRSTEN => {}
            opcodes::SRST => {
                self.four_byte = false;
                self.bank = 0;
            }
            opcodes::RDAR => {
                let value = self.regs.get(&cmd.address.unwrap_or(0)).copied().unwrap_or(0);
                cmd.read_buf.fill(value);
            }
            opcodes::READ_BPR if !cmd.read_buf.is_empty() => {
                let n = cmd.read_buf.len().min(self.bpr.len());
                cmd.read_buf[..n].copy_from_slice(&self.bpr[..n]);
            }
            opcodes::WRAR | opcodes::MT_WR_ANY_REG | opcodes::WR_CR2 => {
                self.regs.insert(cmd.address.unwrap_or(0), first);
            }
            opcodes::WRITE_BPR => self.bpr = cmd.write_data.to_vec(),
            opcodes::CHIP_ERASE => self.memory.fill(0xFF),
            opcodes::BE_4K | opcodes::BE_4K_4B | opcodes::BE_4K_PMC => {
                let at = self.offset(cmd);
                self.erase_array(at, 4096);
            }
            opcodes::BE_32K | opcodes::BE_32K_4B => {
                let at = self.offset(cmd);
                self.erase_array(at, 32 * 1024);
            }
            opcodes::SE | opcodes::SE_4B => {
                let at = self.offset(cmd);
                self.erase_array(at, self.sector_size as usize);
            }
            opcodes::AAI_WP => {
                let at = match cmd.address {
                    Some(_) => self.offset(cmd) as u64,
                    None => self.aai_addr.ok_or(Error::TransferFailed)?,
                };
                self.program_array(at as usize, cmd.write_data);
                self.aai_addr = Some(at + 2);
            }
            op if is_read(op) => {
                let at = self.offset(cmd);
                self.read_array(at, cmd.read_buf);
            }
            op if is_program(op) => {
                let at = self.offset(cmd);
                self.program_array(at, cmd.write_data);
            }
            _ => return Err(Error::OpcodeNotSupported),
        }
        Ok(())
    }

    async fn delay_us(&mut self, us: u32) {
        self.now.set(self.now.get() + us as u64);
    }
}
