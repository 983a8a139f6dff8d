//! Protocol negotiation
//!
//! Intersects what the controller can drive with what the flash offers
//! and picks one read mode, one page program mode and one erase command.
//! Capabilities are bits of [`Hwcaps`], ordered so that the highest common
//! bit is always the mode to use.
//!
//! Controllers come in two kinds. "Smart" controllers answer
//! [`SpiMaster::supports_op`] for a concrete command template, so every
//! candidate mode is checked with the exact opcode, address width, dummy
//! cycles and protocol it would use. The others only expose their line
//! counts through [`SpiFeatures`], from which a capability mask is
//! derived.

use crate::chip::{CatalogEntry, CatalogFlags};
use crate::config::NorConfig;
use crate::error::{Error, Result};
use crate::fixups::Hooks;
use crate::params::{EraseSetting, FlashParameters, Hwcaps, PpCommand, QuadEnable, ReadCommand};
use crate::spi::{opcodes, AddressWidth, SpiCommand};
use crate::transport::{SpiFeatures, SpiMaster};

/// Largest device reachable with 3-byte addresses
const MAX_3B_SIZE: u64 = 16 * 1024 * 1024;

/// Outcome of a negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Read command and its dummy cycles
    pub read: ReadCommand,
    /// Page program command
    pub program: PpCommand,
    /// Uniform erase command
    pub erase: EraseSetting,
    /// Quad enable method, only kept when a selected mode moves data on
    /// four lines
    pub quad_enable: Option<QuadEnable>,
}

impl Selection {
    /// Dummy cycles of the selected read
    pub const fn read_dummy(&self) -> u8 {
        self.read.dummy_cycles()
    }
}

/// Capabilities a controller without `supports_op` knowledge can drive
pub fn hwcaps_from_features(features: SpiFeatures) -> Hwcaps {
    let mut caps = Hwcaps::READ | Hwcaps::READ_FAST | Hwcaps::PP;

    if features.contains(SpiFeatures::OCTAL_IN) {
        caps |= Hwcaps::READ_1_1_8;
        if features.contains(SpiFeatures::OCTAL_IO) {
            caps |= Hwcaps::READ_1_8_8 | Hwcaps::PP_1_1_8 | Hwcaps::PP_1_8_8;
        }
    } else if features.contains(SpiFeatures::QUAD_IN) {
        caps |= Hwcaps::READ_1_1_4;
        if features.contains(SpiFeatures::QUAD_IO) {
            caps |= Hwcaps::READ_1_4_4 | Hwcaps::PP_1_1_4 | Hwcaps::PP_1_4_4;
        }
    } else if features.contains(SpiFeatures::DUAL_IN) {
        caps |= Hwcaps::READ_1_1_2;
        if features.contains(SpiFeatures::DUAL_IO) {
            caps |= Hwcaps::READ_1_2_2;
        }
    }

    caps
}

/// Check one command template, preferring 4-byte addresses
///
/// Devices above 16 MiB must take the 4-byte form. With the bank register
/// the chip always sees 3-byte addresses.
fn check_op<M: SpiMaster + ?Sized>(
    master: &M,
    cmd: &mut SpiCommand<'_>,
    size: u64,
    bank_register: bool,
) -> bool {
    if bank_register {
        cmd.address_width = AddressWidth::ThreeByte;
        return master.supports_op(cmd);
    }

    cmd.address_width = AddressWidth::FourByte;
    if master.supports_op(cmd) {
        return true;
    }
    if size > MAX_3B_SIZE {
        return false;
    }
    cmd.address_width = AddressWidth::ThreeByte;
    master.supports_op(cmd)
}

/// Capabilities the controller accepts, probed one template at a time
fn smart_hwcaps<M: SpiMaster + ?Sized>(
    master: &M,
    params: &FlashParameters,
    candidates: Hwcaps,
    bank_register: bool,
) -> Hwcaps {
    let mut shared = Hwcaps::empty();
    let mut data = [0u8; 2];

    for cap in candidates.iter() {
        let ok = if let Some(read) = params.read(cap) {
            let mut cmd = SpiCommand::read(read.opcode, AddressWidth::ThreeByte, 0, &mut data)
                .with_proto(read.proto)
                .with_dummy_cycles(read.dummy_cycles());
            check_op(master, &mut cmd, params.size, bank_register)
        } else if let Some(pp) = params.pp(cap) {
            let mut cmd = SpiCommand::write(pp.opcode, AddressWidth::ThreeByte, 0, &data)
                .with_proto(pp.proto);
            check_op(master, &mut cmd, params.size, bank_register)
        } else {
            false
        };

        if ok {
            shared |= cap;
        } else {
            log::trace!("controller rejects {:?}", cap);
        }
    }

    shared
}

/// Uniform erase command
///
/// SFDP (or a fixup) wins; otherwise the catalog decides between 4 KiB
/// erase and the full sector.
pub fn select_erase(
    entry: &CatalogEntry,
    params: &FlashParameters,
    config: &NorConfig,
) -> EraseSetting {
    if let Some(erase) = params.erase {
        return erase;
    }
    if config.use_4k_sectors && entry.flags.contains(CatalogFlags::SECT_4K) {
        EraseSetting::new(opcodes::BE_4K, 4096)
    } else if config.use_4k_sectors && entry.flags.contains(CatalogFlags::SECT_4K_PMC) {
        EraseSetting::new(opcodes::BE_4K_PMC, 4096)
    } else {
        EraseSetting::new(opcodes::SE, entry.sector_size)
    }
}

/// Pick read, page program and erase commands
pub fn negotiate<M: SpiMaster + ?Sized>(
    master: &M,
    entry: &CatalogEntry,
    params: &FlashParameters,
    hooks: &Hooks,
    config: &NorConfig,
) -> Result<Selection> {
    let mut shared = if config.smart_hwcaps {
        let mut candidates = params.hwcaps.difference(Hwcaps::X_X_X);
        if config.broken_reset {
            // No way back from octal DTR without a reset line
            candidates.remove(Hwcaps::X_X_X_DTR);
        }
        smart_hwcaps(master, params, candidates, config.bank_register)
    } else {
        let mut shared = hwcaps_from_features(master.features()).intersection(params.hwcaps);
        shared.remove(Hwcaps::X_X_X | Hwcaps::X_X_X_DTR);
        shared
    };

    if params.quad_enable.is_none() {
        shared.remove(Hwcaps::QUAD);
    }
    if hooks.octal_dtr_enable.is_none() {
        shared.remove(Hwcaps::X_X_X_DTR);
    }

    let read_cap = shared.reads().best().ok_or_else(|| {
        log::error!("can't select read settings supported by both the SPI controller and memory");
        Error::NoReadProtocol
    })?;
    let read = *params.read(read_cap).ok_or(Error::NoReadProtocol)?;

    let pp_cap = shared.programs().best().ok_or_else(|| {
        log::error!("can't select write settings supported by both the SPI controller and memory");
        Error::NoProgramProtocol
    })?;
    let program = *params.pp(pp_cap).ok_or(Error::NoProgramProtocol)?;

    let erase = select_erase(entry, params, config);

    let quad_enable = if read.proto.width() == 4 || program.proto.width() == 4 {
        params.quad_enable
    } else {
        None
    };

    log::debug!(
        "selected read {} (0x{:02X}, {} dummy), program {} (0x{:02X}), erase 0x{:02X}/{}",
        read.proto,
        read.opcode,
        read.dummy_cycles(),
        program.proto,
        program.opcode,
        erase.opcode,
        erase.size
    );

    Ok(Selection {
        read,
        program,
        erase,
        quad_enable,
    })
}
