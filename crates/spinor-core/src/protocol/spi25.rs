//! SPI25 protocol primitives
//!
//! This module implements the single-command building blocks of the
//! driver: register reads and writes, ID and SFDP reads, any-register
//! accesses, and the soft reset pair.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async
//!
//! Every function takes the `CmdFormat` the chip currently expects for
//! register accesses. Right after power-up that is plain 1-1-1; once an
//! octal DTR chip has been switched over it is 8D-8D-8D with two-byte
//! opcodes.

use crate::error::{Error, Result};
use crate::spi::{opcodes, AddressWidth, CmdFormat, SpiCommand, SpiProtocol};
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Number of ID bytes read from the chip
pub const ID_LEN: usize = 6;

/// Dummy cycles mandated for RDSFDP
pub const SFDP_DUMMY_CYCLES: u8 = 8;

// ============================================================================
// Generic register access
// ============================================================================

/// Read `buf.len()` bytes from a register without address
#[maybe_async]
pub async fn read_reg<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
    opcode: u8,
    buf: &mut [u8],
) -> Result<()> {
    let mut cmd = SpiCommand::read_reg(opcode, buf).with_format(format);
    master.execute(&mut cmd).await
}

/// Write a register (or send a bare command when `data` is empty)
#[maybe_async]
pub async fn write_reg<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
    opcode: u8,
    data: &[u8],
) -> Result<()> {
    let mut cmd = SpiCommand::write_reg(opcode, data).with_format(format);
    master.execute(&mut cmd).await
}

/// Send the Write Enable command
#[maybe_async]
pub async fn write_enable<M: SpiMaster + ?Sized>(master: &mut M, format: &CmdFormat) -> Result<()> {
    write_reg(master, format, opcodes::WREN, &[]).await
}

/// Send the Write Disable command
#[maybe_async]
pub async fn write_disable<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
) -> Result<()> {
    write_reg(master, format, opcodes::WRDI, &[]).await
}

// ============================================================================
// Status registers
// ============================================================================

/// Read a status-like register (RDSR or RDFSR)
///
/// In 8D-8D-8D mode these reads carry address bytes and dummy cycles and
/// return two bytes, of which the first is the register value.
#[maybe_async]
async fn read_status_like<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
    opcode: u8,
) -> Result<u8> {
    if format.proto.is_octal_dtr() {
        let width = AddressWidth::from_bytes(format.rdsr_addr_nbytes)
            .ok_or(Error::InvalidParameter)?;
        let mut buf = [0u8; 2];
        let mut cmd = if width == AddressWidth::None {
            SpiCommand::read_reg(opcode, &mut buf)
        } else {
            SpiCommand::read(opcode, width, 0, &mut buf)
        }
        .with_format(format)
        .with_dummy_cycles(format.rdsr_dummy);
        master.execute(&mut cmd).await?;
        Ok(buf[0])
    } else {
        let mut buf = [0u8; 1];
        read_reg(master, format, opcode, &mut buf).await?;
        Ok(buf[0])
    }
}

/// Read the status register
#[maybe_async]
pub async fn read_sr<M: SpiMaster + ?Sized>(master: &mut M, format: &CmdFormat) -> Result<u8> {
    read_status_like(master, format, opcodes::RDSR).await
}

/// Read the flag status register
#[maybe_async]
pub async fn read_fsr<M: SpiMaster + ?Sized>(master: &mut M, format: &CmdFormat) -> Result<u8> {
    read_status_like(master, format, opcodes::RDFSR).await
}

/// Read the configuration register
#[maybe_async]
pub async fn read_cr<M: SpiMaster + ?Sized>(master: &mut M, format: &CmdFormat) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_reg(master, format, opcodes::RDCR, &mut buf).await?;
    Ok(buf[0])
}

/// Write the status register (and the configuration register if two
/// bytes are given)
///
/// The caller is responsible for WREN and for waiting until ready.
#[maybe_async]
pub async fn write_sr<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
    data: &[u8],
) -> Result<()> {
    write_reg(master, format, opcodes::WRSR, data).await
}

// ============================================================================
// Identification
// ============================================================================

/// Read the raw JEDEC ID bytes
#[maybe_async]
pub async fn read_id<M: SpiMaster + ?Sized>(
    master: &mut M,
    format: &CmdFormat,
) -> Result<[u8; ID_LEN]> {
    let mut id = [0u8; ID_LEN];
    read_reg(master, format, opcodes::RDID, &mut id).await?;
    Ok(id)
}

/// Read from the SFDP area
///
/// RDSFDP is always sent as 1-1-1 with a 3-byte address and 8 dummy
/// cycles, whatever the session's addressing. Reads are split at the
/// transport's maximum transfer size.
#[maybe_async]
pub async fn read_sfdp<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    let max_len = master.max_read_len();
    if max_len == 0 {
        return Err(Error::InvalidParameter);
    }
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(
            opcodes::RDSFDP,
            AddressWidth::ThreeByte,
            addr + offset as u32,
            chunk,
        )
        .with_proto(SpiProtocol::P1_1_1)
        .with_dummy_cycles(SFDP_DUMMY_CYCLES);
        master.execute(&mut cmd).await?;
        offset += chunk_len;
    }

    Ok(())
}

// ============================================================================
// Any-register access (vendor volatile registers)
// ============================================================================

/// Read one byte from an addressed register (RDAR)
#[maybe_async]
pub async fn read_any_reg<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    addr: u32,
    dummy_cycles: u8,
) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read(opcodes::RDAR, width, addr, &mut buf)
        .with_proto(SpiProtocol::P1_1_1)
        .with_dummy_cycles(dummy_cycles);
    master.execute(&mut cmd).await?;
    Ok(buf[0])
}

/// Write one byte to an addressed register
///
/// `opcode` is the vendor's write-any-register command. The caller is
/// responsible for WREN.
#[maybe_async]
pub async fn write_any_reg<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
    value: u8,
) -> Result<()> {
    let data = [value];
    let mut cmd =
        SpiCommand::write(opcode, width, addr, &data).with_proto(SpiProtocol::P1_1_1);
    master.execute(&mut cmd).await
}

// ============================================================================
// Reset
// ============================================================================

/// Send the reset-enable / reset pair
///
/// The caller must wait for the chip to come back (200 us).
#[maybe_async]
pub async fn soft_reset<M: SpiMaster + ?Sized>(master: &mut M, format: &CmdFormat) -> Result<()> {
    write_reg(master, format, opcodes::SRSTEN, &[]).await?;
    write_reg(master, format, opcodes::SRST, &[]).await
}
