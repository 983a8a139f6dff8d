//! SST26 block protection register
//!
//! Bit layout, from bit 0 up:
//!
//! - one bit per 64 KiB block between the two 64 KiB boundary regions
//! - the 32 KiB block of the lower boundary region, then of the upper one
//! - four 8 KiB blocks of the lower region, then four of the upper one,
//!   each as a write-protect / read-protect pair of which only the first
//!   bit is used here
//!
//! The register is clocked out most significant byte first. Lock, unlock
//! and both checks visit the same bits through [`covered_bits`].

use crate::error::{Error, Result};
use crate::flash::NorSession;
use crate::protocol::spi25;
use crate::spi::opcodes;
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

const BLOCK: u64 = 64 * 1024;
/// Size of each boundary region made of one 32 KiB and four 8 KiB blocks
const BOUNDARY: u64 = 64 * 1024;
const SMALL_BLOCKS: u32 = 4;
/// Register length of the 64 Mbit part
pub(crate) const BPR_MAX_LEN: usize = 18;
const MAX_BITS: usize = BPR_MAX_LEN * 8;

/// Register length for a chip of `size` bytes
///
/// The family only has 16, 32 and 64 Mbit parts.
pub(crate) fn bpr_len(size: u64) -> Result<usize> {
    match size {
        0x20_0000 | 0x40_0000 | 0x80_0000 => Ok(2 + (size / BLOCK / 8) as usize),
        _ => {
            log::error!("no SST26 protection layout for {} bytes", size);
            Err(Error::NotSupported)
        }
    }
}

/// Register bits covering `len` bytes at `ofs`
///
/// Both must be 64 KiB aligned.
pub(crate) fn covered_bits(size: u64, ofs: u64, len: u64) -> Result<heapless::Vec<u16, MAX_BITS>> {
    if ofs % BLOCK != 0 || len % BLOCK != 0 {
        log::error!("length or offset is not 64KiB aligned");
        return Err(Error::InvalidAlignment);
    }
    if ofs + len > size {
        log::error!("range 0x{:x}+0x{:x} is beyond 0x{:x}", ofs, len, size);
        return Err(Error::AddressOutOfBounds);
    }
    bpr_len(size)?;

    let mut bits = heapless::Vec::new();
    if len == 0 {
        return Ok(bits);
    }
    let mut push = |bit: u64| bits.push(bit as u16).map_err(|_| Error::InvalidParameter);

    let end = ofs + len;
    let lower = ofs < BOUNDARY;
    let upper = end > size - BOUNDARY;

    let mut pos = ofs.max(BOUNDARY);
    let stop = end.min(size - BOUNDARY);
    let mut bit = pos / BLOCK - 1;
    while pos < stop {
        push(bit)?;
        bit += 1;
        pos += BLOCK;
    }

    let mut bit = (size - 2 * BOUNDARY) / BLOCK;
    if lower {
        push(bit)?;
    }
    bit += 1;
    if upper {
        push(bit)?;
    }
    bit += 1;

    for _ in 0..SMALL_BLOCKS {
        if lower {
            push(bit)?;
        }
        bit += 2;
    }
    for _ in 0..SMALL_BLOCKS {
        if upper {
            push(bit)?;
        }
        bit += 2;
    }

    Ok(bits)
}

/// Block protection register contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bpr {
    bytes: [u8; BPR_MAX_LEN],
    len: usize,
}

impl Bpr {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            bytes: [0; BPR_MAX_LEN],
            len: len.min(BPR_MAX_LEN),
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    fn locate(&self, bit: u16) -> (usize, u8) {
        let bit = bit as usize;
        (self.len - bit / 8 - 1, 1 << (bit % 8))
    }

    pub(crate) fn get(&self, bit: u16) -> bool {
        let (byte, mask) = self.locate(bit);
        self.bytes[byte] & mask != 0
    }

    pub(crate) fn set(&mut self, bit: u16, on: bool) {
        let (byte, mask) = self.locate(bit);
        if on {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
    }
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    async fn read_bpr(&mut self) -> Result<Bpr> {
        let mut bpr = Bpr::new(bpr_len(self.size)?);
        let fmt = self.reg_format;
        spi25::read_reg(&mut self.master, &fmt, opcodes::READ_BPR, bpr.as_mut_slice()).await?;
        Ok(bpr)
    }

    async fn write_bpr(&mut self, bpr: &Bpr) -> Result<()> {
        let fmt = self.reg_format;
        spi25::write_enable(&mut self.master, &fmt).await?;
        spi25::write_reg(&mut self.master, &fmt, opcodes::WRITE_BPR, bpr.as_slice()).await?;
        self.wait_till_ready().await
    }

    async fn sst26_update(&mut self, ofs: u64, len: u64, lock: bool) -> Result<()> {
        let bits = covered_bits(self.size, ofs, len)?;
        let mut bpr = self.read_bpr().await?;
        for &bit in &bits {
            bpr.set(bit, lock);
        }
        self.write_bpr(&bpr).await
    }

    pub(super) async fn sst26_lock(&mut self, ofs: u64, len: u64) -> Result<()> {
        self.sst26_update(ofs, len, true).await
    }

    pub(super) async fn sst26_unlock(&mut self, ofs: u64, len: u64) -> Result<()> {
        self.sst26_update(ofs, len, false).await
    }

    pub(super) async fn sst26_is_locked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        let bits = covered_bits(self.size, ofs, len)?;
        let bpr = self.read_bpr().await?;
        Ok(bits.iter().all(|&bit| bpr.get(bit)))
    }

    /// Unaligned ranges are widened to the 64 KiB blocks they touch
    pub(super) async fn sst26_is_unlocked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        let start = ofs - ofs % BLOCK;
        let end = (ofs + len).div_ceil(BLOCK) * BLOCK;
        let bits = covered_bits(self.size, start, end.min(self.size) - start)?;
        let bpr = self.read_bpr().await?;
        Ok(!bits.iter().any(|&bit| bpr.get(bit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: u64 = 2 * 1024 * 1024;

    #[test]
    fn test_register_length() {
        assert_eq!(bpr_len(SIZE), Ok(6));
        assert_eq!(bpr_len(8 * 1024 * 1024), Ok(18));
        assert_eq!(bpr_len(16 * 1024 * 1024), Err(Error::NotSupported));
    }

    #[test]
    fn test_middle_block_bits() {
        let bits = covered_bits(SIZE, 0x20000, 0x20000).unwrap();
        assert_eq!(&bits[..], &[1, 2]);
    }

    #[test]
    fn test_lower_boundary_bits() {
        let bits = covered_bits(SIZE, 0, BLOCK).unwrap();
        // 32 KiB bit after the 30 middle blocks, then the lower 8 KiB bits
        assert_eq!(&bits[..], &[30, 32, 34, 36, 38]);
    }

    #[test]
    fn test_whole_chip_bits() {
        let bits = covered_bits(SIZE, 0, SIZE).unwrap();
        assert_eq!(bits.len(), 30 + 2 + 8);
        assert!(bits.contains(&31));
        assert!(bits.contains(&46));
        assert!(!bits.contains(&47));
    }

    #[test]
    fn test_alignment_and_bounds() {
        assert_eq!(covered_bits(SIZE, 0x1000, BLOCK), Err(Error::InvalidAlignment));
        assert_eq!(covered_bits(SIZE, 0, 0x8000), Err(Error::InvalidAlignment));
        assert_eq!(covered_bits(SIZE, SIZE, BLOCK), Err(Error::AddressOutOfBounds));
        assert!(covered_bits(SIZE, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_bpr_bit_order() {
        let mut bpr = Bpr::new(6);
        bpr.set(0, true);
        bpr.set(47, true);
        assert_eq!(bpr.as_slice(), &[0x80, 0, 0, 0, 0, 0x01]);
        assert!(bpr.get(47));
        bpr.set(47, false);
        assert!(!bpr.get(47));
    }
}
