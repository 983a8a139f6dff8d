//! Status register block protect bits
//!
//! BP2..BP0 encode a locked length of `size >> (7 - bp)`, zero meaning
//! nothing locked. The region sits at the top of the array unless the
//! chip has a TB bit and it is set.

use super::LockRange;
use crate::error::{Error, Result};
use crate::flash::{NorSession, SessionFlags};
use crate::protocol::spi25;
use crate::spi::opcodes::{SR_BP0, SR_BP1, SR_BP2, SR_SRWD, SR_TB};
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Block protect field of the status register
pub const BP_MASK: u8 = SR_BP0 | SR_BP1 | SR_BP2;
const BP_SHIFT: u32 = 2;

/// Range locked by status register value `sr`
pub fn locked_range(sr: u8, size: u64, has_tb: bool) -> LockRange {
    let bp = sr & BP_MASK;
    if bp == 0 {
        return LockRange::EMPTY;
    }
    let pow = (bp ^ BP_MASK) >> BP_SHIFT;
    let len = size >> pow;
    let ofs = if has_tb && sr & SR_TB != 0 { 0 } else { size - len };
    LockRange::new(ofs, len)
}

fn is_locked_sr(sr: u8, size: u64, has_tb: bool, req: LockRange) -> bool {
    req.is_empty() || locked_range(sr, size, has_tb).contains(&req)
}

fn is_unlocked_sr(sr: u8, size: u64, has_tb: bool, req: LockRange) -> bool {
    !locked_range(sr, size, has_tb).overlaps(&req)
}

/// BP field locking `size >> pow` bytes
fn bp_field(pow: u32) -> Option<u8> {
    let step = u8::try_from(pow.checked_shl(BP_SHIFT)?).ok()?;
    BP_MASK.checked_sub(step)
}

fn ceil_log2(n: u64) -> u32 {
    if n.is_power_of_two() {
        n.ilog2()
    } else {
        n.ilog2() + 1
    }
}

/// Status register value that locks `req`, or `None` when it already is
///
/// The new locked region must cover both the request and whatever was
/// locked before.
pub(crate) fn lock_value(sr: u8, size: u64, has_tb: bool, req: LockRange) -> Result<Option<u8>> {
    if is_locked_sr(sr, size, has_tb, req) {
        return Ok(None);
    }

    let can_be_bottom = has_tb && is_locked_sr(sr, size, has_tb, LockRange::new(0, req.ofs));
    let can_be_top = is_locked_sr(sr, size, has_tb, LockRange::new(req.end(), size - req.end()));
    if !can_be_bottom && !can_be_top {
        return Err(Error::LockRangeUnsupported);
    }
    // Prefer top
    let use_top = can_be_top;

    // Smallest region covering the request
    let lock_len = if use_top { size - req.ofs } else { req.end() };
    let pow = size
        .ilog2()
        .checked_sub(ceil_log2(lock_len))
        .ok_or(Error::LockRangeUnsupported)?;
    let val = bp_field(pow).ok_or(Error::LockRangeUnsupported)?;
    if val == 0 {
        return Err(Error::LockRangeUnsupported);
    }

    let tb = if has_tb { SR_TB } else { 0 };
    let mut new = (sr & !BP_MASK & !tb) | val | SR_SRWD;
    if !use_top {
        new |= SR_TB;
    }

    let locked = locked_range(new, size, has_tb);
    if !locked.contains(&locked_range(sr, size, has_tb)) || !locked.contains(&req) {
        return Err(Error::LockRangeUnsupported);
    }
    Ok((new != sr).then_some(new))
}

/// Status register value that unlocks `req`, or `None` when it already is
///
/// What stays locked must be part of what was locked before and must not
/// touch the request. Everything locked before outside the request must
/// stay locked.
pub(crate) fn unlock_value(sr: u8, size: u64, has_tb: bool, req: LockRange) -> Result<Option<u8>> {
    if is_unlocked_sr(sr, size, has_tb, req) {
        return Ok(None);
    }

    let can_be_top = is_unlocked_sr(sr, size, has_tb, LockRange::new(0, req.ofs));
    let can_be_bottom =
        has_tb && is_unlocked_sr(sr, size, has_tb, LockRange::new(req.end(), size - req.end()));
    if !can_be_bottom && !can_be_top {
        return Err(Error::LockRangeUnsupported);
    }
    let use_top = can_be_top;

    let lock_len = if use_top { size - req.end() } else { req.ofs };
    // Largest region left outside the request
    let val = if lock_len == 0 {
        0
    } else {
        let pow = size.ilog2() - lock_len.ilog2();
        bp_field(pow).ok_or(Error::LockRangeUnsupported)?
    };

    let tb = if has_tb { SR_TB } else { 0 };
    let mut new = (sr & !BP_MASK & !tb) | val;
    if val == 0 {
        new &= !SR_SRWD;
    }
    if !use_top {
        new |= SR_TB;
    }

    let old = locked_range(sr, size, has_tb);
    let locked = locked_range(new, size, has_tb);
    if !old.contains(&locked) || locked.overlaps(&req) {
        return Err(Error::LockRangeUnsupported);
    }
    let (below, above) = old.outside(&req);
    if !locked.contains(&below) || !locked.contains(&above) {
        return Err(Error::LockRangeUnsupported);
    }
    Ok((new != sr).then_some(new))
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    fn has_tb(&self) -> bool {
        self.flags.contains(SessionFlags::HAS_TB)
    }

    async fn read_status(&mut self) -> Result<u8> {
        let fmt = self.reg_format;
        spi25::read_sr(&mut self.master, &fmt).await
    }

    /// Write the status register and verify the protection bits
    async fn write_sr_and_check(&mut self, value: u8) -> Result<()> {
        self.write_sr_wait(&[value]).await?;
        let sr = self.read_status().await?;
        let mask = BP_MASK | SR_SRWD | if self.has_tb() { SR_TB } else { 0 };
        if sr & mask != value & mask {
            log::error!("status register 0x{:02x} does not read back, got 0x{:02x}", value, sr);
            return Err(Error::RegisterVerifyFailed);
        }
        Ok(())
    }

    pub(super) async fn bp_lock(&mut self, ofs: u64, len: u64) -> Result<()> {
        let sr = self.read_status().await?;
        match lock_value(sr, self.size, self.has_tb(), LockRange::new(ofs, len))? {
            Some(value) => self.write_sr_and_check(value).await,
            None => Ok(()),
        }
    }

    pub(super) async fn bp_unlock(&mut self, ofs: u64, len: u64) -> Result<()> {
        let sr = self.read_status().await?;
        match unlock_value(sr, self.size, self.has_tb(), LockRange::new(ofs, len))? {
            Some(value) => self.write_sr_and_check(value).await,
            None => Ok(()),
        }
    }

    pub(super) async fn bp_is_locked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        let sr = self.read_status().await?;
        Ok(is_locked_sr(sr, self.size, self.has_tb(), LockRange::new(ofs, len)))
    }

    pub(super) async fn bp_is_unlocked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        let sr = self.read_status().await?;
        Ok(is_unlocked_sr(sr, self.size, self.has_tb(), LockRange::new(ofs, len)))
    }
}
