//! Write protection
//!
//! Two schemes are supported:
//!
//! - **Block protect bits** in the status register select a power-of-two
//!   fraction of the array, anchored at the top or (with a TB bit) at the
//!   bottom.
//! - **SST26 block protection register**, a bit vector with one bit per
//!   64 KiB block plus finer 32 KiB and 8 KiB regions at both ends.
//!
//! Locking never unlocks a region that was locked before. Unlocking only
//! clears bytes of the request and never locks new ones. Requests the
//! scheme cannot express that way fail with
//! [`Error::LockRangeUnsupported`] and leave the chip untouched.

mod bp;
mod sst26;

pub use bp::{locked_range, BP_MASK};

use crate::error::{Error, Result};
use crate::flash::NorSession;
use crate::time::Clock;
use crate::transport::SpiMaster;
use maybe_async::maybe_async;

/// Protection scheme of a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScheme {
    /// Status register block protect bits
    Bp,
    /// SST26 block protection register
    Sst26,
}

/// A contiguous byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockRange {
    /// First byte
    pub ofs: u64,
    /// Length in bytes
    pub len: u64,
}

impl LockRange {
    /// Nothing locked
    pub const EMPTY: Self = Self { ofs: 0, len: 0 };

    /// Range of `len` bytes at `ofs`
    pub const fn new(ofs: u64, len: u64) -> Self {
        Self { ofs, len }
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.ofs + self.len
    }

    /// True when the range holds no byte
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every byte of `other` is in `self`
    pub fn contains(&self, other: &LockRange) -> bool {
        other.is_empty() || (other.ofs >= self.ofs && other.end() <= self.end())
    }

    /// Some byte is in both
    pub fn overlaps(&self, other: &LockRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && other.ofs < self.end()
            && other.end() > self.ofs
    }

    /// The parts of `self` below and above `other`, either possibly empty
    pub fn outside(&self, other: &LockRange) -> (LockRange, LockRange) {
        if self.is_empty() {
            return (Self::EMPTY, Self::EMPTY);
        }
        let below_end = other.ofs.clamp(self.ofs, self.end());
        let above_ofs = other.end().clamp(self.ofs, self.end());
        let below = if other.is_empty() {
            *self
        } else {
            LockRange::new(self.ofs, below_end - self.ofs)
        };
        let above = if other.is_empty() {
            Self::EMPTY
        } else {
            LockRange::new(above_ofs, self.end() - above_ofs)
        };
        (below, above)
    }
}

/// Keep the first error of an operation and its bus release
fn released<T>(result: Result<T>, release: Result<()>) -> Result<T> {
    let value = result?;
    release?;
    Ok(value)
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    fn lock_scheme_or_err(&self) -> Result<LockScheme> {
        self.lock.ok_or_else(|| {
            log::error!("{} has no block protection", self.entry.name);
            Error::NotSupported
        })
    }

    /// Write protect `len` bytes at `ofs`
    pub async fn lock(&mut self, ofs: u64, len: u64) -> Result<()> {
        let scheme = self.lock_scheme_or_err()?;
        self.check_range(ofs, len)?;
        self.master.claim_bus().await?;
        let result = match scheme {
            LockScheme::Bp => self.bp_lock(ofs, len).await,
            LockScheme::Sst26 => self.sst26_lock(ofs, len).await,
        };
        let release = self.master.release_bus().await;
        released(result, release)
    }

    /// Remove write protection from `len` bytes at `ofs`
    pub async fn unlock(&mut self, ofs: u64, len: u64) -> Result<()> {
        let scheme = self.lock_scheme_or_err()?;
        self.check_range(ofs, len)?;
        self.master.claim_bus().await?;
        let result = match scheme {
            LockScheme::Bp => self.bp_unlock(ofs, len).await,
            LockScheme::Sst26 => self.sst26_unlock(ofs, len).await,
        };
        let release = self.master.release_bus().await;
        released(result, release)
    }

    /// Whether every byte of the range is write protected
    pub async fn is_locked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        let scheme = self.lock_scheme_or_err()?;
        self.check_range(ofs, len)?;
        self.master.claim_bus().await?;
        let result = match scheme {
            LockScheme::Bp => self.bp_is_locked(ofs, len).await,
            LockScheme::Sst26 => self.sst26_is_locked(ofs, len).await,
        };
        let release = self.master.release_bus().await;
        released(result, release)
    }

    /// Whether no byte of the range is write protected
    ///
    /// Chips without block protection are always unlocked.
    pub async fn is_unlocked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        self.check_range(ofs, len)?;
        self.master.claim_bus().await?;
        let result = self.range_unlocked(ofs, len).await;
        let release = self.master.release_bus().await;
        released(result, release)
    }

    /// Raw block protect field of the status register
    pub async fn sw_wp_query(&mut self) -> Result<u8> {
        if self.lock_scheme_or_err()? != LockScheme::Bp {
            return Err(Error::NotSupported);
        }
        self.master.claim_bus().await?;
        let fmt = self.reg_format;
        let result = crate::protocol::spi25::read_sr(&mut self.master, &fmt).await;
        let release = self.master.release_bus().await;
        released(result, release).map(|sr| sr & BP_MASK)
    }

    /// Lock check run by program and erase with the bus already claimed
    pub(crate) async fn range_unlocked(&mut self, ofs: u64, len: u64) -> Result<bool> {
        match self.lock {
            None => Ok(true),
            Some(LockScheme::Bp) => self.bp_is_unlocked(ofs, len).await,
            Some(LockScheme::Sst26) => self.sst26_is_unlocked(ofs, len).await,
        }
    }
}
