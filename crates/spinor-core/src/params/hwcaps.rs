//! Read and page program capability bits
//!
//! Each read capability owns one slot in `FlashParameters::reads`, each
//! page program capability one slot in `FlashParameters::page_programs`.
//! The slot index is the bit position (minus 16 for page programs), and
//! bits are ordered so that a higher bit is always the preferred mode.

use crate::spi::SpiProtocol;
use bitflags::bitflags;

/// Number of read slots
pub const READ_SLOTS: usize = 16;
/// Number of page program slots
pub const PP_SLOTS: usize = 8;

const PP_SHIFT: u32 = 16;

bitflags! {
    /// Read and page program capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Hwcaps: u32 {
        /// 0x03, no dummy cycles
        const READ            = 1 << 0;
        /// 0x0B with wait states
        const READ_FAST       = 1 << 1;
        /// 1D-1D-1D
        const READ_1_1_1_DTR  = 1 << 2;
        /// 1-1-2
        const READ_1_1_2      = 1 << 3;
        /// 1-2-2
        const READ_1_2_2      = 1 << 4;
        /// 2-2-2
        const READ_2_2_2      = 1 << 5;
        /// 1D-2D-2D
        const READ_1_2_2_DTR  = 1 << 6;
        /// 1-1-4
        const READ_1_1_4      = 1 << 7;
        /// 1-4-4
        const READ_1_4_4      = 1 << 8;
        /// 4-4-4
        const READ_4_4_4      = 1 << 9;
        /// 1D-4D-4D
        const READ_1_4_4_DTR  = 1 << 10;
        /// 1-1-8
        const READ_1_1_8      = 1 << 11;
        /// 1-8-8
        const READ_1_8_8      = 1 << 12;
        /// 8-8-8
        const READ_8_8_8      = 1 << 13;
        /// 1D-8D-8D
        const READ_1_8_8_DTR  = 1 << 14;
        /// 8D-8D-8D
        const READ_8_8_8_DTR  = 1 << 15;

        /// 1-1-1 page program
        const PP              = 1 << 16;
        /// 1-1-4 page program
        const PP_1_1_4        = 1 << 17;
        /// 1-4-4 page program
        const PP_1_4_4        = 1 << 18;
        /// 4-4-4 page program
        const PP_4_4_4        = 1 << 19;
        /// 1-1-8 page program
        const PP_1_1_8        = 1 << 20;
        /// 1-8-8 page program
        const PP_1_8_8        = 1 << 21;
        /// 8-8-8 page program
        const PP_8_8_8        = 1 << 22;
        /// 8D-8D-8D page program
        const PP_8_8_8_DTR    = 1 << 23;
    }
}

impl Hwcaps {
    /// All read capabilities
    pub const READ_MASK: Self = Self::from_bits_truncate(0x0000_FFFF);
    /// All page program capabilities
    pub const PP_MASK: Self = Self::from_bits_truncate(0x00FF_0000);

    /// Modes where the opcode itself goes out on several lines
    pub const X_X_X: Self = Self::READ_2_2_2
        .union(Self::READ_4_4_4)
        .union(Self::READ_8_8_8)
        .union(Self::PP_4_4_4)
        .union(Self::PP_8_8_8);

    /// Octal DTR modes
    pub const X_X_X_DTR: Self = Self::READ_8_8_8_DTR.union(Self::PP_8_8_8_DTR);

    /// Reads and programs that move data on four lines
    pub const QUAD: Self = Self::READ_1_1_4
        .union(Self::READ_1_4_4)
        .union(Self::READ_4_4_4)
        .union(Self::READ_1_4_4_DTR)
        .union(Self::PP_1_1_4)
        .union(Self::PP_1_4_4)
        .union(Self::PP_4_4_4);

    /// The read capabilities only
    pub const fn reads(self) -> Self {
        self.intersection(Self::READ_MASK)
    }

    /// The page program capabilities only
    pub const fn programs(self) -> Self {
        self.intersection(Self::PP_MASK)
    }

    /// The most preferred capability in the set
    pub const fn best(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(Self::from_bits_retain(1 << (31 - self.bits().leading_zeros())))
        }
    }

    /// Read slot for a single read capability
    pub const fn read_slot(self) -> Option<usize> {
        if self.bits().count_ones() == 1 && self.bits() < (1 << PP_SHIFT) {
            Some(self.bits().trailing_zeros() as usize)
        } else {
            None
        }
    }

    /// Page program slot for a single page program capability
    pub const fn pp_slot(self) -> Option<usize> {
        let bits = self.bits() >> PP_SHIFT;
        if self.bits().count_ones() == 1 && bits != 0 && bits < (1 << PP_SLOTS) {
            Some(bits.trailing_zeros() as usize)
        } else {
            None
        }
    }

    /// Capability bit of read slot `slot`
    pub const fn from_read_slot(slot: usize) -> Self {
        Self::from_bits_truncate(1 << slot)
    }

    /// Capability bit of page program slot `slot`
    pub const fn from_pp_slot(slot: usize) -> Self {
        Self::from_bits_truncate(1 << (slot as u32 + PP_SHIFT))
    }

    /// Wire protocol of a single capability
    pub const fn protocol(self) -> Option<SpiProtocol> {
        let proto = match self.bits() {
            b if b == Self::READ.bits() || b == Self::READ_FAST.bits() => SpiProtocol::P1_1_1,
            b if b == Self::READ_1_1_1_DTR.bits() => SpiProtocol::P1_1_1_DTR,
            b if b == Self::READ_1_1_2.bits() => SpiProtocol::P1_1_2,
            b if b == Self::READ_1_2_2.bits() => SpiProtocol::P1_2_2,
            b if b == Self::READ_2_2_2.bits() => SpiProtocol::P2_2_2,
            b if b == Self::READ_1_2_2_DTR.bits() => SpiProtocol::P1_2_2_DTR,
            b if b == Self::READ_1_1_4.bits() || b == Self::PP_1_1_4.bits() => {
                SpiProtocol::P1_1_4
            }
            b if b == Self::READ_1_4_4.bits() || b == Self::PP_1_4_4.bits() => {
                SpiProtocol::P1_4_4
            }
            b if b == Self::READ_4_4_4.bits() || b == Self::PP_4_4_4.bits() => {
                SpiProtocol::P4_4_4
            }
            b if b == Self::READ_1_4_4_DTR.bits() => SpiProtocol::P1_4_4_DTR,
            b if b == Self::READ_1_1_8.bits() || b == Self::PP_1_1_8.bits() => {
                SpiProtocol::P1_1_8
            }
            b if b == Self::READ_1_8_8.bits() || b == Self::PP_1_8_8.bits() => {
                SpiProtocol::P1_8_8
            }
            b if b == Self::READ_8_8_8.bits() || b == Self::PP_8_8_8.bits() => {
                SpiProtocol::P8_8_8
            }
            b if b == Self::READ_1_8_8_DTR.bits() => SpiProtocol::P1_8_8_DTR,
            b if b == Self::READ_8_8_8_DTR.bits() || b == Self::PP_8_8_8_DTR.bits() => {
                SpiProtocol::P8_8_8_DTR
            }
            b if b == Self::PP.bits() => SpiProtocol::P1_1_1,
            _ => return None,
        };
        Some(proto)
    }
}
