//! Wire protocols
//!
//! A protocol is written `I-A-D`: the number of lines used for the
//! instruction, address and data phases. A `D` suffix on each phase marks
//! double transfer rate, e.g. `8D-8D-8D`.

use core::fmt;

/// Bus widths of one command, plus whether it is clocked on both edges
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpiProtocol {
    /// Lines used for the instruction phase
    pub inst: u8,
    /// Lines used for the address and dummy phases
    pub addr: u8,
    /// Lines used for the data phase
    pub data: u8,
    /// Double transfer rate on every phase
    pub dtr: bool,
}

impl SpiProtocol {
    /// Build a protocol from its phase widths
    pub const fn new(inst: u8, addr: u8, data: u8, dtr: bool) -> Self {
        Self {
            inst,
            addr,
            data,
            dtr,
        }
    }

    /// 1-1-1
    pub const P1_1_1: Self = Self::new(1, 1, 1, false);
    /// 1-1-2
    pub const P1_1_2: Self = Self::new(1, 1, 2, false);
    /// 1-2-2
    pub const P1_2_2: Self = Self::new(1, 2, 2, false);
    /// 2-2-2
    pub const P2_2_2: Self = Self::new(2, 2, 2, false);
    /// 1-1-4
    pub const P1_1_4: Self = Self::new(1, 1, 4, false);
    /// 1-4-4
    pub const P1_4_4: Self = Self::new(1, 4, 4, false);
    /// 4-4-4
    pub const P4_4_4: Self = Self::new(4, 4, 4, false);
    /// 1-1-8
    pub const P1_1_8: Self = Self::new(1, 1, 8, false);
    /// 1-8-8
    pub const P1_8_8: Self = Self::new(1, 8, 8, false);
    /// 8-8-8
    pub const P8_8_8: Self = Self::new(8, 8, 8, false);
    /// 1D-1D-1D
    pub const P1_1_1_DTR: Self = Self::new(1, 1, 1, true);
    /// 1D-2D-2D
    pub const P1_2_2_DTR: Self = Self::new(1, 2, 2, true);
    /// 1D-4D-4D
    pub const P1_4_4_DTR: Self = Self::new(1, 4, 4, true);
    /// 1D-8D-8D
    pub const P1_8_8_DTR: Self = Self::new(1, 8, 8, true);
    /// 8D-8D-8D
    pub const P8_8_8_DTR: Self = Self::new(8, 8, 8, true);

    /// Data phase width, used to decide whether a quad enable is needed
    pub const fn width(&self) -> u8 {
        self.data
    }

    /// Returns true for 8D-8D-8D
    pub const fn is_octal_dtr(&self) -> bool {
        self.inst == 8 && self.addr == 8 && self.data == 8 && self.dtr
    }
}

impl Default for SpiProtocol {
    fn default() -> Self {
        Self::P1_1_1
    }
}

impl fmt::Display for SpiProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = if self.dtr { "D" } else { "" };
        write!(
            f,
            "{}{d}-{}{d}-{}{d}",
            self.inst,
            self.addr,
            self.data,
            d = d
        )
    }
}

/// How the second opcode byte of a DTR command is formed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CmdExtension {
    /// Not known; single byte opcodes
    #[default]
    None,
    /// Second byte repeats the opcode
    Repeat,
    /// Second byte is the bitwise inverse of the opcode
    Invert,
    /// 16-bit opcodes, not supported
    SixteenBit,
}

impl CmdExtension {
    /// Extension byte for `opcode`, if the style defines one
    pub const fn extension(&self, opcode: u8) -> Option<u8> {
        match self {
            Self::Repeat => Some(opcode),
            Self::Invert => Some(!opcode),
            Self::None | Self::SixteenBit => None,
        }
    }
}

/// The shape register accesses take on the wire
///
/// Status register reads in 8D-8D-8D mode need extra address bytes and
/// dummy cycles that plain 1-1-1 reads do not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CmdFormat {
    /// Protocol used for the command
    pub proto: SpiProtocol,
    /// Command extension style for DTR opcodes
    pub ext: CmdExtension,
    /// Dummy cycles before the status byte in 8D-8D-8D mode
    pub rdsr_dummy: u8,
    /// Address bytes sent with a status read in 8D-8D-8D mode
    pub rdsr_addr_nbytes: u8,
}

impl CmdFormat {
    /// Single data rate format using `proto`
    pub const fn new(proto: SpiProtocol) -> Self {
        Self {
            proto,
            ext: CmdExtension::None,
            rdsr_dummy: 0,
            rdsr_addr_nbytes: 0,
        }
    }

    /// Same format with another protocol
    pub const fn with_proto(mut self, proto: SpiProtocol) -> Self {
        self.proto = proto;
        self
    }
}
