//! SFDP type definitions
//!
//! Wire layouts of the SFDP header and parameter headers as defined by
//! JEDEC JESD216, plus the field positions the driver decodes.

use zerocopy::{FromBytes, Immutable, KnownLayout};

/// SFDP signature magic value ("SFDP" in little-endian)
pub const SFDP_SIGNATURE: u32 = 0x50444653;

/// The only major revision understood
pub const SFDP_JESD216_MAJOR: u8 = 1;

/// Size of the SFDP header including the embedded BFPT parameter header
pub const SFDP_HEADER_LEN: usize = 16;

/// Size of one parameter header
pub const PARAM_HEADER_LEN: usize = 8;

/// Maximum number of BFPT DWORDs decoded (JESD216D)
pub const BFPT_DWORD_MAX: usize = 20;

/// BFPT length of the original JESD216
pub const BFPT_DWORD_MAX_JESD216: usize = 9;

/// BFPT length of JESD216B
pub const BFPT_DWORD_MAX_JESD216B: usize = 16;

/// DWORDs needed from the xSPI profile 1.0 table
pub const PROFILE1_DWORD_MIN: usize = 5;

/// DWORDs needed from the SCCR map
pub const SCCR_DWORD_MIN: usize = 22;

// ============================================================================
// Parameter IDs (MSB << 8 | LSB)
// ============================================================================

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;
/// Sector Map Parameter Table ID
pub const PARAM_ID_SECTOR_MAP: u16 = 0xFF81;
/// xSPI Profile 1.0 Parameter Table ID
pub const PARAM_ID_XSPI_1_0: u16 = 0xFF05;
/// Status/Control/Config Register Map ID
pub const PARAM_ID_SCCR_MAP: u16 = 0xFF87;
/// SST / Microchip vendor table ID
pub const PARAM_ID_SST: u16 = 0x01BF;

// ============================================================================
// BFPT fields
// ============================================================================

/// DWORD 1 bits [18:17], address bytes
pub const BFPT_DWORD1_ADDRESS_BYTES_SHIFT: u32 = 17;
/// 3-byte only
pub const BFPT_ADDRESS_BYTES_3_ONLY: u32 = 0;
/// 3-byte default, 4-byte capable
pub const BFPT_ADDRESS_BYTES_3_OR_4: u32 = 1;
/// 4-byte only
pub const BFPT_ADDRESS_BYTES_4_ONLY: u32 = 2;

/// DWORD 2 bit 31, density is an exponent
pub const BFPT_DWORD2_EXPONENT: u32 = 1 << 31;

/// DWORD 11 bits [7:4], page size exponent
pub const BFPT_DWORD11_PAGE_SIZE_SHIFT: u32 = 4;

/// DWORD 15 bits [22:20], quad enable requirement
pub const BFPT_DWORD15_QER_SHIFT: u32 = 20;

/// DWORD 16 bit 12, 0x66 / 0x99 soft reset
pub const BFPT_DWORD16_SOFT_RST: u32 = 1 << 12;
/// DWORD 16 bit 21, exiting 4-byte mode needs a power cycle
pub const BFPT_DWORD16_EX4B_PWRCYC: u32 = 1 << 21;

/// DWORD 18 bits [30:29], command extension
pub const BFPT_DWORD18_CMD_EXT_SHIFT: u32 = 29;

// ============================================================================
// Wire layouts
// ============================================================================

/// SFDP header as stored at offset 0
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawSfdpHeader {
    /// "SFDP", little-endian
    pub signature: [u8; 4],
    /// Minor revision
    pub minor: u8,
    /// Major revision
    pub major: u8,
    /// Number of parameter headers after the BFPT one
    pub nph: u8,
    /// Access protocol, 0xFF for legacy
    pub access_protocol: u8,
    /// Mandatory BFPT parameter header
    pub bfpt: RawParamHeader,
}

/// Parameter header as stored in the SFDP area
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct RawParamHeader {
    /// Parameter ID LSB
    pub id_lsb: u8,
    /// Table minor revision
    pub minor: u8,
    /// Table major revision
    pub major: u8,
    /// Table length in DWORDs
    pub length: u8,
    /// Table pointer, 24-bit little-endian
    pub pointer: [u8; 3],
    /// Parameter ID MSB
    pub id_msb: u8,
}

// ============================================================================
// Decoded headers
// ============================================================================

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl SfdpRevision {
    /// Create a new revision
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Decoded parameter header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl From<&RawParamHeader> for ParameterHeader {
    fn from(raw: &RawParamHeader) -> Self {
        Self {
            id: ((raw.id_msb as u16) << 8) | raw.id_lsb as u16,
            revision: SfdpRevision::new(raw.major, raw.minor),
            length_dwords: raw.length,
            table_pointer: u32::from_le_bytes([raw.pointer[0], raw.pointer[1], raw.pointer[2], 0]),
        }
    }
}

impl ParameterHeader {
    /// Table length in bytes
    pub fn length_bytes(&self) -> usize {
        self.length_dwords as usize * 4
    }

    /// Returns true if this header describes a BFPT that is newer than
    /// `other`
    ///
    /// A higher minor revision wins, then a longer table.
    pub fn supersedes_bfpt(&self, other: &Self) -> bool {
        self.id == PARAM_ID_BASIC
            && self.revision.major == SFDP_JESD216_MAJOR
            && (self.revision.minor > other.revision.minor
                || (self.revision.minor == other.revision.minor
                    && self.length_dwords > other.length_dwords))
    }
}

/// Decoded SFDP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SfdpHeader {
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers after the BFPT one
    pub nph: u8,
    /// The BFPT parameter header embedded in the SFDP header
    pub bfpt: ParameterHeader,
}

/// BFPT DWORDs, zero-filled past the table length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bfpt {
    /// DWORD 1 is `dwords[0]`
    pub dwords: [u32; BFPT_DWORD_MAX],
}

impl Bfpt {
    /// Decode little-endian DWORDs from raw table bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut dwords = [0u32; BFPT_DWORD_MAX];
        for (dword, chunk) in dwords.iter_mut().zip(bytes.chunks_exact(4)) {
            *dword = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self { dwords }
    }

    /// DWORD `n`, counted from 1 as in the JEDEC tables
    pub fn dword(&self, n: usize) -> u32 {
        self.dwords[n - 1]
    }
}
