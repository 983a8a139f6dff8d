//! Catalog feature flags

use bitflags::bitflags;

bitflags! {
    /// Feature flags for catalog entries
    ///
    /// These flags describe what a chip supports when SFDP is missing or
    /// incomplete, and which quirks it needs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CatalogFlags: u32 {
        // Erase
        /// Has 4 KiB sector erase (0x20)
        const SECT_4K          = 1 << 0;
        /// Has 4 KiB sector erase with the PMC opcode (0xD7)
        const SECT_4K_PMC      = 1 << 1;
        /// Chip erase is not supported
        const NO_CHIP_ERASE    = 1 << 2;
        /// No erase command at all
        const NO_ERASE         = 1 << 3;

        // Read capabilities
        /// FAST_READ is not supported
        const NO_FR            = 1 << 4;
        /// Supports 1-1-2 reads
        const DUAL_READ        = 1 << 5;
        /// Supports 1-1-4 reads
        const QUAD_READ        = 1 << 6;
        /// Supports 1-1-8 reads
        const OCTAL_READ       = 1 << 7;
        /// Supports 8D-8D-8D reads
        const OCTAL_DTR_READ   = 1 << 8;
        /// Do not read SFDP even if the chip has wide reads
        const SKIP_SFDP        = 1 << 9;

        // Addressing
        /// Has distinct 4-byte address opcodes
        const FOUR_B_OPCODES   = 1 << 10;

        // Status and protection
        /// Uses the flag status register for ready and errors
        const USE_FSR          = 1 << 11;
        /// Error bits in SR must be cleared with CLSR
        const USE_CLSR         = 1 << 12;
        /// Status register block protection
        const HAS_LOCK         = 1 << 13;
        /// Block protection can be anchored at the bottom (TB bit)
        const HAS_TB           = 1 << 14;
        /// SST26 style block protection register
        const HAS_SST26LOCK    = 1 << 15;

        // Write behavior
        /// Byte program and AAI word program only (older SST parts)
        const SST_WRITE        = 1 << 16;
    }
}

impl Default for CatalogFlags {
    fn default() -> Self {
        CatalogFlags::empty()
    }
}

impl CatalogFlags {
    /// Wide read flags that make SFDP worth probing
    pub const SFDP_HINTS: Self = Self::DUAL_READ
        .union(Self::QUAD_READ)
        .union(Self::OCTAL_DTR_READ);
}
