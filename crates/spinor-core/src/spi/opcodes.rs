//! SPI NOR flash opcodes and register bits
//!
//! Standard JEDEC opcodes first, then the 4-byte address variants and the
//! vendor specific commands used by the fixups.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status and configuration registers
// ============================================================================

/// Read Status Register
pub const RDSR: u8 = 0x05;
/// Write Status Register (1 or 2 bytes)
pub const WRSR: u8 = 0x01;
/// Read Configuration Register (status register 2 on some parts)
pub const RDCR: u8 = 0x35;
/// Read Status Register 2 (SR2 bit 7 quad enable parts)
pub const RDSR2: u8 = 0x3F;
/// Write Status Register 2 (SR2 bit 7 quad enable parts)
pub const WRSR2: u8 = 0x3E;
/// Read Flag Status Register
pub const RDFSR: u8 = 0x70;
/// Clear Flag Status Register
pub const CLFSR: u8 = 0x50;
/// Clear Status Register (Spansion error bits)
pub const CLSR: u8 = 0x30;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Read SFDP
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Read commands - 3-byte address
// ============================================================================

/// Read Data (up to ~33 MHz)
pub const READ: u8 = 0x03;
/// Fast Read (with dummy byte, up to max frequency)
pub const FAST_READ: u8 = 0x0B;
/// Dual Output Read (1-1-2)
pub const READ_1_1_2: u8 = 0x3B;
/// Dual I/O Read (1-2-2)
pub const READ_1_2_2: u8 = 0xBB;
/// Quad Output Read (1-1-4)
pub const READ_1_1_4: u8 = 0x6B;
/// Quad I/O Read (1-4-4)
pub const READ_1_4_4: u8 = 0xEB;
/// Octal Output Read (1-1-8)
pub const READ_1_1_8: u8 = 0x8B;
/// Octal I/O Read (1-8-8)
pub const READ_1_8_8: u8 = 0xCB;
/// DTR Fast Read (1D-1D-1D)
pub const READ_1_1_1_DTR: u8 = 0x0D;
/// DTR Dual I/O Read (1D-2D-2D)
pub const READ_1_2_2_DTR: u8 = 0xBD;
/// DTR Quad I/O Read (1D-4D-4D)
pub const READ_1_4_4_DTR: u8 = 0xED;

// ============================================================================
// Read commands - 4-byte address
// ============================================================================

/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;
/// Fast Read with 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Dual Output Read with 4-byte address
pub const READ_1_1_2_4B: u8 = 0x3C;
/// Dual I/O Read with 4-byte address
pub const READ_1_2_2_4B: u8 = 0xBC;
/// Quad Output Read with 4-byte address
pub const READ_1_1_4_4B: u8 = 0x6C;
/// Quad I/O Read with 4-byte address
pub const READ_1_4_4_4B: u8 = 0xEC;
/// Octal Output Read with 4-byte address
pub const READ_1_1_8_4B: u8 = 0x7C;
/// Octal I/O Read with 4-byte address
pub const READ_1_8_8_4B: u8 = 0xCC;
/// DTR Fast Read with 4-byte address
pub const READ_1_1_1_DTR_4B: u8 = 0x0E;
/// DTR Dual I/O Read with 4-byte address
pub const READ_1_2_2_DTR_4B: u8 = 0xBE;
/// DTR Quad I/O Read with 4-byte address
pub const READ_1_4_4_DTR_4B: u8 = 0xEE;

// ============================================================================
// Program commands
// ============================================================================

/// Page Program
pub const PP: u8 = 0x02;
/// Quad Input Page Program (1-1-4)
pub const PP_1_1_4: u8 = 0x32;
/// Quad I/O Page Program (1-4-4)
pub const PP_1_4_4: u8 = 0x38;
/// Octal Input Page Program (1-1-8)
pub const PP_1_1_8: u8 = 0x82;
/// Octal I/O Page Program (1-8-8)
pub const PP_1_8_8: u8 = 0xC2;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;
/// Quad Input Page Program with 4-byte address
pub const PP_1_1_4_4B: u8 = 0x34;
/// Quad I/O Page Program with 4-byte address
pub const PP_1_4_4_4B: u8 = 0x3E;
/// Octal Input Page Program with 4-byte address
pub const PP_1_1_8_4B: u8 = 0x84;
/// Octal I/O Page Program with 4-byte address
pub const PP_1_8_8_4B: u8 = 0x8E;

// ============================================================================
// Erase commands
// ============================================================================

/// 4 KiB sector erase
pub const BE_4K: u8 = 0x20;
/// 4 KiB sector erase on PMC parts
pub const BE_4K_PMC: u8 = 0xD7;
/// 32 KiB block erase
pub const BE_32K: u8 = 0x52;
/// Sector erase (usually 64 KiB)
pub const SE: u8 = 0xD8;
/// Chip erase
pub const CHIP_ERASE: u8 = 0xC7;
/// 4 KiB sector erase with 4-byte address
pub const BE_4K_4B: u8 = 0x21;
/// 32 KiB block erase with 4-byte address
pub const BE_32K_4B: u8 = 0x5C;
/// Sector erase with 4-byte address
pub const SE_4B: u8 = 0xDC;

// ============================================================================
// Address mode and bank register
// ============================================================================

/// Enter 4-byte address mode
pub const EN4B: u8 = 0xB7;
/// Exit 4-byte address mode
pub const EX4B: u8 = 0xE9;
/// Exit 4-byte address mode (Cypress)
pub const EX4B_CYPRESS: u8 = 0xB8;
/// Bank register read (Spansion)
pub const BRRD: u8 = 0x16;
/// Bank register write (Spansion)
pub const BRWR: u8 = 0x17;
/// Read extended address register
pub const RDEAR: u8 = 0xC8;
/// Write extended address register
pub const WREAR: u8 = 0xC5;

// ============================================================================
// Reset
// ============================================================================

/// Reset Enable
pub const SRSTEN: u8 = 0x66;
/// Reset Memory
pub const SRST: u8 = 0x99;

// ============================================================================
// SST
// ============================================================================

/// Byte program
pub const BP: u8 = 0x02;
/// Auto address increment word program
pub const AAI_WP: u8 = 0xAD;
/// Read block protection register (SST26)
pub const READ_BPR: u8 = 0x72;
/// Write block protection register (SST26)
pub const WRITE_BPR: u8 = 0x42;

// ============================================================================
// Vendor register access
// ============================================================================

/// Read any register (Spansion/Cypress)
pub const RDAR: u8 = 0x65;
/// Write any register (Spansion/Cypress)
pub const WRAR: u8 = 0x71;
/// Write volatile configuration register (Micron octal)
pub const MT_WR_ANY_REG: u8 = 0x81;
/// 8D-8D-8D fast read (Micron)
pub const MT_DTR_RD: u8 = 0xFD;
/// Write configuration register 2 (Macronix)
pub const WR_CR2: u8 = 0x72;
/// 8D-8D-8D fast read (Cypress)
pub const CYPRESS_RD_FAST: u8 = 0xEE;

// ============================================================================
// Status register bits
// ============================================================================

/// SR: write in progress
pub const SR_WIP: u8 = 1 << 0;
/// SR: write enable latch
pub const SR_WEL: u8 = 1 << 1;
/// SR: block protect bit 0
pub const SR_BP0: u8 = 1 << 2;
/// SR: block protect bit 1
pub const SR_BP1: u8 = 1 << 3;
/// SR: block protect bit 2
pub const SR_BP2: u8 = 1 << 4;
/// SR: top/bottom protect
pub const SR_TB: u8 = 1 << 5;
/// SR: erase error (Spansion)
pub const SR_E_ERR: u8 = 1 << 5;
/// SR: program error (Spansion)
pub const SR_P_ERR: u8 = 1 << 6;
/// SR: quad enable (Macronix)
pub const SR_QUAD_EN_MX: u8 = 1 << 6;
/// SR: status register write disable
pub const SR_SRWD: u8 = 1 << 7;

/// CR: quad enable (Spansion)
pub const CR_QUAD_EN_SPAN: u8 = 1 << 1;
/// SR2: quad enable on bit 7
pub const SR2_QUAD_EN_BIT7: u8 = 1 << 7;

/// FSR: ready
pub const FSR_READY: u8 = 1 << 7;
/// FSR: erase error
pub const FSR_E_ERR: u8 = 1 << 5;
/// FSR: program error
pub const FSR_P_ERR: u8 = 1 << 4;
/// FSR: protection error
pub const FSR_PT_ERR: u8 = 1 << 1;

// ============================================================================
// Vendor register addresses and values
// ============================================================================

/// Spansion volatile status register 1
pub const SPANSION_STR1V: u32 = 0x0080_0000;
/// Spansion volatile configuration register 1
pub const SPANSION_CFR1V: u32 = 0x0080_0002;
/// Cypress volatile configuration register 2
pub const CYPRESS_CFR2V: u32 = 0x0080_0003;
/// Spansion volatile configuration register 3
pub const SPANSION_CFR3V: u32 = 0x0080_0004;
/// Cypress volatile configuration register 5
pub const CYPRESS_CFR5V: u32 = 0x0080_0006;
/// CFR3V: uniform sector architecture selected (S25Hx-T)
pub const CFR3V_UNHYSA: u8 = 1 << 3;
/// CFR3V: uniform sector architecture selected (S28Hx-T)
pub const CFR3V_UNISECT: u8 = 1 << 3;
/// CFR3V: 512 byte page buffer
pub const CFR3V_PGMBUF: u8 = 1 << 4;
/// CFR2V: memory latency code for 24 dummy cycles
pub const CFR2V_MEMLAT_11_24: u8 = 0x0B;
/// CFR5V: octal DTR enable
pub const CFR5V_OCT_DTR_EN: u8 = 0x43;

/// Micron volatile configuration register 0 (I/O mode)
pub const MT_CFR0V: u32 = 0x00;
/// Micron volatile configuration register 1 (dummy cycles)
pub const MT_CFR1V: u32 = 0x01;
/// Micron CFR0V value for octal DTR
pub const MT_OCT_DTR: u8 = 0xE7;

/// Macronix CR2 address of the I/O mode field
pub const MXIC_CR2_MODE: u32 = 0x0000_0000;
/// Macronix CR2 address of the dummy cycle field
pub const MXIC_CR2_DC: u32 = 0x0000_0300;
/// Macronix CR2 dummy cycle code for 20 cycles
pub const MXIC_DC_20: u8 = 0x00;
/// Macronix CR2 mode value for octal DTR
pub const MXIC_OPI_DTR_EN: u8 = 0x02;
