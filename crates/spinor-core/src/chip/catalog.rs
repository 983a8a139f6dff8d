//! Static table of known chips
//!
//! Used when SFDP is missing or incomplete, and to pick the vendor
//! fixups. The table is ordered by manufacturer.

use super::flags::CatalogFlags as F;
use super::types::CatalogEntry;

const K64: u32 = 64 * 1024;
const K256: u32 = 256 * 1024;

const WIDE: F = F::DUAL_READ.union(F::QUAD_READ);
const SPANSION_S: F = WIDE.union(F::USE_CLSR);
const SPANSION_HX_T: F = F::SECT_4K
    .union(F::QUAD_READ)
    .union(F::FOUR_B_OPCODES)
    .union(F::HAS_LOCK)
    .union(F::USE_CLSR);
const WINBOND_LOCK: F = F::SECT_4K
    .union(WIDE)
    .union(F::HAS_LOCK)
    .union(F::HAS_TB);

/// Every chip the driver knows by ID
pub static CATALOG: &[CatalogEntry] = &[
    // Atmel
    CatalogEntry::new("at25df321a", &[0x1f, 0x47, 0x01, 0x00], K64, 64, F::SECT_4K.union(F::HAS_LOCK)),
    CatalogEntry::new("at25sl321", &[0x1f, 0x42, 0x16], K64, 64, F::SECT_4K.union(WIDE)),
    // EON
    CatalogEntry::new("en25q64", &[0x1c, 0x30, 0x17], K64, 128, F::SECT_4K),
    CatalogEntry::new("en25qh128", &[0x1c, 0x70, 0x18], K64, 256, F::empty()),
    // GigaDevice
    CatalogEntry::new("gd25q16", &[0xc8, 0x40, 0x15], K64, 32, WINBOND_LOCK),
    CatalogEntry::new("gd25q64", &[0xc8, 0x40, 0x17], K64, 128, WINBOND_LOCK),
    CatalogEntry::new("gd25q128", &[0xc8, 0x40, 0x18], K64, 256, WINBOND_LOCK),
    // ISSI
    CatalogEntry::new("is25lp032", &[0x9d, 0x60, 0x16], K64, 64, F::SECT_4K.union(F::DUAL_READ)),
    CatalogEntry::new("is25lp128", &[0x9d, 0x60, 0x18], K64, 256, F::SECT_4K.union(WIDE)),
    CatalogEntry::new("is25lp256", &[0x9d, 0x60, 0x19], K64, 512, F::SECT_4K.union(WIDE)),
    CatalogEntry::new(
        "is25wp256",
        &[0x9d, 0x70, 0x19],
        K64,
        512,
        F::SECT_4K.union(WIDE).union(F::FOUR_B_OPCODES),
    ),
    // Macronix
    CatalogEntry::new("mx25l2006e", &[0xc2, 0x20, 0x12], K64, 4, F::SECT_4K),
    CatalogEntry::new("mx25l4005", &[0xc2, 0x20, 0x13], K64, 8, F::SECT_4K),
    CatalogEntry::new("mx25l8005", &[0xc2, 0x20, 0x14], K64, 16, F::empty()),
    CatalogEntry::new("mx25l1606e", &[0xc2, 0x20, 0x15], K64, 32, F::SECT_4K),
    CatalogEntry::new("mx25l3205d", &[0xc2, 0x20, 0x16], K64, 64, F::SECT_4K),
    CatalogEntry::new("mx25l6405d", &[0xc2, 0x20, 0x17], K64, 128, F::SECT_4K),
    CatalogEntry::new("mx25u6435f", &[0xc2, 0x25, 0x37], K64, 128, F::SECT_4K),
    CatalogEntry::new("mx25l12805d", &[0xc2, 0x20, 0x18], K64, 256, F::SECT_4K),
    CatalogEntry::new("mx25l25635f", &[0xc2, 0x20, 0x19], K64, 512, F::SECT_4K.union(WIDE)),
    CatalogEntry::new(
        "mx66l51235l",
        &[0xc2, 0x20, 0x1a],
        K64,
        1024,
        F::SECT_4K.union(WIDE).union(F::FOUR_B_OPCODES),
    ),
    CatalogEntry::new(
        "mx66lm1g45g",
        &[0xc2, 0x85, 0x3b],
        32 * 1024,
        4096,
        F::SECT_4K.union(F::OCTAL_READ).union(F::OCTAL_DTR_READ),
    ),
    CatalogEntry::new(
        "mx66uw2g345g",
        &[0xc2, 0x84, 0x3c],
        K64,
        4096,
        F::SECT_4K
            .union(F::OCTAL_READ)
            .union(F::OCTAL_DTR_READ)
            .union(F::FOUR_B_OPCODES),
    ),
    // Micron / ST
    CatalogEntry::new("m25p40", &[0x20, 0x20, 0x13], K64, 8, F::empty()),
    CatalogEntry::new("m25p80", &[0x20, 0x20, 0x14], K64, 16, F::empty()),
    CatalogEntry::new("m25p16", &[0x20, 0x20, 0x15], K64, 32, F::empty()),
    CatalogEntry::new("m25p32", &[0x20, 0x20, 0x16], K64, 64, F::empty()),
    CatalogEntry::new("m25p64", &[0x20, 0x20, 0x17], K64, 128, F::empty()),
    CatalogEntry::new("m25p128", &[0x20, 0x20, 0x18], K256, 64, F::empty()),
    CatalogEntry::new("n25q064a", &[0x20, 0xbb, 0x17], K64, 128, F::SECT_4K.union(F::QUAD_READ)),
    CatalogEntry::new("n25q128a13", &[0x20, 0xba, 0x18], K64, 256, F::SECT_4K.union(F::QUAD_READ)),
    CatalogEntry::new("n25q256a", &[0x20, 0xba, 0x19], K64, 512, F::SECT_4K.union(WIDE)),
    CatalogEntry::new(
        "n25q512a",
        &[0x20, 0xbb, 0x20],
        K64,
        1024,
        F::SECT_4K.union(F::USE_FSR).union(F::QUAD_READ),
    ),
    CatalogEntry::new(
        "n25q00",
        &[0x20, 0xba, 0x21],
        K64,
        2048,
        F::SECT_4K
            .union(F::USE_FSR)
            .union(F::QUAD_READ)
            .union(F::NO_CHIP_ERASE),
    ),
    CatalogEntry::new(
        "mt35xu512aba",
        &[0x2c, 0x5b, 0x1a],
        128 * 1024,
        512,
        F::USE_FSR
            .union(F::OCTAL_READ)
            .union(F::FOUR_B_OPCODES)
            .union(F::OCTAL_DTR_READ),
    ),
    // Spansion / Cypress
    CatalogEntry::new("s25fl128s_256k", &[0x01, 0x20, 0x18, 0x4d, 0x00, 0x80], K256, 64, SPANSION_S),
    CatalogEntry::new("s25fl128s_64k", &[0x01, 0x20, 0x18, 0x4d, 0x01, 0x80], K64, 256, SPANSION_S),
    CatalogEntry::new("s25fl256s0", &[0x01, 0x02, 0x19, 0x4d, 0x00], K256, 128, SPANSION_S),
    CatalogEntry::new("s25fl256s1", &[0x01, 0x02, 0x19, 0x4d, 0x01], K64, 512, SPANSION_S),
    CatalogEntry::new("s25fl512s", &[0x01, 0x02, 0x20, 0x4d, 0x00, 0x80], K256, 256, SPANSION_S)
        .with_page_size(512),
    CatalogEntry::new(
        "s25fl064l",
        &[0x01, 0x60, 0x17],
        K64,
        128,
        F::SECT_4K.union(WIDE).union(F::FOUR_B_OPCODES),
    ),
    CatalogEntry::new(
        "s25fl256l",
        &[0x01, 0x60, 0x19],
        K64,
        512,
        F::SECT_4K.union(WIDE).union(F::FOUR_B_OPCODES),
    ),
    CatalogEntry::new("s25hl512t", &[0x34, 0x2a, 0x1a, 0x0f, 0x03, 0x90], K256, 256, SPANSION_HX_T),
    CatalogEntry::new("s25hl01gt", &[0x34, 0x2a, 0x1b, 0x0f, 0x03, 0x90], K256, 512, SPANSION_HX_T),
    CatalogEntry::new(
        "s25hl02gt",
        &[0x34, 0x2a, 0x1c, 0x0f, 0x03, 0x90],
        K256,
        1024,
        SPANSION_HX_T.union(F::NO_CHIP_ERASE),
    ),
    CatalogEntry::new("s25hs512t", &[0x34, 0x2b, 0x1a, 0x0f, 0x03, 0x90], K256, 256, SPANSION_HX_T),
    CatalogEntry::new("s25hs01gt", &[0x34, 0x2b, 0x1b, 0x0f, 0x03, 0x90], K256, 512, SPANSION_HX_T),
    CatalogEntry::new(
        "s25hs02gt",
        &[0x34, 0x2b, 0x1c, 0x0f, 0x03, 0x90],
        K256,
        1024,
        SPANSION_HX_T.union(F::NO_CHIP_ERASE),
    ),
    CatalogEntry::new("s28hl512t", &[0x34, 0x5a, 0x1a], K256, 256, F::OCTAL_DTR_READ),
    CatalogEntry::new("s28hs512t", &[0x34, 0x5b, 0x1a], K256, 256, F::OCTAL_DTR_READ),
    CatalogEntry::new("s28hs01gt", &[0x34, 0x5b, 0x1b], K256, 512, F::OCTAL_DTR_READ),
    // SST
    CatalogEntry::new("sst25vf040b", &[0xbf, 0x25, 0x8d], K64, 8, F::SECT_4K.union(F::SST_WRITE)),
    CatalogEntry::new("sst25vf080b", &[0xbf, 0x25, 0x8e], K64, 16, F::SECT_4K.union(F::SST_WRITE)),
    CatalogEntry::new("sst25vf016b", &[0xbf, 0x25, 0x41], K64, 32, F::SECT_4K.union(F::SST_WRITE)),
    CatalogEntry::new("sst25vf032b", &[0xbf, 0x25, 0x4a], K64, 64, F::SECT_4K.union(F::SST_WRITE)),
    CatalogEntry::new("sst26vf016b", &[0xbf, 0x26, 0x41], K64, 32, F::SECT_4K.union(F::HAS_SST26LOCK)),
    CatalogEntry::new("sst26vf032b", &[0xbf, 0x26, 0x42], K64, 64, F::SECT_4K.union(F::HAS_SST26LOCK)),
    CatalogEntry::new(
        "sst26vf064b",
        &[0xbf, 0x26, 0x43],
        K64,
        128,
        F::SECT_4K.union(F::HAS_SST26LOCK).union(WIDE),
    ),
    CatalogEntry::new("sst26wf016", &[0xbf, 0x26, 0x51], K64, 32, F::SECT_4K.union(F::HAS_SST26LOCK)),
    // Winbond
    CatalogEntry::new("w25x40", &[0xef, 0x30, 0x13], K64, 8, F::SECT_4K),
    CatalogEntry::new("w25q16dw", &[0xef, 0x60, 0x15], K64, 32, WINBOND_LOCK),
    CatalogEntry::new("w25q32", &[0xef, 0x40, 0x16], K64, 64, F::SECT_4K),
    CatalogEntry::new("w25q64cv", &[0xef, 0x40, 0x17], K64, 128, F::SECT_4K.union(WIDE)),
    CatalogEntry::new("w25q64fw", &[0xef, 0x60, 0x17], K64, 128, WINBOND_LOCK),
    CatalogEntry::new("w25q128fv", &[0xef, 0x40, 0x18], K64, 256, WINBOND_LOCK),
    CatalogEntry::new("w25q256fv", &[0xef, 0x40, 0x19], K64, 512, F::SECT_4K.union(WIDE)),
];

/// Find the entry matching the raw RDID bytes
///
/// Each entry compares its own `id_len` leading bytes; the first match in
/// table order wins.
pub fn lookup(raw: &[u8]) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.id_len > 0 && entry.matches(raw))
}

/// Find an entry by part name
pub fn find_by_name(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.name == name)
}
