//! Catalog entry definition

use super::flags::CatalogFlags;

/// Maximum number of ID bytes a catalog entry can match on
pub const MAX_ID_LEN: usize = 6;

/// One known chip
///
/// Entries are static data. `id_len` bytes of `id` must match the start of
/// the RDID response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Part name
    pub name: &'static str,
    /// JEDEC ID bytes, manufacturer first
    pub id: [u8; MAX_ID_LEN],
    /// Number of meaningful bytes in `id`
    pub id_len: u8,
    /// Uniform sector size in bytes
    pub sector_size: u32,
    /// Number of sectors
    pub n_sectors: u32,
    /// Page program buffer size in bytes
    pub page_size: u16,
    /// Default address width, 0 when not specified
    pub addr_width: u8,
    /// Feature flags
    pub flags: CatalogFlags,
}

impl CatalogEntry {
    /// Create an entry with a 256 byte page
    pub const fn new(
        name: &'static str,
        id_bytes: &[u8],
        sector_size: u32,
        n_sectors: u32,
        flags: CatalogFlags,
    ) -> Self {
        let mut id = [0u8; MAX_ID_LEN];
        let mut i = 0;
        while i < id_bytes.len() && i < MAX_ID_LEN {
            id[i] = id_bytes[i];
            i += 1;
        }
        Self {
            name,
            id,
            id_len: i as u8,
            sector_size,
            n_sectors,
            page_size: 256,
            addr_width: 0,
            flags,
        }
    }

    /// Override the page size
    pub const fn with_page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set a default address width
    pub const fn with_addr_width(mut self, addr_width: u8) -> Self {
        self.addr_width = addr_width;
        self
    }

    /// The ID bytes this entry matches on
    pub fn id_bytes(&self) -> &[u8] {
        &self.id[..self.id_len as usize]
    }

    /// JEDEC manufacturer ID (first ID byte)
    pub const fn manufacturer(&self) -> u8 {
        self.id[0]
    }

    /// Total size in bytes
    pub const fn total_size(&self) -> u64 {
        self.sector_size as u64 * self.n_sectors as u64
    }

    /// Returns true if `raw` starts with this entry's ID
    pub fn matches(&self, raw: &[u8]) -> bool {
        raw.len() >= self.id_len as usize && raw[..self.id_len as usize] == *self.id_bytes()
    }
}

/// JEDEC manufacturer IDs
pub mod manufacturer {
    /// AMD / Spansion
    pub const SPANSION: u8 = 0x01;
    /// Atmel / Adesto
    pub const ATMEL: u8 = 0x1F;
    /// Eon
    pub const EON: u8 = 0x1C;
    /// Cypress (S25Hx-T / S28Hx-T)
    pub const CYPRESS: u8 = 0x34;
    /// GigaDevice
    pub const GIGADEVICE: u8 = 0xC8;
    /// Intel
    pub const INTEL: u8 = 0x89;
    /// ISSI
    pub const ISSI: u8 = 0x9D;
    /// Macronix
    pub const MACRONIX: u8 = 0xC2;
    /// Micron (shares the ST ID)
    pub const MICRON: u8 = 0x20;
    /// Micron octal parts
    pub const MICRON_OCTAL: u8 = 0x2C;
    /// SST / Microchip
    pub const SST: u8 = 0xBF;
    /// ST Microelectronics
    pub const ST: u8 = 0x20;
    /// Winbond
    pub const WINBOND: u8 = 0xEF;
}
