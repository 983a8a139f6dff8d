//! Driver configuration
//!
//! Board- and build-specific choices that change how a chip is driven:
//! preferred erase granularity, the legacy bank register path, polling
//! deadlines, and so on. With the `std` feature the configuration can be
//! loaded from TOML:
//!
//! ```toml
//! use_4k_sectors = true
//! bank_register = false
//!
//! [timeouts]
//! program_ms = 2000
//! erase_ms = 10000
//! ```

use core::fmt;

/// Polling deadlines, all wall-clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct Timeouts {
    /// Register writes, mode switches and other short operations
    pub default_ms: u32,
    /// One page program
    pub program_ms: u32,
    /// One sector erase
    pub erase_ms: u32,
    /// Whole-chip erase, per 2 MiB of density
    pub chip_erase_per_2mib_ms: u32,
    /// Delay between two status polls
    pub poll_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default_ms: 40_000,
            program_ms: 2_000,
            erase_ms: 10_000,
            chip_erase_per_2mib_ms: 40_000,
            poll_us: 10,
        }
    }
}

impl Timeouts {
    /// Chip erase deadline in milliseconds for a device of `size` bytes
    pub fn chip_erase_ms(&self, size: u64) -> u64 {
        let units = core::cmp::max(1, size / (2 * 1024 * 1024));
        self.chip_erase_per_2mib_ms as u64 * units
    }
}

/// Configuration of one NOR session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct NorConfig {
    /// Prefer 4 KiB erase granularity when the chip offers it
    pub use_4k_sectors: bool,
    /// Stay in 3-byte addressing above 16 MiB and switch banks through
    /// the bank address register instead
    pub bank_register: bool,
    /// Clear the block protection bits during init on chips that power up
    /// locked
    pub unlock_all_on_init: bool,
    /// Issue a soft reset before reading the JEDEC ID
    pub soft_reset_on_boot: bool,
    /// Use the inverted opcode as command extension for the boot soft reset
    /// when the chip does not advertise one
    pub soft_reset_invert: bool,
    /// Allow the FAST_READ opcode
    pub fast_read: bool,
    /// The reset line is not wired, so octal DTR must never be entered
    pub broken_reset: bool,
    /// Validate every candidate protocol with `SpiMaster::supports_op`
    /// instead of trusting the controller feature flags
    pub smart_hwcaps: bool,
    /// Polling deadlines
    pub timeouts: Timeouts,
}

impl Default for NorConfig {
    fn default() -> Self {
        Self {
            use_4k_sectors: false,
            bank_register: false,
            unlock_all_on_init: true,
            soft_reset_on_boot: false,
            soft_reset_invert: false,
            fast_read: true,
            broken_reset: false,
            smart_hwcaps: true,
            timeouts: Timeouts::default(),
        }
    }
}

/// Errors from loading a configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The file could not be read
    IoError,
    /// The file is not valid TOML for this structure
    ParseError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError => write!(f, "failed to read configuration"),
            Self::ParseError => write!(f, "failed to parse configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl NorConfig {
    /// Parse a configuration from a TOML string
    ///
    /// Missing keys keep their default value.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| {
            log::debug!("config: {}", e);
            ConfigError::ParseError
        })
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Serialize the configuration to TOML
    pub fn to_toml_string(&self) -> Result<std::string::String, ConfigError> {
        toml::to_string(self).map_err(|_| ConfigError::ParseError)
    }
}
