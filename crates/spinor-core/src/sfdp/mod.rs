//! SFDP (Serial Flash Discoverable Parameters) parsing
//!
//! This module implements parsing of SFDP data structures as defined by
//! JEDEC JESD216 (through revision H). SFDP lets a chip describe its own
//! density, fast read modes, erase types, page size, quad enable method
//! and octal DTR settings.
//!
//! # Overview
//!
//! SFDP data is stored in a reserved area of the flash chip and can be
//! read using the RDSFDP command (0x5A). The structure contains:
//!
//! - An SFDP header with signature and revision info
//! - One or more parameter headers describing available tables
//! - Parameter tables: the mandatory BFPT plus optional vendor and
//!   xSPI tables
//!
//! # Usage
//!
//! ```ignore
//! use spinor_core::{chip, fixups::Fixups, params::FlashParameters, sfdp, NorConfig};
//!
//! let entry = chip::lookup(&id).ok_or(spinor_core::Error::ChipNotFound)?;
//! let config = NorConfig::default();
//! let mut params = FlashParameters::from_catalog(entry, &config);
//! let mut discovered = params.clone();
//! if sfdp::parse_sfdp(&mut master, entry, Fixups::None, &config, &mut discovered).is_ok() {
//!     params = discovered;
//! }
//! ```

mod parser;
mod types;

pub use parser::*;
pub use types::*;
