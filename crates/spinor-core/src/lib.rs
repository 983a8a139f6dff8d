//! spinor-core - SPI NOR flash identification and operation engine
//!
//! This crate turns a raw SPI transport into an addressable, erasable
//! byte-storage device. It identifies the attached chip from its JEDEC ID,
//! discovers its parameters from SFDP tables, negotiates the fastest wire
//! protocol both sides support, and then drives read, page-program and
//! sector-erase sequences with status polling.
//!
//! It is designed to be `no_std` compatible for use in boot firmware.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, serde and
//!   TOML configuration loading)
//! - `alloc` - Enable heap allocation
//! - `is_sync` - Compile the transport-facing API as blocking code
//!
//! # Example
//!
//! ```ignore
//! use spinor_core::{flash::NorSession, NorConfig, StdClock};
//!
//! fn dump<M: spinor_core::transport::SpiMaster>(master: M) -> spinor_core::Result<()> {
//!     let mut nor = NorSession::scan(master, StdClock::new(), NorConfig::default())?;
//!     println!("Found {} ({} bytes)", nor.name(), nor.size());
//!
//!     let mut buf = [0u8; 256];
//!     nor.read(0, &mut buf).map_err(|e| e.error)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod config;
pub mod error;
pub mod fixups;
pub mod flash;
pub mod negotiate;
pub mod params;
pub mod protocol;
pub mod sfdp;
pub mod spi;
pub mod time;
pub mod transport;
pub mod wp;

pub use config::{NorConfig, Timeouts};
pub use error::{DeviceFault, Error, PartialError, PartialResult, Result};
#[cfg(feature = "std")]
pub use time::StdClock;
pub use time::Clock;
