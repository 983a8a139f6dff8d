//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions,
//! wire protocols, and standard JEDEC opcodes.

mod address;
mod command;
pub mod opcodes;
mod protocol;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use protocol::{CmdExtension, CmdFormat, SpiProtocol};
