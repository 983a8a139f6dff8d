//! SPI transport abstraction
//!
//! The driver never touches a bus directly; it hands fully described
//! commands to an [`SpiMaster`] implementation.

mod traits;

pub use traits::{check_protocol_supported, SpiFeatures, SpiMaster};
