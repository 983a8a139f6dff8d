//! Flash command sequences
//!
//! Thin wrappers that build one command each and hand it to the transport.

pub mod spi25;
