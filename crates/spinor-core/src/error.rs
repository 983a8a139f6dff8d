//! Error types for spinor-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Fault reported by the flash itself through its status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// The erase error bit was set after an erase
    EraseFailed,
    /// The program error bit was set after a page program
    ProgramFailed,
    /// The chip refused to modify a protected sector
    ProtectedSector,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// SPI transfer failed
    TransferFailed,
    /// Opcode is not supported by the transport
    OpcodeNotSupported,
    /// Requested wire protocol is not supported by the transport
    ProtocolNotSupported,
    /// The bus could not be claimed
    BusUnavailable,

    // Identification errors
    /// No catalog entry matches the JEDEC ID read from the chip
    ChipNotFound,
    /// The SFDP signature or major revision is not recognized
    SfdpNotFound,
    /// An SFDP table is malformed
    SfdpInvalid,

    // Setup errors
    /// No read protocol is supported by both the controller and the flash
    NoReadProtocol,
    /// No page program protocol is supported by both sides
    NoProgramProtocol,
    /// Feature not supported by this chip or configuration
    NotSupported,
    /// The quad enable bit could not be set
    QuadEnableFailed,

    // Address/size errors
    /// Address is beyond flash chip size
    AddressOutOfBounds,
    /// Offset or length is not aligned to the active erase size
    InvalidAlignment,
    /// Address width larger than 4 bytes
    AddressWidthUnsupported(u8),

    // Operation errors
    /// Status never reached ready within the operation timeout
    Timeout,
    /// The flash reported an erase or program fault
    DeviceError(DeviceFault),
    /// Operation aborted by the caller between sectors
    Interrupted,

    // Protection errors
    /// The target range is write protected
    WriteProtected,
    /// The requested lock range cannot be expressed by the protection bits
    LockRangeUnsupported,
    /// A status register write did not read back as written
    RegisterVerifyFailed,

    /// Invalid parameter passed to the driver
    InvalidParameter,
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EraseFailed => write!(f, "erase operation failed"),
            Self::ProgramFailed => write!(f, "program operation failed"),
            Self::ProtectedSector => write!(f, "attempted to modify a protected sector"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferFailed => write!(f, "SPI transfer failed"),
            Self::OpcodeNotSupported => write!(f, "SPI opcode not supported by transport"),
            Self::ProtocolNotSupported => write!(f, "wire protocol not supported by transport"),
            Self::BusUnavailable => write!(f, "SPI bus unavailable"),
            Self::ChipNotFound => write!(f, "unrecognized JEDEC id"),
            Self::SfdpNotFound => write!(f, "SFDP signature not found"),
            Self::SfdpInvalid => write!(f, "malformed SFDP table"),
            Self::NoReadProtocol => write!(f, "no read protocol supported by both sides"),
            Self::NoProgramProtocol => write!(f, "no page program protocol supported by both sides"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::QuadEnableFailed => write!(f, "failed to set quad enable bit"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::AddressWidthUnsupported(w) => write!(f, "address width is too large: {}", w),
            Self::Timeout => write!(f, "operation timed out"),
            Self::DeviceError(fault) => write!(f, "{}", fault),
            Self::Interrupted => write!(f, "operation interrupted"),
            Self::WriteProtected => write!(f, "range is write protected"),
            Self::LockRangeUnsupported => write!(f, "lock range not expressible"),
            Self::RegisterVerifyFailed => write!(f, "register read back mismatch"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Failure of a multi-chunk operation
///
/// `completed` is the number of bytes read, programmed or erased before
/// the failure, counted from the start of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialError {
    /// The underlying error
    pub error: Error,
    /// Bytes completed before the failure
    pub completed: usize,
}

impl PartialError {
    /// Wrap an error that happened after `completed` bytes
    pub const fn new(error: Error, completed: usize) -> Self {
        Self { error, completed }
    }
}

impl From<Error> for PartialError {
    fn from(error: Error) -> Self {
        Self::new(error, 0)
    }
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} bytes", self.error, self.completed)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PartialError {}

/// Result of a multi-chunk operation
pub type PartialResult<T> = core::result::Result<T, PartialError>;
