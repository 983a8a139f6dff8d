//! Transport trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, traits are async (suitable for Embassy or tokio based firmware)
//! - With the `is_sync` feature, traits become synchronous

use crate::error::{Error, Result};
use crate::spi::{AddressWidth, SpiCommand, SpiProtocol};
use bitflags::bitflags;
use maybe_async::maybe_async;

bitflags! {
    /// SPI controller feature flags
    ///
    /// `*_IN` flags mean the controller can receive on that many lines,
    /// `*_IO` flags mean it can also drive address and data on them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiFeatures: u32 {
        /// Supports 4-byte address phases
        const FOUR_BYTE_ADDR = 1 << 0;
        /// Can read two bits at once (1-1-2 mode)
        const DUAL_IN        = 1 << 1;
        /// Can transfer two bits at once (1-2-2 and 2-2-2 modes)
        const DUAL_IO        = 1 << 2;
        /// Can read four bits at once (1-1-4 mode)
        const QUAD_IN        = 1 << 3;
        /// Can transfer four bits at once (1-4-4 mode)
        const QUAD_IO        = 1 << 4;
        /// Can send commands with quad I/O (4-4-4 mode)
        const QPI            = 1 << 5;
        /// Can read eight bits at once (1-1-8 mode)
        const OCTAL_IN       = 1 << 6;
        /// Can transfer eight bits at once (1-8-8 mode)
        const OCTAL_IO       = 1 << 7;
        /// Can send commands with octal I/O (8-8-8 mode)
        const OPI            = 1 << 8;
        /// Can clock on both edges
        const DTR            = 1 << 9;
        /// Reads must not use FAST_READ
        const SLOW_READ      = 1 << 10;
        /// Writes are limited to one data byte per command
        const BYTE_PROGRAM   = 1 << 11;

        /// Shorthand for dual mode (both DUAL_IN and DUAL_IO)
        const DUAL = Self::DUAL_IN.bits() | Self::DUAL_IO.bits();
        /// Shorthand for quad mode (both QUAD_IN and QUAD_IO)
        const QUAD = Self::QUAD_IN.bits() | Self::QUAD_IO.bits();
        /// Shorthand for octal mode (both OCTAL_IN and OCTAL_IO)
        const OCTAL = Self::OCTAL_IN.bits() | Self::OCTAL_IO.bits();
    }
}

impl Default for SpiFeatures {
    fn default() -> Self {
        SpiFeatures::empty()
    }
}

fn lines_supported(lines: u8, single: bool, dual: bool, quad: bool, octal: bool) -> bool {
    match lines {
        1 => single,
        2 => dual,
        4 => quad,
        8 => octal,
        _ => false,
    }
}

/// Check if a controller supports the requested wire protocol
///
/// Returns `Ok(())` if the protocol is supported, or
/// `Err(ProtocolNotSupported)` if not.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///     check_protocol_supported(cmd.proto, self.features())?;
///     // ... execute the command
/// }
/// ```
pub fn check_protocol_supported(proto: SpiProtocol, features: SpiFeatures) -> Result<()> {
    let f = |flag| features.contains(flag);
    let ok = (!proto.dtr || f(SpiFeatures::DTR))
        && lines_supported(
            proto.inst,
            true,
            f(SpiFeatures::DUAL_IO),
            f(SpiFeatures::QPI),
            f(SpiFeatures::OPI),
        )
        && lines_supported(
            proto.addr,
            true,
            f(SpiFeatures::DUAL_IO),
            f(SpiFeatures::QUAD_IO),
            f(SpiFeatures::OCTAL_IO),
        )
        && lines_supported(
            proto.data,
            true,
            f(SpiFeatures::DUAL_IN),
            f(SpiFeatures::QUAD_IN),
            f(SpiFeatures::OCTAL_IN),
        );

    if ok {
        Ok(())
    } else {
        Err(Error::ProtocolNotSupported)
    }
}

/// SPI Master trait (sync or async depending on `is_sync` feature)
///
/// This trait represents a controller that can execute SPI NOR commands.
/// - With `is_sync` feature: blocking/synchronous
/// - Without `is_sync` feature: async
///
/// ## Wire protocols
///
/// Every `SpiCommand` carries an `SpiProtocol` giving the number of lines
/// used for the instruction, address and data phases and whether the
/// transfer is DTR. Implementations should:
///
/// 1. Report their capabilities via `features()`
/// 2. Refuse commands they cannot put on the wire with
///    `Error::ProtocolNotSupported` instead of silently downgrading
/// 3. Override `supports_op()` if some combinations the feature flags
///    allow still cannot be executed (opcode filters, FIFO limits, ...)
///
/// ## Example
///
/// ```ignore
/// #[maybe_async]
/// impl SpiMaster for QspiController {
///     fn features(&self) -> SpiFeatures {
///         SpiFeatures::FOUR_BYTE_ADDR | SpiFeatures::DUAL | SpiFeatures::QUAD
///     }
///
///     async fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///         check_protocol_supported(cmd.proto, self.features())?;
///         self.start_transfer(cmd).await
///     }
/// }
/// ```
#[maybe_async(AFIT)]
pub trait SpiMaster {
    /// Get the features supported by this controller
    fn features(&self) -> SpiFeatures;

    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transaction
    fn max_write_len(&self) -> usize;

    /// Check whether this exact command template can be executed
    ///
    /// Used during protocol negotiation. The default implementation
    /// derives the answer from `features()`.
    fn supports_op(&self, cmd: &SpiCommand<'_>) -> bool {
        let features = self.features();
        if cmd.address_width == AddressWidth::FourByte
            && !features.contains(SpiFeatures::FOUR_BYTE_ADDR)
        {
            return false;
        }
        check_protocol_supported(cmd.proto, features).is_ok()
    }

    /// Take exclusive ownership of the bus before a sequence of commands
    async fn claim_bus(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the bus after a sequence of commands
    async fn release_bus(&mut self) -> Result<()> {
        Ok(())
    }

    /// Execute a single SPI command
    ///
    /// The command contains all the information needed for the transaction:
    /// - `opcode` and `opcode_ext`: one or two opcode bytes
    /// - `address`: Optional address (with width)
    /// - `proto`: The wire protocol to use
    /// - `dummy_cycles`: Number of dummy clock cycles after address
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read into
    ///
    /// A read must fill the whole buffer or fail.
    async fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}

// Blanket impl for boxed SPI masters to allow trait objects (sync mode only)
// In async mode, traits with async fn are not object-safe
#[cfg(all(feature = "alloc", feature = "is_sync"))]
impl SpiMaster for alloc::boxed::Box<dyn SpiMaster + Send> {
    fn features(&self) -> SpiFeatures {
        (**self).features()
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn supports_op(&self, cmd: &SpiCommand<'_>) -> bool {
        (**self).supports_op(cmd)
    }

    fn claim_bus(&mut self) -> Result<()> {
        (**self).claim_bus()
    }

    fn release_bus(&mut self) -> Result<()> {
        (**self).release_bus()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
