//! SPI command structure

use super::{AddressWidth, CmdFormat, SpiProtocol};

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Second opcode byte for DTR commands (if any)
    pub opcode_ext: Option<u8>,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Wire protocol
    pub proto: SpiProtocol,

    /// Number of dummy clock cycles after address
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            opcode_ext: None,
            address: None,
            address_width: AddressWidth::None,
            proto: SpiProtocol::P1_1_1,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed read command (e.g., READ, RDSFDP)
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            read_buf: buf,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed write command (e.g., PP, WRAR)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            write_data: data,
            ..Self::simple(opcode)
        }
    }

    /// Create an addressed command without data (e.g., SE)
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            address: Some(addr),
            address_width: width,
            ..Self::simple(opcode)
        }
    }

    /// Set the wire protocol for this command
    pub fn with_proto(mut self, proto: SpiProtocol) -> Self {
        self.proto = proto;
        self
    }

    /// Apply a command format
    ///
    /// In DTR protocols the opcode becomes two bytes, the second one derived
    /// from the format's command extension.
    pub fn with_format(mut self, format: &CmdFormat) -> Self {
        self.proto = format.proto;
        self.opcode_ext = if format.proto.dtr {
            format.ext.extension(self.opcode)
        } else {
            None
        };
        if format.proto.dtr && self.opcode_ext.is_none() {
            log::debug!(
                "no command extension for opcode 0x{:02X} in {}",
                self.opcode,
                format.proto
            );
        }
        self
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Number of opcode bytes on the wire
    pub fn opcode_len(&self) -> usize {
        if self.opcode_ext.is_some() {
            2
        } else {
            1
        }
    }

    /// Calculate the number of bytes the command header occupies
    ///
    /// Dummy cycles are counted in bytes on the address lines, doubled
    /// for DTR.
    pub fn header_len(&self) -> usize {
        let mut total = self.opcode_len();
        total += self.address_width.bytes() as usize;
        let mut dummy = self.dummy_cycles as usize * self.proto.addr as usize / 8;
        if self.proto.dtr {
            dummy *= 2;
        }
        total + dummy
    }

    /// Encode opcode(s) and address into `buf`, returning the bytes used
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        buf[0] = self.opcode;
        let mut len = 1;
        if let Some(ext) = self.opcode_ext {
            buf[1] = ext;
            len = 2;
        }
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[len..]);
            len += self.address_width.bytes() as usize;
        }
        len
    }
}
