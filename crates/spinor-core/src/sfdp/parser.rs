//! SFDP parsing implementation
//!
//! Decoding is split from reading: the `decode_*` functions turn table
//! contents into `FlashParameters` updates and never touch the bus, while
//! `parse_sfdp` walks the SFDP area through the transport.

use crate::chip::CatalogEntry;
use crate::config::NorConfig;
use crate::error::{Error, Result};
use crate::fixups::Fixups;
use crate::params::{EraseSetting, FlashParameters, Hwcaps, ParamFlags, QuadEnable, ReadCommand};
use crate::protocol::spi25;
use crate::spi::{CmdExtension, SpiProtocol};
use crate::transport::SpiMaster;
use maybe_async::maybe_async;
use zerocopy::FromBytes;

use super::types::*;

/// Maximum number of optional parameter headers looked at
pub const MAX_PARAMETER_HEADERS: usize = 32;

/// DWORDs read from the xSPI profile 1.0 table
const PROFILE1_DWORDS_READ: usize = 8;

/// Fallback 8D-8D-8D dummy cycles when profile 1.0 gives none
const PROFILE1_DUMMY_DEFAULT: u8 = 20;

/// Where BFPT advertises one fast read mode
struct BfptRead {
    hwcaps: Hwcaps,
    supported_dword: usize,
    supported_bit: u32,
    settings_dword: usize,
    settings_shift: u32,
    proto: SpiProtocol,
}

const BFPT_READS: [BfptRead; 6] = [
    BfptRead {
        hwcaps: Hwcaps::READ_1_1_2,
        supported_dword: 1,
        supported_bit: 1 << 16,
        settings_dword: 4,
        settings_shift: 0,
        proto: SpiProtocol::P1_1_2,
    },
    BfptRead {
        hwcaps: Hwcaps::READ_1_2_2,
        supported_dword: 1,
        supported_bit: 1 << 20,
        settings_dword: 4,
        settings_shift: 16,
        proto: SpiProtocol::P1_2_2,
    },
    BfptRead {
        hwcaps: Hwcaps::READ_2_2_2,
        supported_dword: 5,
        supported_bit: 1 << 0,
        settings_dword: 6,
        settings_shift: 16,
        proto: SpiProtocol::P2_2_2,
    },
    BfptRead {
        hwcaps: Hwcaps::READ_1_1_4,
        supported_dword: 1,
        supported_bit: 1 << 22,
        settings_dword: 3,
        settings_shift: 16,
        proto: SpiProtocol::P1_1_4,
    },
    BfptRead {
        hwcaps: Hwcaps::READ_1_4_4,
        supported_dword: 1,
        supported_bit: 1 << 21,
        settings_dword: 3,
        settings_shift: 0,
        proto: SpiProtocol::P1_4_4,
    },
    BfptRead {
        hwcaps: Hwcaps::READ_4_4_4,
        supported_dword: 5,
        supported_bit: 1 << 4,
        settings_dword: 7,
        settings_shift: 16,
        proto: SpiProtocol::P4_4_4,
    },
];

/// (DWORD, shift) of the four erase types
const BFPT_ERASES: [(usize, u32); 4] = [(8, 0), (8, 16), (9, 0), (9, 16)];

// ============================================================================
// Decoding
// ============================================================================

/// Decode and validate the SFDP header
pub fn decode_header(buf: &[u8; SFDP_HEADER_LEN]) -> Result<SfdpHeader> {
    let raw = RawSfdpHeader::read_from_bytes(buf).map_err(|_| Error::SfdpInvalid)?;

    if u32::from_le_bytes(raw.signature) != SFDP_SIGNATURE {
        log::debug!("SFDP signature invalid (expected 'SFDP')");
        return Err(Error::SfdpNotFound);
    }
    if raw.major != SFDP_JESD216_MAJOR {
        log::debug!("SFDP major version {} not supported", raw.major);
        return Err(Error::SfdpNotFound);
    }

    Ok(SfdpHeader {
        revision: SfdpRevision::new(raw.major, raw.minor),
        nph: raw.nph,
        bfpt: ParameterHeader::from(&raw.bfpt),
    })
}

/// Fast read settings from one BFPT half-word
///
/// Layout: [15:8] opcode, [7:5] mode clocks, [4:0] wait states.
fn read_from_half(half: u32, proto: SpiProtocol) -> ReadCommand {
    ReadCommand::new(
        ((half >> 5) & 0x07) as u8,
        (half & 0x1F) as u8,
        ((half >> 8) & 0xFF) as u8,
        proto,
    )
}

/// Decode a BFPT of `len` DWORDs into `params`
///
/// Erase selection keeps the smallest erase type, or 4 KiB when
/// `use_4k` is set and the chip has it. The largest erase type is kept
/// in `erase_max`.
pub fn decode_bfpt(
    len: usize,
    bfpt: &Bfpt,
    use_4k: bool,
    params: &mut FlashParameters,
) -> Result<()> {
    if len < BFPT_DWORD_MAX_JESD216 {
        return Err(Error::SfdpInvalid);
    }

    // Number of address bytes
    match (bfpt.dword(1) >> BFPT_DWORD1_ADDRESS_BYTES_SHIFT) & 0x3 {
        BFPT_ADDRESS_BYTES_3_ONLY | BFPT_ADDRESS_BYTES_3_OR_4 => {
            params.addr_width = 3;
            params.addr_mode_nbytes = 3;
        }
        BFPT_ADDRESS_BYTES_4_ONLY => {
            params.addr_width = 4;
            params.addr_mode_nbytes = 4;
        }
        _ => {}
    }

    // Flash memory density, in bits
    let density = bfpt.dword(2);
    let bits = if density & BFPT_DWORD2_EXPONENT != 0 {
        let exp = density & !BFPT_DWORD2_EXPONENT;
        if exp > 63 {
            return Err(Error::SfdpInvalid);
        }
        1u64 << exp
    } else {
        density as u64 + 1
    };
    params.size = bits >> 3;

    // Fast read settings
    for rd in &BFPT_READS {
        if bfpt.dword(rd.supported_dword) & rd.supported_bit == 0 {
            params.hwcaps.remove(rd.hwcaps);
            continue;
        }
        let half = (bfpt.dword(rd.settings_dword) >> rd.settings_shift) & 0xFFFF;
        params.set_read(rd.hwcaps, read_from_half(half, rd.proto));
    }

    // Sector erase settings
    let mut smallest: Option<EraseSetting> = None;
    let mut largest: Option<EraseSetting> = None;
    let mut four_k: Option<EraseSetting> = None;
    for &(dword, shift) in &BFPT_ERASES {
        let half = bfpt.dword(dword) >> shift;
        let size_exp = half & 0xFF;
        if size_exp == 0 || size_exp >= 32 {
            continue;
        }
        let erase = EraseSetting::new(((half >> 8) & 0xFF) as u8, 1 << size_exp);
        if erase.size == 4096 && four_k.is_none() {
            four_k = Some(erase);
        }
        if smallest.map_or(true, |s| erase.size < s.size) {
            smallest = Some(erase);
        }
        if largest.map_or(true, |l| erase.size > l.size) {
            largest = Some(erase);
        }
    }
    params.erase = match (use_4k, four_k) {
        (true, Some(erase)) => Some(erase),
        _ => smallest,
    };
    params.erase_max = largest;

    // Stop here if not JESD216 rev A or later
    if len == BFPT_DWORD_MAX_JESD216 {
        return Ok(());
    }

    // Page size: 2^N bytes
    params.page_size = 1 << ((bfpt.dword(11) >> BFPT_DWORD11_PAGE_SIZE_SHIFT) & 0xF);

    // Quad enable requirements
    match (bfpt.dword(15) >> BFPT_DWORD15_QER_SHIFT) & 0x7 {
        0 => params.quad_enable = Some(QuadEnable::NotRequired),
        1 | 4 => params.quad_enable = Some(QuadEnable::SpansionNoReadCr),
        2 => params.quad_enable = Some(QuadEnable::Macronix),
        3 => params.quad_enable = Some(QuadEnable::Sr2Bit7),
        5 => params.quad_enable = Some(QuadEnable::SpansionReadCr),
        _ => log::debug!("BFPT QER reserved value used"),
    }

    if bfpt.dword(16) & BFPT_DWORD16_SOFT_RST != 0 {
        params.flags |= ParamFlags::SOFT_RESET;
    }

    // Stop here if JESD216 rev B
    if len == BFPT_DWORD_MAX_JESD216B {
        return Ok(());
    }

    // 8D-8D-8D command extension
    match (bfpt.dword(18) >> BFPT_DWORD18_CMD_EXT_SHIFT) & 0x3 {
        0 => params.cmd_ext = CmdExtension::Repeat,
        1 => params.cmd_ext = CmdExtension::Invert,
        2 => return Err(Error::SfdpInvalid),
        _ => {
            log::error!("16-bit opcodes not supported");
            return Err(Error::NotSupported);
        }
    }

    Ok(())
}

/// Decode the xSPI profile 1.0 table
///
/// Provides the 8D-8D-8D read opcode and dummy cycles, and the shape of a
/// status read in 8D-8D-8D.
pub fn decode_profile1(dwords: &[u32], params: &mut FlashParameters) -> Result<()> {
    if dwords.len() < PROFILE1_DWORD_MIN {
        return Err(Error::SfdpInvalid);
    }

    let opcode = ((dwords[0] >> 8) & 0xFF) as u8;
    params.rdsr_dummy = if dwords[0] & (1 << 28) != 0 { 8 } else { 4 };
    params.rdsr_addr_nbytes = if dwords[0] & (1 << 29) != 0 { 4 } else { 0 };

    // The controller speed is unknown, so take the dummy cycles of the
    // fastest frequency listed
    let candidates = [
        (dwords[3] >> 7) & 0x1F,
        (dwords[4] >> 27) & 0x1F,
        (dwords[4] >> 17) & 0x1F,
        (dwords[4] >> 7) & 0x1F,
    ];
    let dummy = candidates
        .iter()
        .copied()
        .find(|&d| d != 0)
        .map_or(PROFILE1_DUMMY_DEFAULT, |d| d as u8);
    // Round up to an even value
    let dummy = (dummy + 1) & !1;

    params.set_read(
        Hwcaps::READ_8_8_8_DTR,
        ReadCommand::new(0, dummy, opcode, SpiProtocol::P8_8_8_DTR),
    );
    Ok(())
}

/// Decode the status, control and configuration register map
pub fn decode_sccr(dwords: &[u32], params: &mut FlashParameters) -> Result<()> {
    if dwords.len() < SCCR_DWORD_MIN {
        return Err(Error::SfdpInvalid);
    }
    if dwords[21] & (1 << 31) != 0 {
        params.flags |= ParamFlags::IO_MODE_EN_VOLATILE;
    }
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

/// Read up to `N` DWORDs of a parameter table, returning how many
#[maybe_async]
async fn read_table<M: SpiMaster + ?Sized, const N: usize>(
    master: &mut M,
    header: &ParameterHeader,
    dwords: &mut [u32; N],
) -> Result<usize> {
    let count = core::cmp::min(header.length_dwords as usize, N);
    let mut raw = [0u8; 4];
    for (i, dword) in dwords.iter_mut().take(count).enumerate() {
        spi25::read_sfdp(master, header.table_pointer + 4 * i as u32, &mut raw).await?;
        *dword = u32::from_le_bytes(raw);
    }
    Ok(count)
}

#[maybe_async]
async fn parse_bfpt<M: SpiMaster + ?Sized>(
    master: &mut M,
    entry: &CatalogEntry,
    fixups: Fixups,
    config: &NorConfig,
    header: &ParameterHeader,
    params: &mut FlashParameters,
) -> Result<()> {
    let len = header.length_dwords as usize;
    if len < BFPT_DWORD_MAX_JESD216 {
        return Err(Error::SfdpInvalid);
    }

    let mut raw = [0u8; BFPT_DWORD_MAX * 4];
    let n = core::cmp::min(len, BFPT_DWORD_MAX) * 4;
    spi25::read_sfdp(master, header.table_pointer, &mut raw[..n]).await?;
    let bfpt = Bfpt::from_bytes(&raw[..n]);

    decode_bfpt(len, &bfpt, config.use_4k_sectors, params)?;
    fixups.post_bfpt(master, entry, &bfpt, params).await
}

#[maybe_async]
async fn parse_vendor_table<M: SpiMaster + ?Sized>(
    master: &mut M,
    header: &ParameterHeader,
    params: &mut FlashParameters,
) -> Result<()> {
    let len = header.length_bytes();
    if len > crate::params::VENDOR_TABLE_MAX {
        return Err(Error::SfdpInvalid);
    }
    let mut raw = [0u8; crate::params::VENDOR_TABLE_MAX];
    spi25::read_sfdp(master, header.table_pointer, &mut raw[..len]).await?;
    params.vendor_table =
        Some(heapless::Vec::from_slice(&raw[..len]).map_err(|_| Error::SfdpInvalid)?);
    Ok(())
}

#[maybe_async]
async fn parse_optional<M: SpiMaster + ?Sized>(
    master: &mut M,
    header: &ParameterHeader,
    params: &mut FlashParameters,
) -> Result<()> {
    match header.id {
        PARAM_ID_SECTOR_MAP => {
            log::info!("non-uniform erase sector maps are not supported");
            Ok(())
        }
        PARAM_ID_SST => parse_vendor_table(master, header, params).await,
        PARAM_ID_XSPI_1_0 => {
            let mut dwords = [0u32; PROFILE1_DWORDS_READ];
            let n = read_table(master, header, &mut dwords).await?;
            decode_profile1(&dwords[..n], params)
        }
        PARAM_ID_SCCR_MAP => {
            let mut dwords = [0u32; SCCR_DWORD_MIN];
            let n = read_table(master, header, &mut dwords).await?;
            decode_sccr(&dwords[..n], params)
        }
        _ => Ok(()),
    }
}

/// Parse the SFDP area into `params`
///
/// BFPT failures are returned and leave `params` in an undefined state,
/// so the caller passes a copy and keeps its legacy parameters on error.
/// Failures of optional tables are logged and dropped; the parameters
/// then keep the values they had before that table.
#[maybe_async]
pub async fn parse_sfdp<M: SpiMaster + ?Sized>(
    master: &mut M,
    entry: &CatalogEntry,
    fixups: Fixups,
    config: &NorConfig,
    params: &mut FlashParameters,
) -> Result<()> {
    let mut buf = [0u8; SFDP_HEADER_LEN];
    spi25::read_sfdp(master, 0, &mut buf).await?;
    let header = decode_header(&buf)?;
    log::debug!(
        "SFDP revision {}, {} extra parameter headers",
        header.revision,
        header.nph
    );

    let nph = header.nph as usize;
    if nph > MAX_PARAMETER_HEADERS {
        log::warn!(
            "SFDP lists {} parameter headers, only the first {} are used",
            nph,
            MAX_PARAMETER_HEADERS
        );
    }
    let nph = core::cmp::min(nph, MAX_PARAMETER_HEADERS);

    let mut headers: heapless::Vec<ParameterHeader, MAX_PARAMETER_HEADERS> = heapless::Vec::new();
    if nph > 0 {
        let mut raw = [0u8; MAX_PARAMETER_HEADERS * PARAM_HEADER_LEN];
        let raw = &mut raw[..nph * PARAM_HEADER_LEN];
        spi25::read_sfdp(master, SFDP_HEADER_LEN as u32, raw).await?;
        for chunk in raw.chunks_exact(PARAM_HEADER_LEN) {
            let raw_header = RawParamHeader::read_from_bytes(chunk).map_err(|_| Error::SfdpInvalid)?;
            headers
                .push(ParameterHeader::from(&raw_header))
                .map_err(|_| Error::SfdpInvalid)?;
        }
    }

    // Use the latest BFPT revision offered
    let mut bfpt_header = header.bfpt;
    for candidate in &headers {
        if candidate.supersedes_bfpt(&bfpt_header) {
            bfpt_header = *candidate;
        }
    }
    parse_bfpt(master, entry, fixups, config, &bfpt_header, params).await?;

    for optional in &headers {
        let mut scratch = params.clone();
        match parse_optional(master, optional, &mut scratch).await {
            Ok(()) => *params = scratch,
            Err(e) => log::warn!(
                "failed to parse optional parameter table {:04x}: {}",
                optional.id,
                e
            ),
        }
    }

    Ok(())
}


#[cfg(all(test, feature = "is_sync"))]
mod table_tests {
    use super::*;
    use crate::chip::find_by_name;
    use crate::spi::{opcodes, SpiCommand};
    use crate::transport::SpiFeatures;

    /// Complete SFDP table from flashprog's dummyflasher.c
    /// Based on MX25L6436E (rev. 1.8) datasheet - 8 MiB chip
    #[rustfmt::skip]
    const MX25L6436E_SFDP: [u8; 88] = [
        0x53, 0x46, 0x44, 0x50, // @0x00: SFDP signature "SFDP"
        0x00, 0x01, 0x01, 0xFF, // @0x04: revision 1.0, 2 headers (NPH=1)
        0x00, 0x00, 0x01, 0x09, // @0x08: JEDEC SFDP header rev. 1.0, 9 DW long
        0x1C, 0x00, 0x00, 0xFF, // @0x0C: PTP0 = 0x1C
        0xC2, 0x00, 0x01, 0x04, // @0x10: Macronix header rev. 1.0, 4 DW long
        0x48, 0x00, 0x00, 0xFF, // @0x14: PTP1 = 0x48
        0xFF, 0xFF, 0xFF, 0xFF, // @0x18: hole
        0xE5, 0x20, 0xC9, 0xFF, // @0x1C: SFDP parameter table start (DWORD 1)
        0xFF, 0xFF, 0xFF, 0x03, // @0x20: DWORD 2 - density
        0x00, 0xFF, 0x08, 0x6B, // @0x24: DWORD 3
        0x08, 0x3B, 0x00, 0xFF, // @0x28: DWORD 4
        0xEE, 0xFF, 0xFF, 0xFF, // @0x2C: DWORD 5
        0xFF, 0xFF, 0x00, 0x00, // @0x30: DWORD 6
        0xFF, 0xFF, 0x00, 0xFF, // @0x34: DWORD 7
        0x0C, 0x20, 0x0F, 0x52, // @0x38: DWORD 8 - erase types
        0x10, 0xD8, 0x00, 0xFF, // @0x3C: DWORD 9 - erase types
        0xFF, 0xFF, 0xFF, 0xFF, // @0x40: hole
        0xFF, 0xFF, 0xFF, 0xFF, // @0x44: hole
        0x00, 0x36, 0x00, 0x27, // @0x48: Macronix parameter table start
        0xF4, 0x4F, 0xFF, 0xFF, // @0x4C
        0xD9, 0xC8, 0xFF, 0xFF, // @0x50
        0xFF, 0xFF, 0xFF, 0xFF, // @0x54: Macronix parameter table end
    ];

    /// Mock SPI master that serves an SFDP image
    struct MockSfdpFlash<'a> {
        sfdp_data: &'a [u8],
    }

    impl SpiMaster for MockSfdpFlash<'_> {
        fn features(&self) -> SpiFeatures {
            SpiFeatures::empty()
        }

        fn max_read_len(&self) -> usize {
            64
        }

        fn max_write_len(&self) -> usize {
            256
        }

        fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
            match cmd.opcode {
                opcodes::RDSFDP => {
                    assert_eq!(cmd.dummy_cycles, 8);
                    let addr = cmd.address.unwrap_or(0) as usize;
                    for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                        *b = self.sfdp_data.get(addr + i).copied().unwrap_or(0xFF);
                    }
                    Ok(())
                }
                _ => Err(Error::OpcodeNotSupported),
            }
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    /// Build an SFDP image with a 20 DWORD BFPT followed by the given
    /// optional tables
    fn image(bfpt: &[u32; 20], tables: &[(u16, &[u32])]) -> heapless::Vec<u8, 1024> {
        let mut out: heapless::Vec<u8, 1024> = heapless::Vec::new();
        let nph = tables.len();
        let headers_end = SFDP_HEADER_LEN + nph * PARAM_HEADER_LEN;
        let push_header = |out: &mut heapless::Vec<u8, 1024>, id: u16, len: usize, ptr: usize| {
            out.extend_from_slice(&[
                id as u8,
                0x00,
                0x01,
                len as u8,
                ptr as u8,
                (ptr >> 8) as u8,
                (ptr >> 16) as u8,
                (id >> 8) as u8,
            ])
            .unwrap();
        };

        out.extend_from_slice(&[0x53, 0x46, 0x44, 0x50, 0x08, 0x01, nph as u8, 0xFF])
            .unwrap();
        push_header(&mut out, PARAM_ID_BASIC, 20, headers_end);
        let mut ptr = headers_end + 80;
        for (id, dwords) in tables {
            push_header(&mut out, *id, dwords.len(), ptr);
            ptr += dwords.len() * 4;
        }
        for dw in bfpt {
            out.extend_from_slice(&dw.to_le_bytes()).unwrap();
        }
        for (_, dwords) in tables {
            for dw in dwords.iter() {
                out.extend_from_slice(&dw.to_le_bytes()).unwrap();
            }
        }
        out
    }

    fn octal_bfpt() -> [u32; 20] {
        let mut bfpt = [0u32; 20];
        // 3 or 4 byte addressing
        bfpt[0] = 1 << 17;
        // 512 Mbit
        bfpt[1] = 0x1FFF_FFFF;
        // 4K/0x21, 256K/0xDC
        bfpt[7] = 0xDC12_210C;
        // 256 byte pages
        bfpt[10] = 8 << 4;
        bfpt[14] = 0;
        bfpt[15] = BFPT_DWORD16_SOFT_RST;
        // Invert
        bfpt[17] = 1 << 29;
        bfpt
    }

    /// BFPT describing `params`, with `erases` as the erase types
    fn encode_bfpt(params: &FlashParameters, erases: &[EraseSetting]) -> [u32; 20] {
        let mut bfpt = [0u32; 20];
        let addr = if params.addr_width == 4 {
            BFPT_ADDRESS_BYTES_4_ONLY
        } else {
            BFPT_ADDRESS_BYTES_3_ONLY
        };
        bfpt[0] = addr << BFPT_DWORD1_ADDRESS_BYTES_SHIFT;

        let bits = params.size * 8;
        bfpt[1] = if bits <= 1 << 32 {
            (bits - 1) as u32
        } else {
            BFPT_DWORD2_EXPONENT | bits.ilog2()
        };

        for rd in &BFPT_READS {
            if !params.hwcaps.contains(rd.hwcaps) {
                continue;
            }
            let cmd = params.read(rd.hwcaps).unwrap();
            let half = (cmd.opcode as u32) << 8
                | (cmd.mode_clocks as u32) << 5
                | cmd.wait_states as u32;
            bfpt[rd.supported_dword - 1] |= rd.supported_bit;
            bfpt[rd.settings_dword - 1] |= half << rd.settings_shift;
        }

        for (erase, &(dword, shift)) in erases.iter().zip(&BFPT_ERASES) {
            let half = (erase.opcode as u32) << 8 | erase.size.ilog2();
            bfpt[dword - 1] |= half << shift;
        }

        bfpt[10] = params.page_size.ilog2() << BFPT_DWORD11_PAGE_SIZE_SHIFT;
        if params.quad_enable == Some(QuadEnable::Macronix) {
            bfpt[14] = 2 << BFPT_DWORD15_QER_SHIFT;
        }
        bfpt
    }

    #[test]
    fn test_bfpt_round_trip() {
        let erases = [
            EraseSetting::new(0x20, 4096),
            EraseSetting::new(0x52, 32 * 1024),
            EraseSetting::new(0xD8, 64 * 1024),
        ];
        let mut expected = FlashParameters {
            size: 32 * 1024 * 1024,
            page_size: 512,
            addr_width: 4,
            addr_mode_nbytes: 4,
            quad_enable: Some(QuadEnable::Macronix),
            erase: Some(erases[0]),
            erase_max: Some(erases[2]),
            cmd_ext: CmdExtension::Repeat,
            ..FlashParameters::default()
        };
        expected.set_read(
            Hwcaps::READ_1_1_2,
            ReadCommand::new(0, 8, 0x3B, SpiProtocol::P1_1_2),
        );
        expected.set_read(
            Hwcaps::READ_1_1_4,
            ReadCommand::new(0, 8, 0x6B, SpiProtocol::P1_1_4),
        );
        expected.set_read(
            Hwcaps::READ_1_4_4,
            ReadCommand::new(2, 4, 0xEB, SpiProtocol::P1_4_4),
        );

        let data = image(&encode_bfpt(&expected, &erases), &[]);
        let mut mock = MockSfdpFlash { sfdp_data: &data };
        let entry = find_by_name("mx25l25635f").unwrap();
        let mut params = FlashParameters::default();
        parse_sfdp(&mut mock, entry, Fixups::None, &NorConfig::default(), &mut params).unwrap();

        assert_eq!(params, expected);
    }

    #[test]
    fn test_parse_mx25l6436e_sfdp() {
        let mut mock = MockSfdpFlash {
            sfdp_data: &MX25L6436E_SFDP,
        };
        let entry = find_by_name("mx25l6405d").unwrap();
        let config = NorConfig::default();
        let mut params = FlashParameters::from_catalog(entry, &config);
        parse_sfdp(&mut mock, entry, Fixups::None, &config, &mut params).unwrap();

        assert_eq!(params.size, 8 * 1024 * 1024);
        assert_eq!(params.addr_width, 3);
        assert_eq!(params.erase, Some(EraseSetting::new(0x20, 4096)));
        assert_eq!(params.erase_max, Some(EraseSetting::new(0xD8, 65536)));

        // 1-1-2 and 1-1-4 supported, nothing else
        assert_eq!(
            *params.read(Hwcaps::READ_1_1_2).unwrap(),
            ReadCommand::new(0, 8, 0x3B, SpiProtocol::P1_1_2)
        );
        assert_eq!(
            *params.read(Hwcaps::READ_1_1_4).unwrap(),
            ReadCommand::new(0, 8, 0x6B, SpiProtocol::P1_1_4)
        );
        assert!(!params.hwcaps.intersects(
            Hwcaps::READ_1_2_2 | Hwcaps::READ_1_4_4 | Hwcaps::READ_2_2_2 | Hwcaps::READ_4_4_4
        ));
        assert!(params.hwcaps.contains(Hwcaps::READ | Hwcaps::READ_FAST | Hwcaps::PP));
        // Rev 1.0 table, page size from the catalog
        assert_eq!(params.page_size, 256);
    }

    #[test]
    fn test_parse_optional_tables() {
        let mut profile1 = [0u32; 5];
        profile1[0] = (1 << 28) | (0xEE << 8);
        profile1[4] = 12 << 27;
        let mut sccr = [0u32; 22];
        sccr[21] = 1 << 31;
        let sst = [0x1234_5678u32, 0x9ABC_DEF0];
        let data = image(
            &octal_bfpt(),
            &[
                (PARAM_ID_XSPI_1_0, &profile1),
                (PARAM_ID_SCCR_MAP, &sccr),
                (PARAM_ID_SST, &sst),
            ],
        );
        let mut mock = MockSfdpFlash { sfdp_data: &data };
        let entry = find_by_name("s28hs512t").unwrap();
        let config = NorConfig::default();
        let mut params = FlashParameters::default();
        parse_sfdp(&mut mock, entry, Fixups::None, &config, &mut params).unwrap();

        assert_eq!(params.size, 64 * 1024 * 1024);
        assert_eq!(params.erase, Some(EraseSetting::new(0x21, 4096)));
        assert_eq!(params.erase_max, Some(EraseSetting::new(0xDC, 256 * 1024)));
        assert_eq!(params.cmd_ext, CmdExtension::Invert);
        assert!(params.flags.contains(ParamFlags::SOFT_RESET | ParamFlags::IO_MODE_EN_VOLATILE));
        assert_eq!(
            *params.read(Hwcaps::READ_8_8_8_DTR).unwrap(),
            ReadCommand::new(0, 12, 0xEE, SpiProtocol::P8_8_8_DTR)
        );
        assert_eq!(params.rdsr_dummy, 8);
        assert_eq!(
            params.vendor_table.as_deref(),
            Some(&[0x78, 0x56, 0x34, 0x12, 0xF0, 0xDE, 0xBC, 0x9A][..])
        );
    }

    #[test]
    fn test_broken_optional_table_is_dropped() {
        // Profile 1.0 too short, SCCR fine
        let profile1 = [0x0000_EE00u32, 0];
        let mut sccr = [0u32; 22];
        sccr[21] = 1 << 31;
        let data = image(
            &octal_bfpt(),
            &[(PARAM_ID_XSPI_1_0, &profile1), (PARAM_ID_SCCR_MAP, &sccr)],
        );
        let mut mock = MockSfdpFlash { sfdp_data: &data };
        let entry = find_by_name("s28hs512t").unwrap();
        let config = NorConfig::default();
        let mut params = FlashParameters::default();
        parse_sfdp(&mut mock, entry, Fixups::None, &config, &mut params).unwrap();

        assert!(!params.hwcaps.contains(Hwcaps::READ_8_8_8_DTR));
        assert_eq!(params.rdsr_dummy, 0);
        assert!(params.flags.contains(ParamFlags::IO_MODE_EN_VOLATILE));
    }

    #[test]
    fn test_latest_bfpt_wins() {
        let data = image(&octal_bfpt(), &[]);
        let mut sfdp: heapless::Vec<u8, 1024> = heapless::Vec::new();
        sfdp.extend_from_slice(&[0x53, 0x46, 0x44, 0x50, 0x06, 0x01, 0x01, 0xFF])
            .unwrap();
        // Rev 1.0 BFPT header pointing at erased space
        sfdp.extend_from_slice(&[0x00, 0x00, 0x01, 0x09, 0x00, 0x02, 0x00, 0xFF])
            .unwrap();
        // Rev 1.6 BFPT header pointing at the real table
        sfdp.extend_from_slice(&[0x00, 0x06, 0x01, 20, 24, 0x00, 0x00, 0xFF])
            .unwrap();
        sfdp.extend_from_slice(&data[SFDP_HEADER_LEN..]).unwrap();

        let mut mock = MockSfdpFlash { sfdp_data: &sfdp };
        let entry = find_by_name("s28hs512t").unwrap();
        let mut params = FlashParameters::default();
        parse_sfdp(&mut mock, entry, Fixups::None, &NorConfig::default(), &mut params).unwrap();
        assert_eq!(params.size, 64 * 1024 * 1024);
        assert_eq!(params.cmd_ext, CmdExtension::Invert);
    }

    #[test]
    fn test_no_sfdp() {
        let blank = [0xFFu8; 64];
        let mut mock = MockSfdpFlash { sfdp_data: &blank };
        let entry = find_by_name("mx25l6405d").unwrap();
        let mut params = FlashParameters::default();
        assert_eq!(
            parse_sfdp(&mut mock, entry, Fixups::None, &NorConfig::default(), &mut params),
            Err(Error::SfdpNotFound)
        );
    }
}
