//! Identification and setup

use super::octal::{reset_format, send_soft_reset};
use super::{NorSession, SessionFlags};
use crate::chip::{lookup, manufacturer, CatalogEntry, CatalogFlags};
use crate::config::NorConfig;
use crate::error::{Error, Result};
use crate::fixups::{EraseHook, Fixups, Hooks, ReadyHook, DIE_SIZE};
use crate::negotiate::negotiate;
use crate::params::{EraseSetting, FlashParameters, PpCommand, ReadCommand};
use crate::protocol::spi25;
use crate::sfdp::parse_sfdp;
use crate::spi::{opcodes, AddressWidth, CmdFormat, SpiProtocol};
use crate::time::Clock;
use crate::transport::{SpiFeatures, SpiMaster};
use crate::wp::LockScheme;
use maybe_async::maybe_async;

/// Bytes of 4 KiB sectors at the bottom of a hybrid Infineon array
const HYBRID_4K_BOTTOM: u32 = 128 * 1024;

/// What identification found out about the chip
struct Probe {
    entry: &'static CatalogEntry,
    fixups: Fixups,
    hooks: Hooks,
    params: FlashParameters,
}

/// Identify the chip and build its parameters
#[maybe_async]
async fn probe<M: SpiMaster + ?Sized>(master: &mut M, config: &NorConfig) -> Result<Probe> {
    if config.soft_reset_on_boot {
        // A chip left in octal DTR by an earlier stage ignores 1-1-1 RDID
        let fmt = reset_format(
            CmdFormat::new(SpiProtocol::P8_8_8_DTR),
            config.soft_reset_invert,
        );
        let _ = send_soft_reset(master, &fmt).await;
    }

    let id = spi25::read_id(master, &CmdFormat::new(SpiProtocol::P1_1_1)).await?;
    let entry = lookup(&id).ok_or_else(|| {
        log::error!("unrecognized JEDEC id bytes: {:02x?}", id);
        Error::ChipNotFound
    })?;
    log::debug!("JEDEC id {:02x?} matches {}", entry.id_bytes(), entry.name);

    let fixups = Fixups::detect(entry, config);
    let mut hooks = Hooks::default();
    fixups.default_init(&mut hooks);

    let mut params = FlashParameters::from_catalog(entry, config);
    if entry.flags.intersects(CatalogFlags::SFDP_HINTS) && !entry.flags.contains(CatalogFlags::SKIP_SFDP) {
        let mut sfdp = params.clone();
        match parse_sfdp(master, entry, fixups, config, &mut sfdp).await {
            Ok(()) => params = sfdp,
            Err(e) => log::debug!("{}: no usable SFDP ({}), using catalog parameters", entry.name, e),
        }
    }
    fixups.post_sfdp(&mut params);

    Ok(Probe {
        entry,
        fixups,
        hooks,
        params,
    })
}

/// Block protection scheme of a catalog entry
fn lock_scheme(entry: &CatalogEntry) -> Option<LockScheme> {
    let mfr = entry.manufacturer();
    if entry.flags.contains(CatalogFlags::HAS_SST26LOCK) {
        Some(LockScheme::Sst26)
    } else if mfr == manufacturer::ST
        || mfr == manufacturer::SST
        || entry.flags.contains(CatalogFlags::HAS_LOCK)
    {
        Some(LockScheme::Bp)
    } else {
        None
    }
}

/// Session flags from the catalog entry, SFDP and configuration
fn session_flags(entry: &CatalogEntry, params: &FlashParameters, config: &NorConfig) -> SessionFlags {
    use crate::params::ParamFlags;

    let mut flags = SessionFlags::empty();
    let map = [
        (CatalogFlags::USE_FSR, SessionFlags::USE_FSR),
        (CatalogFlags::USE_CLSR, SessionFlags::USE_CLSR),
        (CatalogFlags::HAS_TB, SessionFlags::HAS_TB),
        (CatalogFlags::SST_WRITE, SessionFlags::SST_WRITE),
        (CatalogFlags::NO_CHIP_ERASE, SessionFlags::NO_CHIP_ERASE),
        (CatalogFlags::NO_ERASE, SessionFlags::NO_ERASE),
        (CatalogFlags::FOUR_B_OPCODES, SessionFlags::FOUR_B_OPCODES),
    ];
    for (catalog, session) in map {
        flags.set(session, entry.flags.contains(catalog));
    }

    flags.set(SessionFlags::SOFT_RESET, params.flags.contains(ParamFlags::SOFT_RESET));
    flags.set(
        SessionFlags::IO_MODE_EN_VOLATILE,
        params.flags.contains(ParamFlags::IO_MODE_EN_VOLATILE),
    );
    flags.set(SessionFlags::BROKEN_RESET, config.broken_reset);
    flags
}

/// Whether the status register is cleared at init
fn unlocks_on_init(entry: &CatalogEntry) -> bool {
    matches!(
        entry.manufacturer(),
        manufacturer::ATMEL | manufacturer::INTEL | manufacturer::SST
    ) || entry.flags.contains(CatalogFlags::HAS_LOCK)
}

#[maybe_async(AFIT)]
impl<M: SpiMaster, C: Clock> NorSession<M, C> {
    /// Identify the attached chip and bring it into operating mode
    ///
    /// Reads the JEDEC ID, refines the catalog parameters from SFDP and
    /// fixups, negotiates the wire protocols with `master` and runs the
    /// chip's init sequence (unlock, quad enable, address mode).
    pub async fn scan(mut master: M, clock: C, config: NorConfig) -> Result<Self> {
        master.claim_bus().await?;

        let probed = match probe(&mut master, &config).await {
            Ok(p) => p,
            Err(e) => {
                let _ = master.release_bus().await;
                return Err(e);
            }
        };

        let Probe {
            entry,
            fixups,
            hooks,
            params,
        } = probed;

        let mut nor = Self {
            master,
            clock,
            config,
            entry,
            fixups,
            hooks,
            flags: SessionFlags::empty(),
            size: params.size,
            page_size: params.page_size,
            erase: EraseSetting::new(opcodes::SE, entry.sector_size),
            read: ReadCommand::default(),
            read_dummy: 0,
            program: PpCommand::default(),
            reg_format: CmdFormat::new(SpiProtocol::P1_1_1),
            addr_width: AddressWidth::ThreeByte,
            addr_mode_nbytes: params.addr_mode_nbytes,
            bank: None,
            lock: None,
            vendor_table: None,
        };

        let result = nor.setup(params).await;
        let release = nor.master.release_bus().await;
        result.and(release)?;

        log::info!(
            "Detected {} with page size {}, erase size {}, total {} bytes",
            nor.entry.name,
            nor.page_size,
            nor.erase.size,
            nor.size
        );
        Ok(nor)
    }

    /// Apply probed parameters to the session and run the init sequence
    async fn setup(&mut self, mut params: FlashParameters) -> Result<()> {
        self.lock = lock_scheme(self.entry);
        self.flags = session_flags(self.entry, &params, &self.config);
        self.vendor_table = params.vendor_table.take();

        if self.entry.flags.contains(CatalogFlags::NO_FR)
            || self.master.features().contains(SpiFeatures::SLOW_READ)
        {
            params.hwcaps.remove(crate::params::Hwcaps::READ_FAST);
        }

        self.fixup_setup().await?;

        let selection = negotiate(&self.master, self.entry, &params, &self.hooks, &self.config)?;
        self.read = selection.read;
        self.read_dummy = selection.read_dummy();
        self.program = selection.program;
        self.erase = selection.erase;

        self.setup_addr_width(params.addr_width).await?;

        self.reg_format.ext = params.cmd_ext;
        self.reg_format.rdsr_dummy = params.rdsr_dummy;
        self.reg_format.rdsr_addr_nbytes = params.rdsr_addr_nbytes;

        self.init(selection.quad_enable).await
    }

    /// Chip family setup that needs to talk to the chip
    async fn fixup_setup(&mut self) -> Result<()> {
        match self.fixups {
            Fixups::S25hxT => {
                if self.config.bank_register {
                    log::error!("{}: bank address register is not supported", self.entry.name);
                    return Err(Error::NotSupported);
                }
                let width = crate::fixups::reg_width(self.addr_mode_nbytes)?;
                let cfr3v =
                    spi25::read_any_reg(&mut self.master, width, opcodes::SPANSION_CFR3V, 0).await?;
                if cfr3v & opcodes::CFR3V_UNHYSA == 0 {
                    self.hooks.erase = EraseHook::NonUniform {
                        opcode_4k: opcodes::BE_4K_4B,
                        top: 0,
                        bottom: HYBRID_4K_BOTTOM,
                    };
                }
                if self.size > DIE_SIZE {
                    self.hooks.ready = ReadyHook::MultiDie;
                }
                Ok(())
            }
            Fixups::S28hxT => {
                self.wait_till_ready().await?;
                let cfr3v = spi25::read_any_reg(
                    &mut self.master,
                    AddressWidth::ThreeByte,
                    opcodes::SPANSION_CFR3V,
                    0,
                )
                .await?;
                if cfr3v & opcodes::CFR3V_UNISECT == 0 {
                    self.hooks.erase = EraseHook::NonUniform {
                        opcode_4k: opcodes::BE_4K_4B,
                        top: 0,
                        bottom: HYBRID_4K_BOTTOM,
                    };
                }
                Ok(())
            }
            Fixups::S25fl256lBar => {
                log::error!("{}: bank address register is not supported", self.entry.name);
                Err(Error::NotSupported)
            }
            Fixups::None | Fixups::Mt35xu512aba | Fixups::MacronixOctal => Ok(()),
        }
    }

    async fn init(&mut self, quad_enable: Option<crate::params::QuadEnable>) -> Result<()> {
        if let Some(seq) = self.hooks.octal_dtr_enable {
            if self.read.proto == SpiProtocol::P8_8_8_DTR
                && self.program.proto == SpiProtocol::P8_8_8_DTR
                && self.flags.contains(SessionFlags::IO_MODE_EN_VOLATILE)
            {
                self.octal_dtr_enable(seq).await?;
                self.reg_format.proto = SpiProtocol::P8_8_8_DTR;
            }
        }

        if self.config.unlock_all_on_init && unlocks_on_init(self.entry) {
            self.write_sr_wait(&[0]).await?;
        }

        if let Some(method) = quad_enable {
            self.quad_enable(method).await?;
        }

        let mfr = self.entry.manufacturer();
        if self.addr_width == AddressWidth::FourByte
            && self.read.proto != SpiProtocol::P8_8_8_DTR
            && mfr != manufacturer::SPANSION
            && !self.flags.contains(SessionFlags::FOUR_B_OPCODES)
        {
            if self.flags.contains(SessionFlags::BROKEN_RESET) {
                log::debug!("enabling 4-byte mode on a chip without a reset line");
            }
            self.set_4byte(true).await?;
        }

        Ok(())
    }
}


#[cfg(all(test, feature = "is_sync", feature = "std"))]
mod session_tests {
    use super::super::mock::{scan_mock, MockChip};
    use crate::chip::find_by_name;
    use crate::config::NorConfig;
    use crate::error::Error;
    use crate::spi::{opcodes, AddressWidth, SpiProtocol};
    use crate::transport::SpiFeatures;

    #[test]
    fn test_legacy_scan() {
        let chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        let nor = scan_mock(chip, NorConfig::default()).unwrap();

        assert_eq!(nor.name(), "mx25l6405d");
        assert_eq!(nor.size(), 8 * 1024 * 1024);
        assert_eq!(nor.page_size(), 256);
        assert_eq!(nor.read_command().opcode, opcodes::FAST_READ);
        assert_eq!(nor.read_command().proto, SpiProtocol::P1_1_1);
        assert_eq!(nor.read_dummy(), 8);
        assert_eq!(nor.program_command().opcode, opcodes::PP);
        assert_eq!(nor.addr_width(), AddressWidth::ThreeByte);
        assert!(nor.bank_register().is_none());
        // No wide read flags, so SFDP is never probed
        assert!(nor.master().commands(opcodes::RDSFDP).is_empty());
        assert_eq!(nor.master().claims(), 1);
        assert_eq!(nor.master().releases(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let mut chip = MockChip::new(find_by_name("mx25l6405d").unwrap(), SpiFeatures::empty());
        chip.id = [0x00, 0x11, 0x22, 0xFF, 0xFF, 0xFF];
        let err = scan_mock(chip, NorConfig::default()).unwrap_err();
        assert_eq!(err, Error::ChipNotFound);
    }

    #[test]
    fn test_bank_register_path() {
        let chip = MockChip::new(find_by_name("mx25l25635f").unwrap(), SpiFeatures::empty());
        let config = NorConfig {
            bank_register: true,
            ..NorConfig::default()
        };
        let nor = scan_mock(chip, config).unwrap();

        assert_eq!(nor.addr_width(), AddressWidth::ThreeByte);
        let bank = nor.bank_register().unwrap();
        assert_eq!(bank.read_opcode, opcodes::RDEAR);
        assert_eq!(bank.current, Some(0));
        assert!(nor.master().commands(opcodes::EN4B).is_empty());
    }

    #[test]
    fn test_four_byte_mode_entered() {
        let chip = MockChip::new(find_by_name("mx25l25635f").unwrap(), SpiFeatures::FOUR_BYTE_ADDR);
        let nor = scan_mock(chip, NorConfig::default()).unwrap();

        assert_eq!(nor.addr_width(), AddressWidth::FourByte);
        assert_eq!(nor.master().commands(opcodes::EN4B).len(), 1);
        assert_eq!(nor.read_command().opcode, opcodes::FAST_READ);
    }

    #[test]
    fn test_spansion_uses_4byte_opcodes() {
        let chip = MockChip::new(find_by_name("s25fl256s1").unwrap(), SpiFeatures::FOUR_BYTE_ADDR);
        let nor = scan_mock(chip, NorConfig::default()).unwrap();

        assert_eq!(nor.addr_width(), AddressWidth::FourByte);
        assert_eq!(nor.read_command().opcode, opcodes::FAST_READ_4B);
        assert_eq!(nor.program_command().opcode, opcodes::PP_4B);
        assert_eq!(nor.erase_command().opcode, opcodes::SE_4B);
        assert!(nor.master().commands(opcodes::EN4B).is_empty());
    }

    #[test]
    fn test_unlock_on_init() {
        let chip = MockChip::new(find_by_name("at25df321a").unwrap(), SpiFeatures::empty());
        let nor = scan_mock(chip, NorConfig::default()).unwrap();
        assert_eq!(nor.master().commands(opcodes::WRSR).len(), 1);

        let chip = MockChip::new(find_by_name("at25df321a").unwrap(), SpiFeatures::empty());
        let config = NorConfig {
            unlock_all_on_init: false,
            ..NorConfig::default()
        };
        let nor = scan_mock(chip, config).unwrap();
        assert!(nor.master().commands(opcodes::WRSR).is_empty());
    }
}
