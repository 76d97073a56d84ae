//! Predefined machine layouts.
//!
//! Each variant is a fixed [`CustomMemory`] configuration run through the
//! same construction path as user models.

use crate::bank::BankType;
use crate::config::{BankConfig, CustomMemory, IoMmu, SlotConfig};
use crate::error::ConfigurationError;
use crate::model::MemoryModel;

/// Known memory layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PredefinedModel {
    /// Layout not known; one 64K bank of unknown type.
    Unknown,
    /// 64K of RAM without banking.
    AllRam,
    /// ZX Spectrum 16K.
    Zx16k,
    /// ZX Spectrum 48K.
    Zx48k,
    /// ZX Spectrum 128K with two ROMs and eight 16K RAM banks.
    Zx128k,
    /// ZX Next with distinguishable ROM0 and ROM1.
    ZxNextTwoRom,
    /// ZX Next where the paged-in ROM cannot be identified.
    ZxNextOneRom,
    /// ZX81 with 1K RAM.
    Zx81K1,
    /// ZX81 with 2K RAM.
    Zx81K2,
    /// ZX81 with a 16K RAM pack.
    Zx81K16,
    /// ZX81 with a 32K RAM pack.
    Zx81K32,
    /// ZX81 with a 48K RAM pack.
    Zx81K48,
    /// ZX81 with a 56K RAM pack.
    Zx81K56,
    /// ColecoVision.
    ColecoVision,
    /// User supplied configuration.
    Custom,
}

impl PredefinedModel {
    /// Every predefined layout except [`Self::Custom`].
    pub const ALL: [Self; 14] = [
        Self::Unknown,
        Self::AllRam,
        Self::Zx16k,
        Self::Zx48k,
        Self::Zx128k,
        Self::ZxNextTwoRom,
        Self::ZxNextOneRom,
        Self::Zx81K1,
        Self::Zx81K2,
        Self::Zx81K16,
        Self::Zx81K32,
        Self::Zx81K48,
        Self::Zx81K56,
        Self::ColecoVision,
    ];

    /// Settings name of the layout. Both Next variants report `ZXNEXT`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::AllRam => "RAM",
            Self::Zx16k => "ZX16K",
            Self::Zx48k => "ZX48K",
            Self::Zx128k => "ZX128K",
            Self::ZxNextTwoRom | Self::ZxNextOneRom => "ZXNEXT",
            Self::Zx81K1 => "ZX81-1K",
            Self::Zx81K2 => "ZX81-2K",
            Self::Zx81K16 => "ZX81-16K",
            Self::Zx81K32 => "ZX81-32K",
            Self::Zx81K48 => "ZX81-48K",
            Self::Zx81K56 => "ZX81-56K",
            Self::ColecoVision => "ColecoVision",
            Self::Custom => "CUSTOM",
        }
    }

    /// Parses a settings name, case-insensitively. `ZXNEXT` selects the two-ROM variant.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case(Self::Custom.name()) {
            return Some(Self::Custom);
        }
        Self::ALL
            .into_iter()
            .filter(|model| *model != Self::ZxNextOneRom)
            .find(|model| model.name().eq_ignore_ascii_case(name))
    }

    /// Returns `true` for both ZX Next variants.
    #[must_use]
    pub const fn is_zx_next(self) -> bool {
        matches!(self, Self::ZxNextTwoRom | Self::ZxNextOneRom)
    }

    /// The Next maps both ROM halves under one short name.
    #[must_use]
    pub const fn allows_duplicate_short_names(self) -> bool {
        self.is_zx_next()
    }

    /// The slot configuration behind the layout. `None` for [`Self::Custom`].
    #[must_use]
    pub fn memory(self) -> Option<CustomMemory> {
        let slots = match self {
            Self::Unknown => vec![single(0x0000, 0xFFFF, named_bank(0, "UNKNOWN"))],
            Self::AllRam => vec![single(0x0000, 0xFFFF, named_bank(0, "RAM"))],
            Self::Zx16k => vec![
                single(0x0000, 0x3FFF, BankConfig::single(0).long_name("ROM").rom()),
                single(0x4000, 0x7FFF, BankConfig::single(1).long_name("RAM")),
            ],
            Self::Zx48k => vec![
                single(0x0000, 0x3FFF, BankConfig::single(0).long_name("ROM").rom()),
                single(0x4000, 0xFFFF, BankConfig::single(1).long_name("RAM")),
            ],
            Self::Zx128k => return Some(zx128k()),
            Self::ZxNextTwoRom => return Some(zx_next(true)),
            Self::ZxNextOneRom => return Some(zx_next(false)),
            Self::Zx81K1 => zx81(0x4000, 0x43FF),
            Self::Zx81K2 => zx81(0x4000, 0x47FF),
            Self::Zx81K16 => zx81(0x4000, 0x7FFF),
            Self::Zx81K32 => zx81(0x4000, 0xBFFF),
            Self::Zx81K48 => zx81(0x4000, 0xFFFF),
            // The 56K pack also fills the 8K below 0x4000.
            Self::Zx81K56 => zx81(0x2000, 0xFFFF),
            Self::ColecoVision => vec![
                single(0x0000, 0x1FFF, BankConfig::single(0).named("BIOS", "BIOS").rom()),
                single(0x2000, 0x5FFF, BankConfig::single(1).named("Expansion port", "EXP")),
                single(0x7000, 0x73FF, BankConfig::single(2).named("RAM (1k)", "RAM")),
                single(0x8000, 0xFFFF, BankConfig::single(3).named("Cartridge ROM", "CR").rom()),
            ],
            Self::Custom => return None,
        };
        Some(CustomMemory { slots, io_mmu: None })
    }

    const fn default_top_of_stack(self) -> Option<u16> {
        match self {
            Self::Zx81K1 => Some(0x43FF),
            Self::Zx81K2 => Some(0x47FF),
            Self::Zx81K16 | Self::Zx81K32 | Self::Zx81K48 | Self::Zx81K56 => Some(0x7FFF),
            _ => None,
        }
    }
}

fn single(start: u16, end: u16, bank: BankConfig) -> SlotConfig {
    SlotConfig::new(start, end, vec![bank])
}

fn named_bank(index: i64, name: &str) -> BankConfig {
    BankConfig::single(index).long_name(name)
}

fn zx81(ram_start: u16, ram_end: u16) -> Vec<SlotConfig> {
    vec![
        single(0x0000, 0x1FFF, BankConfig::single(0).long_name("ROM").rom()),
        single(ram_start, ram_end, BankConfig::single(1).long_name("RAM")),
    ]
}

fn zx128k() -> CustomMemory {
    CustomMemory {
        slots: vec![
            SlotConfig::new(
                0x0000,
                0x3FFF,
                vec![
                    BankConfig::single(8).named("ROM0", "R0").rom(),
                    BankConfig::single(9).named("ROM1", "R1").rom(),
                ],
            )
            .named("slotROM")
            .with_initial_bank(8),
            single(0x4000, 0x7FFF, BankConfig::single(5)),
            single(0x8000, 0xBFFF, BankConfig::single(2)),
            SlotConfig::new(0xC000, 0xFFFF, vec![BankConfig::range(0, 7)])
                .named("slotC000")
                .with_initial_bank(0),
        ],
        io_mmu: Some(IoMmu::Lines(lines(&[
            "var disabled;",
            "if((portAddress | 0x7FFD) == 0x7FFD && !disabled) {",
            "  slotC000 = portValue & 0x07; // RAM block select",
            "  disabled = portValue & 0b0100000; // DIS",
            "  slotROM = ((portValue & 0b0010000) >>> 4) + 8;",
            "}",
        ]))),
    }
}

fn zx_next(two_roms: bool) -> CustomMemory {
    let (low_roms, high_roms) = if two_roms {
        (
            vec![
                BankConfig::single(0xFC).named("ROM0", "R0").rom(),
                BankConfig::single(0xFE).named("ROM1", "R1").rom(),
            ],
            vec![
                BankConfig::single(0xFD).named("ROM0", "R0").rom_at(0x2000),
                BankConfig::single(0xFF).named("ROM1", "R1").rom_at(0x2000),
            ],
        )
    } else {
        (
            vec![BankConfig::single(0xFE).named("ROM", "R").rom()],
            vec![BankConfig::single(0xFF).named("ROM", "R").rom()],
        )
    };
    let rom_slot = |start: u16, initial: usize, roms: Vec<BankConfig>| {
        let mut banks = vec![BankConfig::range(0, 223)];
        banks.extend(roms);
        SlotConfig::new(start, start + 0x1FFF, banks).with_initial_bank(initial)
    };
    let ram_slot = |start: u16, initial: usize, last: i64| {
        SlotConfig::new(start, start + 0x1FFF, vec![BankConfig::range(0, last)])
            .with_initial_bank(initial)
    };
    let io_mmu = two_roms.then(|| {
        IoMmu::Lines(lines(&[
            "var disabled;",
            "if((portAddress | 0x7FFD) == 0x7FFD && !disabled) {",
            "  bank = 2*(portValue & 0x07); // RAM block select",
            "  slots[6] = bank;",
            "  slots[7] = bank+1;",
            "  romBank = 0xFC + 2*((portValue & 0b0010000) >>> 4);",
            "  slots[0] = romBank;",
            "  slots[1] = romBank+1;",
            "  disabled = portValue & 0b0100000; // DIS",
            "}",
        ]))
    });
    CustomMemory {
        slots: vec![
            rom_slot(0x0000, 0xFE, low_roms),
            rom_slot(0x2000, 0xFF, high_roms),
            ram_slot(0x4000, 10, 255),
            ram_slot(0x6000, 11, 223),
            ram_slot(0x8000, 4, 223),
            ram_slot(0xA000, 5, 223),
            ram_slot(0xC000, 0, 223),
            ram_slot(0xE000, 1, 223),
        ],
        io_mmu,
    }
}

fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(ToString::to_string).collect()
}

impl MemoryModel {
    /// Builds one of the predefined layouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingCustomMemory`] for
    /// [`PredefinedModel::Custom`], which needs [`MemoryModel::new`].
    pub fn predefined(kind: PredefinedModel) -> Result<Self, ConfigurationError> {
        let memory = kind.memory().ok_or(ConfigurationError::MissingCustomMemory)?;
        let mut model = Self::build(&memory, kind)?;
        if kind == PredefinedModel::Unknown {
            model = model.with_bank_type(BankType::Unknown);
        }
        if let Some(top) = kind.default_top_of_stack() {
            model = model.with_default_top_of_stack(top);
        }
        Ok(model)
    }

    /// Builds a model from its settings name, using `custom` for `CUSTOM`.
    ///
    /// # Errors
    ///
    /// Fails for unknown names, for `CUSTOM` without a configuration and for
    /// an invalid custom configuration.
    pub fn from_name(
        name: &str,
        custom: Option<&CustomMemory>,
    ) -> Result<Self, ConfigurationError> {
        match PredefinedModel::from_name(name) {
            Some(PredefinedModel::Custom) => {
                Self::new(custom.ok_or(ConfigurationError::MissingCustomMemory)?)
            }
            Some(kind) => Self::predefined(kind),
            None => Err(ConfigurationError::UnknownModel(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PredefinedModel;

    #[test]
    fn names_round_trip() {
        for model in PredefinedModel::ALL {
            let parsed = PredefinedModel::from_name(model.name()).unwrap();
            if model == PredefinedModel::ZxNextOneRom {
                assert_eq!(parsed, PredefinedModel::ZxNextTwoRom);
            } else {
                assert_eq!(parsed, model);
            }
        }
        assert_eq!(PredefinedModel::from_name("zx48k"), Some(PredefinedModel::Zx48k));
        assert_eq!(PredefinedModel::from_name("ZX99"), None);
    }
}
