use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use memory_model::{long_address_with_bank, MemoryModel, SlotRange};

use super::{LabelKind, ParseResult, ParserCore, SourceFileEntry};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Device the SLD file was assembled for, as announced by its `Z` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceModel {
    /// No device: a single 64K page.
    NoSlot64k,
    /// ZX Spectrum 48K, four 16K pages.
    Zx48k,
    /// ZX Spectrum 128K, eight 16K pages.
    Zx128k,
    /// ZX Spectrum Next, 224 8K pages.
    ZxNext,
}

impl SourceModel {
    /// Determines the device from the data of a `Z` line, e.g.
    /// `pages.size:16384,pages.count:8,slots.count:4,...`.
    ///
    /// # Errors
    ///
    /// Returns [`LabelsError::UnsupportedSourceModel`] for other layouts.
    pub fn from_z_data(data: &str) -> Result<Self, LabelsError> {
        let field = |key: &str| {
            data.split(',').find_map(|item| {
                let (k, v) = item.split_once(':')?;
                (k.trim() == key).then(|| v.trim().to_string())
            })
        };
        if let Some(device) = field("device") {
            return match device.to_ascii_uppercase().as_str() {
                "NOSLOT64K" | "NONE" => Ok(Self::NoSlot64k),
                "ZXSPECTRUM48" => Ok(Self::Zx48k),
                "ZXSPECTRUM128" => Ok(Self::Zx128k),
                "ZXSPECTRUMNEXT" => Ok(Self::ZxNext),
                _ => Err(LabelsError::UnsupportedSourceModel(device)),
            };
        }
        let number = |key: &str| field(key).and_then(|v| v.parse::<u32>().ok());
        match (number("pages.size"), number("pages.count")) {
            (Some(0x1_0000), _) => Ok(Self::NoSlot64k),
            (Some(0x4000), Some(4)) => Ok(Self::Zx48k),
            (Some(0x4000), Some(8)) => Ok(Self::Zx128k),
            (Some(0x2000), Some(224)) => Ok(Self::ZxNext),
            _ => Err(LabelsError::UnsupportedSourceModel(data.to_string())),
        }
    }

    /// Bytes per page.
    #[must_use]
    pub const fn page_size(self) -> u32 {
        match self {
            Self::NoSlot64k => 0x1_0000,
            Self::Zx48k | Self::Zx128k => 0x4000,
            Self::ZxNext => 0x2000,
        }
    }
}

/// `true` if the file starts with `|`, the SLD signature.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn is_sld_file(path: &Path) -> Result<bool, LabelsError> {
    let mut first = [0u8; 1];
    let read = File::open(path)
        .and_then(|mut file| file.read(&mut first))
        .map_err(|e| LabelsError::io(path, e))?;
    Ok(read == 1 && first[0] == b'|')
}

/// Maps SLD pages of one source device to banks of the target model.
#[derive(Debug, Clone, Copy)]
pub struct BankTranslation<'a> {
    source: SourceModel,
    target: &'a MemoryModel,
    disable_banking: bool,
}

impl<'a> BankTranslation<'a> {
    /// Creates the translation from `source` pages to `target` banks.
    #[must_use]
    pub const fn new(source: SourceModel, target: &'a MemoryModel, disable_banking: bool) -> Self {
        Self {
            source,
            target,
            disable_banking,
        }
    }

    fn initial_bank(&self, addr: u16) -> usize {
        self.target.initial_slots()[self.target.slot_index_for_address(addr)]
    }

    /// Size of the target slot holding `addr`.
    fn target_page_size(&self, addr: u16) -> u32 {
        self.target
            .slot_ranges()
            .get(self.target.slot_index_for_address(addr))
            .map_or(0x1_0000, SlotRange::size)
    }

    /// Bank of the target model for `addr` in source `page`.
    ///
    /// Pages are split or joined when source pages are twice or half the
    /// size of the target slot at `addr`. `Err` carries the fallback bank
    /// when the computed bank cannot be paged in at `addr`.
    pub fn bank(&self, addr: u16, page: Option<usize>) -> Result<usize, usize> {
        let reachable = self.target.banks_reachable_from(addr);
        if reachable.len() == 1 {
            return Ok(self.initial_bank(addr));
        }
        let source_size = self.source.page_size();
        let target_size = self.target_page_size(addr);
        let bank = match (self.source, page) {
            (SourceModel::NoSlot64k | SourceModel::Zx48k, _) | (_, None) => {
                return Ok(self.initial_bank(addr));
            }
            (_, Some(page)) if source_size == 2 * target_size => {
                let half = (u32::from(addr) / target_size) & 1;
                2 * page + usize::from(half == 1)
            }
            (_, Some(page)) if target_size == 2 * source_size => page / 2,
            (_, Some(page)) => page,
        };
        if reachable.contains(&bank) {
            Ok(bank)
        } else {
            Err(self.initial_bank(addr))
        }
    }

    /// Long address for `addr` in source `page`, see [`Self::bank`].
    pub fn long_address(&self, addr: u16, page: Option<usize>) -> Result<u32, u32> {
        if self.disable_banking {
            return Ok(u32::from(addr));
        }
        self.bank(addr, page)
            .map(|bank| long_address_with_bank(addr, bank))
            .map_err(|bank| long_address_with_bank(addr, bank))
    }
}

/// Parses a sjasmplus SLD file (`--sld`).
///
/// # Errors
///
/// Fails if the file cannot be read or was assembled for a device that
/// cannot be translated.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let mut core = ParserCore::new(config, model)?;
    let lines = core.read_lines()?;
    let source = lines
        .iter()
        .map(|line| line.split('|').collect::<Vec<_>>())
        .find(|fields| fields.get(6) == Some(&"Z"))
        .map_or(Ok(SourceModel::NoSlot64k), |fields| {
            SourceModel::from_z_data(fields.get(7).copied().unwrap_or_default())
        })?;
    debug!("SLD '{}' assembled for {source:?}, target '{}'", config.path, model.name());
    let translation = BankTranslation::new(source, model, config.disable_banking);

    let mut last_label: Option<String> = None;
    for line in &lines {
        core.begin_line(line);
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 8 || fields[0].is_empty() {
            continue;
        }
        let (Ok(line_nr), Ok(value)) = (fields[1].parse::<usize>(), fields[5].parse::<i64>()) else {
            continue;
        };
        let Ok(addr) = u16::try_from(value & 0xFFFF) else {
            continue;
        };
        let page = fields[4].parse::<usize>().ok();
        let data = fields[7];
        let file_name = core.resolve_source(fields[0]);

        match fields[6] {
            kind @ ("F" | "D") => {
                if kind == "F" {
                    if !last_label
                        .as_ref()
                        .is_some_and(|last| data.starts_with(&format!("{last}.")))
                    {
                        last_label = Some(data.to_string());
                    }
                    let number = long_address(&mut core, &translation, addr, page);
                    core.last_label.clone_from(&last_label);
                    core.add_label(number, data, LabelKind::Global);
                } else {
                    // EQU values are not addresses and may exceed 64K.
                    core.add_constant(value, data);
                }
                let (def_file, def_line) = if fields[2].is_empty() {
                    (file_name, line_nr)
                } else {
                    (core.resolve_source(fields[2]), fields[3].parse().unwrap_or(line_nr))
                };
                core.current_line().file_name = def_file;
                core.current_line().line_nr = i64::try_from(def_line).unwrap_or(0) - 1;
            }
            "T" => {
                let long_addr = long_address(&mut core, &translation, addr, page);
                core.map_address(
                    long_addr,
                    SourceFileEntry {
                        file_name,
                        line_nr: line_nr.saturating_sub(1),
                        module_prefix: None,
                        last_label: last_label.clone(),
                        size: 0,
                    },
                );
            }
            "K" => {
                let long_addr = long_address(&mut core, &translation, addr, page);
                core.scan_comment(data, Some(long_addr));
            }
            _ => {}
        }
    }
    Ok(core.finish())
}

fn long_address(
    core: &mut ParserCore<'_>,
    translation: &BankTranslation<'_>,
    addr: u16,
    page: Option<usize>,
) -> u32 {
    translation.long_address(addr, page).unwrap_or_else(|fallback| {
        core.warn(format!(
            "Page {} of address {addr:04X} is not reachable in '{}'.",
            page.map_or_else(|| "-".to_string(), |p| p.to_string()),
            core.model.name()
        ));
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::{BankTranslation, SourceModel};
    use memory_model::{BankConfig, CustomMemory, MemoryModel, PredefinedModel, SlotConfig};
    use rstest::rstest;

    /// Fixed bank 100 below 0xC000, banks 0-15 in two 8K slots above.
    fn custom_8k() -> MemoryModel {
        MemoryModel::new(&CustomMemory {
            slots: vec![
                SlotConfig::new(0x0000, 0xBFFF, vec![BankConfig::single(100)]),
                SlotConfig::new(0xC000, 0xDFFF, vec![BankConfig::range(0, 15)]),
                SlotConfig::new(0xE000, 0xFFFF, vec![BankConfig::range(0, 15)]),
            ],
            io_mmu: None,
        })
        .unwrap()
    }

    /// Fixed bank 20 below 0xC000, banks 0-7 in one 16K slot above.
    fn custom_16k() -> MemoryModel {
        MemoryModel::new(&CustomMemory {
            slots: vec![
                SlotConfig::new(0x0000, 0xBFFF, vec![BankConfig::single(20)]),
                SlotConfig::new(0xC000, 0xFFFF, vec![BankConfig::range(0, 7)]),
            ],
            io_mmu: None,
        })
        .unwrap()
    }

    #[rstest]
    #[case("pages.size:65536,pages.count:32,slots.count:1,slots.adr:0", SourceModel::NoSlot64k)]
    #[case("pages.size:16384,pages.count:4,slots.count:4,slots.adr:0,16384", SourceModel::Zx48k)]
    #[case("pages.size:16384,pages.count:8,slots.count:4,slots.adr:0,16384", SourceModel::Zx128k)]
    #[case("pages.size:8192,pages.count:224,slots.count:8,slots.adr:0,8192", SourceModel::ZxNext)]
    #[case("device:ZXSPECTRUM128", SourceModel::Zx128k)]
    fn detects_source_model(#[case] data: &str, #[case] expected: SourceModel) {
        assert_eq!(SourceModel::from_z_data(data).unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_layouts() {
        assert!(SourceModel::from_z_data("pages.size:4096,pages.count:16").is_err());
        assert!(SourceModel::from_z_data("device:AMSTRADCPC464").is_err());
    }

    #[test]
    fn zx128k_pages_on_zx_next_target() {
        let next = MemoryModel::predefined(PredefinedModel::ZxNextTwoRom).unwrap();
        let t = BankTranslation::new(SourceModel::Zx128k, &next, false);
        assert_eq!(t.bank(0xC000, Some(7)), Ok(14));
        assert_eq!(t.bank(0xE000, Some(7)), Ok(15));
        assert_eq!(t.long_address(0xC000, Some(7)), Ok(0xC000 + 15 * 0x1_0000));
    }

    #[test]
    fn zx_next_pages_on_zx128k_target() {
        let zx128 = MemoryModel::predefined(PredefinedModel::Zx128k).unwrap();
        let t = BankTranslation::new(SourceModel::ZxNext, &zx128, false);
        assert_eq!(t.bank(0xC000, Some(14)), Ok(7));
        assert_eq!(t.bank(0xE000, Some(15)), Ok(7));
        assert_eq!(t.bank(0x8000, Some(4)), Ok(2));
        // Slot 0x8000 is fixed to bank 2 on the 128K.
        assert_eq!(t.bank(0x8000, Some(2)), Ok(2));
    }

    #[test]
    fn same_family_keeps_page() {
        let zx128 = MemoryModel::predefined(PredefinedModel::Zx128k).unwrap();
        let t = BankTranslation::new(SourceModel::Zx128k, &zx128, false);
        assert_eq!(t.bank(0xC000, Some(3)), Ok(3));
        assert_eq!(t.bank(0x4000, Some(5)), Ok(5));
        assert_eq!(t.bank(0xC000, None), Ok(0));
    }

    #[test]
    fn unbanked_sources_use_initial_slots() {
        let zx128 = MemoryModel::predefined(PredefinedModel::Zx128k).unwrap();
        let t = BankTranslation::new(SourceModel::NoSlot64k, &zx128, false);
        assert_eq!(t.long_address(0xC000, Some(0)), Ok(0xC000 + 0x1_0000));
        let all_ram = MemoryModel::predefined(PredefinedModel::AllRam).unwrap();
        let t = BankTranslation::new(SourceModel::ZxNext, &all_ram, false);
        assert_eq!(t.long_address(0xA000, Some(5)), Ok(0xA000 + 0x1_0000));
        let t = BankTranslation::new(SourceModel::ZxNext, &all_ram, true);
        assert_eq!(t.long_address(0xA000, Some(5)), Ok(0xA000));
    }

    #[rstest]
    #[case::lower_half(0xC000, 7, 14)]
    #[case::upper_half(0xE000, 7, 15)]
    #[case::page_0_upper(0xE123, 0, 1)]
    fn zx128k_pages_on_custom_8k_target(
        #[case] addr: u16,
        #[case] page: usize,
        #[case] expected: usize,
    ) {
        let model = custom_8k();
        let t = BankTranslation::new(SourceModel::Zx128k, &model, false);
        assert_eq!(t.bank(addr, Some(page)), Ok(expected));
    }

    #[rstest]
    #[case::lower_half(0xC000, 14, 7)]
    #[case::upper_half(0xE000, 15, 7)]
    #[case::low_page(0xD000, 3, 1)]
    fn zx_next_pages_on_custom_16k_target(
        #[case] addr: u16,
        #[case] page: usize,
        #[case] expected: usize,
    ) {
        let model = custom_16k();
        let t = BankTranslation::new(SourceModel::ZxNext, &model, false);
        assert_eq!(t.bank(addr, Some(page)), Ok(expected));
    }

    #[test]
    fn equal_page_sizes_keep_the_page_on_custom_targets() {
        let model = custom_16k();
        let t = BankTranslation::new(SourceModel::Zx128k, &model, false);
        assert_eq!(t.bank(0xC000, Some(6)), Ok(6));
        assert_eq!(t.bank(0x8000, Some(2)), Ok(20));
        let model = custom_8k();
        let t = BankTranslation::new(SourceModel::ZxNext, &model, false);
        assert_eq!(t.bank(0xE000, Some(9)), Ok(9));
        // Page 16 of a 128K maps to bank 33, which the slot cannot hold.
        let t = BankTranslation::new(SourceModel::Zx128k, &model, false);
        assert_eq!(t.bank(0xE000, Some(16)), Err(0));
    }

    #[test]
    fn unreachable_page_falls_back() {
        let next = MemoryModel::predefined(PredefinedModel::ZxNextTwoRom).unwrap();
        let t = BankTranslation::new(SourceModel::ZxNext, &next, false);
        assert_eq!(t.bank(0x8000, Some(300)), Err(4));
    }
}
