//! Slot/bank model built from a [`CustomMemory`] configuration.
//!
//! Construction validates the slot list, registers every bank a slot can
//! page in and fills address gaps with synthetic `UNUSED` slots, so that the
//! slots always tile `0x0000..=0xFFFF`. A 65536-entry table maps each
//! address to its slot in O(1).

use std::collections::{BTreeSet, HashMap};

use crate::bank::{BankInfo, BankType, MemoryBank, SlotRange};
use crate::config::{BankConfig, BankIndex, CustomMemory, RomSource};
use crate::error::{ConfigurationError, QueryError};
use crate::long_address::{long_address_with_bank, split_long_address};
use crate::predefined::PredefinedModel;

/// Highest bank index a configuration may declare, plus one.
pub const MAX_DECLARED_BANKS: i64 = 256;

const ADDRESS_SPACE: u32 = 0x1_0000;

/// Bank record while slots are still being merged.
#[derive(Debug, Clone)]
struct PendingBank {
    name: Option<String>,
    short_name: Option<String>,
    size: u32,
    bank_type: BankType,
    rom: Option<RomSource>,
    rom_offset: u32,
    fill: Option<u8>,
}

/// Target memory layout: slots, the banks each can page in, and the
/// initial slot-to-bank assignment.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    name: String,
    kind: PredefinedModel,
    slot_ranges: Vec<SlotRange>,
    slot_banks: Vec<BTreeSet<usize>>,
    initial_slots: Vec<usize>,
    banks: Vec<Option<BankInfo>>,
    slot_of_address: Box<[u16]>,
    short_names: HashMap<String, usize>,
    io_mmu: String,
    default_top_of_stack: Option<u16>,
}

impl MemoryModel {
    /// Builds a `CUSTOM` model from user configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for overlapping or inverted slot
    /// ranges, empty bank lists, out-of-range bank indices and duplicate
    /// short names.
    pub fn new(config: &CustomMemory) -> Result<Self, ConfigurationError> {
        Self::build(config, PredefinedModel::Custom)
    }

    pub(crate) fn build(
        config: &CustomMemory,
        kind: PredefinedModel,
    ) -> Result<Self, ConfigurationError> {
        let mut slot_ranges = Vec::new();
        let mut slot_banks: Vec<BTreeSet<usize>> = Vec::new();
        let mut initial_slots: Vec<Option<usize>> = Vec::new();
        let mut pending: Vec<Option<PendingBank>> = Vec::new();

        let mut expected_start: u32 = 0;
        for slot in &config.slots {
            let start = u32::from(slot.range[0]);
            if start < expected_start {
                return Err(ConfigurationError::OverlappingRange);
            }
            if start > expected_start {
                let gap = (expected_start, start - 1);
                push_gap(&mut slot_ranges, &mut slot_banks, &mut initial_slots, gap);
            }
            let end = u32::from(slot.range[1]);
            if end < start {
                return Err(ConfigurationError::InvertedRange);
            }
            if slot.banks.is_empty() {
                return Err(ConfigurationError::NoBanks);
            }

            let size = end + 1 - start;
            let several = slot.banks.len() > 1;
            let mut reachable = BTreeSet::new();
            let mut initial_bank = slot.initial_bank;
            for bank in &slot.banks {
                let (first, last) = validate_index(bank.index)?;
                let assign_short_name = several || last > first;
                for index in first..=last {
                    let info = pending_bank(bank, index, size, assign_short_name);
                    merge_bank(&mut pending, index, info);
                    reachable.insert(index);
                }
                initial_bank.get_or_insert(first);
            }

            slot_ranges.push(SlotRange {
                start: slot.range[0],
                end: slot.range[1],
                name: slot.name.clone(),
            });
            slot_banks.push(reachable);
            initial_slots.push(initial_bank);
            expected_start = end + 1;
        }
        if expected_start < ADDRESS_SPACE {
            let gap = (expected_start, ADDRESS_SPACE - 1);
            push_gap(&mut slot_ranges, &mut slot_banks, &mut initial_slots, gap);
        }

        let mut banks: Vec<Option<BankInfo>> = pending
            .into_iter()
            .enumerate()
            .map(|(index, bank)| bank.map(|bank| finish_bank(index, bank)))
            .collect();

        // Gaps get banks above the highest declared index.
        let initial_slots: Vec<usize> = initial_slots
            .into_iter()
            .zip(slot_ranges.iter().zip(slot_banks.iter_mut()))
            .map(|(initial, (range, reachable))| {
                initial.unwrap_or_else(|| {
                    let index = banks.len();
                    banks.push(Some(unused_bank(range.size())));
                    reachable.insert(index);
                    index
                })
            })
            .collect();

        let mut slot_of_address = vec![0_u16; ADDRESS_SPACE as usize].into_boxed_slice();
        for (slot, range) in slot_ranges.iter().enumerate() {
            let slot = u16::try_from(slot).unwrap_or(u16::MAX);
            slot_of_address[usize::from(range.start)..=usize::from(range.end)].fill(slot);
        }

        let short_names = register_short_names(&banks, kind.allows_duplicate_short_names())?;

        Ok(Self {
            name: kind.name().to_string(),
            kind,
            slot_ranges,
            slot_banks,
            initial_slots,
            banks,
            slot_of_address,
            short_names,
            io_mmu: config.io_mmu.as_ref().map(crate::IoMmu::to_text).unwrap_or_default(),
            default_top_of_stack: None,
        })
    }

    pub(crate) fn with_default_top_of_stack(mut self, top: u16) -> Self {
        self.default_top_of_stack = Some(top);
        self
    }

    pub(crate) fn with_bank_type(mut self, bank_type: BankType) -> Self {
        for bank in self.banks.iter_mut().flatten() {
            bank.bank_type = bank_type;
        }
        self
    }

    /// Model name, e.g. `ZX128K` or `CUSTOM`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Which predefined layout this model was built from.
    #[must_use]
    pub const fn kind(&self) -> PredefinedModel {
        self.kind
    }

    /// All slots in address order, including synthetic `UNUSED` slots.
    #[must_use]
    pub fn slot_ranges(&self) -> &[SlotRange] {
        &self.slot_ranges
    }

    /// Bank paged into each slot at power-on.
    #[must_use]
    pub fn initial_slots(&self) -> &[usize] {
        &self.initial_slots
    }

    /// Number of bank indices in use, including gaps and `UNUSED` banks.
    #[must_use]
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// The bank with the given index.
    #[must_use]
    pub fn bank(&self, index: usize) -> Option<&BankInfo> {
        self.banks.get(index).and_then(Option::as_ref)
    }

    /// IO-MMU rule text, empty when the model has none. Never evaluated here.
    #[must_use]
    pub fn io_mmu(&self) -> &str {
        &self.io_mmu
    }

    /// Stack pointer to use when a program does not set one.
    #[must_use]
    pub const fn default_top_of_stack(&self) -> Option<u16> {
        self.default_top_of_stack
    }

    /// Slot that contains `addr`.
    #[must_use]
    pub fn slot_index_for_address(&self, addr: u16) -> usize {
        usize::from(self.slot_of_address[usize::from(addr)])
    }

    /// Banks that can be paged into the slot containing `addr`.
    ///
    /// A single entry means the address is not banked.
    #[must_use]
    pub fn banks_reachable_from(&self, addr: u16) -> &BTreeSet<usize> {
        &self.slot_banks[self.slot_index_for_address(addr)]
    }

    /// Looks up a bank by short name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownShortName`] if no bank has that name.
    pub fn short_name_to_bank(&self, short_name: &str) -> Result<usize, QueryError> {
        self.short_names
            .get(short_name)
            .copied()
            .ok_or_else(|| QueryError::UnknownShortName(short_name.to_string()))
    }

    /// Resolves the bank for `addr` written as `addr.short_name`.
    ///
    /// Without a short name (or with an empty one) the slot must have exactly
    /// one reachable bank.
    ///
    /// # Errors
    ///
    /// Fails when the name is unknown, when the bank cannot be paged in at
    /// `addr`, or when no name is given and the slot is banked.
    pub fn parse_bank(&self, addr: u16, short_name: Option<&str>) -> Result<usize, QueryError> {
        let reachable = self.banks_reachable_from(addr);
        match short_name.filter(|name| !name.is_empty()) {
            Some(name) => {
                let mut bank = self.short_name_to_bank(name)?;
                // Next ROM halves share a short name; the upper half is registered last.
                if self.kind.is_zx_next() && (bank == 0xFF || bank == 0xFD) && addr < 0x2000 {
                    bank -= 1;
                }
                if reachable.contains(&bank) {
                    Ok(bank)
                } else {
                    Err(QueryError::Unreachable {
                        name: name.to_string(),
                        addr,
                    })
                }
            }
            None => match (reachable.len(), reachable.first()) {
                (1, Some(&bank)) => Ok(bank),
                _ => Err(QueryError::AmbiguousBank(addr)),
            },
        }
    }

    /// Bank encoded in `long_addr`, or `None` if untagged or unbanked.
    #[must_use]
    pub fn bank_for_address(&self, long_addr: u32) -> Option<usize> {
        let (addr, bank) = split_long_address(long_addr);
        let bank = bank?;
        if self.banks_reachable_from(addr).len() <= 1 {
            return None;
        }
        Some(bank)
    }

    /// Short name of the bank encoded in `long_addr`, see [`Self::bank_for_address`].
    #[must_use]
    pub fn bank_short_name_for_address(&self, long_addr: u32) -> Option<&str> {
        self.bank_for_address(long_addr)
            .and_then(|bank| self.bank(bank))
            .map(|bank| bank.short_name.as_str())
    }

    /// Long name of the bank encoded in `long_addr`, see [`Self::bank_for_address`].
    #[must_use]
    pub fn bank_name_for_address(&self, long_addr: u32) -> Option<&str> {
        self.bank_for_address(long_addr)
            .and_then(|bank| self.bank(bank))
            .map(|bank| bank.name.as_str())
    }

    /// Short name of `bank`, empty when the bank does not exist.
    #[must_use]
    pub fn bank_short_name(&self, bank: usize) -> &str {
        self.bank(bank).map_or("", |bank| bank.short_name.as_str())
    }

    /// One past the highest RAM address in the initial slot assignment.
    ///
    /// Returns 0 if no initial slot holds RAM.
    #[must_use]
    pub fn top_of_ram(&self) -> u32 {
        self.slot_ranges
            .iter()
            .zip(&self.initial_slots)
            .rev()
            .find(|(_, &bank)| {
                self.bank(bank)
                    .is_some_and(|bank| bank.bank_type == BankType::Ram)
            })
            .map_or(0, |(range, _)| u32::from(range.end) + 1)
    }

    /// Describes every slot with the bank currently paged in per `slots`.
    #[must_use]
    pub fn memory_banks(&self, slots: &[usize]) -> Vec<MemoryBank> {
        self.slot_ranges
            .iter()
            .enumerate()
            .map(|(index, range)| MemoryBank {
                start: range.start,
                end: range.end,
                name: slots
                    .get(index)
                    .and_then(|&bank| self.bank(bank))
                    .map_or_else(|| "UNASSIGNED".to_string(), |bank| bank.name.clone()),
            })
            .collect()
    }

    /// Long address of `addr` with the bank `slots` assigns to its slot.
    #[must_use]
    pub fn create_long_address(&self, addr: u16, slots: &[usize]) -> u32 {
        crate::long_address::create_long_address(addr, |a| self.slot_index_for_address(a), slots)
    }

    /// Long address of `addr` in the initial slot assignment.
    #[must_use]
    pub fn initial_long_address(&self, addr: u16) -> u32 {
        long_address_with_bank(addr, self.initial_slots[self.slot_index_for_address(addr)])
    }
}

fn push_gap(
    slot_ranges: &mut Vec<SlotRange>,
    slot_banks: &mut Vec<BTreeSet<usize>>,
    initial_slots: &mut Vec<Option<usize>>,
    (start, end): (u32, u32),
) {
    slot_ranges.push(SlotRange {
        start: u16::try_from(start).unwrap_or(u16::MAX),
        end: u16::try_from(end).unwrap_or(u16::MAX),
        name: None,
    });
    slot_banks.push(BTreeSet::new());
    initial_slots.push(None);
}

fn validate_index(index: BankIndex) -> Result<(usize, usize), ConfigurationError> {
    let (first, last) = match index {
        BankIndex::Single(index) => {
            if index >= MAX_DECLARED_BANKS {
                return Err(ConfigurationError::BankIndexTooHigh);
            }
            (index, index)
        }
        BankIndex::Range([first, last]) => {
            if first > last {
                return Err(ConfigurationError::InvertedBankRange);
            }
            if last >= MAX_DECLARED_BANKS {
                return Err(ConfigurationError::BankIndexTooHigh);
            }
            (first, last)
        }
    };
    let first = usize::try_from(first).map_err(|_| ConfigurationError::NegativeBankIndex)?;
    let last = usize::try_from(last).map_err(|_| ConfigurationError::NegativeBankIndex)?;
    Ok((first, last))
}

fn substitute_index(text: &str, index: usize) -> String {
    text.replace("${index}", &index.to_string())
}

fn pending_bank(
    bank: &BankConfig,
    index: usize,
    size: u32,
    assign_short_name: bool,
) -> PendingBank {
    let short_name = if assign_short_name {
        bank.short_name.as_deref().map(|name| substitute_index(name, index))
    } else {
        Some(String::new())
    };
    PendingBank {
        name: bank.name.as_deref().map(|name| substitute_index(name, index)),
        short_name,
        size,
        bank_type: if bank.is_rom() { BankType::Rom } else { BankType::Ram },
        rom: bank.rom.clone(),
        rom_offset: bank.rom_offset.unwrap_or(0),
        fill: bank.fill,
    }
}

/// Larger size wins, the first non-empty name wins.
fn merge_bank(banks: &mut Vec<Option<PendingBank>>, index: usize, bank: PendingBank) {
    if banks.len() <= index {
        banks.resize(index + 1, None);
    }
    match &mut banks[index] {
        Some(previous) => {
            previous.size = previous.size.max(bank.size);
            if previous.name.as_deref().map_or(true, str::is_empty) {
                previous.name = bank.name;
            }
            if previous.short_name.as_deref().map_or(true, str::is_empty) {
                previous.short_name = bank.short_name;
            }
        }
        slot @ None => *slot = Some(bank),
    }
}

fn finish_bank(index: usize, bank: PendingBank) -> BankInfo {
    BankInfo {
        name: bank.name.unwrap_or_else(|| format!("BANK{index}")),
        short_name: bank.short_name.unwrap_or_else(|| index.to_string()),
        size: bank.size,
        bank_type: bank.bank_type,
        rom: bank.rom,
        rom_offset: bank.rom_offset,
        default_fill: bank.fill.unwrap_or(0),
    }
}

fn unused_bank(size: u32) -> BankInfo {
    BankInfo {
        name: "UNUSED".to_string(),
        short_name: String::new(),
        size,
        bank_type: BankType::Unused,
        rom: None,
        rom_offset: 0,
        default_fill: 0xFF,
    }
}

fn register_short_names(
    banks: &[Option<BankInfo>],
    allow_duplicates: bool,
) -> Result<HashMap<String, usize>, ConfigurationError> {
    let mut short_names = HashMap::new();
    for (index, bank) in banks.iter().enumerate() {
        let Some(bank) = bank else { continue };
        if bank.short_name.is_empty() {
            continue;
        }
        if let Some(&previous) = short_names.get(&bank.short_name) {
            if previous != index && !allow_duplicates {
                return Err(ConfigurationError::DuplicateShortName(bank.short_name.clone()));
            }
        }
        short_names.insert(bank.short_name.clone(), index);
    }
    Ok(short_names)
}
