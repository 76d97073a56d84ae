//! User-facing memory configuration.
//!
//! Mirrors the `customMemory` settings block: an ordered list of slots, each
//! listing the banks it can page in, plus an optional IO-MMU rule text.

/// A complete custom memory configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CustomMemory {
    /// Slots in ascending address order.
    pub slots: Vec<SlotConfig>,
    /// Bank switching rules, kept as opaque text.
    #[cfg_attr(feature = "serde", serde(default))]
    pub io_mmu: Option<IoMmu>,
}

/// IO-MMU rule text, either as one string or as a list of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum IoMmu {
    /// The whole rule set in one string.
    Text(String),
    /// One rule line per entry, joined with newlines.
    Lines(Vec<String>),
}

impl IoMmu {
    /// Returns the rule set as one newline separated string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Lines(lines) => lines.join("\n"),
        }
    }
}

/// One slot: an address range and the banks that can be paged into it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SlotConfig {
    /// Optional slot name, referenced by IO-MMU rules.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Inclusive `[start, end]` address range.
    pub range: [u16; 2],
    /// Bank initially paged in. Defaults to the first listed bank.
    #[cfg_attr(feature = "serde", serde(default))]
    pub initial_bank: Option<usize>,
    /// Banks reachable from this slot.
    pub banks: Vec<BankConfig>,
}

impl SlotConfig {
    /// Creates a slot covering `start..=end` with the given banks.
    #[must_use]
    pub const fn new(start: u16, end: u16, banks: Vec<BankConfig>) -> Self {
        Self {
            name: None,
            range: [start, end],
            initial_bank: None,
            banks,
        }
    }

    /// Sets the slot name.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Sets the initially paged-in bank.
    #[must_use]
    pub const fn with_initial_bank(mut self, bank: usize) -> Self {
        self.initial_bank = Some(bank);
        self
    }
}

/// A single bank index or an inclusive range of bank indices.
///
/// Indices are signed so that negative values from settings can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum BankIndex {
    /// One bank.
    Single(i64),
    /// `[first, last]`, both inclusive.
    Range([i64; 2]),
}

/// ROM contents for a bank.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RomSource {
    /// Marks the bank as ROM without naming a file.
    Flag(bool),
    /// Path of a raw or Intel HEX ROM image.
    Path(String),
}

/// Bank declaration inside a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BankConfig {
    /// Bank index or range.
    pub index: BankIndex,
    /// Long name, `${index}` is replaced with the bank number.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Short name used in `addr.bank` notation, `${index}` is replaced.
    #[cfg_attr(feature = "serde", serde(default))]
    pub short_name: Option<String>,
    /// Present for ROM banks.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rom: Option<RomSource>,
    /// Offset into the ROM image.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rom_offset: Option<u32>,
    /// Byte used to initialise the bank.
    #[cfg_attr(feature = "serde", serde(default))]
    pub fill: Option<u8>,
}

impl BankConfig {
    /// A RAM bank with default names.
    #[must_use]
    pub const fn single(index: i64) -> Self {
        Self::with_index(BankIndex::Single(index))
    }

    /// A range of RAM banks with default names.
    #[must_use]
    pub const fn range(first: i64, last: i64) -> Self {
        Self::with_index(BankIndex::Range([first, last]))
    }

    const fn with_index(index: BankIndex) -> Self {
        Self {
            index,
            name: None,
            short_name: None,
            rom: None,
            rom_offset: None,
            fill: None,
        }
    }

    /// Sets long and short name.
    #[must_use]
    pub fn named(mut self, name: &str, short_name: &str) -> Self {
        self.name = Some(name.to_string());
        self.short_name = Some(short_name.to_string());
        self
    }

    /// Sets only the long name.
    #[must_use]
    pub fn long_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Marks the bank as ROM.
    #[must_use]
    pub fn rom(mut self) -> Self {
        self.rom = Some(RomSource::Flag(true));
        self
    }

    /// Marks the bank as ROM at `offset` inside its image.
    #[must_use]
    pub fn rom_at(mut self, offset: u32) -> Self {
        self.rom = Some(RomSource::Flag(true));
        self.rom_offset = Some(offset);
        self
    }

    /// Returns `true` when the declaration describes ROM.
    #[must_use]
    pub const fn is_rom(&self) -> bool {
        !matches!(self.rom, None | Some(RomSource::Flag(false)))
    }
}
