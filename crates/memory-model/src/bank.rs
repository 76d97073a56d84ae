use crate::config::RomSource;

/// Kind of memory backing a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BankType {
    /// Read-only memory.
    Rom,
    /// Read/write memory.
    Ram,
    /// Nothing attached; synthesised for gaps between slots.
    Unused,
    /// Memory layout unknown to the debugger.
    Unknown,
}

/// A bank after construction, with all names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BankInfo {
    /// Long name, e.g. `ROM0` or `BANK3`.
    pub name: String,
    /// Short name for `addr.bank` notation. Empty for unbanked memory.
    pub short_name: String,
    /// Size in bytes (the largest slot that maps it).
    pub size: u32,
    /// Backing kind.
    pub bank_type: BankType,
    /// ROM image, if any.
    pub rom: Option<RomSource>,
    /// Offset into the ROM image.
    pub rom_offset: u32,
    /// Byte the bank is initialised with.
    pub default_fill: u8,
}

/// Address range covered by one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SlotRange {
    /// Inclusive start address.
    pub start: u16,
    /// Inclusive end address.
    pub end: u16,
    /// Name used by IO-MMU rules.
    pub name: Option<String>,
}

impl SlotRange {
    /// Number of bytes in the slot.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.end as u32 + 1 - self.start as u32
    }

    /// Returns `true` when `addr` lies in the slot.
    #[must_use]
    pub const fn contains(&self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }
}

/// A slot together with the name of the bank currently paged in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryBank {
    /// Inclusive start address.
    pub start: u16,
    /// Inclusive end address.
    pub end: u16,
    /// Bank name, or `UNASSIGNED`.
    pub name: String,
}
