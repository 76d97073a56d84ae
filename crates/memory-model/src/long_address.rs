//! A long address packs a bank tag above the 16-bit Z80 address:
//! `((bank + 1) << 16) | addr16`. A tag of zero marks an address without
//! bank information.

/// Bit position of the bank tag inside a long address.
pub const LONG_ADDRESS_BANK_SHIFT: u32 = 16;

/// Returns the long address for `addr16` paged in from `bank`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn long_address_with_bank(addr16: u16, bank: usize) -> u32 {
    (((bank as u32) + 1) << LONG_ADDRESS_BANK_SHIFT) | addr16 as u32
}

/// Splits a long address into its 16-bit address and bank.
///
/// The bank is `None` for plain 64K addresses (tag 0).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn split_long_address(long_addr: u32) -> (u16, Option<usize>) {
    let addr16 = (long_addr & 0xFFFF) as u16;
    let tag = long_addr >> LONG_ADDRESS_BANK_SHIFT;
    if tag == 0 {
        (addr16, None)
    } else {
        (addr16, Some((tag - 1) as usize))
    }
}

/// Creates a long address from a 64K address and a slot-to-bank table.
///
/// `slot_of` maps the address to its slot index. Returns the plain 64K
/// address when `slots` has no entry for that slot.
#[must_use]
pub fn create_long_address(addr16: u16, slot_of: impl Fn(u16) -> usize, slots: &[usize]) -> u32 {
    slots
        .get(slot_of(addr16))
        .map_or(u32::from(addr16), |&bank| long_address_with_bank(addr16, bank))
}
