//! Banked memory model for Z80 debug targets.
//!
//! A model divides the 64K address space into slots. Each slot can page in
//! one of a set of banks (ROM, RAM or unused). Addresses are disambiguated
//! with a bank tag in the upper bits, producing a "long address".

/// Long-address encoding and decoding helpers.
pub mod long_address;
pub use long_address::{
    create_long_address, long_address_with_bank, split_long_address, LONG_ADDRESS_BANK_SHIFT,
};

/// Memory configuration as read from user settings.
pub mod config;
pub use config::{BankConfig, BankIndex, CustomMemory, IoMmu, RomSource, SlotConfig};

/// Construction and query error types.
pub mod error;
pub use error::{ConfigurationError, QueryError};

/// Bank and slot records.
pub mod bank;
pub use bank::{BankInfo, BankType, MemoryBank, SlotRange};

/// The slot/bank model and its address queries.
pub mod model;
pub use model::MemoryModel;

/// Predefined machine models.
pub mod predefined;
pub use predefined::PredefinedModel;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use serde_json as _;
