use thiserror::Error;

/// A malformed memory configuration, reported at model construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A slot starts inside or before the previous slot.
    #[error("Range-start lower or equal than last range-end.")]
    OverlappingRange,
    /// A slot range is inverted.
    #[error("Range-end lower than range-start.")]
    InvertedRange,
    /// A slot lists no banks.
    #[error("No banks specified for range.")]
    NoBanks,
    /// Bank index is 256 or more.
    #[error("Bank index too high.")]
    BankIndexTooHigh,
    /// Bank index is negative.
    #[error("Bank index < 0.")]
    NegativeBankIndex,
    /// Bank range with first index above the last.
    #[error("Bank range: first index bigger than last index.")]
    InvertedBankRange,
    /// Two different banks share a short name.
    #[error("Bank shortName '{0}' used more than once.")]
    DuplicateShortName(String),
    /// No predefined model with that name.
    #[error("Unknown memory model: '{0}'.")]
    UnknownModel(String),
    /// `CUSTOM` requested without a configuration.
    #[error("Memory model 'CUSTOM' requires a custom memory configuration.")]
    MissingCustomMemory,
}

/// A failed bank lookup against an existing model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// No bank carries the short name.
    #[error("Bank with shortName '{0}' does not exist in memory model.")]
    UnknownShortName(String),
    /// The bank exists but the slot at the address cannot page it in.
    #[error("Bank '{name}' is not reachable from address {addr:04X}.")]
    Unreachable {
        /// Short name as written.
        name: String,
        /// 64K address the bank was requested for.
        addr: u16,
    },
    /// No short name given and the slot has several banks.
    #[error("No bank given for address {0:04X} but the slot has several banks.")]
    AmbiguousBank(u16),
}
