//! Label and source-line resolution for Z80 debugging.
//!
//! Reads the list files of the sjasmplus, z80asm, z88dk and revEng
//! assemblers, maps every long address (see [`memory_model`]) to its source
//! line and answers label queries in both directions.

/// Session configuration.
pub mod config;
pub use config::{Dialect, LabelsConfig, LineFilter, ListFileConfig, DEFAULT_SMALL_VALUES_MAXIMUM};

/// WPMEM, ASSERTION and LOGPOINT comments.
pub mod directives;
pub use directives::{DirectiveLine, Directives};

/// Errors and warnings.
pub mod error;
pub use error::{LabelsError, ParseWarning};

/// Assembler expressions in EQU lines.
pub mod expression;

/// 64K address to label lookup table.
pub mod label_table;

/// The merged label database.
pub mod labels;
pub use labels::{
    calculate_label_distances, LabelDistance, LabelHierarchy, LabelScope, Labels, ListFileDate,
};

/// List-file parsers.
pub mod parser;
pub use parser::{LabelLocation, ParseResult, SourceFileEntry};

/// Model, labels and slots of a debug session.
pub mod session;
pub use session::{RegisterProvider, Session};

use env_logger as _;
