//! List-file parsers, one per assembler dialect.
//!
//! Every parser turns one list file into a [`ParseResult`]. Common work
//! (reading, label naming, include tracking, address association) lives in
//! [`ParserCore`]; dialects only recognise their line formats.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use log::{info, warn};
use memory_model::MemoryModel;

use crate::config::{Dialect, LineFilter, ListFileConfig};
use crate::directives::{DirectiveScanner, Directives};
use crate::error::{LabelsError, ParseWarning};
use crate::expression;

/// Reverse engineering list format.
pub mod rev_eng;
/// sjasmplus classic list format.
pub mod sjasmplus;
/// sjasmplus source level debug (SLD) format.
pub mod sld;
/// z80asm list format.
pub mod z80asm;
/// z88dk list format before v2.2.
pub mod z88dk;
/// z88dk list format v2.2 and later.
pub mod z88dk_v2;

/// Source location of an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileEntry {
    /// Source (or list) file.
    pub file_name: String,
    /// 0-based line number in `file_name`.
    pub line_nr: usize,
    /// sjasmplus module prefix, e.g. `sprites.`.
    pub module_prefix: Option<String>,
    /// Last non-local label before the line.
    pub last_label: Option<String>,
    /// Bytes the line occupies. 0 for label-only lines.
    pub size: u16,
}

/// Where a label is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelLocation {
    /// Source (or list) file.
    pub file: String,
    /// 0-based line number.
    pub line_nr: usize,
    /// Value of the label.
    pub address: i64,
}

/// Everything extracted from one list file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Long address to source location. Every byte of a line is mapped.
    pub file_line_nrs: HashMap<u32, SourceFileEntry>,
    /// Per file: line number to the first address of the line.
    pub line_arrays: HashMap<String, BTreeMap<usize, u32>>,
    /// Label values in definition order. EQU constants keep their full
    /// value, which may be negative or above 0xFFFF.
    pub number_for_label: IndexMap<String, i64>,
    /// 64K value to labels.
    pub labels_for_number: BTreeMap<u16, Vec<String>>,
    /// Long address to labels.
    pub labels_for_long_address: HashMap<u32, Vec<String>>,
    /// Label to defining line.
    pub label_locations: HashMap<String, LabelLocation>,
    /// WPMEM, ASSERTION and LOGPOINT lines.
    pub directives: Directives,
    /// Long address to number of bytes the disassembler skips (revEng).
    pub skip_addresses: HashMap<u32, u16>,
    /// Long addresses that are code (revEng).
    pub code_addresses: Vec<u32>,
    /// Non-fatal problems.
    pub warnings: Vec<ParseWarning>,
}

/// Parses the list file of `dialect` against the target `model`.
///
/// # Errors
///
/// Fails on I/O errors and on list files that cannot be mapped to the
/// target model at all. Problems with single lines become warnings.
pub fn parse(dialect: &Dialect, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let config = dialect.config();
    info!("Reading {} list file '{}'", dialect.key(), config.path);
    let result = match dialect {
        Dialect::Sjasmplus(config) => {
            if sld::is_sld_file(Path::new(&config.path))? {
                sld::parse(config, model)
            } else {
                sjasmplus::parse(config, model)
            }
        }
        Dialect::Z80asm(config) => z80asm::parse(config, model),
        Dialect::Z88dk(config) => z88dk::parse(config, model),
        Dialect::Z88dkV2(config) => z88dk_v2::parse(config, model),
        Dialect::RevEng(config) => rev_eng::parse(config, model),
    }?;
    info!(
        "'{}': {} labels, {} addresses, {} warnings",
        config.path,
        result.number_for_label.len(),
        result.file_line_nrs.len(),
        result.warnings.len()
    );
    Ok(result)
}

/// How a label name is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelKind {
    /// Gets the module prefix and becomes the last label.
    Normal,
    /// `.name`, appended to the last label.
    Local,
    /// `@name`, taken verbatim.
    Global,
}

/// One line of the list file while parsing.
#[derive(Debug, Clone, Default)]
pub(crate) struct ListLine {
    pub(crate) long_addr: Option<u32>,
    pub(crate) size: u16,
    pub(crate) line: String,
    pub(crate) file_name: String,
    /// Negative while not (yet) associated.
    pub(crate) line_nr: i64,
    pub(crate) module_prefix: Option<String>,
    pub(crate) last_label: Option<String>,
}

/// Hooks a dialect provides to [`ParserCore::run`].
pub(crate) trait LineParser {
    /// Pass 1: labels, EQUs and the address of `line`.
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError>;

    /// Pass 2 (sources mode): include boundaries and the source line number.
    fn parse_file_and_line_number(&mut self, _core: &mut ParserCore<'_>, _line: &str) {}

    /// Pass 2 (sources mode) over all lines, front to back by default.
    fn associate_sources(&mut self, core: &mut ParserCore<'_>) -> Result<(), LabelsError> {
        core.reset_includes();
        for index in 0..core.lines.len() {
            core.current = index;
            let text = core.lines[index].line.clone();
            self.parse_file_and_line_number(core, &text);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct IncludeFrame {
    /// Name as written in the list file.
    pub(crate) raw_name: String,
    /// Name resolved against the source directories.
    pub(crate) file_name: String,
}

/// State shared by all dialects while one list file is parsed.
pub(crate) struct ParserCore<'a> {
    pub(crate) config: &'a ListFileConfig,
    pub(crate) model: &'a MemoryModel,
    pub(crate) lines: Vec<ListLine>,
    pub(crate) current: usize,
    pub(crate) result: ParseResult,
    pub(crate) module_prefix: Option<String>,
    pub(crate) last_label: Option<String>,
    pub(crate) include_stack: Vec<IncludeFrame>,
    scanner: DirectiveScanner,
    filter: Option<LineFilter>,
    exclude: Vec<glob::Pattern>,
    excluded_from: Option<usize>,
    module_stack: Vec<String>,
    pending_locations: Vec<(String, usize)>,
    constants: HashSet<String>,
}

impl<'a> ParserCore<'a> {
    pub(crate) fn new(
        config: &'a ListFileConfig,
        model: &'a MemoryModel,
    ) -> Result<Self, LabelsError> {
        let exclude = config
            .exclude_files
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| LabelsError::Glob {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let filter = config.filter.as_deref().map(LineFilter::parse).transpose()?;
        Ok(Self {
            config,
            model,
            lines: Vec::new(),
            current: 0,
            result: ParseResult::default(),
            module_prefix: None,
            last_label: None,
            include_stack: Vec::new(),
            scanner: DirectiveScanner::new()?,
            filter,
            exclude,
            excluded_from: None,
            module_stack: Vec::new(),
            pending_locations: Vec::new(),
            constants: HashSet::new(),
        })
    }

    /// Reads the list file, filtered, split into lines.
    pub(crate) fn read_lines(&self) -> Result<Vec<String>, LabelsError> {
        let text = read_text(Path::new(&self.config.path))?;
        Ok(text
            .lines()
            .map(|line| match &self.filter {
                Some(filter) => filter.apply(line),
                None => line.to_string(),
            })
            .collect())
    }

    /// Runs both passes with `parser` and finishes the result.
    pub(crate) fn run(mut self, parser: &mut impl LineParser) -> Result<ParseResult, LabelsError> {
        for text in self.read_lines()? {
            self.begin_line(&text);
            parser.parse_label_and_address(&mut self, &text)?;
            self.end_line();
        }
        if self.config.sources_mode() {
            parser.associate_sources(&mut self)?;
        } else {
            self.list_file_mode_lines();
        }
        Ok(self.finish())
    }

    /// Starts a new list line in pass 1.
    pub(crate) fn begin_line(&mut self, text: &str) {
        self.lines.push(ListLine {
            line: text.to_string(),
            line_nr: -1,
            ..ListLine::default()
        });
        self.current = self.lines.len() - 1;
    }

    pub(crate) fn current_line(&mut self) -> &mut ListLine {
        &mut self.lines[self.current]
    }

    /// Records the label scope and the directives of the current line.
    fn end_line(&mut self) {
        let module_prefix = self.module_prefix.clone();
        let last_label = self.last_label.clone();
        let line = &mut self.lines[self.current];
        line.module_prefix = module_prefix;
        line.last_label = last_label;
        self.scanner
            .scan(&line.line, line.long_addr, &mut self.result.directives);
    }

    /// Records directives in `text`, which holds only comment text.
    pub(crate) fn scan_comment(&mut self, text: &str, address: Option<u32>) {
        self.scanner
            .scan(&format!(";{text}"), address, &mut self.result.directives);
    }

    /// Sets the address and byte count of the current line.
    pub(crate) fn add_address_line(&mut self, long_addr: u32, size: u16) {
        let line = self.current_line();
        line.long_addr = Some(long_addr);
        line.size = size;
    }

    /// `addr` moved by the configured `addOffset`, wrapping at 64K.
    pub(crate) fn offset_address(&self, addr: u16) -> u16 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let moved = (i64::from(addr) + i64::from(self.config.add_offset)) as u16;
        moved
    }

    /// Long address of `addr` for this list file.
    pub(crate) fn create_long_address(&self, addr: u16) -> u32 {
        if self.config.disable_banking {
            u32::from(addr)
        } else {
            self.model.initial_long_address(addr)
        }
    }

    /// Full name of `label` in the current module and label scope.
    pub(crate) fn full_label_name(&self, label: &str, kind: LabelKind) -> String {
        match kind {
            LabelKind::Global => label.to_string(),
            LabelKind::Local => match (&self.last_label, &self.module_prefix) {
                (Some(last), _) => format!("{last}{label}"),
                (None, Some(prefix)) => format!("{prefix}{}", label.trim_start_matches('.')),
                (None, None) => label.to_string(),
            },
            LabelKind::Normal => match &self.module_prefix {
                Some(prefix) => format!("{prefix}{label}"),
                None => label.to_string(),
            },
        }
    }

    /// Adds a label and updates the label scope.
    pub(crate) fn add_label(&mut self, value: u32, label: &str, kind: LabelKind) {
        let full = self.full_label_name(label, kind);
        if kind != LabelKind::Local {
            self.last_label = Some(full.clone());
        }
        self.add_label_raw(value, &full);
    }

    /// Adds the address label `label` verbatim.
    pub(crate) fn add_label_raw(&mut self, value: u32, label: &str) {
        self.result
            .number_for_label
            .insert(label.to_string(), i64::from(value));
        self.constants.remove(label);
        #[allow(clippy::cast_possible_truncation)]
        let addr = value as u16;
        self.add_label_for_number(addr, label);
        if value > 0xFFFF {
            let labels = self.result.labels_for_long_address.entry(value).or_default();
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        self.pending_locations.push((label.to_string(), self.current));
    }

    /// Adds the constant `label` verbatim. Only values that fit into 64K
    /// are found by number.
    pub(crate) fn add_constant(&mut self, value: i64, label: &str) {
        self.result.number_for_label.insert(label.to_string(), value);
        self.constants.insert(label.to_string());
        if let Ok(addr) = u16::try_from(value) {
            self.add_label_for_number(addr, label);
        }
        self.pending_locations.push((label.to_string(), self.current));
    }

    fn add_label_for_number(&mut self, addr: u16, label: &str) {
        let labels = self.result.labels_for_number.entry(addr).or_default();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }

    /// Evaluates an `EQU` and adds the label as a constant.
    ///
    /// Returns the value, or `None` (with a warning) if it cannot be
    /// evaluated.
    pub(crate) fn add_equ(
        &mut self,
        label: &str,
        kind: LabelKind,
        expression: &str,
        addr: Option<u16>,
    ) -> Option<i64> {
        let known = &self.result.number_for_label;
        let constants = &self.constants;
        // Address labels take part with their 64K address.
        let evaluated = expression::evaluate(expression, addr.map(i64::from), |name| {
            known.get(name).map(|&value| {
                if constants.contains(name) {
                    value
                } else {
                    value & 0xFFFF
                }
            })
        });
        match evaluated {
            Ok(value) => {
                let full = self.full_label_name(label, kind);
                self.add_constant(value, &full);
                Some(value)
            }
            Err(_) => {
                let line = self.lines[self.current].line.clone();
                self.warn(format!(
                    "Could not evaluate expression '{}' in line: '{line}'",
                    expression.trim()
                ));
                None
            }
        }
    }

    /// Records a warning for the current line.
    pub(crate) fn warn(&mut self, message: String) {
        let warning = ParseWarning {
            file: self.config.path.clone(),
            line: self.current,
            message,
        };
        warn!("{warning}");
        self.result.warnings.push(warning);
    }

    pub(crate) fn module_start(&mut self, name: &str) {
        self.module_stack.push(name.to_string());
        self.module_prefix = Some(format!("{}.", self.module_stack.join(".")));
        self.last_label = None;
    }

    pub(crate) fn module_end(&mut self) {
        self.module_stack.pop();
        self.module_prefix = if self.module_stack.is_empty() {
            None
        } else {
            Some(format!("{}.", self.module_stack.join(".")))
        };
        self.last_label = None;
    }

    /// Resolves a source file name against the directory of the including
    /// file and the source directories. Unknown files keep their name.
    pub(crate) fn resolve_source(&self, name: &str) -> String {
        let parent = self
            .include_stack
            .last()
            .and_then(|frame| Path::new(&frame.file_name).parent())
            .map(Path::to_path_buf);
        parent
            .into_iter()
            .chain(self.config.src_dirs.iter().map(|dir| Path::new(dir).to_path_buf()))
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
            .map_or_else(|| name.to_string(), |path| path.to_string_lossy().into_owned())
    }

    /// Forgets all include frames before pass 2.
    pub(crate) fn reset_includes(&mut self) {
        self.include_stack.clear();
        self.excluded_from = None;
    }

    /// Enters an included file.
    pub(crate) fn include_start(&mut self, name: &str) {
        let file_name = self.resolve_source(name);
        if self.excluded_from.is_none()
            && self.exclude.iter().any(|pattern| pattern.matches(&file_name))
        {
            self.excluded_from = Some(self.include_stack.len());
        }
        self.include_stack.push(IncludeFrame {
            raw_name: name.to_string(),
            file_name,
        });
    }

    /// Leaves the current included file.
    pub(crate) fn include_end(&mut self) {
        self.include_stack.pop();
        if self
            .excluded_from
            .is_some_and(|index| index >= self.include_stack.len())
        {
            self.excluded_from = None;
        }
    }

    /// Associates the current line with `line_nr` of the current file.
    pub(crate) fn set_line_number(&mut self, line_nr: i64) {
        if self.excluded_from.is_some() {
            return;
        }
        let Some(frame) = self.include_stack.last() else {
            return;
        };
        let file_name = frame.file_name.clone();
        let line = self.current_line();
        line.file_name = file_name;
        line.line_nr = line_nr;
    }

    /// Associates every line with its own position in the list file.
    pub(crate) fn list_file_mode_lines(&mut self) {
        let path = self.config.path.clone();
        for (index, line) in self.lines.iter_mut().enumerate() {
            line.file_name.clone_from(&path);
            line.line_nr = i64::try_from(index).unwrap_or(i64::MAX);
        }
    }

    /// Maps `long_addr` to a source location, overwriting earlier mappings.
    pub(crate) fn map_address(&mut self, long_addr: u32, entry: SourceFileEntry) {
        let line_array = self
            .result
            .line_arrays
            .entry(entry.file_name.clone())
            .or_default();
        line_array.entry(entry.line_nr).or_insert(long_addr);
        self.result.file_line_nrs.insert(long_addr, entry);
    }

    /// Builds the address tables from the associated lines.
    fn associate(&mut self) {
        let lines = std::mem::take(&mut self.lines);
        for line in &lines {
            let (Some(long_addr), Ok(line_nr)) = (line.long_addr, usize::try_from(line.line_nr))
            else {
                continue;
            };
            if line.file_name.is_empty() {
                continue;
            }
            let entry = SourceFileEntry {
                file_name: line.file_name.clone(),
                line_nr,
                module_prefix: line.module_prefix.clone(),
                last_label: line.last_label.clone(),
                size: line.size,
            };
            for k in 1..u32::from(line.size) {
                self.result.file_line_nrs.insert(long_addr + k, entry.clone());
            }
            self.map_address(long_addr, entry);
        }
        for (label, index) in std::mem::take(&mut self.pending_locations) {
            let Some(line) = lines.get(index) else {
                continue;
            };
            let (Ok(line_nr), Some(&address)) = (
                usize::try_from(line.line_nr),
                self.result.number_for_label.get(&label),
            ) else {
                continue;
            };
            if line.file_name.is_empty() {
                continue;
            }
            self.result.label_locations.insert(
                label,
                LabelLocation {
                    file: line.file_name.clone(),
                    line_nr,
                    address,
                },
            );
        }
        self.lines = lines;
    }

    /// Completes the address tables and returns the result.
    pub(crate) fn finish(mut self) -> ParseResult {
        self.associate();
        self.result
    }
}

/// Reads a text file, replacing invalid UTF-8.
pub(crate) fn read_text(path: &Path) -> Result<String, LabelsError> {
    let bytes = fs::read(path).map_err(|e| LabelsError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Value of the leading hex digits of `text`, at most `max_digits` of them.
pub(crate) fn leading_hex(text: &str, max_digits: usize) -> Option<u16> {
    let digits: String = text
        .chars()
        .take(max_digits)
        .take_while(char::is_ascii_hexdigit)
        .collect();
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(|value| u16::try_from(value & 0xFFFF).ok())
}

/// Number of bytes in a run of two-digit hex values separated by spaces.
pub(crate) fn count_hex_bytes(bytes: &str) -> u16 {
    let digits = bytes.chars().filter(|c| !c.is_whitespace()).count() / 2;
    u16::try_from(digits).unwrap_or(u16::MAX)
}
