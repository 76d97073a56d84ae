//! The label facade: all list files of a session merged into one queryable
//! symbol table.
//!
//! [`Labels::read_list_files`] parses every configured list file, merges the
//! results in configuration order and precomputes the lookup structures.
//! Queries never rescan list files.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use indexmap::IndexMap;
use log::{error, info, warn};
use memory_model::MemoryModel;
use regex::RegexBuilder;

use crate::config::{Dialect, LabelsConfig, DEFAULT_SMALL_VALUES_MAXIMUM};
use crate::directives::{DirectiveLine, Directives};
use crate::error::{LabelsError, ParseWarning};
use crate::expression::parse_number;
use crate::label_table::LabelTable;
use crate::parser::{self, LabelLocation, ParseResult, SourceFileEntry};
use crate::session::RegisterProvider;

/// Distance from a label to the next label defined after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDistance {
    /// Bytes to the next label, always > 0.
    pub distance: u32,
    /// Name of the next label.
    pub next_label: String,
}

/// Module and label scope of a source line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelScope {
    /// Module prefix, e.g. `sprites.`.
    pub module_prefix: Option<String>,
    /// Last non-local label.
    pub last_label: Option<String>,
}

/// Modification time of the youngest list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFileDate {
    /// The list file.
    pub path: PathBuf,
    /// Its modification time.
    pub modified: SystemTime,
}

/// Tree of dotted label names, e.g. `a.b.c`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelHierarchy {
    children: IndexMap<String, LabelHierarchy>,
}

impl LabelHierarchy {
    /// Adds `label` split at its dots. A leading dot stays on the first part.
    pub fn insert(&mut self, label: &str) {
        let mut node = self;
        for part in Self::parts(label) {
            node = node.children.entry(part).or_default();
        }
    }

    /// Names of the direct children of `label`; top level for `""`.
    #[must_use]
    pub fn children(&self, label: &str) -> Vec<String> {
        let mut node = self;
        if !label.is_empty() {
            for part in Self::parts(label) {
                match node.children.get(&part) {
                    Some(child) => node = child,
                    None => return Vec::new(),
                }
            }
        }
        node.children.keys().cloned().collect()
    }

    fn parts(label: &str) -> Vec<String> {
        let mut parts: Vec<String> = label.split('.').map(str::to_string).collect();
        if parts.len() > 1 && parts[0].is_empty() {
            parts.remove(0);
            parts[0].insert(0, '.');
        }
        parts
    }
}

/// Distances between consecutively defined labels.
///
/// Only pairs where the next label has a higher 64K address get an entry,
/// keyed by the long address of the first label. Negative constants are
/// skipped.
#[must_use]
pub fn calculate_label_distances(
    number_for_label: &IndexMap<String, i64>,
) -> HashMap<u32, LabelDistance> {
    let mut distances = HashMap::new();
    let mut previous: Option<u32> = None;
    for (label, &value) in number_for_label {
        let Ok(value) = u32::try_from(value) else {
            continue;
        };
        if let Some(prev) = previous {
            let distance = i64::from(value & 0xFFFF) - i64::from(prev & 0xFFFF);
            if let Ok(distance @ 1..) = u32::try_from(distance) {
                distances.insert(
                    prev,
                    LabelDistance {
                        distance,
                        next_label: label.clone(),
                    },
                );
            }
        }
        previous = Some(value);
    }
    distances
}

/// All labels and address associations of a debug session.
#[derive(Debug, Clone)]
pub struct Labels {
    small_values_maximum: u16,
    file_line_nrs: HashMap<u32, SourceFileEntry>,
    line_arrays: HashMap<String, BTreeMap<usize, u32>>,
    label_table: LabelTable,
    labels_for_long_address: HashMap<u32, Vec<String>>,
    distances: HashMap<u32, LabelDistance>,
    number_for_label: IndexMap<String, i64>,
    hierarchy: LabelHierarchy,
    label_locations: HashMap<String, LabelLocation>,
    directives: Directives,
    skip_addresses: HashMap<u32, u16>,
    code_addresses: Vec<u32>,
    warnings: Vec<ParseWarning>,
    watched_files: Vec<PathBuf>,
    list_file_date: Option<ListFileDate>,
}

impl Default for Labels {
    fn default() -> Self {
        Self::new(DEFAULT_SMALL_VALUES_MAXIMUM)
    }
}

impl Labels {
    /// Creates an empty facade. Values up to `small_values_maximum` are
    /// never reported as labels.
    #[must_use]
    pub fn new(small_values_maximum: u16) -> Self {
        Self {
            small_values_maximum,
            file_line_nrs: HashMap::new(),
            line_arrays: HashMap::new(),
            label_table: LabelTable::new(),
            labels_for_long_address: HashMap::new(),
            distances: HashMap::new(),
            number_for_label: IndexMap::new(),
            hierarchy: LabelHierarchy::default(),
            label_locations: HashMap::new(),
            directives: Directives::default(),
            skip_addresses: HashMap::new(),
            code_addresses: Vec::new(),
            warnings: Vec::new(),
            watched_files: Vec::new(),
            list_file_date: None,
        }
    }

    /// Clears everything read so far.
    pub fn init(&mut self) {
        *self = Self::new(self.small_values_maximum);
    }

    /// Reads all list files of `config` for the target `model`.
    ///
    /// Files are read in dialect order (sjasmplus, z80asm, z88dk, z88dkv2,
    /// revEng) and, per dialect, in configuration order; later files
    /// overwrite address associations of earlier ones. A failing file does
    /// not stop the others from being read.
    ///
    /// # Errors
    ///
    /// [`LabelsError::Aggregated`] with the last failure if any file could
    /// not be read or parsed. The files read successfully stay queryable.
    pub fn read_list_files(
        &mut self,
        config: &LabelsConfig,
        model: &MemoryModel,
    ) -> Result<(), LabelsError> {
        self.small_values_maximum = config.small_values_maximum;
        self.init();

        let mut failure: Option<String> = None;
        for dialect in config.dialects() {
            if let Err(e) = self.read_dialect(&dialect, model) {
                error!("{e}");
                failure = Some(e.to_string());
            }
        }
        self.finish();
        if let Some(message) = failure {
            return Err(LabelsError::Aggregated(message));
        }
        info!(
            "{} labels, {} addresses, {} warnings",
            self.number_for_label.len(),
            self.file_line_nrs.len(),
            self.warnings.len()
        );
        Ok(())
    }

    /// Reads every file matching the (glob) path of `dialect`.
    fn read_dialect(&mut self, dialect: &Dialect, model: &MemoryModel) -> Result<(), LabelsError> {
        let config = dialect.config();
        let paths = expand_glob(&config.path)?;
        if paths.is_empty() {
            warn!("No list file matches '{}'", config.path);
        }
        for path in paths {
            let result = parser::parse(&dialect.with_path(&path.to_string_lossy()), model)?;
            self.merge(result);
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map_err(|e| LabelsError::io(&path, e))?;
            if self
                .list_file_date
                .as_ref()
                .is_none_or(|date| modified > date.modified)
            {
                self.list_file_date = Some(ListFileDate {
                    path: path.clone(),
                    modified,
                });
            }
            if matches!(dialect, Dialect::RevEng(_)) && config.reload_on_save {
                self.watched_files.push(path);
            }
        }
        Ok(())
    }

    /// Adds the result of one list file.
    pub fn merge(&mut self, result: ParseResult) {
        self.file_line_nrs.extend(result.file_line_nrs);
        for (file, lines) in result.line_arrays {
            let array = self.line_arrays.entry(file).or_default();
            array.extend(lines);
        }
        self.number_for_label.extend(result.number_for_label);
        for (addr, labels) in result.labels_for_number {
            for label in labels {
                self.label_table.add(addr, &label);
            }
        }
        for (addr, labels) in result.labels_for_long_address {
            let known = self.labels_for_long_address.entry(addr).or_default();
            for label in labels {
                if !known.contains(&label) {
                    known.push(label);
                }
            }
        }
        self.label_locations.extend(result.label_locations);
        self.directives.extend(result.directives);
        self.skip_addresses.extend(result.skip_addresses);
        self.code_addresses.extend(result.code_addresses);
        self.warnings.extend(result.warnings);
    }

    /// Precomputes offsets, distances and the label hierarchy.
    pub fn finish(&mut self) {
        self.label_table.calculate_offsets();
        self.distances = calculate_label_distances(&self.number_for_label);
        self.hierarchy = LabelHierarchy::default();
        for label in self.number_for_label.keys() {
            self.hierarchy.insert(label);
        }
    }

    /// File and 0-based line of `long_addr`.
    #[must_use]
    pub fn file_and_line_for_address(&self, long_addr: u32) -> Option<(&str, usize)> {
        self.file_line_nrs
            .get(&long_addr)
            .map(|entry| (entry.file_name.as_str(), entry.line_nr))
    }

    /// Full source entry of `long_addr`.
    #[must_use]
    pub fn source_file_entry_for_address(&self, long_addr: u32) -> Option<&SourceFileEntry> {
        self.file_line_nrs.get(&long_addr)
    }

    /// First address of the 0-based `line_nr` in `file`.
    #[must_use]
    pub fn addr_for_file_and_line(&self, file: &str, line_nr: usize) -> Option<u32> {
        self.line_arrays.get(file)?.get(&line_nr).copied()
    }

    /// Module and label scope at `line_nr` in `file`, taken from the nearest
    /// line at or above it that has an address.
    #[must_use]
    pub fn module_and_last_label_for_file_and_line(&self, file: &str, line_nr: usize) -> LabelScope {
        let Some((_, &addr)) = self
            .line_arrays
            .get(file)
            .and_then(|lines| lines.range(..=line_nr).next_back())
        else {
            return LabelScope::default();
        };
        self.file_line_nrs
            .get(&addr)
            .map(|entry| LabelScope {
                module_prefix: entry.module_prefix.clone(),
                last_label: entry.last_label.clone(),
            })
            .unwrap_or_default()
    }

    /// Value of `label`, a long address for code labels.
    #[must_use]
    pub fn number_for_label(&self, label: &str) -> Option<i64> {
        self.number_for_label.get(label).copied()
    }

    /// Where `label` is defined.
    #[must_use]
    pub fn location_of_label(&self, label: &str) -> Option<&LabelLocation> {
        self.label_locations.get(label)
    }

    /// Labels (and register names) with exactly the 64K value of `number`.
    #[must_use]
    pub fn labels_for_number_64k(
        &self,
        number: u32,
        registers: Option<&dyn RegisterProvider>,
    ) -> Vec<String> {
        #[allow(clippy::cast_possible_truncation)]
        let value = (number & 0xFFFF) as u16;
        if value <= self.small_values_maximum {
            return Vec::new();
        }
        let mut names = registers.map_or_else(Vec::new, |r| r.registers_equal_to(value));
        names.extend(self.label_table.labels_at(value).iter().cloned());
        names
    }

    /// Labels at `number`, or the nearest lower labels with `+offset`.
    ///
    /// Small values and values above 0xFFFF are not addresses and yield
    /// nothing.
    #[must_use]
    pub fn labels_plus_index_for_number_64k(
        &self,
        number: u32,
        registers: Option<&dyn RegisterProvider>,
    ) -> Vec<String> {
        let Ok(value) = u16::try_from(number) else {
            return Vec::new();
        };
        if value <= self.small_values_maximum {
            return Vec::new();
        }
        let mut names = registers.map_or_else(Vec::new, |r| r.registers_equal_to(value));
        names.extend(self.label_table.labels_plus_index(value));
        names
    }

    /// Labels at exactly `long_addr`.
    #[must_use]
    pub fn labels_for_long_address(&self, long_addr: u32) -> &[String] {
        self.labels_for_long_address
            .get(&long_addr)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Long lookup for tagged addresses, 64K lookup otherwise.
    #[must_use]
    pub fn labels_for_long_or_64k_address(&self, addr: u32) -> Vec<String> {
        if addr >> 16 == 0 {
            self.labels_for_number_64k(addr, None)
        } else {
            self.labels_for_long_address(addr).to_vec()
        }
    }

    /// Labels matching `pattern`, in definition order.
    ///
    /// # Errors
    ///
    /// Fails if `pattern` is not a valid regular expression.
    pub fn labels_for_regex(
        &self,
        pattern: &str,
        case_insensitive: bool,
    ) -> Result<Vec<String>, LabelsError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(self
            .number_for_label
            .keys()
            .filter(|label| regex.is_match(label))
            .cloned()
            .collect())
    }

    /// Direct children of a dotted label, e.g. `x` and `hitbox` for
    /// `invader` with `invader.x` and `invader.hitbox.y` defined.
    #[must_use]
    pub fn sub_labels(&self, label: &str) -> Vec<String> {
        self.hierarchy.children(label)
    }

    /// 64K value of a label or a number literal.
    ///
    /// Text starting with `_` is only taken as a label.
    #[must_use]
    pub fn number_from_string_64k(&self, text: &str) -> Option<u16> {
        let value = match self.number_for_label(text) {
            Some(value) => value,
            None if text.starts_with('_') => return None,
            None => parse_number(text.trim())?,
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = (value & 0xFFFF) as u16;
        Some(value)
    }

    /// Bytes from the label at `long_addr` to the next label.
    #[must_use]
    pub fn distance_to_next_label(&self, long_addr: u32) -> Option<u32> {
        self.distances.get(&long_addr).map(|d| d.distance)
    }

    /// `WPMEM` lines in source order.
    #[must_use]
    pub fn watch_point_lines(&self) -> &[DirectiveLine] {
        &self.directives.watch_points
    }

    /// `ASSERTION` lines in source order.
    #[must_use]
    pub fn assertion_lines(&self) -> &[DirectiveLine] {
        &self.directives.assertions
    }

    /// `LOGPOINT` lines in source order.
    #[must_use]
    pub fn log_point_lines(&self) -> &[DirectiveLine] {
        &self.directives.log_points
    }

    /// First label of every long address.
    #[must_use]
    pub fn labels_map(&self) -> BTreeMap<u32, String> {
        self.labels_for_long_address
            .iter()
            .filter_map(|(&addr, labels)| labels.first().map(|label| (addr, label.clone())))
            .collect()
    }

    /// Long addresses the disassembler skips, with the number of bytes.
    #[must_use]
    pub const fn long_skip_addresses(&self) -> &HashMap<u32, u16> {
        &self.skip_addresses
    }

    /// Long addresses that are known to be code.
    #[must_use]
    pub fn long_code_addresses(&self) -> &[u32] {
        &self.code_addresses
    }

    /// revEng list files to reload when they change.
    #[must_use]
    pub fn watched_files(&self) -> &[PathBuf] {
        &self.watched_files
    }

    /// The youngest list file read.
    #[must_use]
    pub const fn list_file_date(&self) -> Option<&ListFileDate> {
        self.list_file_date.as_ref()
    }

    /// All warnings, one per line.
    #[must_use]
    pub fn warnings(&self) -> String {
        self.warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All warnings as values.
    #[must_use]
    pub fn parse_warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Number of labels.
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.number_for_label.len()
    }

    /// Number of addresses associated with a source line.
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.file_line_nrs.len()
    }
}

/// Files matching `pattern`, sorted.
fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, LabelsError> {
    let invalid = |message: String| LabelsError::Glob {
        pattern: pattern.to_string(),
        message,
    };
    let mut paths = glob::glob(pattern)
        .map_err(|e| invalid(e.to_string()))?
        .map(|entry| entry.map_err(|e| invalid(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|path| path.is_file());
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{calculate_label_distances, LabelHierarchy, Labels};
    use crate::parser::ParseResult;
    use crate::session::RegisterProvider;

    fn labels(pairs: &[(&str, i64)]) -> IndexMap<String, i64> {
        pairs.iter().map(|(l, v)| ((*l).to_string(), *v)).collect()
    }

    #[test]
    fn distances_only_count_upwards() {
        let d = calculate_label_distances(&labels(&[
            ("a", 0x8000),
            ("b", 0x8003),
            ("c", 0x7000),
            ("d", 0x8004),
        ]));
        assert_eq!(d.len(), 2);
        assert_eq!(d[&0x8000].distance, 3);
        assert_eq!(d[&0x8000].next_label, "b");
        assert_eq!(d[&0x7000].distance, 0x1004);
    }

    #[test]
    fn distances_use_the_64k_part() {
        let d = calculate_label_distances(&labels(&[
            ("a", 0x01_8000),
            ("b", 0x02_8001),
            ("c", 0x03_7000),
            ("d", 0x02_8004),
        ]));
        assert_eq!(d.len(), 2);
        assert_eq!(d[&0x01_8000].distance, 1);
        assert_eq!(d[&0x03_7000].distance, 0x1004);
    }

    #[test]
    fn hierarchy_splits_at_dots() {
        let mut h = LabelHierarchy::default();
        for label in ["invader.x", "invader.hitbox.y", "invader.hitbox.w", ".local.a", "main"] {
            h.insert(label);
        }
        assert_eq!(h.children(""), ["invader", ".local", "main"]);
        assert_eq!(h.children("invader"), ["x", "hitbox"]);
        assert_eq!(h.children("invader.hitbox"), ["y", "w"]);
        assert_eq!(h.children(".local"), ["a"]);
        assert!(h.children("missing").is_empty());
    }

    struct Registers;

    impl RegisterProvider for Registers {
        fn registers_equal_to(&self, value: u16) -> Vec<String> {
            if value == 0x8000 {
                vec!["HL".to_string()]
            } else {
                Vec::new()
            }
        }
    }

    fn facade() -> Labels {
        let mut result = ParseResult::default();
        for (label, value) in [("start", 0x1_8000u32), ("loop", 0x1_8010), ("SMALL", 0x20)] {
            result.number_for_label.insert(label.to_string(), i64::from(value));
            let addr = u16::try_from(value & 0xFFFF).unwrap();
            result
                .labels_for_number
                .entry(addr)
                .or_default()
                .push(label.to_string());
            if value > 0xFFFF {
                result
                    .labels_for_long_address
                    .entry(value)
                    .or_default()
                    .push(label.to_string());
            }
        }
        let mut labels = Labels::default();
        labels.merge(result);
        labels.finish();
        labels
    }

    #[test]
    fn number_lookups() {
        let labels = facade();
        assert_eq!(labels.labels_for_number_64k(0x1_8000, None), ["start"]);
        assert_eq!(labels.labels_for_number_64k(0x8000, Some(&Registers)), ["HL", "start"]);
        assert!(labels.labels_for_number_64k(0x20, None).is_empty());
        assert_eq!(labels.labels_plus_index_for_number_64k(0x8005, None), ["start+5"]);
        assert!(labels.labels_plus_index_for_number_64k(0x1_8005, None).is_empty());
        assert!(labels.labels_plus_index_for_number_64k(0xFF, None).is_empty());
        assert_eq!(labels.labels_for_long_or_64k_address(0x1_8010), ["loop"]);
        assert_eq!(labels.labels_for_long_or_64k_address(0x8010), ["loop"]);
        assert!(labels.labels_for_long_or_64k_address(0x2_8010).is_empty());
        assert_eq!(labels.distance_to_next_label(0x1_8000), Some(0x10));
    }

    #[test]
    fn numbers_from_strings() {
        let labels = facade();
        assert_eq!(labels.number_from_string_64k("loop"), Some(0x8010));
        assert_eq!(labels.number_from_string_64k("0x1234"), Some(0x1234));
        assert_eq!(labels.number_from_string_64k("$12345"), Some(0x2345));
        assert_eq!(labels.number_from_string_64k("_missing"), None);
        assert_eq!(labels.number_from_string_64k("nothing"), None);
    }

    #[test]
    fn regex_lookup() {
        let labels = facade();
        assert_eq!(labels.labels_for_regex("^s", true).unwrap(), ["start", "SMALL"]);
        assert_eq!(labels.labels_for_regex("^s", false).unwrap(), ["start"]);
        assert!(labels.labels_for_regex("(", false).is_err());
    }
}
