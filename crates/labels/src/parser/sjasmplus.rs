use memory_model::MemoryModel;
use regex::Regex;

use super::{count_hex_bytes, leading_hex, LabelKind, LineParser, ParseResult, ParserCore};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Parses a classic sjasmplus list file (`--lst`).
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let core = ParserCore::new(config, model)?;
    core.run(&mut SjasmplusParser::new()?)
}

struct SjasmplusParser {
    line_number: Regex,
    label: Regex,
    invalid_line: Regex,
    module_start: Regex,
    module_end: Regex,
    bytes: Regex,
    source_line_number: Regex,
    /// Inside the trailing `Value  Label` table.
    label_table: bool,
}

impl SjasmplusParser {
    fn new() -> Result<Self, LabelsError> {
        Ok(Self {
            line_number: Regex::new(r"^ *[0-9]+[\s+]+")?,
            label: Regex::new(
                r"(?i)^.{18}(@?)([^;:\s0-9][^:;\s]*):?\s*(equ\s|macro\s)?\s*([^;\n]*)",
            )?,
            invalid_line: Regex::new(r"(?i)^[0-9a-f]+\s+~")?,
            module_start: Regex::new(r"(?i)^[0-9a-f]+\s+module\s+(\S+)")?,
            module_end: Regex::new(r"(?i)^[0-9a-f]+\s+endmodule\b")?,
            bytes: Regex::new(r"(?i)^[0-9a-f]+((\s+[0-9a-f][0-9a-f])+)")?,
            source_line_number: Regex::new(r"^\s*([0-9]+)[\s+]+")?,
            label_table: false,
        })
    }

    /// A line of the trailing label table: `0xHHHH X full.label.name`.
    fn parse_label_table_line(core: &mut ParserCore<'_>, line: &str) {
        let (Some(value), Some(label)) = (line.get(2..6), line.get(9..)) else {
            return;
        };
        let (Ok(value), label) = (u16::from_str_radix(value, 16), label.trim()) else {
            return;
        };
        if !label.is_empty() && !core.result.number_for_label.contains_key(label) {
            let long_addr = core.create_long_address(value);
            core.add_label_raw(long_addr, label);
        }
    }
}

impl LineParser for SjasmplusParser {
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError> {
        if self.label_table {
            if line.starts_with("0x") {
                Self::parse_label_table_line(core, line);
            }
            return Ok(());
        }
        if line.starts_with("Value") {
            self.label_table = true;
            return Ok(());
        }

        let line = self.line_number.replace(line, "");
        if self.invalid_line.is_match(&line) {
            return Ok(());
        }
        let Some(addr) = leading_hex(&line, 4) else {
            return Ok(());
        };

        if let Some(caps) = self.module_start.captures(&line) {
            core.module_start(&caps[1]);
        } else if self.module_end.is_match(&line) {
            core.module_end();
        }

        if let Some(caps) = self.label.captures(&line) {
            let label = &caps[2];
            let kind = if !caps[1].is_empty() {
                LabelKind::Global
            } else if label.starts_with('.') {
                LabelKind::Local
            } else {
                LabelKind::Normal
            };
            match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(directive) if directive.starts_with("equ") => {
                    core.add_equ(label, kind, &caps[4], Some(addr));
                }
                Some(_) => {}
                None => {
                    let long_addr = core.create_long_address(addr);
                    core.add_label(long_addr, label, kind);
                }
            }
        }

        let size = self
            .bytes
            .captures(&line)
            .map_or(0, |caps| count_hex_bytes(&caps[1]));
        let long_addr = core.create_long_address(addr);
        core.add_address_line(long_addr, size);
        Ok(())
    }

    fn parse_file_and_line_number(&mut self, core: &mut ParserCore<'_>, line: &str) {
        if let Some(name) = line.strip_prefix("# file opened:") {
            core.include_start(name.trim());
            return;
        }
        if line.starts_with("# file closed:") {
            core.include_end();
            return;
        }
        if let Some(caps) = self.source_line_number.captures(line) {
            if let Ok(line_nr) = caps[1].parse::<i64>() {
                core.set_line_number(line_nr - 1);
            }
        }
    }
}
