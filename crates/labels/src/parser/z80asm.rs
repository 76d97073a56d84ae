use std::collections::HashMap;

use memory_model::MemoryModel;
use regex::Regex;

use super::{count_hex_bytes, leading_hex, LabelKind, LineParser, ParseResult, ParserCore};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Parses a z80asm list file.
///
/// z80asm shows the contents of `IF 0` blocks like any other code, so labels
/// defined there are reported as well.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let core = ParserCore::new(config, model)?;
    core.run(&mut Z80asmParser::new()?)
}

struct Z80asmParser {
    label: Regex,
    bytes: Regex,
    include: Regex,
}

/// File the reverse scan is currently in.
struct Frame {
    raw_name: String,
    file_name: String,
    line_nr: i64,
}

impl Z80asmParser {
    fn new() -> Result<Self, LabelsError> {
        Ok(Self {
            label: Regex::new(
                r"(?i)^[0-9a-f]+[\s0-9a-f]*\s+>?(@?)([^;\s0-9][^;\s]*):\s*(equ\s|macro\s)?\s*([^;\n]*)",
            )?,
            bytes: Regex::new(r"(?i)^[0-9a-f]+((\s+[0-9a-f][0-9a-f])+)")?,
            include: Regex::new(r#"(?i)^[0-9a-f]+\s+include\s+"([^\s]*)""#)?,
        })
    }

    /// Line of the macro invocation that `end_line` closes.
    fn macro_start(core: &ParserCore<'_>, name: &str, end_line: usize) -> Result<usize, LabelsError> {
        let start = Regex::new(&format!(r"[0-9a-fA-F]+\s+{}(\s|$)", regex::escape(name)))?;
        Ok((1..=end_line)
            .rev()
            .find(|&index| start.is_match(&core.lines[index].line))
            .unwrap_or(end_line))
    }
}

impl LineParser for Z80asmParser {
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError> {
        let Some(addr) = leading_hex(line, 4).map(|addr| core.offset_address(addr)) else {
            return Ok(());
        };

        if let Some(caps) = self.label.captures(line) {
            let label = &caps[2];
            match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(directive) if directive.starts_with("equ") => {
                    core.last_label = Some(label.to_string());
                    core.add_equ(label, LabelKind::Global, &caps[4], Some(addr));
                }
                Some(_) => core.last_label = Some(label.to_string()),
                None => {
                    let long_addr = core.create_long_address(addr);
                    core.add_label(long_addr, label, LabelKind::Global);
                }
            }
        }

        let size = self
            .bytes
            .captures(line)
            .map_or(1, |caps| count_hex_bytes(&caps[1]));
        let long_addr = core.create_long_address(addr);
        core.add_address_line(long_addr, size);
        Ok(())
    }

    /// z80asm marks only the ends of includes and macros, so the lines are
    /// walked back to front and numbered downwards from each end marker.
    fn associate_sources(&mut self, core: &mut ParserCore<'_>) -> Result<(), LabelsError> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut index = core.lines.len().saturating_sub(1);
        while index > 0 {
            let text = core.lines[index].line.clone();

            if let Some(name) = text.strip_prefix("# End of macro") {
                let start = Self::macro_start(core, name.trim(), index)?;
                if let Some(frame) = stack.last_mut() {
                    for line in &mut core.lines[start..index] {
                        line.file_name.clone_from(&frame.file_name);
                        line.line_nr = frame.line_nr;
                    }
                    frame.line_nr -= 1;
                }
                index = start.saturating_sub(1);
                continue;
            }

            if let Some(name) = text.strip_prefix("# End of file") {
                let raw_name = name.trim().to_string();
                let file_name = core.resolve_source(&raw_name);
                stack.push(Frame {
                    raw_name,
                    file_name,
                    line_nr: 0,
                });
            }

            if let Some(caps) = self.include.captures(&text) {
                if stack.last().is_some_and(|frame| frame.raw_name == caps[1]) {
                    stack.pop();
                }
            }

            let line = &mut core.lines[index];
            match stack.last_mut() {
                Some(frame) => {
                    line.file_name.clone_from(&frame.file_name);
                    line.line_nr = frame.line_nr;
                    frame.line_nr -= 1;
                }
                None => {
                    line.file_name.clear();
                    line.line_nr = 0;
                }
            }
            index -= 1;
        }

        // Line numbers so far count down from each file's end; the first
        // line seen of a file defines its length.
        let mut lengths: HashMap<String, i64> = HashMap::new();
        for line in &mut core.lines {
            if line.file_name.is_empty() {
                continue;
            }
            let length = *lengths
                .entry(line.file_name.clone())
                .or_insert(-line.line_nr);
            line.line_nr += length;
        }
        Ok(())
    }
}
