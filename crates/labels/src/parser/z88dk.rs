use std::collections::HashMap;
use std::path::Path;

use log::debug;
use memory_model::MemoryModel;
use regex::Regex;

use super::{
    count_hex_bytes, leading_hex, read_text, LabelKind, LineParser, ParseResult, ParserCore,
};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Parses a z88dk list file in the format used before v2.2.
///
/// The list addresses are relative. Labels found in the optional map file
/// re-anchor all following addresses to their real value.
///
/// # Errors
///
/// Fails if the list or map file cannot be read.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let mappings = match &config.map_file {
        Some(path) => read_map_file(Path::new(path))?,
        None => HashMap::new(),
    };
    let core = ParserCore::new(config, model)?;
    core.run(&mut Z88dkParser::new(mappings)?)
}

/// Reads the `label = $ADDR ; ...` lines of a z88dk map file.
///
/// # Errors
///
/// Fails if the file cannot be read.
pub fn read_map_file(path: &Path) -> Result<HashMap<String, u16>, LabelsError> {
    let entry = Regex::new(r"(?i)^(\w*)\b\s*=\s*\$([0-9a-f]+)")?;
    let mappings: HashMap<String, u16> = read_text(path)?
        .lines()
        .filter_map(|line| {
            let caps = entry.captures(line)?;
            let value = u32::from_str_radix(&caps[2], 16).ok()?;
            u16::try_from(value & 0xFFFF)
                .ok()
                .map(|value| (caps[1].to_string(), value))
        })
        .collect();
    debug!("{} symbols in map file '{}'", mappings.len(), path.display());
    Ok(mappings)
}

struct Z88dkParser {
    mappings: HashMap<String, u16>,
    /// Real address minus list address of the last mapped label.
    map_offset: i64,
    line_number: Regex,
    label: Regex,
    bytes: Regex,
    source_line: Regex,
    include: Regex,
}

impl Z88dkParser {
    fn new(mappings: HashMap<String, u16>) -> Result<Self, LabelsError> {
        Ok(Self {
            mappings,
            map_offset: 0,
            line_number: Regex::new(r"^[0-9]+[\s+]+")?,
            label: Regex::new(
                r"(?i)^[0-9a-f]+[\s0-9a-f]*\s+>?(@?)([^;\s0-9][^;\s]*):\s*(equ\s|macro\s)?\s*([^;\n]*)",
            )?,
            bytes: Regex::new(r"(?i)^[0-9a-f]+((\s+[0-9a-f][0-9a-f])+)")?,
            source_line: Regex::new(r"^\s*([0-9]+)[\s+]+(.*)")?,
            include: Regex::new(r#"(?i)^[0-9a-f]+\s+include\s+"([^\s]*)""#)?,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    const fn wrap(value: i64) -> u16 {
        (value & 0xFFFF) as u16
    }
}

impl LineParser for Z88dkParser {
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError> {
        let line = self.line_number.replace(line, "");
        let Some(read) = leading_hex(&line, 4) else {
            return Ok(());
        };
        let mut addr = Self::wrap(i64::from(core.offset_address(read)) + self.map_offset);

        if let Some(caps) = self.label.captures(&line) {
            let label = &caps[2];
            match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(directive) if directive.starts_with("equ") => {
                    core.add_equ(label, LabelKind::Global, &caps[4], Some(addr));
                }
                Some(_) => {}
                None => {
                    if let Some(&real) = self.mappings.get(label) {
                        self.map_offset = i64::from(real) - i64::from(read);
                        addr = real;
                    }
                    let long_addr = core.create_long_address(addr);
                    core.add_label(long_addr, label, LabelKind::Global);
                }
            }
        }

        let size = self
            .bytes
            .captures(&line)
            .map_or(1, |caps| count_hex_bytes(&caps[1]));
        let long_addr = core.create_long_address(addr);
        core.add_address_line(long_addr, size);
        Ok(())
    }

    /// Includes start at an `include` line and end where the line numbers
    /// stop counting up.
    fn associate_sources(&mut self, core: &mut ParserCore<'_>) -> Result<(), LabelsError> {
        core.reset_includes();
        let main_file = core.config.main_file.clone();
        let main = main_file.clone().unwrap_or_else(|| core.config.path.clone());
        core.include_start(&main);

        let mut expected: Option<i64> = None;
        for index in 0..core.lines.len() {
            core.current = index;
            let text = core.lines[index].line.clone();
            let Some(caps) = self.source_line.captures(&text) else {
                continue;
            };
            let Ok(line_number) = caps[1].parse::<i64>() else {
                continue;
            };

            if expected.is_some_and(|e| line_number != e && line_number != e + 1)
                && core.include_stack.len() > 1
            {
                core.include_end();
            }

            if let Some(include) = self.include.captures(&caps[2]) {
                core.include_start(&include[1]);
                expected = None;
            } else {
                expected = Some(line_number);
            }

            let line_nr = if core.include_stack.len() == 1 && main_file.is_none() {
                i64::try_from(index).unwrap_or(i64::MAX)
            } else {
                line_number - 1
            };
            core.set_line_number(line_nr);
        }
        Ok(())
    }
}
