use memory_model::{long_address_with_bank, MemoryModel, PredefinedModel};
use regex::Regex;

use super::{LabelKind, LineParser, ParseResult, ParserCore};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Parses a reverse engineering list.
///
/// ```text
/// C000.R1 3E 05  start:  LD A,5    ; load A with 5
/// C002.R1 CF             RST 8     ; SKIP
/// MY_CONSTANT:   EQU 50
/// ```
///
/// Every line is empty, a comment, an `EQU` or starts with an address,
/// optionally followed by `.` and the bank's short name. The file is always
/// associated in list-file mode.
///
/// # Errors
///
/// Fails if the file cannot be read or names a bank the target model does
/// not have.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let core = ParserCore::new(config, model)?;
    core.run(&mut RevEngParser::new()?)
}

struct RevEngParser {
    equ: Regex,
    address: Regex,
    byte: Regex,
    label: Regex,
    disassembler_hint: Regex,
}

impl RevEngParser {
    fn new() -> Result<Self, LabelsError> {
        Ok(Self {
            equ: Regex::new(r"(?i)^\s*([a-z_][\w\.]*):\s*EQU\s+([^;]+)")?,
            address: Regex::new(r"(?i)^(([\da-f]+)(\.(\w+))?\s*)")?,
            byte: Regex::new(r"(?i)^([\da-f][\da-f]\s)")?,
            label: Regex::new(r"(?i)^\s*((\.?)[a-z_][\w\.]*):")?,
            disassembler_hint: Regex::new(r"\b(SKIPWORD|SKIP|CODE)\b")?,
        })
    }

    /// Long address of `addr` written with the optional bank `bank`.
    fn long_address(
        core: &ParserCore<'_>,
        addr: u16,
        bank: Option<&str>,
    ) -> Result<u32, LabelsError> {
        if core.config.disable_banking {
            return Ok(u32::from(addr));
        }
        let model = core.model;
        let bank = match (model.kind(), bank) {
            (PredefinedModel::AllRam, _) => 0,
            (PredefinedModel::Zx48k, _) => usize::from(addr >= 0x4000),
            (_, None) => return Ok(core.create_long_address(addr)),
            (PredefinedModel::Unknown, Some(bank)) => {
                bank.parse().map_err(|_| LabelsError::BankNotAvailable {
                    bank: bank.to_string(),
                    model: model.name().to_string(),
                })?
            }
            (_, Some(bank)) => {
                if model.short_name_to_bank(bank).is_err() {
                    return Err(LabelsError::BankNotAvailable {
                        bank: bank.to_string(),
                        model: model.name().to_string(),
                    });
                }
                model.parse_bank(addr, Some(bank))?
            }
        };
        Ok(long_address_with_bank(addr, bank))
    }

    /// Adds a label unless the name is taken.
    fn add_unique(core: &mut ParserCore<'_>, value: u32, label: &str, kind: LabelKind) {
        let full = core.full_label_name(label, kind);
        if core.result.number_for_label.contains_key(&full) {
            core.warn(format!("Label '{full}' defined more than once."));
            return;
        }
        core.add_label(value, label, kind);
    }

    /// `SKIP`, `SKIPWORD` and `CODE` in the comment of an address line.
    fn disassembler_hints(&self, core: &mut ParserCore<'_>, line: &str, long_addr: u32, size: u16) {
        let Some((_, comment)) = line.split_once(';') else {
            return;
        };
        let Some(caps) = self.disassembler_hint.captures(comment) else {
            return;
        };
        match &caps[1] {
            "SKIP" => {
                core.result.skip_addresses.insert(long_addr + u32::from(size), 1);
            }
            "SKIPWORD" => {
                core.result.skip_addresses.insert(long_addr + u32::from(size), 2);
            }
            _ => core.result.code_addresses.push(long_addr),
        }
    }
}

impl LineParser for RevEngParser {
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError> {
        let work = format!("{line} ");

        if let Some(caps) = self.equ.captures(&work) {
            let label = &caps[1];
            if core.result.number_for_label.contains_key(label) {
                core.warn(format!("Label '{label}' defined more than once."));
            } else {
                core.add_equ(label, LabelKind::Global, &caps[2], None);
            }
            return Ok(());
        }

        let Some(caps) = self.address.captures(&work) else {
            let trimmed = work.trim();
            if !trimmed.is_empty() && !trimmed.starts_with(';') {
                core.warn(format!("Line ignored: '{line}'"));
            }
            return Ok(());
        };
        let Ok(value) = u32::from_str_radix(&caps[2], 16) else {
            core.warn(format!("Line ignored: '{line}'"));
            return Ok(());
        };
        #[allow(clippy::cast_possible_truncation)]
        let addr = (value & 0xFFFF) as u16;
        let long_addr = Self::long_address(core, addr, caps.get(4).map(|m| m.as_str()))?;
        let mut rest = &work[caps[1].len()..];

        let mut size: u16 = 0;
        while let Some(byte) = self.byte.find(rest) {
            rest = &rest[byte.end()..];
            size = size.saturating_add(1);
        }

        if let Some(caps) = self.label.captures(rest) {
            let label = &caps[1];
            let kind = if label.starts_with('.') {
                LabelKind::Local
            } else {
                LabelKind::Global
            };
            Self::add_unique(core, long_addr, label, kind);
        }

        core.add_address_line(long_addr, size);
        self.disassembler_hints(core, line, long_addr, size);
        Ok(())
    }

    fn associate_sources(&mut self, core: &mut ParserCore<'_>) -> Result<(), LabelsError> {
        core.list_file_mode_lines();
        Ok(())
    }
}
