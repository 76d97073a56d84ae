use std::collections::HashMap;
use std::path::Path;

use memory_model::MemoryModel;
use regex::Regex;

use super::z88dk::read_map_file;
use super::{LabelKind, LineParser, ParseResult, ParserCore};
use crate::config::ListFileConfig;
use crate::error::LabelsError;

/// Stack pointer symbol of the z88dk C runtime.
const REGISTER_SP: &str = "__register_sp";

/// Parses a z88dk list file in the v2.2 format.
///
/// ```text
/// main.asm:
///     15                          label1:
///     16  0000  00                	nop
///     18  0001  3e05              label2:	ld a,5
/// ```
///
/// Addresses are relative to the last label found in the map file, which
/// is therefore required.
///
/// # Errors
///
/// Fails without a map file or if a file cannot be read.
pub fn parse(config: &ListFileConfig, model: &MemoryModel) -> Result<ParseResult, LabelsError> {
    let map_file = config
        .map_file
        .as_deref()
        .ok_or_else(|| LabelsError::MissingMapFile("z88dkv2".to_string()))?;
    let mappings = read_map_file(Path::new(map_file))?;
    let register_sp = mappings.get(REGISTER_SP).copied();

    let core = ParserCore::new(config, model)?;
    let mut result = core.run(&mut Z88dkV2Parser::new(mappings)?)?;

    if let Some(sp) = register_sp {
        let long_addr = if config.disable_banking {
            u32::from(sp)
        } else {
            model.initial_long_address(sp)
        };
        result
            .number_for_label
            .insert(REGISTER_SP.to_string(), i64::from(long_addr));
        result
            .labels_for_number
            .entry(sp)
            .or_default()
            .push(REGISTER_SP.to_string());
        if long_addr > 0xFFFF {
            result
                .labels_for_long_address
                .entry(long_addr)
                .or_default()
                .push(REGISTER_SP.to_string());
        }
    }
    Ok(result)
}

struct Z88dkV2Parser {
    mappings: HashMap<String, u16>,
    map_offset: Option<i64>,
    last_label_address: u16,
    last_addr: u16,
    c_line: i64,
    line_number: Regex,
    comment: Regex,
    file_name: Regex,
    address: Regex,
    label: Regex,
    equ: Regex,
    source_line: Regex,
    c_file: Regex,
    c_reference: Regex,
}

impl Z88dkV2Parser {
    fn new(mappings: HashMap<String, u16>) -> Result<Self, LabelsError> {
        Ok(Self {
            mappings,
            map_offset: Some(0),
            last_label_address: 0,
            last_addr: 0,
            c_line: 0,
            line_number: Regex::new(r"^\s*\d+\s+")?,
            comment: Regex::new(r";.*")?,
            file_name: Regex::new(r"^(\S.*):")?,
            address: Regex::new(r"(?i)^([0-9a-f]{4,6})\s+((?:[0-9a-f]{2})+)\s")?,
            label: Regex::new(r"(?i)^(?:[0-9a-f]{4,6}\s+(?:[0-9a-f]{2})+)?\s*([a-z_]\w*):")?,
            equ: Regex::new(
                r"(?i)^(?:[0-9a-f]{4,6}\s+(?:[0-9a-f]{2})+)?\s*([a-z_]\w*):\s*equ\s+(.*)",
            )?,
            source_line: Regex::new(r"^(\s*\d+\s*)")?,
            c_file: Regex::new(r"(.*\.[cC])$")?,
            c_reference: Regex::new(r"^\s*\d+\s+;(.*?):(\d+):")?,
        })
    }

    /// Name of the current include if it is a C file.
    fn current_c_file(&self, core: &ParserCore<'_>) -> Option<String> {
        let frame = core.include_stack.last()?;
        self.c_file
            .captures(&frame.raw_name)
            .map(|caps| caps[1].to_string())
    }
}

impl LineParser for Z88dkV2Parser {
    fn parse_label_and_address(
        &mut self,
        core: &mut ParserCore<'_>,
        line: &str,
    ) -> Result<(), LabelsError> {
        // File names start in column 0, numbered lines with a space.
        if !line.starts_with(' ') {
            return Ok(());
        }
        let line = self.line_number.replace(line, "");
        let line = self.comment.replace(&line, "");

        if let Some(caps) = self.equ.captures(&line) {
            core.add_equ(&caps[1], LabelKind::Global, &caps[2], None);
        } else if let Some(caps) = self.label.captures(&line) {
            if let Some(&real) = self.mappings.get(&caps[1]) {
                self.last_label_address = real;
                self.last_addr = real;
                self.map_offset = None;
                let long_addr = core.create_long_address(real);
                core.add_label(long_addr, &caps[1], LabelKind::Global);
            }
        }

        let mut size: u16 = 0;
        if let Some(caps) = self.address.captures(&line) {
            let addr = i64::from_str_radix(&caps[1], 16).unwrap_or_default();
            let offset = *self
                .map_offset
                .get_or_insert(i64::from(self.last_label_address) - addr);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let real = ((addr + offset) & 0xFFFF) as u16;
            self.last_addr = real;
            size = u16::try_from(caps[2].len() / 2).unwrap_or(u16::MAX);
        }

        let long_addr = core.create_long_address(self.last_addr);
        core.add_address_line(long_addr, size);
        self.last_addr = self.last_addr.wrapping_add(size);
        Ok(())
    }

    fn parse_file_and_line_number(&mut self, core: &mut ParserCore<'_>, line: &str) {
        if let Some(caps) = self.file_name.captures(line) {
            core.reset_includes();
            core.include_start(&caps[1]);
            self.c_line = 0;
            return;
        }

        if let Some(c_file) = self.current_c_file(core) {
            if let Some(caps) = self.c_reference.captures(line) {
                if caps[1].replace('\\', "/") == c_file {
                    self.c_line = caps[2].parse().unwrap_or(self.c_line);
                }
            }
            core.set_line_number(self.c_line - 1);
        } else if let Some(caps) = self.source_line.captures(line) {
            if let Ok(line_number) = caps[1].trim().parse::<i64>() {
                core.set_line_number(line_number - 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use memory_model::{MemoryModel, PredefinedModel};

    use crate::config::ListFileConfig;
    use crate::error::LabelsError;

    const LIST: &str = "\
main.asm:
     1
     3                          label_equ1:\t\tequ 100
    13                          \tORG 0x8000
    15                          label1:
    16  0000  00                \tnop
    18  0001  3e05              label2:\tld a,5
    20  0003  0608              _locala:\tld b,8
    23  0005  00                \tnop\t\t; ASSERTION
    48                          data:
    49  000d  0102030405060708  \tdefb 1, 2, 3, 4, 5, 6, 7, 8\t\t; WPMEM
    54                          \tinclude \"filea.asm\"
filea.asm:
     1
     2  001f  00                fa_label1:\tnop
main.asm:
    55
";

    const MAP: &str = "\
label1                          = $8000 ; addr, public, , main, , main.asm:15
label2                          = $8001 ; addr, public, , main, , main.asm:18
data                            = $800D ; addr, public, , main, , main.asm:48
fa_label1                       = $801F ; addr, public, , main, , filea.asm:2
__register_sp                   = $FF00 ; const, public, , , , crt0.asm:7
";

    #[test]
    fn labels_only_match_in_the_label_column() {
        let parser = super::Z88dkV2Parser::new(HashMap::new()).unwrap();
        let label = |line: &str| parser.label.captures(line).map(|caps| caps[1].to_string());
        assert_eq!(label("0001  3e05              label2:\tld a,5").as_deref(), Some("label2"));
        assert_eq!(label("                        label1:").as_deref(), Some("label1"));
        assert_eq!(label("0003  c30000            \tjp\tlabel2:"), None);
        assert_eq!(label("0006  6e616d653a        \tdefm \"name:\""), None);
        assert_eq!(label("                        \tld a,(ix+_x):"), None);
    }

    fn parse(sources: bool) -> super::ParseResult {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("main.lis");
        let map = dir.path().join("main.map");
        fs::write(&list, LIST).unwrap();
        fs::write(&map, MAP).unwrap();
        let mut config =
            ListFileConfig::new(list.to_string_lossy()).with_map_file(map.to_string_lossy());
        if sources {
            config = config.with_src_dirs([""]);
        }
        let model = MemoryModel::predefined(PredefinedModel::AllRam).unwrap();
        super::parse(&config, &model).unwrap()
    }

    #[test]
    fn labels_get_real_addresses() {
        let result = parse(false);
        let n = &result.number_for_label;
        assert_eq!(n["label_equ1"], 100);
        assert_eq!(n["label1"], 0x1_8000);
        assert_eq!(n["label2"], 0x1_8001);
        assert!(!n.contains_key("_locala"));
        assert_eq!(n["data"], 0x1_800D);
        assert_eq!(n["fa_label1"], 0x1_801F);
        assert_eq!(n["__register_sp"], 0x1_FF00);
        assert_eq!(result.directives.assertions[0].address, Some(0x1_8005));
        assert_eq!(result.directives.watch_points[0].address, Some(0x1_800D));
    }

    #[test]
    fn sources_mode_uses_file_headers() {
        let result = parse(true);
        let entry = &result.file_line_nrs[&0x1_8003];
        assert_eq!((entry.file_name.as_str(), entry.line_nr), ("main.asm", 19));
        let entry = &result.file_line_nrs[&0x1_801F];
        assert_eq!((entry.file_name.as_str(), entry.line_nr), ("filea.asm", 1));
        assert_eq!(result.label_locations["data"].line_nr, 47);
    }

    #[test]
    fn map_file_is_required() {
        let config = ListFileConfig::new("main.lis");
        let model = MemoryModel::predefined(PredefinedModel::AllRam).unwrap();
        assert!(matches!(
            super::parse(&config, &model),
            Err(LabelsError::MissingMapFile(_))
        ));
    }
}
