//! Label settings as read from the debugger's JSON launch configuration.

use std::fs;
use std::path::Path;

use memory_model::{ConfigurationError, CustomMemory, MemoryModel};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LabelsError;

/// Values at or below this are never shown as labels.
pub const DEFAULT_SMALL_VALUES_MAXIMUM: u16 = 255;

/// Settings of one list file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFileConfig {
    /// Path of the list file. May be a glob pattern.
    pub path: String,
    /// Source directories. Empty selects list-file mode.
    pub src_dirs: Vec<String>,
    /// Glob patterns of source files that are not associated with addresses.
    pub exclude_files: Vec<String>,
    /// Main assembler file (z88dk).
    pub main_file: Option<String>,
    /// Map file with absolute label addresses (z88dk).
    #[serde(alias = "z88dkMapFile")]
    pub map_file: Option<String>,
    /// Line filter of the form `/search/replace/`.
    pub filter: Option<String>,
    /// Use plain 64K addresses even for banked targets.
    pub disable_banking: bool,
    /// Reload when the file changes (revEng).
    pub reload_on_save: bool,
    /// Offset added to every list address (z88dk v1).
    pub add_offset: i32,
}

impl ListFileConfig {
    /// Creates a config for `path` in list-file mode.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Switches to sources mode with the given source directories.
    #[must_use]
    pub fn with_src_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.src_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the map file.
    #[must_use]
    pub fn with_map_file(mut self, map_file: impl Into<String>) -> Self {
        self.map_file = Some(map_file.into());
        self
    }

    /// Sets the main file.
    #[must_use]
    pub fn with_main_file(mut self, main_file: impl Into<String>) -> Self {
        self.main_file = Some(main_file.into());
        self
    }

    /// `true` when source files are associated instead of the list file itself.
    #[must_use]
    pub fn sources_mode(&self) -> bool {
        !self.src_dirs.is_empty()
    }

    /// Makes relative paths absolute with respect to `root`.
    #[must_use]
    pub fn resolved(&self, root: &Path) -> Self {
        let join = |p: &str| root.join(p).to_string_lossy().into_owned();
        Self {
            path: join(&self.path),
            src_dirs: self.src_dirs.iter().map(|d| join(d)).collect(),
            map_file: self.map_file.as_deref().map(join),
            ..self.clone()
        }
    }
}

/// The assembler dialect of one list file, with its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// sjasmplus SLD file or classic list file.
    Sjasmplus(ListFileConfig),
    /// z80asm list file.
    Z80asm(ListFileConfig),
    /// z88dk list file, format before v2.2.
    Z88dk(ListFileConfig),
    /// z88dk list file, format v2.2 and later.
    Z88dkV2(ListFileConfig),
    /// Hand-written reverse engineering list.
    RevEng(ListFileConfig),
}

impl Dialect {
    /// Settings of the list file.
    #[must_use]
    pub const fn config(&self) -> &ListFileConfig {
        match self {
            Self::Sjasmplus(c)
            | Self::Z80asm(c)
            | Self::Z88dk(c)
            | Self::Z88dkV2(c)
            | Self::RevEng(c) => c,
        }
    }

    /// Configuration key the dialect is read from.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Sjasmplus(_) => "sjasmplus",
            Self::Z80asm(_) => "z80asm",
            Self::Z88dk(_) => "z88dk",
            Self::Z88dkV2(_) => "z88dkv2",
            Self::RevEng(_) => "revEng",
        }
    }

    /// Same dialect with another list file path.
    #[must_use]
    pub fn with_path(&self, path: &str) -> Self {
        let config = ListFileConfig {
            path: path.to_string(),
            ..self.config().clone()
        };
        match self {
            Self::Sjasmplus(_) => Self::Sjasmplus(config),
            Self::Z80asm(_) => Self::Z80asm(config),
            Self::Z88dk(_) => Self::Z88dk(config),
            Self::Z88dkV2(_) => Self::Z88dkV2(config),
            Self::RevEng(_) => Self::RevEng(config),
        }
    }
}

/// Label settings of a debug session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelsConfig {
    /// Values up to this are not resolved to labels.
    pub small_values_maximum: u16,
    /// Name of the target memory model, `UNKNOWN` if absent.
    pub memory_model: Option<String>,
    /// Slot and bank layout for the `CUSTOM` model.
    pub custom_memory: Option<CustomMemory>,
    /// sjasmplus list or SLD files.
    pub sjasmplus: Vec<ListFileConfig>,
    /// z80asm list files.
    pub z80asm: Vec<ListFileConfig>,
    /// z88dk list files (old format).
    pub z88dk: Vec<ListFileConfig>,
    /// z88dk list files (v2.2 format).
    pub z88dkv2: Vec<ListFileConfig>,
    /// Reverse engineering list files.
    pub rev_eng: Vec<ListFileConfig>,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            small_values_maximum: DEFAULT_SMALL_VALUES_MAXIMUM,
            memory_model: None,
            custom_memory: None,
            sjasmplus: Vec::new(),
            z80asm: Vec::new(),
            z88dk: Vec::new(),
            z88dkv2: Vec::new(),
            rev_eng: Vec::new(),
        }
    }
}

impl LabelsConfig {
    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LabelsError::Config`] for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, LabelsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a JSON configuration file. Relative list-file paths are taken
    /// relative to the directory of `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> Result<Self, LabelsError> {
        let text = fs::read_to_string(path).map_err(|e| LabelsError::io(path, e))?;
        let mut config = Self::from_json(&text)?;
        let root = path.parent().unwrap_or_else(|| Path::new(""));
        for list in config.lists_mut() {
            *list = list.resolved(root);
        }
        Ok(config)
    }

    fn lists_mut(&mut self) -> impl Iterator<Item = &mut ListFileConfig> {
        self.sjasmplus
            .iter_mut()
            .chain(self.z80asm.iter_mut())
            .chain(self.z88dk.iter_mut())
            .chain(self.z88dkv2.iter_mut())
            .chain(self.rev_eng.iter_mut())
    }

    /// Every configured list file, in the order they are loaded.
    #[must_use]
    pub fn dialects(&self) -> Vec<Dialect> {
        let tagged = |lists: &[ListFileConfig], tag: fn(ListFileConfig) -> Dialect| {
            lists.iter().cloned().map(tag).collect::<Vec<_>>()
        };
        [
            tagged(&self.sjasmplus, Dialect::Sjasmplus),
            tagged(&self.z80asm, Dialect::Z80asm),
            tagged(&self.z88dk, Dialect::Z88dk),
            tagged(&self.z88dkv2, Dialect::Z88dkV2),
            tagged(&self.rev_eng, Dialect::RevEng),
        ]
        .concat()
    }

    /// Builds the target memory model.
    ///
    /// # Errors
    ///
    /// Fails for unknown model names and malformed custom layouts.
    pub fn build_model(&self) -> Result<MemoryModel, ConfigurationError> {
        MemoryModel::from_name(
            self.memory_model.as_deref().unwrap_or("UNKNOWN"),
            self.custom_memory.as_ref(),
        )
    }
}

/// A sed-like `/search/replace/[g]` substitution applied to every list line.
#[derive(Debug, Clone)]
pub struct LineFilter {
    search: Regex,
    replace: String,
    global: bool,
}

impl LineFilter {
    /// Parses the filter text. `\/` escapes a slash.
    ///
    /// # Errors
    ///
    /// Fails if the text is not of the form `/search/replace/` or the
    /// search part is not a valid regular expression.
    pub fn parse(text: &str) -> Result<Self, LabelsError> {
        let invalid = || LabelsError::Filter(text.to_string());
        let body = text.strip_prefix('/').ok_or_else(invalid)?;
        let mut parts = vec![String::new()];
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('/') => parts.last_mut().ok_or_else(invalid)?.push('/'),
                    Some(other) => {
                        let part = parts.last_mut().ok_or_else(invalid)?;
                        part.push('\\');
                        part.push(other);
                    }
                    None => return Err(invalid()),
                },
                '/' => parts.push(String::new()),
                _ => parts.last_mut().ok_or_else(invalid)?.push(c),
            }
        }
        if parts.len() != 3 {
            return Err(invalid());
        }
        let global = parts[2].contains('g');
        Ok(Self {
            search: Regex::new(&parts[0])?,
            replace: parts[1].clone(),
            global,
        })
    }

    /// Applies the substitution to `line`.
    #[must_use]
    pub fn apply(&self, line: &str) -> String {
        if self.global {
            self.search.replace_all(line, self.replace.as_str()).into_owned()
        } else {
            self.search.replace(line, self.replace.as_str()).into_owned()
        }
    }
}
