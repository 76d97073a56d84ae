//! WPMEM, ASSERTION and LOGPOINT directives embedded in source comments.

use regex::Regex;

use crate::error::LabelsError;

/// One directive with the address of the line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveLine {
    /// Long address of the line, `None` if the line has no address.
    pub address: Option<u32>,
    /// Directive text, starting at the keyword.
    pub line: String,
}

/// Directive lines per kind, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// `WPMEM` watchpoints.
    pub watch_points: Vec<DirectiveLine>,
    /// `ASSERTION` breakpoints.
    pub assertions: Vec<DirectiveLine>,
    /// `LOGPOINT` breakpoints.
    pub log_points: Vec<DirectiveLine>,
}

impl Directives {
    /// Appends all lines of `other`.
    pub fn extend(&mut self, other: Self) {
        self.watch_points.extend(other.watch_points);
        self.assertions.extend(other.assertions);
        self.log_points.extend(other.log_points);
    }

    /// Number of directives of all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.watch_points.len() + self.assertions.len() + self.log_points.len()
    }

    /// `true` if no directive was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Finds directives in the comment part of list lines.
#[derive(Debug, Clone)]
pub struct DirectiveScanner {
    wpmem: Regex,
    assertion: Regex,
    logpoint: Regex,
}

impl DirectiveScanner {
    /// Compiles the directive patterns.
    ///
    /// # Errors
    ///
    /// Only fails if a pattern does not compile.
    pub fn new() -> Result<Self, LabelsError> {
        Ok(Self {
            wpmem: Regex::new(r"\b(WPMEM([\s,].*|$))")?,
            assertion: Regex::new(r"\b(ASSERTION([\s,].*|$))")?,
            logpoint: Regex::new(r"\b(LOGPOINT[\s,\[].*)")?,
        })
    }

    /// Scans the comment of `line` and records a directive found there.
    ///
    /// Only text after the first `;` is considered.
    pub fn scan(&self, line: &str, address: Option<u32>, into: &mut Directives) {
        let Some((_, comment)) = line.split_once(';') else {
            return;
        };
        let found = |regex: &Regex| {
            regex.captures(comment).and_then(|caps| caps.get(1)).map(|m| DirectiveLine {
                address,
                line: m.as_str().trim_end().to_string(),
            })
        };
        if let Some(directive) = found(&self.wpmem) {
            into.watch_points.push(directive);
        } else if let Some(directive) = found(&self.assertion) {
            into.assertions.push(directive);
        } else if let Some(directive) = found(&self.logpoint) {
            into.log_points.push(directive);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectiveScanner, Directives};

    fn scan(lines: &[(&str, Option<u32>)]) -> Directives {
        let scanner = DirectiveScanner::new().unwrap();
        let mut directives = Directives::default();
        for (line, address) in lines {
            scanner.scan(line, *address, &mut directives);
        }
        directives
    }

    #[test]
    fn finds_each_kind_in_comments() {
        let d = scan(&[
            ("8000 00    nop ; WPMEM, 5, w ", Some(0x1_8000)),
            ("8001 00    nop ; ASSERTION A < 5", Some(0x1_8001)),
            ("8002 00    nop ; LOGPOINT [SPRITES] x=${A}", Some(0x1_8002)),
            ("; WPMEM", None),
        ]);
        assert_eq!(d.watch_points.len(), 2);
        assert_eq!(d.watch_points[0].line, "WPMEM, 5, w");
        assert_eq!(d.watch_points[0].address, Some(0x1_8000));
        assert_eq!(d.watch_points[1].address, None);
        assert_eq!(d.assertions[0].line, "ASSERTION A < 5");
        assert_eq!(d.log_points[0].line, "LOGPOINT [SPRITES] x=${A}");
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn ignores_code_and_partial_words() {
        let d = scan(&[
            ("8000 00    WPMEM: nop", Some(0x8000)),
            ("8000 00    nop ; XWPMEM", Some(0x8000)),
            ("8000 00    nop ; WPMEMORY", Some(0x8000)),
            ("8000 00    nop ; LOGPOINT", Some(0x8000)),
        ]);
        assert!(d.is_empty());
    }
}
