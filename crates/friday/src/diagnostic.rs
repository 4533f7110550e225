// Copyright 2026 Friday Contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Diagnostics reported by static analysis tools.
//!
//! A [`Diagnostic`] with a location can render a code frame showing the
//! offending line with its neighbours and a caret under the column:
//!
//! ```text
//!    2 | export function add(a: number, b: number) {
//!    3 |   return a + c;
//!      |              ^
//!    4 | }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Lines of context shown before and after the diagnostic line.
const CONTEXT_LINES: usize = 3;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Blocks the build.
    Error,
    /// Reported but not blocking.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One finding from a linter or type checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the finding refers to, when known.
    pub filename: Option<PathBuf>,
    /// 1-indexed line, 0 when unknown.
    pub line: usize,
    /// 1-indexed column, 0 when unknown.
    pub column: usize,
    /// Tool-specific numeric code.
    pub code: Option<u32>,
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Creates an error diagnostic without a location.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            filename: None,
            line: 0,
            column: 0,
            code: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Attaches a location.
    pub fn at(mut self, filename: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        self.filename = Some(filename.into());
        self.line = line;
        self.column = column;
        self
    }

    /// Attaches a code.
    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    /// Whether this diagnostic points at a line in a file.
    pub fn has_location(&self) -> bool {
        self.filename.is_some() && self.line > 0
    }

    /// Renders the code frame around this diagnostic from `source`.
    pub fn code_frame(&self, source: &str) -> Option<String> {
        if !self.has_location() {
            return None;
        }
        Some(code_frame(source, self.line, self.column))
    }

    /// Reads the file and renders the code frame. `None` when the file
    /// cannot be read or the diagnostic has no location.
    pub fn read_code_frame(&self) -> Option<String> {
        let filename = self.filename.as_ref()?;
        let source = std::fs::read_to_string(filename).ok()?;
        self.code_frame(&source)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filename) = &self.filename {
            if self.line > 0 {
                write!(f, "{}:{}:{}: ", filename.display(), self.line, self.column)?;
            } else {
                write!(f, "{}: ", filename.display())?;
            }
        }
        write!(f, "{}", self.severity)?;
        if let Some(code) = self.code {
            write!(f, " TS{}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Formats `source` around `line` (1-indexed) with a caret under `column`.
pub fn code_frame(source: &str, line: usize, column: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let start = line.saturating_sub(CONTEXT_LINES).max(1);
    let end = (line + CONTEXT_LINES).min(lines.len());

    let mut result = String::new();
    for line_num in start..=end {
        let text = lines[line_num - 1];
        result.push_str(&format!("{:4} | {}\n", line_num, text));
        if line_num == line {
            result.push_str(&format!("     | {}^\n", " ".repeat(column.saturating_sub(1))));
        }
    }
    result
}

/// Number of distinct files mentioned by `diagnostics`.
pub fn file_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter_map(|d| d.filename.as_deref())
        .collect::<BTreeSet<&Path>>()
        .len()
}

/// `"N problems in M files"`, pluralized.
pub fn summary(diagnostics: &[Diagnostic]) -> String {
    let problems = diagnostics.len();
    let files = file_count(diagnostics);
    format!(
        "{} problem{} in {} file{}",
        problems,
        if problems == 1 { "" } else { "s" },
        files,
        if files == 1 { "" } else { "s" }
    )
}
