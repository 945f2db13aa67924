//! Microcode assembly diagnostics, collected the same way `pep9-asm`'s are: a flat
//! `(line, message)` list, fatal unless every entry is a warning.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MicroErrorKind {
    #[error("{0}")]
    Lexical(String),
    #[error("{0}")]
    Syntactic(String),
    #[error("{0}")]
    Semantic(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroError {
    pub line: usize,
    pub kind: MicroErrorKind,
    pub is_warning: bool,
}

impl MicroError {
    pub fn lexical(line: usize, msg: impl Into<String>) -> Self {
        MicroError { line, kind: MicroErrorKind::Lexical(msg.into()), is_warning: false }
    }

    pub fn syntactic(line: usize, msg: impl Into<String>) -> Self {
        MicroError { line, kind: MicroErrorKind::Syntactic(msg.into()), is_warning: false }
    }

    pub fn semantic(line: usize, msg: impl Into<String>) -> Self {
        MicroError { line, kind: MicroErrorKind::Semantic(msg.into()), is_warning: false }
    }

    fn message(&self) -> &str {
        match &self.kind {
            MicroErrorKind::Lexical(m) | MicroErrorKind::Syntactic(m) | MicroErrorKind::Semantic(m) => m,
        }
    }
}

impl fmt::Display for MicroError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = if self.is_warning { "WARNING" } else { "ERROR" };
        write!(f, ";{}: {}", tag, self.message())
    }
}

/// Render the full error log for a source text, same shape as the ISA assembler's.
pub fn format_error_log(source: &str, errors: &[MicroError]) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::new();
    for err in errors {
        if let Some(src_line) = lines.get(err.line.saturating_sub(1)) {
            out.push_str(src_line);
            out.push('\n');
        }
        out.push_str(&err.to_string());
        out.push('\n');
    }
    out
}
