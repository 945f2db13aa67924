//! Assembler diagnostics.
//!
//! Lexical, syntactic, and semantic problems are all collected into the same `(line, message)`
//! shaped list per §7 of the specification; only their `kind` differs, and only for reporting
//! purposes. A `warning` never fails assembly by itself.

use std::fmt;
use thiserror::Error;

/// The five-way split from the error-handling design; `pep9-asm` only ever produces the first
/// three (lexical/syntactic/semantic). Resource and runtime errors belong to the CLI and the CPU
/// engine respectively.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmErrorKind {
    #[error("{0}")]
    Lexical(String),
    #[error("{0}")]
    Syntactic(String),
    #[error("{0}")]
    Semantic(String),
}

/// One diagnostic, tied to the 1-based source line that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub line: usize,
    pub kind: AsmErrorKind,
    pub is_warning: bool,
}

impl AsmError {
    pub fn lexical(line: usize, msg: impl Into<String>) -> Self {
        AsmError {
            line,
            kind: AsmErrorKind::Lexical(msg.into()),
            is_warning: false,
        }
    }

    pub fn syntactic(line: usize, msg: impl Into<String>) -> Self {
        AsmError {
            line,
            kind: AsmErrorKind::Syntactic(msg.into()),
            is_warning: false,
        }
    }

    pub fn semantic(line: usize, msg: impl Into<String>) -> Self {
        AsmError {
            line,
            kind: AsmErrorKind::Semantic(msg.into()),
            is_warning: false,
        }
    }

    pub fn warning(line: usize, msg: impl Into<String>) -> Self {
        AsmError {
            line,
            kind: AsmErrorKind::Semantic(msg.into()),
            is_warning: true,
        }
    }

    fn message(&self) -> &str {
        match &self.kind {
            AsmErrorKind::Lexical(m) | AsmErrorKind::Syntactic(m) | AsmErrorKind::Semantic(m) => m,
        }
    }
}

impl fmt::Display for AsmError {
    /// Renders the way the error log in §6 wants: `;ERROR: message` or `;WARNING: message`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = if self.is_warning { "WARNING" } else { "ERROR" };
        write!(f, ";{}: {}", tag, self.message())
    }
}

/// Render the full error log for a source text: each diagnostic preceded by its offending line.
pub fn format_error_log(source: &str, errors: &[AsmError]) -> String {
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
