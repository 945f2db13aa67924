//! `MicrocodeLine`: one parsed line of microcode source, before the post-construction link pass
//! resolves symbolic targets and `AssemblerAssigned` fall-throughs.

use crate::branch::BranchFunction;
use crate::signals::{Clock, Signal};
use crate::spec::Spec;

/// A fully parsed `signal=value, ...; clock, clock ... branch // comment` line.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeLine {
    pub line_no: usize,
    /// This line's own symbol, either user-given (`label:`) or generated (`_asN`) once
    /// [`crate::program::MicrocodeProgram`] runs its link pass.
    pub symbol: Option<String>,
    /// Dense: every signal this line asserts, paired with its 8-bit value.
    pub signals: Vec<(Signal, u8)>,
    /// Dense: every clock this line asserts this cycle.
    pub clocks: Vec<Clock>,
    pub branch: BranchFunction,
    /// `goto`/`if`-supplied target symbol names, before resolution to line indices. `None` until
    /// the link pass fills in "targets self" for lines that never named one (`AMD`/`ISD`/`stop`).
    pub true_target: Option<String>,
    pub false_target: Option<String>,
    pub comment: Option<String>,
    pub breakpoint: bool,
}

impl CodeLine {
    pub fn has_signal(&self, signal: Signal) -> bool {
        self.signals.iter().any(|&(s, _)| s == signal)
    }

    pub fn signal_value(&self, signal: Signal) -> Option<u8> {
        self.signals.iter().find(|&&(s, _)| s == signal).map(|&(_, v)| v)
    }

    pub fn has_clock(&self, clock: Clock) -> bool {
        self.clocks.contains(&clock)
    }
}

/// One line of microcode source, in its parsed-but-unlinked form.
#[derive(Debug, Clone, PartialEq)]
pub enum MicrocodeLine {
    Code(CodeLine),
    PreCondition { line_no: usize, specs: Vec<Spec> },
    PostCondition { line_no: usize, specs: Vec<Spec> },
    CommentOnly,
    Blank,
}

impl MicrocodeLine {
    pub fn as_code(&self) -> Option<&CodeLine> {
        match self {
            MicrocodeLine::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_code_mut(&mut self) -> Option<&mut CodeLine> {
        match self {
            MicrocodeLine::Code(c) => Some(c),
            _ => None,
        }
    }
}
