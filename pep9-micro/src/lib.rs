//! Lexer, parser, and post-link resolution for Pep/9 microcode source: the layer that turns
//! `signal=value, …; clock goto L` text into a [`program::MicrocodeProgram`] the CPU engine can
//! step through.

pub mod branch;
pub mod code;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod signals;
pub mod spec;

pub use branch::{BranchFunction, Condition};
pub use code::{CodeLine, MicrocodeLine};
pub use error::{format_error_log, MicroError, MicroErrorKind};
pub use parser::parse_line;
pub use program::{LinkedLine, MicrocodeProgram};
pub use signals::{clock_name, lookup_clock, lookup_signal, signal_name, Clock, Signal};
pub use spec::{RegisterName, Spec, FLAG_NAMES};
