//! Two-pass Pep/9 ISA assembler.
//!
//! Source goes in through [`assembler::assemble`] (or, for a simulator session juggling both an
//! operating system and a user program, through [`manager::AsmProgramManager`]) and a laid-out
//! [`program::AsmProgram`] comes out: object code, a listing, and a resolved symbol table.

pub mod argument;
pub mod assembler;
pub mod code;
pub mod error;
pub mod format;
pub mod lexer;
pub mod manager;
pub mod parser;
pub mod program;
pub mod tracetag;

pub use argument::AsmArgument;
pub use assembler::{assemble, AssembleOutcome};
pub use code::{AsmCode, AsmCodeCommon, AsmCodeKind};
pub use error::{format_error_log, AsmError, AsmErrorKind};
pub use format::{full_listing, object_code_text, symbol_table_listing};
pub use manager::AsmProgramManager;
pub use program::{AsmProgram, MemoryVector};
