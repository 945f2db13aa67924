//! The microcoded CPU engine.
//!
//! This crate executes a linked [`pep9_micro::MicrocodeProgram`] against a
//! [`pep9_memory::MemoryDevice`], one microcode line at a time, evaluating the branch functions
//! of §4.5 and maintaining the ISA-level call/stack trace that correlates the running program
//! with the assembler's static trace-tag analysis. [`engine::Engine`] is the entry point;
//! [`unittest`] drives the `UnitPre:`/`UnitPost:` microcode tests described in §6/§8.

pub mod alu;
pub mod datapath;
pub mod engine;
pub mod error;
pub mod jumptable;
pub mod memoizer;
pub mod registers;
pub mod trace;
pub mod unittest;

pub use engine::{Engine, RunObserver};
pub use error::ErrorLatch;
pub use memoizer::{InstructionTrace, Memoizer, RegisterDelta, RunStatistics};
pub use registers::{RegisterFile, RegisterSelect, RegisterSnapshot};
pub use trace::{Frame, FrameKind, HeapBlock, MemoryTrace, StackTrace};
pub use unittest::{run_unit_test, UnitTestFailure, UnitTestOutcome};
