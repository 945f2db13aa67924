//! Runtime errors the engine latches during execution. Per §7, these are distinct from the
//! assembler's collected diagnostics: only one message survives per run, and it halts execution
//! rather than being collected alongside others.

use std::fmt;

/// The three sources of a latched runtime error, checked in this order — "the first non-empty
/// of memory/data/control messages is surfaced" (§7).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorLatch {
    memory: Option<String>,
    data: Option<String>,
    control: Option<String>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latch_memory(&mut self, message: impl Into<String>) {
        if self.memory.is_none() {
            self.memory = Some(message.into());
        }
    }

    pub fn latch_data(&mut self, message: impl Into<String>) {
        if self.data.is_none() {
            self.data = Some(message.into());
        }
    }

    pub fn latch_control(&mut self, message: impl Into<String>) {
        if self.control.is_none() {
            self.control = Some(message.into());
        }
    }

    pub fn has_error(&self) -> bool {
        self.memory.is_some() || self.data.is_some() || self.control.is_some()
    }

    /// The surfaced message: memory first, then data, then control.
    pub fn message(&self) -> Option<&str> {
        self.memory
            .as_deref()
            .or(self.data.as_deref())
            .or(self.control.as_deref())
    }

    pub fn clear(&mut self) {
        self.memory = None;
        self.data = None;
        self.control = None;
    }
}

impl fmt::Display for ErrorLatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_error_wins_over_data_and_control() {
        let mut latch = ErrorLatch::new();
        latch.latch_control("control issue");
        latch.latch_data("data issue");
        latch.latch_memory("memory issue");
        assert_eq!(latch.message(), Some("memory issue"));
    }

    #[test]
    fn first_latch_of_a_kind_wins() {
        let mut latch = ErrorLatch::new();
        latch.latch_control("first");
        latch.latch_control("second");
        assert_eq!(latch.message(), Some("first"));
    }

    #[test]
    fn clear_resets_all_three() {
        let mut latch = ErrorLatch::new();
        latch.latch_data("oops");
        latch.clear();
        assert!(!latch.has_error());
    }
}
