//! `AsmProgramManager`: owns the assembled operating system and the user program loaded against
//! it, and answers the handful of cross-program questions the CPU engine and CLI need.

use crate::assembler::{assemble, AssembleOutcome};
use crate::error::AsmError;
use crate::program::AsmProgram;
use std::collections::HashSet;

/// Holds at most one operating system and one user program at a time, mirroring the one-OS,
/// one-user-program model the simulator actually runs.
#[derive(Debug, Default)]
pub struct AsmProgramManager {
    os: Option<AsmProgram>,
    user: Option<AsmProgram>,
    breakpoints: HashSet<u16>,
}

impl AsmProgramManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble `source` as the operating system. The OS is relocated so its last byte lands on
    /// its own `.BURN` address; it carries no external symbol table to resolve against. Per
    /// §4.2's end-of-program checks, an operating system must contain exactly one `.BURN`
    /// directive; when `force_burn_at_ffff` is set (the CLI's `--burn-at-ffff`), that `.BURN`
    /// must additionally target `0xFFFF`.
    pub fn assemble_os(
        &mut self,
        source: &str,
        force_burn_at_ffff: bool,
    ) -> Result<AssembleOutcome, Vec<AsmError>> {
        let outcome = assemble(source, None)?;
        let burn_count = outcome.program.burn_count();
        if burn_count != 1 {
            return Err(vec![AsmError::semantic(
                0,
                format!("operating system must contain exactly one .BURN directive, found {}", burn_count),
            )]);
        }
        if force_burn_at_ffff && outcome.program.burn_address() != Some(0xFFFF) {
            return Err(vec![AsmError::semantic(0, "operating system must burn at 0xFFFF")]);
        }
        self.os = Some(outcome.program.clone());
        Ok(outcome)
    }

    /// Assemble `source` as a user program, resolving `charIn`/`charOut`/trap vectors against
    /// the currently loaded operating system. Per §4.2, a user program must contain zero `.BURN`
    /// directives.
    pub fn assemble_user(&mut self, source: &str) -> Result<AssembleOutcome, Vec<AsmError>> {
        let os_ref = self.os.as_ref();
        let outcome = assemble(source, os_ref)?;
        if outcome.program.burn_count() != 0 {
            return Err(vec![AsmError::semantic(0, "user program must not contain a .BURN directive")]);
        }
        self.user = Some(outcome.program.clone());
        Ok(outcome)
    }

    pub fn os(&self) -> Option<&AsmProgram> {
        self.os.as_ref()
    }

    pub fn user(&self) -> Option<&AsmProgram> {
        self.user.as_ref()
    }

    /// The program (user first, falling back to OS) whose bounds contain `address`.
    pub fn get_program_at(&self, address: u16) -> Option<&AsmProgram> {
        if let Some(user) = &self.user {
            let (lo, hi) = user.program_bounds();
            if address >= lo && address < hi {
                return Some(user);
            }
        }
        if let Some(os) = &self.os {
            let (lo, hi) = os.program_bounds();
            if address >= lo && address < hi {
                return Some(os);
            }
        }
        None
    }

    pub fn set_breakpoint(&mut self, address: u16) {
        self.breakpoints.insert(address);
    }

    pub fn clear_breakpoint(&mut self, address: u16) {
        self.breakpoints.remove(&address);
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    pub fn is_breakpoint(&self, address: u16) -> bool {
        self.breakpoints.contains(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_program_lookup_prefers_user_over_os() {
        let mut mgr = AsmProgramManager::new();
        mgr.assemble_os(".BURN 0xFFFF\nSTOP\n.END\n", false).unwrap();
        mgr.assemble_user("main: ASLA\n.END\n").unwrap();
        assert!(mgr.get_program_at(0).is_some());
    }

    #[test]
    fn os_without_a_burn_directive_is_rejected() {
        let mut mgr = AsmProgramManager::new();
        let errs = mgr.assemble_os("STOP\n.END\n", false).unwrap_err();
        assert!(errs.iter().any(|e| e.to_string().contains("exactly one .BURN")));
    }

    #[test]
    fn forced_burn_rejects_an_os_that_burns_elsewhere() {
        let mut mgr = AsmProgramManager::new();
        let errs = mgr.assemble_os(".BURN 0x1000\nSTOP\n.END\n", true).unwrap_err();
        assert!(errs.iter().any(|e| e.to_string().contains("must burn at 0xFFFF")));
    }

    #[test]
    fn user_program_with_a_burn_directive_is_rejected() {
        let mut mgr = AsmProgramManager::new();
        let errs = mgr.assemble_user(".BURN 0xFFFF\nSTOP\n.END\n").unwrap_err();
        assert!(errs.iter().any(|e| e.to_string().contains("must not contain a .BURN")));
    }

    #[test]
    fn breakpoints_round_trip() {
        let mut mgr = AsmProgramManager::new();
        mgr.set_breakpoint(0x10);
        assert!(mgr.is_breakpoint(0x10));
        mgr.clear_breakpoint(0x10);
        assert!(!mgr.is_breakpoint(0x10));
    }
}
