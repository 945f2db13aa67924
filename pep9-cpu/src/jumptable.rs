//! The 256-entry jump tables `AddressingModeDecoder` and `InstructionSpecifierDecoder` branch
//! functions consult. Built once per loaded microprogram by resolving, for every possible
//! instruction-specifier byte, the microcode symbol that should have been defined for it.

use pep9_isa::decode_opcode;
use pep9_micro::MicrocodeProgram;

/// One entry: either a resolved code-line position, or invalid — no symbol was bound (or it was
/// multiply defined), an error the branch function raises only when actually reached, so partial
/// microprograms that implement a handful of instructions still load and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpEntry {
    Valid(usize),
    Invalid,
}

/// A precomputed 256-entry table, keyed by the current instruction specifier byte (the IR's
/// opcode byte).
#[derive(Debug, Clone)]
pub struct JumpTable {
    entries: [JumpEntry; 256],
}

impl JumpTable {
    pub fn get(&self, opcode: u8) -> JumpEntry {
        self.entries[opcode as usize]
    }
}

/// The symbol name the instruction-specifier decoder expects for a given opcode: the
/// instruction's bare mnemonic, e.g. `"ADDA"`, `"ASLA"`. Unassigned opcodes have no symbol to
/// look for at all, and are unconditionally invalid.
pub fn isd_symbol_for(opcode: u8) -> Option<&'static str> {
    decode_opcode(opcode).map(|(mnemonic, _)| mnemonic)
}

/// The symbol name the addressing-mode decoder expects for a given opcode: the addressing mode's
/// full name, e.g. `"immediate"`, `"stackDeferredIndexed"`. Unary opcodes carry no addressing
/// mode and so have no AMD entry either.
pub fn amd_symbol_for(opcode: u8) -> Option<&'static str> {
    let (_, mode) = decode_opcode(opcode)?;
    mode.map(|m| match m {
        pep9_isa::AddrMode::Immediate => "immediate",
        pep9_isa::AddrMode::Direct => "direct",
        pep9_isa::AddrMode::Indirect => "indirect",
        pep9_isa::AddrMode::Stack => "stack",
        pep9_isa::AddrMode::StackDeferred => "stackDeferred",
        pep9_isa::AddrMode::Indexed => "indexed",
        pep9_isa::AddrMode::StackIndexed => "stackIndexed",
        pep9_isa::AddrMode::StackDeferredIndexed => "stackDeferredIndexed",
    })
}

fn build(symbol_for: impl Fn(u8) -> Option<&'static str>, program: &MicrocodeProgram) -> JumpTable {
    let mut entries = [JumpEntry::Invalid; 256];
    for opcode in 0..=255u8 {
        entries[opcode as usize] = match symbol_for(opcode) {
            Some(name) => match program.position_of(name) {
                Some(pos) => JumpEntry::Valid(pos),
                None => JumpEntry::Invalid,
            },
            None => JumpEntry::Invalid,
        };
    }
    JumpTable { entries }
}

pub fn build_isd(program: &MicrocodeProgram) -> JumpTable {
    build(isd_symbol_for, program)
}

pub fn build_amd(program: &MicrocodeProgram) -> JumpTable {
    build(amd_symbol_for, program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isd_resolves_a_defined_mnemonic_symbol() {
        let prog = MicrocodeProgram::parse("ASLA: A=1; LoadCk stop", true).unwrap();
        let table = build_isd(&prog);
        assert_eq!(table.get(0x0A), JumpEntry::Valid(0));
    }

    #[test]
    fn isd_is_invalid_for_an_unbound_opcode() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk stop", true).unwrap();
        let table = build_isd(&prog);
        assert_eq!(table.get(0x0A), JumpEntry::Invalid);
    }

    #[test]
    fn amd_resolves_an_addressing_mode_symbol() {
        let prog = MicrocodeProgram::parse("direct: A=1; LoadCk stop", true).unwrap();
        let table = build_amd(&prog);
        let direct_ldwa = pep9_isa::lookup("LDWA").unwrap().opcode_for(Some(pep9_isa::AddrMode::Direct)).unwrap();
        assert_eq!(table.get(direct_ldwa), JumpEntry::Valid(0));
    }

    #[test]
    fn amd_has_no_entry_for_unary_opcodes() {
        let prog = MicrocodeProgram::parse("direct: A=1; LoadCk stop", true).unwrap();
        let table = build_amd(&prog);
        assert_eq!(table.get(0x0A), JumpEntry::Invalid);
    }
}
