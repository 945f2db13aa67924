//! Top-level driver: lexes and parses every line, assigns addresses, resolves the operating
//! system's burn address, and checks the handful of whole-program invariants that a single line
//! can't enforce on its own.

use crate::code::AsmCodeKind;
use crate::error::AsmError;
use crate::parser::parse_line;
use crate::program::AsmProgram;
use pep9_symtab::{SymbolTable, SymbolValue};

/// The result of a successful assembly: the laid-out program plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct AssembleOutcome {
    pub program: AsmProgram,
    pub warnings: Vec<AsmError>,
}

/// Assemble `source`. `os` is `Some` when assembling a user program against an already-assembled
/// operating system (its `charIn`/`charOut`/trap symbols are copied in where the user program
/// leaves them undefined); it is `None` when assembling the operating system itself.
pub fn assemble(source: &str, os: Option<&AsmProgram>) -> Result<AssembleOutcome, Vec<AsmError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut symtab = SymbolTable::new();
    let mut codes = Vec::new();
    let mut address: u32 = 0;
    let mut burn_address: Option<u16> = None;
    let mut saw_end = false;

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;
        if saw_end {
            warnings.push(AsmError::warning(line_no, "text following .END is ignored"));
            continue;
        }
        match parse_line(line, line_no, address as u16, &mut symtab) {
            Ok(code) => {
                if let AsmCodeKind::Burn { address: addr } = code.kind {
                    burn_address = Some(addr);
                }
                if matches!(code.kind, AsmCodeKind::End) {
                    saw_end = true;
                }
                address += code.object_code_len();
                if address > 0x1_0000 {
                    errors.push(AsmError::semantic(line_no, "program exceeds the 64K address space"));
                }
                codes.push(code);
            }
            Err(e) => errors.push(e),
        }
    }

    if !saw_end {
        errors.push(AsmError::syntactic(source.lines().count().max(1), "missing .END sentinel"));
    }

    log::debug!("assembler: parsed {} lines, {} errors", codes.len(), errors.len());

    for sym in symtab.iter() {
        if sym.is_undefined() {
            errors.push(AsmError::semantic(0, format!("undefined symbol '{}'", sym.name())));
        }
        if sym.is_multiply_defined() {
            errors.push(AsmError::semantic(0, format!("multiply defined symbol '{}'", sym.name())));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut program = AsmProgram::new(codes, symtab, burn_address);

    if let Some(burn) = burn_address {
        // Lines before the `.BURN` line itself never make it into the object image.
        program.suppress_before_burn();
        // Relocate so the OS's last occupied byte lands exactly on the burn address.
        let (_, high) = program.program_bounds();
        let delta = i32::from(burn) + 1 - high as i32;
        if delta != 0 {
            program.relocate(delta);
        }
        // `.ALIGN`s before the `.BURN` realign downward so IO ports land on fixed boundaries.
        program.flip_aligns_before_burn();
    } else if let Some(os) = os {
        for name in ["charIn", "charOut"] {
            program.symbol_table_mut().copy_value_from(name, os.symbol_table());
        }
    }

    Ok(AssembleOutcome { program, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_minimal_program() {
        let src = "main: ASLA\nSTOP\n.END\n";
        let outcome = assemble(src, None).unwrap();
        assert_eq!(outcome.program.object_code(), vec![0x0A, 0x00]);
    }

    #[test]
    fn rejects_program_missing_end_sentinel() {
        let src = "ASLA\n";
        let errs = assemble(src, None).unwrap_err();
        assert!(errs.iter().any(|e| e.to_string().contains(".END")));
    }

    #[test]
    fn rejects_undefined_symbol_reference() {
        let src = "BR nowhere\n.END\n";
        let errs = assemble(src, None).unwrap_err();
        assert!(errs.iter().any(|e| e.to_string().contains("undefined symbol")));
    }

    #[test]
    fn os_with_burn_relocates_so_last_byte_hits_burn_address() {
        let src = ".BURN 0xFFFF\nSTOP\n.END\n";
        let outcome = assemble(src, None).unwrap();
        let (_, high) = outcome.program.program_bounds();
        assert_eq!(high, 0x1_0000);
    }

    #[test]
    fn user_program_inherits_char_ports_from_os() {
        let os_src = ".BURN 0xFFFF\ncharIn: .BLOCK 1\ncharOut: .BLOCK 1\nSTOP\n.END\n";
        let os_outcome = assemble(os_src, None).unwrap();

        let user_src = "main: STOP\n.END\n";
        let user_outcome = assemble(user_src, Some(&os_outcome.program)).unwrap();
        assert!(user_outcome.program.symbol_table().get_by_name("charIn").is_some());
    }

    #[test]
    fn text_after_end_is_a_warning_not_an_error() {
        let src = ".END\nASLA\n";
        let outcome = assemble(src, None).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
    }
}
