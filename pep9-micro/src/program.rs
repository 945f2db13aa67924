//! `MicrocodeProgram`: a parsed microcode source, linked into a program where every branch target
//! is a resolved code-line index and no [`BranchFunction::AssemblerAssigned`] survives.

use std::collections::HashMap;

use pep9_symtab::{SymbolTable, SymbolValue};

use crate::branch::BranchFunction;
use crate::code::{CodeLine, MicrocodeLine};
use crate::error::MicroError;
use crate::parser::parse_line;
use crate::spec::Spec;

/// One linked code line: signals/clocks/branch exactly as parsed, plus its resolved true/false
/// targets as indices into [`MicrocodeProgram::code_lines`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedLine {
    pub source: CodeLine,
    pub true_target: usize,
    pub false_target: usize,
}

/// A fully parsed and linked microprogram: every [`BranchFunction::AssemblerAssigned`] has been
/// rewritten and every target resolved to an index in `code_lines`, per §4.4's post-pass.
#[derive(Debug, Clone)]
pub struct MicrocodeProgram {
    pub lines: Vec<MicrocodeLine>,
    pub code_lines: Vec<LinkedLine>,
    pub pre_conditions: Vec<Spec>,
    pub post_conditions: Vec<Spec>,
    pub symbols: SymbolTable,
}

impl MicrocodeProgram {
    /// Parse every line of `source`, then run the post-construction link pass described in §4.4:
    /// generate a symbol for every unlabeled code line, rewrite `AssemblerAssigned` to the next
    /// code line (or `Stop` on the last one), and replace any missing true/false target with the
    /// line's own symbol.
    pub fn parse(source: &str, extended: bool) -> Result<MicrocodeProgram, Vec<MicroError>> {
        let mut lines = Vec::new();
        let mut errors = Vec::new();
        for (i, raw) in source.lines().enumerate() {
            match parse_line(raw, i + 1, extended) {
                Ok(line) => lines.push(line),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut symbols = SymbolTable::new();
        let mut code_indices: Vec<usize> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if matches!(line, MicrocodeLine::Code(_)) {
                code_indices.push(idx);
            }
        }

        // Assign every code line a symbol: user-given ones first (so generated names never
        // collide with them), then a generated `_asN` for the rest.
        let mut line_symbol: HashMap<usize, String> = HashMap::new();
        for &idx in &code_indices {
            if let MicrocodeLine::Code(code) = &lines[idx] {
                if let Some(name) = &code.symbol {
                    line_symbol.insert(idx, name.clone());
                }
            }
        }
        let mut gensym_counter = 0usize;
        for &idx in &code_indices {
            if line_symbol.contains_key(&idx) {
                continue;
            }
            let name = loop {
                let candidate = format!("_as{}", gensym_counter);
                gensym_counter += 1;
                if !line_symbol.values().any(|v| v == &candidate) {
                    break candidate;
                }
            };
            line_symbol.insert(idx, name);
        }

        // Bind each code line's symbol to its position among code-only lines (§4.4: "the symbol
        // table records the numeric address of each code line").
        let mut by_code_position: HashMap<String, usize> = HashMap::new();
        for (pos, &idx) in code_indices.iter().enumerate() {
            let name = line_symbol.get(&idx).expect("every code line has a symbol by now").clone();
            symbols.set_value_by_name(&name, SymbolValue::Numeric(pos as i32));
            by_code_position.insert(name, pos);
        }

        let mut code_lines: Vec<LinkedLine> = Vec::with_capacity(code_indices.len());
        for (pos, &idx) in code_indices.iter().enumerate() {
            let mut code = match &lines[idx] {
                MicrocodeLine::Code(c) => c.clone(),
                _ => unreachable!(),
            };
            let own_symbol = line_symbol[&idx].clone();
            code.symbol = Some(own_symbol.clone());

            let next_pos = code_indices.get(pos + 1).map(|_| pos + 1);
            let was_assembler_assigned = matches!(code.branch, BranchFunction::AssemblerAssigned);

            let resolved_branch = if was_assembler_assigned {
                match next_pos {
                    Some(_) => BranchFunction::Unconditional,
                    None => BranchFunction::Stop,
                }
            } else {
                code.branch
            };
            code.branch = resolved_branch;

            // A rewritten `AssemblerAssigned` falls through to the next code line; every other
            // kind's missing target (a `stop`/`AMD`/`ISD` line, or the unused false-branch of a
            // `goto`) targets itself, per §4.4: "Lines missing a true/false target are set to
            // target themselves."
            let fallback = if was_assembler_assigned { next_pos.unwrap_or(pos) } else { pos };

            let resolve_target = |target: &Option<String>| -> Result<usize, MicroError> {
                match target {
                    Some(name) => by_code_position.get(name).copied().ok_or_else(|| {
                        MicroError::semantic(code.line_no, format!("undefined branch target '{}'", name))
                    }),
                    None => Ok(fallback),
                }
            };

            let true_target = resolve_target(&code.true_target)?;
            let false_target = resolve_target(&code.false_target)?;

            code_lines.push(LinkedLine { source: code, true_target, false_target });
        }

        let mut pre_conditions = Vec::new();
        let mut post_conditions = Vec::new();
        for line in &lines {
            match line {
                MicrocodeLine::PreCondition { specs, .. } => pre_conditions.extend(specs.iter().copied()),
                MicrocodeLine::PostCondition { specs, .. } => post_conditions.extend(specs.iter().copied()),
                _ => {}
            }
        }

        Ok(MicrocodeProgram { lines, code_lines, pre_conditions, post_conditions, symbols })
    }

    pub fn code_count(&self) -> usize {
        self.code_lines.len()
    }

    /// Resolve a branch-target symbol name to its position among code lines, the way the CPU
    /// engine looks up `AMD`/`ISD` jump-table entries and the microprogram's `start` line.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.symbols.get_by_name(name).and_then(|s| match s.value() {
            SymbolValue::Numeric(v) if v >= 0 => Some(v as usize),
            _ => None,
        })
    }

    /// The line the engine resets µPC to: the code line named `start`, or 0 if absent. Recorded
    /// as an open question in the original toolchain — the fallback is intentional, not a bug.
    pub fn start_line(&self) -> usize {
        self.position_of("start").unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Condition;

    #[test]
    fn unlabeled_lines_get_generated_symbols() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk\nB=1; LoadCk stop", true).unwrap();
        assert_eq!(prog.code_count(), 2);
        assert!(prog.code_lines[0].source.symbol.as_deref().unwrap().starts_with("_as"));
    }

    #[test]
    fn assembler_assigned_falls_through_to_next_line() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk\nB=1; LoadCk stop", true).unwrap();
        assert_eq!(prog.code_lines[0].source.branch, BranchFunction::Unconditional);
        assert_eq!(prog.code_lines[0].true_target, 1);
        assert_eq!(prog.code_lines[0].false_target, 1);
    }

    #[test]
    fn assembler_assigned_on_last_line_becomes_stop() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk", true).unwrap();
        assert_eq!(prog.code_lines[0].source.branch, BranchFunction::Stop);
    }

    #[test]
    fn goto_resolves_to_labeled_line() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk goto target\ntarget: B=1; LoadCk stop", true).unwrap();
        assert_eq!(prog.code_lines[0].true_target, 1);
        assert_eq!(prog.code_lines[0].false_target, 1);
    }

    #[test]
    fn conditional_branch_resolves_both_targets() {
        let prog = MicrocodeProgram::parse(
            "start: if N yes else no\nyes: A=1; LoadCk stop\nno: A=2; LoadCk stop",
            true,
        )
        .unwrap();
        assert_eq!(prog.code_lines[0].source.branch, BranchFunction::Conditional(Condition::N));
        assert_eq!(prog.code_lines[0].true_target, 1);
        assert_eq!(prog.code_lines[0].false_target, 2);
    }

    #[test]
    fn undefined_branch_target_is_a_semantic_error() {
        let err = MicrocodeProgram::parse("A=1; LoadCk goto nowhere", true).unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(err[0].to_string().contains("undefined branch target"));
    }

    #[test]
    fn start_line_falls_back_to_zero_without_a_start_symbol() {
        let prog = MicrocodeProgram::parse("A=1; LoadCk stop", true).unwrap();
        assert_eq!(prog.start_line(), 0);
    }

    #[test]
    fn start_line_honors_an_explicit_start_symbol() {
        let prog =
            MicrocodeProgram::parse("A=1; LoadCk\nstart: B=1; LoadCk stop", true).unwrap();
        assert_eq!(prog.start_line(), 1);
    }

    #[test]
    fn pre_and_post_conditions_are_collected() {
        let prog = MicrocodeProgram::parse(
            "UnitPre: A=0x0001\nA=1; LoadCk stop\nUnitPost: A=0x0002",
            true,
        )
        .unwrap();
        assert_eq!(prog.pre_conditions.len(), 1);
        assert_eq!(prog.post_conditions.len(), 1);
    }
}
