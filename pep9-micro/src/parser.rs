//! Per-line microcode parser. Mirrors the shape of `pep9-asm`'s parser: one finite-state pass per
//! line, driven by whichever token starts it.

use crate::branch::{BranchFunction, Condition};
use crate::code::{CodeLine, MicrocodeLine};
use crate::error::MicroError;
use crate::lexer::{tokenize, Token, UnitBanner};
use crate::signals::{lookup_clock, lookup_signal, Signal};
use crate::spec::{RegisterName, Spec, FLAG_NAMES};

type TokenIter = std::iter::Peekable<std::vec::IntoIter<Token>>;

/// Parse one line of microcode source. `extended` gates symbolic branches (`goto`, `if/else`,
/// `AMD`, `ISD`); when `false`, any such token is rejected — the source is restricted to plain
/// signal/clock assertions with no control flow, as the original simulator's "basic mode" did.
pub fn parse_line(line: &str, line_no: usize, extended: bool) -> Result<MicrocodeLine, MicroError> {
    let tokens = tokenize(line, line_no)?;
    if tokens.is_empty() {
        return Ok(MicrocodeLine::Blank);
    }
    if tokens.len() == 1 {
        if let Token::Comment(_) = &tokens[0] {
            return Ok(MicrocodeLine::CommentOnly);
        }
    }

    let mut iter: TokenIter = tokens.into_iter().peekable();

    if let Some(Token::UnitBanner(banner)) = iter.peek().cloned() {
        iter.next();
        let specs = parse_specs(&mut iter, line_no)?;
        return Ok(match banner {
            UnitBanner::Pre => MicrocodeLine::PreCondition { line_no, specs },
            UnitBanner::Post => MicrocodeLine::PostCondition { line_no, specs },
        });
    }

    let mut symbol = None;
    if let Some(Token::SymbolDef(name)) = iter.peek().cloned() {
        iter.next();
        symbol = Some(name);
    }

    let signals = parse_signals(&mut iter, line_no)?;
    let clocks = parse_clocks(&mut iter, line_no)?;
    let (branch, true_target, false_target) = parse_branch(&mut iter, line_no, extended)?;
    let comment = parse_trailing_comment(&mut iter, line_no)?;

    Ok(MicrocodeLine::Code(CodeLine {
        line_no,
        symbol,
        signals,
        clocks,
        branch,
        true_target,
        false_target,
        comment,
        breakpoint: false,
    }))
}

fn is_signal_assignment_ahead(iter: &TokenIter) -> bool {
    let mut probe = iter.clone();
    matches!(probe.next(), Some(Token::Identifier(_))) && probe.peek() == Some(&Token::Equals)
}

fn numeric_value(tok: Option<Token>, line_no: usize) -> Result<u32, MicroError> {
    match tok {
        Some(Token::Hex { value, .. }) => Ok(value),
        Some(Token::Decimal(v)) if v >= 0 => Ok(v as u32),
        Some(other) => Err(MicroError::syntactic(line_no, format!("expected a numeric value, found {:?}", other))),
        None => Err(MicroError::syntactic(line_no, "expected a numeric value, found end of line")),
    }
}

fn parse_signals(iter: &mut TokenIter, line_no: usize) -> Result<Vec<(Signal, u8)>, MicroError> {
    let mut signals: Vec<(Signal, u8)> = Vec::new();
    let mut after_comma = false;
    loop {
        if is_signal_assignment_ahead(iter) {
            let name = match iter.next() {
                Some(Token::Identifier(n)) => n,
                _ => unreachable!(),
            };
            iter.next(); // '='
            let value = numeric_value(iter.next(), line_no)?;
            let (signal, max) = lookup_signal(&name)
                .ok_or_else(|| MicroError::semantic(line_no, format!("unknown control signal '{}'", name)))?;
            if signals.iter().any(|&(s, _)| s == signal) {
                return Err(MicroError::semantic(line_no, format!("duplicate signal '{}'", name)));
            }
            if value > u32::from(max) {
                return Err(MicroError::semantic(
                    line_no,
                    format!("signal '{}' value {} exceeds its maximum of {}", name, value, max),
                ));
            }
            if matches!(signal, Signal::MemRead) && signals.iter().any(|&(s, _)| s == Signal::MemWrite) {
                return Err(MicroError::semantic(line_no, "MemRead and MemWrite cannot both be asserted"));
            }
            if matches!(signal, Signal::MemWrite) && signals.iter().any(|&(s, _)| s == Signal::MemRead) {
                return Err(MicroError::semantic(line_no, "MemRead and MemWrite cannot both be asserted"));
            }
            signals.push((signal, value as u8));
            after_comma = false;
            match iter.peek().cloned() {
                Some(Token::Comma) => {
                    iter.next();
                    after_comma = true;
                }
                _ => break,
            }
        } else {
            if after_comma {
                return Err(MicroError::syntactic(line_no, "expected a signal assignment after ','"));
            }
            break;
        }
    }
    Ok(signals)
}

fn parse_clocks(iter: &mut TokenIter, line_no: usize) -> Result<Vec<crate::signals::Clock>, MicroError> {
    let mut clocks = Vec::new();
    if !matches!(iter.peek(), Some(Token::Semicolon)) {
        return Ok(clocks);
    }
    iter.next();

    let mut after_comma = false;
    loop {
        match iter.peek().cloned() {
            Some(Token::Identifier(name)) => {
                if is_signal_assignment_ahead(iter) {
                    return Err(MicroError::syntactic(line_no, "control signals must appear before ';'"));
                }
                if is_branch_keyword(&name) {
                    if after_comma {
                        return Err(MicroError::syntactic(line_no, "expected a clock name after ','"));
                    }
                    break;
                }
                let clock = lookup_clock(&name)
                    .ok_or_else(|| MicroError::semantic(line_no, format!("unknown clock signal '{}'", name)))?;
                if clocks.contains(&clock) {
                    return Err(MicroError::semantic(line_no, format!("duplicate clock '{}'", name)));
                }
                iter.next();
                clocks.push(clock);
                after_comma = false;
                match iter.peek().cloned() {
                    Some(Token::Comma) => {
                        iter.next();
                        after_comma = true;
                    }
                    _ => break,
                }
            }
            _ => {
                if after_comma {
                    return Err(MicroError::syntactic(line_no, "expected a clock name after ','"));
                }
                break;
            }
        }
    }
    Ok(clocks)
}

fn is_branch_keyword(name: &str) -> bool {
    matches!(name, "goto" | "if" | "stop" | "AMD" | "ISD")
}

fn expect_identifier(iter: &mut TokenIter, line_no: usize) -> Result<String, MicroError> {
    match iter.next() {
        Some(Token::Identifier(name)) => Ok(name),
        Some(other) => Err(MicroError::syntactic(line_no, format!("expected an identifier, found {:?}", other))),
        None => Err(MicroError::syntactic(line_no, "expected an identifier, found end of line")),
    }
}

fn expect_keyword(iter: &mut TokenIter, line_no: usize, keyword: &str) -> Result<(), MicroError> {
    match iter.next() {
        Some(Token::Identifier(name)) if name == keyword => Ok(()),
        Some(other) => Err(MicroError::syntactic(line_no, format!("expected '{}', found {:?}", keyword, other))),
        None => Err(MicroError::syntactic(line_no, format!("expected '{}', found end of line", keyword))),
    }
}

#[allow(clippy::type_complexity)]
fn parse_branch(
    iter: &mut TokenIter,
    line_no: usize,
    extended: bool,
) -> Result<(BranchFunction, Option<String>, Option<String>), MicroError> {
    match iter.peek().cloned() {
        None | Some(Token::Comment(_)) => Ok((BranchFunction::AssemblerAssigned, None, None)),
        Some(Token::Identifier(name)) => {
            iter.next();
            match name.as_str() {
                "goto" => {
                    require_extended(extended, line_no)?;
                    let target = expect_identifier(iter, line_no)?;
                    Ok((BranchFunction::Unconditional, Some(target), None))
                }
                "if" => {
                    require_extended(extended, line_no)?;
                    let cond_name = expect_identifier(iter, line_no)?;
                    let cond_upper = cond_name.to_ascii_uppercase();
                    let branch = match cond_upper.as_str() {
                        "ISPREFETCHVALID" => BranchFunction::IsPrefetchValid,
                        "ISUNARY" => BranchFunction::IsUnary,
                        "ISPCEVEN" => BranchFunction::IsPCEven,
                        _ => {
                            let cond = Condition::parse(&cond_upper).ok_or_else(|| {
                                MicroError::semantic(line_no, format!("unknown branch condition '{}'", cond_name))
                            })?;
                            BranchFunction::Conditional(cond)
                        }
                    };
                    let true_target = expect_identifier(iter, line_no)?;
                    expect_keyword(iter, line_no, "else")?;
                    let false_target = expect_identifier(iter, line_no)?;
                    Ok((branch, Some(true_target), Some(false_target)))
                }
                "stop" => Ok((BranchFunction::Stop, None, None)),
                "AMD" => {
                    require_extended(extended, line_no)?;
                    Ok((BranchFunction::AddressingModeDecoder, None, None))
                }
                "ISD" => {
                    require_extended(extended, line_no)?;
                    Ok((BranchFunction::InstructionSpecifierDecoder, None, None))
                }
                other => Err(MicroError::syntactic(line_no, format!("unexpected token '{}' where a branch clause was expected", other))),
            }
        }
        Some(other) => Err(MicroError::syntactic(line_no, format!("unexpected token {:?} where a branch clause was expected", other))),
    }
}

fn require_extended(extended: bool, line_no: usize) -> Result<(), MicroError> {
    if extended {
        Ok(())
    } else {
        Err(MicroError::semantic(line_no, "symbolic branches require extended mode"))
    }
}

fn parse_trailing_comment(iter: &mut TokenIter, line_no: usize) -> Result<Option<String>, MicroError> {
    match iter.next() {
        None => Ok(None),
        Some(Token::Comment(c)) => Ok(Some(c)),
        Some(other) => Err(MicroError::syntactic(line_no, format!("unexpected trailing token {:?}", other))),
    }
}

fn parse_specs(iter: &mut TokenIter, line_no: usize) -> Result<Vec<Spec>, MicroError> {
    let mut specs = Vec::new();
    loop {
        match iter.peek().cloned() {
            None | Some(Token::Comment(_)) => break,
            Some(Token::Identifier(name)) => {
                iter.next();
                let spec = if name == "Mem" {
                    expect_token(iter, line_no, Token::LBracket)?;
                    let address = match iter.next() {
                        Some(Token::Hex { value, .. }) => value as u16,
                        Some(other) => return Err(MicroError::syntactic(line_no, format!("expected a hex address, found {:?}", other))),
                        None => return Err(MicroError::syntactic(line_no, "expected a hex address, found end of line")),
                    };
                    expect_token(iter, line_no, Token::RBracket)?;
                    expect_token(iter, line_no, Token::Equals)?;
                    let (value, two_bytes) = match iter.next() {
                        Some(Token::Hex { value, digits }) => (value as u16, digits > 2),
                        Some(other) => return Err(MicroError::syntactic(line_no, format!("expected a hex value, found {:?}", other))),
                        None => return Err(MicroError::syntactic(line_no, "expected a hex value, found end of line")),
                    };
                    Spec::Mem { address, value, two_bytes }
                } else if let Some(reg) = RegisterName::parse(&name) {
                    expect_token(iter, line_no, Token::Equals)?;
                    let value = numeric_value(iter.next(), line_no)? as u16;
                    Spec::Register { name: reg, value }
                } else if name.len() == 1 && FLAG_NAMES.contains(&name.chars().next().unwrap()) {
                    expect_token(iter, line_no, Token::Equals)?;
                    let value = numeric_value(iter.next(), line_no)?;
                    if value != 0 && value != 1 {
                        return Err(MicroError::semantic(line_no, format!("flag '{}' must be 0 or 1", name)));
                    }
                    Spec::Flag { name: name.chars().next().unwrap(), value: value == 1 }
                } else {
                    return Err(MicroError::semantic(line_no, format!("unknown specification target '{}'", name)));
                };
                specs.push(spec);
                match iter.peek().cloned() {
                    Some(Token::Comma) => {
                        iter.next();
                    }
                    _ => break,
                }
            }
            Some(other) => return Err(MicroError::syntactic(line_no, format!("unexpected token {:?} in specification", other))),
        }
    }
    Ok(specs)
}

fn expect_token(iter: &mut TokenIter, line_no: usize, expected: Token) -> Result<(), MicroError> {
    match iter.next() {
        Some(t) if t == expected => Ok(()),
        Some(other) => Err(MicroError::syntactic(line_no, format!("expected {:?}, found {:?}", expected, other))),
        None => Err(MicroError::syntactic(line_no, format!("expected {:?}, found end of line", expected))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Clock;

    #[test]
    fn parses_plain_signal_and_clock_line() {
        let line = parse_line("A=1, B=2; LoadCk goto next", 1, true).unwrap();
        let code = line.as_code().unwrap();
        assert_eq!(code.signals, vec![(Signal::A, 1), (Signal::B, 2)]);
        assert_eq!(code.clocks, vec![Clock::LoadCk]);
        assert_eq!(code.branch, BranchFunction::Unconditional);
        assert_eq!(code.true_target.as_deref(), Some("next"));
    }

    #[test]
    fn rejects_memread_and_memwrite_together() {
        let err = parse_line("MemRead=1, MemWrite=1; stop", 1, true).unwrap_err();
        assert!(err.to_string().contains("MemRead"));
    }

    #[test]
    fn rejects_duplicate_signal() {
        let err = parse_line("A=1, A=2; stop", 1, true).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_out_of_range_value() {
        let err = parse_line("ALU=16; stop", 1, true).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_missing_comma_between_signals() {
        let err = parse_line("A=1 B=2; stop", 1, true).unwrap_err();
        assert!(err.to_string().contains("','"));
    }

    #[test]
    fn rejects_signal_after_semicolon() {
        let err = parse_line("A=1; B=2 stop", 1, true).unwrap_err();
        assert!(err.to_string().contains("before ';'"));
    }

    #[test]
    fn parses_conditional_branch() {
        let line = parse_line("if N tgt1 else tgt2", 1, true).unwrap();
        let code = line.as_code().unwrap();
        assert_eq!(code.branch, BranchFunction::Conditional(Condition::N));
        assert_eq!(code.true_target.as_deref(), Some("tgt1"));
        assert_eq!(code.false_target.as_deref(), Some("tgt2"));
    }

    #[test]
    fn parses_amd_and_isd() {
        let amd = parse_line("AMD", 1, true).unwrap();
        assert_eq!(amd.as_code().unwrap().branch, BranchFunction::AddressingModeDecoder);
        let isd = parse_line("ISD", 1, true).unwrap();
        assert_eq!(isd.as_code().unwrap().branch, BranchFunction::InstructionSpecifierDecoder);
    }

    #[test]
    fn rejects_symbolic_branch_outside_extended_mode() {
        let err = parse_line("goto next", 1, false).unwrap_err();
        assert!(err.to_string().contains("extended mode"));
    }

    #[test]
    fn omitted_branch_is_assembler_assigned() {
        let line = parse_line("A=1; LoadCk", 1, true).unwrap();
        assert_eq!(line.as_code().unwrap().branch, BranchFunction::AssemblerAssigned);
    }

    #[test]
    fn parses_unit_pre_specs() {
        let line = parse_line("UnitPre: Mem[0x0010]=0xFF, A=0x0001, N=1", 1, true).unwrap();
        match line {
            MicrocodeLine::PreCondition { specs, .. } => {
                assert_eq!(specs.len(), 3);
                assert_eq!(specs[0], Spec::Mem { address: 0x10, value: 0xFF, two_bytes: false });
            }
            _ => panic!("expected PreCondition"),
        }
    }

    #[test]
    fn two_byte_mem_spec_detected_from_digit_count() {
        let line = parse_line("UnitPost: Mem[0x0010]=0xFACE", 1, true).unwrap();
        match line {
            MicrocodeLine::PostCondition { specs, .. } => {
                assert_eq!(specs[0], Spec::Mem { address: 0x10, value: 0xFACE, two_bytes: true });
            }
            _ => panic!("expected PostCondition"),
        }
    }

    #[test]
    fn labeled_code_line_captures_its_symbol() {
        let line = parse_line("start: A=0; stop", 1, true).unwrap();
        assert_eq!(line.as_code().unwrap().symbol.as_deref(), Some("start"));
    }
}
