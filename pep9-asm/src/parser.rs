//! Per-line parser: turns a token stream into an [`AsmCode`], validating mnemonics and
//! dot-command argument shapes along the way. Symbol *definitions* are recorded into the
//! supplied [`SymbolTable`] as they're seen; symbol *references* are left as
//! [`AsmArgument::Symbol`] for the assembler driver to resolve once every line has been parsed.

use crate::argument::AsmArgument;
use crate::code::{AsmCode, AsmCodeCommon, AsmCodeKind};
use crate::error::AsmError;
use crate::lexer::{tokenize, Token};
use pep9_isa::AddrMode;
use pep9_symtab::{SymbolTable, SymbolValue};

/// Dot-commands that take no argument at all.
const NO_ARG_DIRECTIVES: &[&str] = &["END"];

/// Parse one source line. `address` is this line's tentative load address (pass one assigns
/// these sequentially from each line's `object_code_len`); it is fixed up again after OS
/// relocation in the assembler driver.
pub fn parse_line(line: &str, line_no: usize, address: u16, symtab: &mut SymbolTable) -> Result<AsmCode, AsmError> {
    let tokens = tokenize(line, line_no)?;
    let comment = tokens.iter().find_map(|t| match t {
        Token::Comment(text) => Some(text.clone()),
        _ => None,
    });
    let common_base = AsmCodeCommon {
        line_no,
        address,
        symbol: None,
        source_text: line.to_string(),
        comment,
        emit_object_code: true,
    };

    let mut iter = tokens.into_iter().peekable();
    let mut symbol = None;
    if let Some(Token::SymbolDef(name)) = iter.peek().cloned() {
        iter.next();
        symtab.insert(&name);
        // `.EQUATE`'s symbol is bound as a numeric constant by `parse_directive` below, not as
        // a location: binding it here too would latch the symbol `Multiple` (two `set_value`
        // calls) and leave it holding this line's address instead of the EQUATE's value.
        let is_equate = matches!(iter.peek(), Some(Token::DotCommand(d)) if d == "EQUATE");
        if !is_equate {
            symtab.set_value_by_name(&name, SymbolValue::Location(address));
        }
        symbol = Some(name);
    }

    let common = AsmCodeCommon { symbol: symbol.clone(), ..common_base };

    match iter.peek().cloned() {
        None => Ok(AsmCode::new(common, AsmCodeKind::Blank)),
        Some(Token::Comment(_)) => Ok(AsmCode::new(common, AsmCodeKind::CommentOnly)),
        Some(Token::DotCommand(name)) => {
            iter.next();
            parse_directive(&name, iter, line_no, common, symtab)
        }
        Some(Token::Identifier(mnemonic)) => {
            iter.next();
            parse_instruction(&mnemonic, iter, line_no, common)
        }
        Some(other) => Err(AsmError::syntactic(line_no, format!("unexpected token {:?} at start of line", other))),
    }
}

fn parse_instruction(
    mnemonic: &str,
    mut iter: std::iter::Peekable<std::vec::IntoIter<Token>>,
    line_no: usize,
    common: AsmCodeCommon,
) -> Result<AsmCode, AsmError> {
    let upper = mnemonic.to_ascii_uppercase();
    let spec = pep9_isa::lookup(&upper)
        .ok_or_else(|| AsmError::syntactic(line_no, format!("'{}' is not a Pep/9 mnemonic", mnemonic)))?;

    if spec.is_unary() {
        expect_end_of_operands(&mut iter, line_no)?;
        return Ok(AsmCode::new(
            common,
            AsmCodeKind::Unary { mnemonic: spec.mnemonic, opcode: spec.opcode_for(None).unwrap() },
        ));
    }

    let argument = parse_argument(&mut iter, line_no)?
        .ok_or_else(|| AsmError::syntactic(line_no, format!("'{}' requires an operand", mnemonic)))?;

    let mode = match iter.next() {
        Some(Token::AddrMode(text)) => {
            AddrMode::parse(&text).ok_or_else(|| AsmError::syntactic(line_no, format!("'{}' is not an addressing mode", text)))?
        }
        None => spec
            .default_mode()
            .ok_or_else(|| AsmError::syntactic(line_no, format!("'{}' requires an addressing mode", mnemonic)))?,
        Some(other) => return Err(AsmError::syntactic(line_no, format!("unexpected token {:?} after operand", other))),
    };
    expect_end_of_operands(&mut iter, line_no)?;

    if !spec.is_legal_mode(mode) {
        return Err(AsmError::semantic(
            line_no,
            format!("'{}' does not support addressing mode '{}'", mnemonic, mode.suffix()),
        ));
    }
    let opcode = spec.opcode_for(Some(mode)).unwrap();
    Ok(AsmCode::new(common, AsmCodeKind::NonUnary { mnemonic: spec.mnemonic, opcode, mode, argument }))
}

fn parse_directive(
    name: &str,
    mut iter: std::iter::Peekable<std::vec::IntoIter<Token>>,
    line_no: usize,
    common: AsmCodeCommon,
    symtab: &mut SymbolTable,
) -> Result<AsmCode, AsmError> {
    if NO_ARG_DIRECTIVES.contains(&name) {
        expect_end_of_operands(&mut iter, line_no)?;
        return Ok(AsmCode::new(common, AsmCodeKind::End));
    }

    let argument = parse_argument(&mut iter, line_no)?
        .ok_or_else(|| AsmError::syntactic(line_no, format!(".{} requires an argument", name)))?;
    expect_end_of_operands(&mut iter, line_no)?;

    let kind = match name {
        "ADDRSS" => {
            let symbol = argument
                .symbol_name()
                .ok_or_else(|| AsmError::semantic(line_no, ".ADDRSS requires a symbol argument"))?
                .to_string();
            AsmCodeKind::Addrss { symbol }
        }
        "ALIGN" => {
            let modulus = argument.unsigned_value();
            if modulus == 0 || (modulus & (modulus - 1)) != 0 {
                return Err(AsmError::semantic(line_no, ".ALIGN argument must be a power of two"));
            }
            let addr = u32::from(common.address);
            let padding = (modulus - (addr % modulus)) % modulus;
            AsmCodeKind::Align { modulus, padding }
        }
        "ASCII" => {
            let bytes = match argument {
                AsmArgument::StringLit(bytes) => bytes,
                _ => return Err(AsmError::semantic(line_no, ".ASCII requires a string literal")),
            };
            AsmCodeKind::Ascii { bytes }
        }
        "BLOCK" => AsmCodeKind::Block { count: argument.unsigned_value() },
        "BURN" => {
            let value = argument.unsigned_value();
            if value > 0xFFFF {
                return Err(AsmError::semantic(line_no, ".BURN address out of range"));
            }
            AsmCodeKind::Burn { address: value as u16 }
        }
        "BYTE" => {
            let value = argument.unsigned_value();
            if value > 0xFF {
                return Err(AsmError::semantic(line_no, ".BYTE argument must fit in one byte"));
            }
            AsmCodeKind::Byte { value: value as u8 }
        }
        "EQUATE" => {
            let sym = common
                .symbol
                .as_ref()
                .ok_or_else(|| AsmError::semantic(line_no, ".EQUATE requires an owning symbol"))?;
            symtab.set_value_by_name(sym, SymbolValue::Numeric(argument.value()));
            AsmCodeKind::Equate { argument }
        }
        "WORD" => AsmCodeKind::Word { argument },
        other => return Err(AsmError::syntactic(line_no, format!("unknown directive .{}", other))),
    };
    Ok(AsmCode::new(common, kind))
}

fn parse_argument(
    iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    line_no: usize,
) -> Result<Option<AsmArgument>, AsmError> {
    match iter.peek().cloned() {
        Some(Token::Decimal(v)) => {
            iter.next();
            Ok(Some(AsmArgument::Decimal(v)))
        }
        Some(Token::Hex(v)) => {
            iter.next();
            Ok(Some(AsmArgument::Hex(v)))
        }
        Some(Token::CharLit(c)) => {
            iter.next();
            Ok(Some(AsmArgument::Char(c)))
        }
        Some(Token::StringLit(bytes)) => {
            iter.next();
            Ok(Some(AsmArgument::StringLit(bytes)))
        }
        Some(Token::Identifier(name)) => {
            iter.next();
            Ok(Some(AsmArgument::Symbol(name)))
        }
        Some(Token::Comment(_)) | None => Ok(None),
        Some(other) => Err(AsmError::syntactic(line_no, format!("unexpected token {:?} where an argument was expected", other))),
    }
}

fn expect_end_of_operands(iter: &mut std::iter::Peekable<std::vec::IntoIter<Token>>, line_no: usize) -> Result<(), AsmError> {
    match iter.next() {
        None | Some(Token::Comment(_)) => Ok(()),
        Some(other) => Err(AsmError::syntactic(line_no, format!("unexpected trailing token {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unary_instruction() {
        let mut symtab = SymbolTable::new();
        let code = parse_line("ASLA", 1, 0, &mut symtab).unwrap();
        assert_eq!(code.kind, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A });
    }

    #[test]
    fn parses_nonunary_with_explicit_mode() {
        let mut symtab = SymbolTable::new();
        let code = parse_line("LDWA 5,i", 1, 0, &mut symtab).unwrap();
        match code.kind {
            AsmCodeKind::NonUnary { opcode, mode, .. } => {
                assert_eq!(opcode, 0xC0);
                assert_eq!(mode, AddrMode::Immediate);
            }
            _ => panic!("expected NonUnary"),
        }
    }

    #[test]
    fn branch_without_mode_defaults_to_immediate() {
        let mut symtab = SymbolTable::new();
        let code = parse_line("BR main", 1, 0, &mut symtab).unwrap();
        match code.kind {
            AsmCodeKind::NonUnary { mode, .. } => assert_eq!(mode, AddrMode::Immediate),
            _ => panic!("expected NonUnary"),
        }
    }

    #[test]
    fn store_with_immediate_mode_is_semantic_error() {
        let mut symtab = SymbolTable::new();
        let err = parse_line("STWA 5,i", 1, 0, &mut symtab).unwrap_err();
        assert!(matches!(err.kind, crate::error::AsmErrorKind::Semantic(_)));
    }

    #[test]
    fn symbol_definition_is_recorded_at_its_address() {
        let mut symtab = SymbolTable::new();
        let code = parse_line("main: ASLA", 5, 0x10, &mut symtab).unwrap();
        assert_eq!(code.common.symbol.as_deref(), Some("main"));
        assert_eq!(symtab.get_by_name("main").unwrap().value().as_i32(), 0x10);
    }

    #[test]
    fn equate_binds_its_label_immediately() {
        let mut symtab = SymbolTable::new();
        parse_line("five: .EQUATE 5", 1, 0, &mut symtab).unwrap();
        assert_eq!(symtab.get_by_name("five").unwrap().value().as_i32(), 5);
        // Exactly one `set_value` call: defined, not multiply-defined.
        assert!(!symtab.get_by_name("five").unwrap().is_multiply_defined());
    }

    #[test]
    fn bare_equate_with_no_label_is_a_semantic_error() {
        let mut symtab = SymbolTable::new();
        let err = parse_line(".EQUATE 5", 1, 0, &mut symtab).unwrap_err();
        assert!(matches!(err.kind, crate::error::AsmErrorKind::Semantic(_)));
    }

    #[test]
    fn align_computes_padding_to_next_multiple() {
        let mut symtab = SymbolTable::new();
        let code = parse_line(".ALIGN 4", 1, 2, &mut symtab).unwrap();
        assert_eq!(code.kind, AsmCodeKind::Align { modulus: 4, padding: 2 });
    }

    #[test]
    fn unknown_mnemonic_is_syntactic_error() {
        let mut symtab = SymbolTable::new();
        let err = parse_line("FROB", 1, 0, &mut symtab).unwrap_err();
        assert!(matches!(err.kind, crate::error::AsmErrorKind::Syntactic(_)));
    }
}
