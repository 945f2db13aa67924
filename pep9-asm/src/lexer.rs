//! Tokenizer for a single line of Pep/9 assembly source.
//!
//! The grammar is line-oriented: every statement fits on one line, so the lexer is run once per
//! line and handed its tokens as a `Vec<Token>` rather than as a lazy stream over the whole file.

use crate::error::AsmError;

/// One lexical unit within a source line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An identifier, optionally followed immediately by `:` marking a symbol definition.
    Identifier(String),
    /// The same, but spelled with a trailing `:` — defines a symbol at this line's address.
    SymbolDef(String),
    /// A dot-command keyword, e.g. `.WORD`, `.BLOCK`, spelled without the dot.
    DotCommand(String),
    /// An addressing-mode suffix following a comma, e.g. `,X` or `,SFX`.
    AddrMode(String),
    /// A signed decimal literal.
    Decimal(i32),
    /// A `0x…` literal.
    Hex(u32),
    /// A single-quoted character literal, already escape-processed.
    CharLit(u8),
    /// A double-quoted string literal, already escape-processed.
    StringLit(Vec<u8>),
    /// `;` through end of line, text with the leading `;` stripped.
    Comment(String),
}

/// Tokenize one line of source. `line_no` is 1-based, used only to tag diagnostics.
pub fn tokenize(line: &str, line_no: usize) -> Result<Vec<Token>, AsmError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == ',' {
            // Addressing-mode suffix: consume letters until a non-letter.
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && chars[j].is_ascii_alphabetic() {
                j += 1;
            }
            if j == start {
                return Err(AsmError::lexical(line_no, "expected addressing mode after ','"));
            }
            let text: String = chars[start..j].iter().collect();
            tokens.push(Token::AddrMode(text));
            i = j;
            continue;
        }
        if c == ';' {
            let text: String = chars[i + 1..].iter().collect();
            tokens.push(Token::Comment(text.trim_start().to_string()));
            break;
        }
        if c == '\'' {
            let (byte, next) = read_char_literal(&chars, i + 1, line_no)?;
            tokens.push(Token::CharLit(byte));
            i = next;
            continue;
        }
        if c == '"' {
            let (bytes, next) = read_string_literal(&chars, i + 1, line_no)?;
            tokens.push(Token::StringLit(bytes));
            i = next;
            continue;
        }
        if c == '.' {
            let start = i + 1;
            let mut j = start;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            if j == start {
                return Err(AsmError::lexical(line_no, "expected identifier after '.'"));
            }
            let text: String = chars[start..j].iter().collect();
            tokens.push(Token::DotCommand(text.to_ascii_uppercase()));
            i = j;
            continue;
        }
        if c == '-' || c.is_ascii_digit() {
            // 0x… hex has priority over decimal.
            if c == '0' && chars.get(i + 1).map(|c| c.to_ascii_lowercase()) == Some('x') {
                let start = i + 2;
                let mut j = start;
                while j < chars.len() && chars[j].is_ascii_hexdigit() {
                    j += 1;
                }
                if j == start {
                    return Err(AsmError::lexical(line_no, "expected hex digits after '0x'"));
                }
                let text: String = chars[start..j].iter().collect();
                let value = u32::from_str_radix(&text, 16)
                    .map_err(|_| AsmError::lexical(line_no, "malformed hex literal"))?;
                tokens.push(Token::Hex(value));
                i = j;
                continue;
            }
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            let text: String = chars[start..j].iter().collect();
            let value: i32 = text
                .parse()
                .map_err(|_| AsmError::lexical(line_no, format!("malformed decimal literal '{}'", text)))?;
            tokens.push(Token::Decimal(value));
            i = j;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let text: String = chars[start..j].iter().collect();
            if chars.get(j) == Some(&':') {
                tokens.push(Token::SymbolDef(text));
                i = j + 1;
            } else {
                tokens.push(Token::Identifier(text));
                i = j;
            }
            continue;
        }
        return Err(AsmError::lexical(line_no, format!("unrecognized character '{}'", c)));
    }

    Ok(tokens)
}

fn read_char_literal(chars: &[char], start: usize, line_no: usize) -> Result<(u8, usize), AsmError> {
    let (byte, next) = read_escaped_byte(chars, start, line_no)?;
    if chars.get(next) != Some(&'\'') {
        return Err(AsmError::lexical(line_no, "unterminated character literal"));
    }
    Ok((byte, next + 1))
}

fn read_string_literal(chars: &[char], start: usize, line_no: usize) -> Result<(Vec<u8>, usize), AsmError> {
    let mut bytes = Vec::new();
    let mut i = start;
    loop {
        match chars.get(i) {
            None => return Err(AsmError::lexical(line_no, "unterminated string literal")),
            Some('"') => return Ok((bytes, i + 1)),
            _ => {
                let (byte, next) = read_escaped_byte(chars, i, line_no)?;
                bytes.push(byte);
                i = next;
            }
        }
    }
}

/// Read one (possibly-escaped) byte starting at `i`. Supports the Pep/9 escape set
/// `\b \f \n \r \t \v \" \' \\` plus `\xNN` hex escapes.
fn read_escaped_byte(chars: &[char], i: usize, line_no: usize) -> Result<(u8, usize), AsmError> {
    match chars.get(i) {
        None => Err(AsmError::lexical(line_no, "unexpected end of line in literal")),
        Some('\\') => match chars.get(i + 1) {
            Some('b') => Ok((0x08, i + 2)),
            Some('f') => Ok((0x0C, i + 2)),
            Some('n') => Ok((b'\n', i + 2)),
            Some('r') => Ok((b'\r', i + 2)),
            Some('t') => Ok((b'\t', i + 2)),
            Some('v') => Ok((0x0B, i + 2)),
            Some('"') => Ok((b'"', i + 2)),
            Some('\'') => Ok((b'\'', i + 2)),
            Some('\\') => Ok((b'\\', i + 2)),
            Some('x') | Some('X') => {
                let hex: String = chars.iter().skip(i + 2).take(2).collect();
                if hex.len() != 2 {
                    return Err(AsmError::lexical(line_no, "expected two hex digits after \\x"));
                }
                let value = u8::from_str_radix(&hex, 16)
                    .map_err(|_| AsmError::lexical(line_no, "malformed \\x escape"))?;
                Ok((value, i + 4))
            }
            Some(other) => Err(AsmError::lexical(line_no, format!("unknown escape '\\{}'", other))),
            None => Err(AsmError::lexical(line_no, "unterminated escape sequence")),
        },
        Some(c) => {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf);
            if encoded.len() != 1 {
                return Err(AsmError::lexical(line_no, "non-ASCII character in literal"));
            }
            Ok((encoded.as_bytes()[0], i + 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_mnemonic_with_mode() {
        let toks = tokenize("LDWA x,i", 1).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Identifier("LDWA".into()),
                Token::Identifier("x".into()),
                Token::AddrMode("i".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_symbol_definition() {
        let toks = tokenize("main: BR main", 1).unwrap();
        assert_eq!(toks[0], Token::SymbolDef("main".into()));
    }

    #[test]
    fn tokenizes_dot_command_and_hex() {
        let toks = tokenize(".WORD 0xFACE", 1).unwrap();
        assert_eq!(toks[0], Token::DotCommand("WORD".into()));
        assert_eq!(toks[1], Token::Hex(0xFACE));
    }

    #[test]
    fn tokenizes_char_literal_with_escape() {
        let toks = tokenize("'\\n'", 1).unwrap();
        assert_eq!(toks[0], Token::CharLit(b'\n'));
    }

    #[test]
    fn tokenizes_string_literal_with_hex_escape() {
        let toks = tokenize("\"\\x41B\"", 1).unwrap();
        assert_eq!(toks[0], Token::StringLit(vec![b'A', b'B']));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let toks = tokenize("NOP ; trailing note", 1).unwrap();
        assert_eq!(toks[1], Token::Comment("trailing note".into()));
    }

    #[test]
    fn rejects_dangling_comma() {
        assert!(tokenize("LDWA x,", 1).is_err());
    }

    #[test]
    fn negative_decimal_is_one_token() {
        let toks = tokenize("-12", 1).unwrap();
        assert_eq!(toks[0], Token::Decimal(-12));
    }
}
