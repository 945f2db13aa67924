//! Tokenizer for a single line of microcode source.

use crate::error::MicroError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Comma,
    LBracket,
    RBracket,
    Equals,
    Semicolon,
    /// A `0x…` literal, carrying the number of hex digits actually spelled out so a `Mem[addr]=`
    /// spec clause can tell a one-byte assertion (`0xNN`) from a two-byte one (`0xNNNN`).
    Hex { value: u32, digits: u8 },
    Decimal(i32),
    /// A bare word, e.g. a signal name, a clock name, a branch keyword, or a label reference.
    Identifier(String),
    /// The same, but spelled with a trailing `:` at the start of a line — defines this line's
    /// symbol.
    SymbolDef(String),
    /// `UnitPre:` / `UnitPost:` — must appear as the first token of the line.
    UnitBanner(UnitBanner),
    Comment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitBanner {
    Pre,
    Post,
}

pub fn tokenize(line: &str, line_no: usize) -> Result<Vec<Token>, MicroError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            let text: String = chars[i + 2..].iter().collect();
            tokens.push(Token::Comment(text.trim_start().to_string()));
            break;
        }
        match c {
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
                continue;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
                continue;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
                continue;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
                continue;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
                continue;
            }
            _ => {}
        }
        if c.is_ascii_digit() {
            if c == '0' && chars.get(i + 1).map(|c| c.to_ascii_lowercase()) == Some('x') {
                let start = i + 2;
                let mut j = start;
                while j < chars.len() && chars[j].is_ascii_hexdigit() {
                    j += 1;
                }
                if j == start {
                    return Err(MicroError::lexical(line_no, "expected hex digits after '0x'"));
                }
                let text: String = chars[start..j].iter().collect();
                let value = u32::from_str_radix(&text, 16)
                    .map_err(|_| MicroError::lexical(line_no, "malformed hex literal"))?;
                tokens.push(Token::Hex { value, digits: text.len() as u8 });
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
                .map_err(|_| MicroError::lexical(line_no, format!("malformed decimal literal '{}'", text)))?;
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
                if text == "UnitPre" {
                    tokens.push(Token::UnitBanner(UnitBanner::Pre));
                } else if text == "UnitPost" {
                    tokens.push(Token::UnitBanner(UnitBanner::Post));
                } else {
                    tokens.push(Token::SymbolDef(text));
                }
                i = j + 1;
            } else {
                tokens.push(Token::Identifier(text));
                i = j;
            }
            continue;
        }
        return Err(MicroError::lexical(line_no, format!("unrecognized character '{}'", c)));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_signal_assignment() {
        let toks = tokenize("A=3, B=1; LoadCk", 1).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Identifier("A".into()),
                Token::Equals,
                Token::Decimal(3),
                Token::Comma,
                Token::Identifier("B".into()),
                Token::Equals,
                Token::Decimal(1),
                Token::Semicolon,
                Token::Identifier("LoadCk".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_unit_pre_banner() {
        let toks = tokenize("UnitPre: Mem[0x0010]=0xFF", 1).unwrap();
        assert_eq!(toks[0], Token::UnitBanner(UnitBanner::Pre));
        assert_eq!(toks[1], Token::Identifier("Mem".into()));
        assert_eq!(toks[2], Token::LBracket);
    }

    #[test]
    fn tokenizes_goto_with_label() {
        let toks = tokenize("foo: A=1; LoadCk goto bar", 1).unwrap();
        assert_eq!(toks[0], Token::SymbolDef("foo".into()));
        assert!(toks.iter().any(|t| *t == Token::Identifier("goto".into())));
        assert!(toks.iter().any(|t| *t == Token::Identifier("bar".into())));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let toks = tokenize("stop // done", 1).unwrap();
        assert_eq!(toks[1], Token::Comment("done".into()));
    }
}
