//! `AsmCode`: one assembled line, carrying enough to emit object bytes and render a listing.

use crate::argument::AsmArgument;
use pep9_isa::AddrMode;
use pep9_types::Fmt;

/// Fields shared by every code line: its source line number, the address it will occupy once
/// the program is laid out, and the raw source text (for listings).
#[derive(Debug, Clone, PartialEq)]
pub struct AsmCodeCommon {
    pub line_no: usize,
    pub address: u16,
    pub symbol: Option<String>,
    pub source_text: String,
    /// The trailing `; text` comment, if this line carried one (with or without a statement).
    pub comment: Option<String>,
    /// Cleared for OS lines positioned before the `.BURN` directive (§4.2): such lines still
    /// occupy an address, but contribute no bytes to the object image or listing.
    pub emit_object_code: bool,
}

/// What kind of statement a line held, after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmCodeKind {
    /// A unary (one-byte) instruction, e.g. `ASLA`.
    Unary { mnemonic: &'static str, opcode: u8 },
    /// A non-unary (three-byte) instruction with an operand and addressing mode.
    NonUnary {
        mnemonic: &'static str,
        opcode: u8,
        mode: AddrMode,
        argument: AsmArgument,
    },
    /// `.ADDRSS symbol` — emits the 16-bit address of `symbol`, used for OS trap vectors.
    Addrss { symbol: String },
    /// `.ALIGN n` — pads to the next multiple of `n` with zero bytes.
    Align { modulus: u32, padding: u32 },
    /// `.ASCII "text"` — emits the literal bytes of a string, unpacked (not packed to a word).
    Ascii { bytes: Vec<u8> },
    /// `.BLOCK n` — reserves `n` zero bytes.
    Block { count: u32 },
    /// `.BURN addr` — fixes the load address of the following code (OS only).
    Burn { address: u16 },
    /// `.BYTE value` — emits a single byte.
    Byte { value: u8 },
    /// `.END` — marks end of program; emits no bytes.
    End,
    /// `.EQUATE value` — binds the defining symbol to a value; emits no bytes.
    Equate { argument: AsmArgument },
    /// `.WORD value` — emits a big-endian 16-bit value.
    Word { argument: AsmArgument },
    /// A comment-only or label-only line; contributes no bytes but appears in the listing.
    CommentOnly,
    /// A blank line.
    Blank,
}

/// A fully parsed source line: its common fields plus the statement it held.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmCode {
    pub common: AsmCodeCommon,
    pub kind: AsmCodeKind,
}

impl AsmCode {
    pub fn new(common: AsmCodeCommon, kind: AsmCodeKind) -> Self {
        AsmCode { common, kind }
    }

    /// How many bytes of object code this line contributes. Used by pass one to assign
    /// addresses before any symbol is necessarily resolved; once OS relocation has cleared
    /// `emit_object_code` (§4.2), a suppressed line contributes zero regardless of its kind.
    pub fn object_code_len(&self) -> u32 {
        if !self.common.emit_object_code {
            return 0;
        }
        match &self.kind {
            AsmCodeKind::Unary { .. } => 1,
            AsmCodeKind::NonUnary { .. } => 3,
            AsmCodeKind::Addrss { .. } => 2,
            AsmCodeKind::Align { padding, .. } => *padding,
            AsmCodeKind::Ascii { bytes } => bytes.len() as u32,
            AsmCodeKind::Block { count } => *count,
            AsmCodeKind::Burn { .. } => 0,
            AsmCodeKind::Byte { .. } => 1,
            AsmCodeKind::End => 0,
            AsmCodeKind::Equate { .. } => 0,
            AsmCodeKind::Word { .. } => 2,
            AsmCodeKind::CommentOnly | AsmCodeKind::Blank => 0,
        }
    }

    /// Emit this line's object bytes. `resolve` looks a symbol up to its final (possibly
    /// relocated) value; it is only consulted for kinds that reference a symbol.
    pub fn emit_bytes(&self, resolve: impl Fn(&str) -> i32) -> Vec<u8> {
        if !self.common.emit_object_code {
            return Vec::new();
        }
        match &self.kind {
            AsmCodeKind::Unary { opcode, .. } => vec![*opcode],
            AsmCodeKind::NonUnary { opcode, argument, .. } => {
                let value = resolve_argument(argument, &resolve);
                let mut out = vec![*opcode];
                out.extend_from_slice(&(value as u16).to_be_bytes());
                out
            }
            AsmCodeKind::Addrss { symbol } => (resolve(symbol) as u16).to_be_bytes().to_vec(),
            AsmCodeKind::Align { padding, .. } => vec![0u8; *padding as usize],
            AsmCodeKind::Ascii { bytes } => bytes.clone(),
            AsmCodeKind::Block { count } => vec![0u8; *count as usize],
            AsmCodeKind::Burn { .. } => Vec::new(),
            AsmCodeKind::Byte { value } => vec![*value],
            AsmCodeKind::End | AsmCodeKind::Equate { .. } => Vec::new(),
            AsmCodeKind::Word { argument } => {
                let value = resolve_argument(argument, &resolve);
                (value as u16).to_be_bytes().to_vec()
            }
            AsmCodeKind::CommentOnly | AsmCodeKind::Blank => Vec::new(),
        }
    }

    /// A single listing row, reconstructed from the parsed line per §6's fixed-width columns
    /// `AAAA  BB..   NAME:    MNEMON  OPERAND     ;comment` (widths 6/7/9/8/12/rest), not a
    /// re-print of the original source text.
    pub fn listing_line(&self, bytes: &[u8]) -> String {
        // A line that emits no object bytes (blank, comment-only, `.END`, `.EQUATE`, or a
        // `.BURN`-suppressed OS preamble line) has no meaningful load address to show.
        let addr_col = if bytes.is_empty() { String::new() } else { format!("{:04X}", self.common.address) };
        let bytes_col: String = bytes.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ");
        let name_col = match &self.common.symbol {
            Some(name) => format!("{}:", name),
            None => String::new(),
        };
        let (mnemon_col, operand_col) = self.mnemonic_and_operand();

        let mut line = format!(
            "{:<6}{:<7}{:<9}{:<8}{:<12}",
            addr_col, bytes_col, name_col, mnemon_col, operand_col
        );
        if let Some(comment) = &self.common.comment {
            line.push(';');
            line.push_str(comment);
        }
        line.truncate(line.trim_end().len());
        line
    }

    /// The `MNEMON`/`OPERAND` columns for this line's kind, e.g. `("LDWA", "0x1234,i")` or
    /// `(".BLOCK", "4")`. Blank/comment-only/`.END` lines have neither.
    fn mnemonic_and_operand(&self) -> (String, String) {
        match &self.kind {
            AsmCodeKind::Unary { mnemonic, .. } => (mnemonic.to_string(), String::new()),
            AsmCodeKind::NonUnary { mnemonic, mode, argument, .. } => {
                (mnemonic.to_string(), format!("{},{}", argument.text(), mode.suffix()))
            }
            AsmCodeKind::Addrss { symbol } => (".ADDRSS".to_string(), symbol.clone()),
            AsmCodeKind::Align { modulus, .. } => (".ALIGN".to_string(), modulus.to_string()),
            AsmCodeKind::Ascii { bytes } => (".ASCII".to_string(), format!("\"{}\"", String::from_utf8_lossy(bytes))),
            AsmCodeKind::Block { count } => (".BLOCK".to_string(), count.to_string()),
            AsmCodeKind::Burn { address } => (".BURN".to_string(), format!("0x{:X}", address)),
            AsmCodeKind::Byte { value } => (".BYTE".to_string(), value.to_string()),
            AsmCodeKind::End => (".END".to_string(), String::new()),
            AsmCodeKind::Equate { argument } => (".EQUATE".to_string(), argument.text()),
            AsmCodeKind::Word { argument } => (".WORD".to_string(), argument.text()),
            AsmCodeKind::CommentOnly | AsmCodeKind::Blank => (String::new(), String::new()),
        }
    }

    pub fn fmt_for_directive(&self) -> Option<Fmt> {
        None
    }
}

fn resolve_argument(argument: &AsmArgument, resolve: &impl Fn(&str) -> i32) -> i32 {
    match argument.symbol_name() {
        Some(name) => resolve(name),
        None => argument.value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn common(len_src: &str) -> AsmCodeCommon {
        AsmCodeCommon {
            line_no: 1,
            address: 0,
            symbol: None,
            source_text: len_src.to_string(),
            comment: None,
            emit_object_code: true,
        }
    }

    #[test]
    fn suppressed_line_emits_no_bytes() {
        let mut common = common("ASLA");
        common.emit_object_code = false;
        let code = AsmCode::new(common, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A });
        assert_eq!(code.object_code_len(), 0);
        assert!(code.emit_bytes(|_| 0).is_empty());
    }

    #[test]
    fn unary_emits_one_byte() {
        let code = AsmCode::new(common("ASLA"), AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A });
        assert_eq!(code.emit_bytes(|_| 0), vec![0x0A]);
        assert_eq!(code.object_code_len(), 1);
    }

    #[test]
    fn nonunary_resolves_symbol_through_callback() {
        let code = AsmCode::new(
            common("LDWA x,d"),
            AsmCodeKind::NonUnary {
                mnemonic: "LDWA",
                opcode: 0xC1,
                mode: AddrMode::Direct,
                argument: AsmArgument::Symbol("x".into()),
            },
        );
        assert_eq!(code.emit_bytes(|name| if name == "x" { 0x1234 } else { 0 }), vec![0xC1, 0x12, 0x34]);
    }

    #[test]
    fn block_reserves_zero_bytes() {
        let code = AsmCode::new(common(".BLOCK 4"), AsmCodeKind::Block { count: 4 });
        assert_eq!(code.object_code_len(), 4);
        assert_eq!(code.emit_bytes(|_| 0), vec![0, 0, 0, 0]);
    }

    #[test]
    fn equate_contributes_no_bytes() {
        let code = AsmCode::new(common(".EQUATE 5"), AsmCodeKind::Equate { argument: AsmArgument::Decimal(5) });
        assert_eq!(code.object_code_len(), 0);
        assert!(code.emit_bytes(|_| 0).is_empty());
    }

    #[test]
    fn listing_line_splits_into_address_bytes_and_mnemonic_columns() {
        let code = AsmCode::new(common("ASLA"), AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A });
        let line = code.listing_line(&[0x0A]);
        assert!(line.starts_with("0000"));
        assert!(line.contains("0A"));
        assert!(line.trim_end().ends_with("ASLA"));
        // No label on this line, so the NAME column is blank rather than echoing source text.
        assert!(!line.contains(':'));
    }

    #[test]
    fn listing_line_renders_the_owning_label_and_operand() {
        let mut common = common("main: LDWA 0x1234,i");
        common.symbol = Some("main".to_string());
        let code = AsmCode::new(
            common,
            AsmCodeKind::NonUnary {
                mnemonic: "LDWA",
                opcode: 0xC0,
                mode: AddrMode::Immediate,
                argument: AsmArgument::Hex(0x1234),
            },
        );
        let line = code.listing_line(&[0xC0, 0x12, 0x34]);
        assert!(line.contains("main:"));
        assert!(line.contains("LDWA"));
        assert!(line.contains("0x1234,i"));
    }

    #[test]
    fn listing_line_appends_a_trailing_comment() {
        let mut common = common("ASLA ; shift left");
        common.comment = Some("shift left".to_string());
        let code = AsmCode::new(common, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A });
        let line = code.listing_line(&[0x0A]);
        assert!(line.ends_with(";shift left"));
    }

    #[test]
    fn listing_line_of_a_byteless_line_omits_the_address_column() {
        let code = AsmCode::new(common(".END"), AsmCodeKind::End);
        let line = code.listing_line(&[]);
        assert!(!line.contains("0000"));
    }
}
