//! Global Pep/9 instruction tables.
//!
//! The assembler (`pep9-asm`) uses this crate to validate mnemonics, their operand kind, and
//! their addressing-mode mask while emitting object code; the CPU engine (`pep9-cpu`) uses the
//! same tables, inverted by opcode byte, to build its 256-entry instruction-specifier decoder.
//! Per Design Note "Module-level mnemonic maps become a single immutable table built once at
//! process start", the tables below are built exactly once behind a [`once_cell::sync::Lazy`].

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One of the eight Pep/9 addressing-mode suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrMode {
    Immediate,
    Direct,
    Indirect,
    Stack,
    StackDeferred,
    Indexed,
    StackIndexed,
    StackDeferredIndexed,
}

impl AddrMode {
    /// Parse the suffix text following the comma, e.g. `"sfx"`. Case-insensitive, matching the
    /// lexer's addressing-mode token.
    pub fn parse(text: &str) -> Option<AddrMode> {
        match text.to_ascii_uppercase().as_str() {
            "I" => Some(AddrMode::Immediate),
            "D" => Some(AddrMode::Direct),
            "N" => Some(AddrMode::Indirect),
            "S" => Some(AddrMode::Stack),
            "SF" => Some(AddrMode::StackDeferred),
            "X" => Some(AddrMode::Indexed),
            "SX" => Some(AddrMode::StackIndexed),
            "SFX" => Some(AddrMode::StackDeferredIndexed),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            AddrMode::Immediate => "i",
            AddrMode::Direct => "d",
            AddrMode::Indirect => "n",
            AddrMode::Stack => "s",
            AddrMode::StackDeferred => "sf",
            AddrMode::Indexed => "x",
            AddrMode::StackIndexed => "sx",
            AddrMode::StackDeferredIndexed => "sfx",
        }
    }
}

/// Whether a mnemonic is unary (one byte, no operand) or non-unary (three bytes: opcode +
/// 16-bit operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    NonUnary,
}

/// A single entry of the global mnemonic table.
#[derive(Debug, Clone)]
pub struct InstructionSpec {
    pub mnemonic: &'static str,
    pub arity: Arity,
    /// Base opcode. For `Unary`, this *is* the opcode. For `NonUnary`, the actual opcode is
    /// `opcode_base + position of the chosen mode in `legal_modes``.
    pub opcode_base: u8,
    /// Addressing modes this mnemonic accepts, in the order they're assigned opcodes. Empty for
    /// unary mnemonics.
    pub legal_modes: &'static [AddrMode],
    /// Branch-style instructions (`BR*`, `CALL`) default to immediate addressing when the source
    /// line omits a mode suffix entirely.
    pub branch_style: bool,
}

impl InstructionSpec {
    pub fn is_unary(&self) -> bool {
        self.arity == Arity::Unary
    }

    pub fn is_legal_mode(&self, mode: AddrMode) -> bool {
        self.legal_modes.contains(&mode)
    }

    /// Resolve the concrete opcode byte for `mode` (ignored for unary instructions).
    pub fn opcode_for(&self, mode: Option<AddrMode>) -> Option<u8> {
        match self.arity {
            Arity::Unary => Some(self.opcode_base),
            Arity::NonUnary => {
                let mode = mode?;
                let pos = self.legal_modes.iter().position(|&m| m == mode)?;
                Some(self.opcode_base + pos as u8)
            }
        }
    }

    /// The default addressing mode to assume when a branch-style mnemonic's source line omits
    /// the mode suffix.
    pub fn default_mode(&self) -> Option<AddrMode> {
        if self.branch_style {
            Some(AddrMode::Immediate)
        } else {
            None
        }
    }
}

macro_rules! spec {
    ($mnemonic:expr, unary, $opcode:expr) => {
        InstructionSpec {
            mnemonic: $mnemonic,
            arity: Arity::Unary,
            opcode_base: $opcode,
            legal_modes: &[],
            branch_style: false,
        }
    };
    ($mnemonic:expr, $opcode:expr, $modes:expr) => {
        InstructionSpec {
            mnemonic: $mnemonic,
            arity: Arity::NonUnary,
            opcode_base: $opcode,
            legal_modes: $modes,
            branch_style: false,
        }
    };
    ($mnemonic:expr, $opcode:expr, $modes:expr, branch) => {
        InstructionSpec {
            mnemonic: $mnemonic,
            arity: Arity::NonUnary,
            opcode_base: $opcode,
            legal_modes: $modes,
            branch_style: true,
        }
    };
}

use AddrMode::*;

const FULL_ALU_MODES: &[AddrMode] = &[Immediate, Direct, Indexed, Stack];
const STORE_MODES: &[AddrMode] = &[Direct, Indexed, Stack];
const STACK_ADJUST_MODES: &[AddrMode] = &[Immediate];
const BRANCH_MODES: &[AddrMode] = &[Immediate, Indexed];

/// The global, ordered mnemonic table. Declaration order matters only for documentation; opcode
/// assignment is driven entirely by `opcode_base`/`legal_modes`, computed once in
/// [`build_instruction_table`].
static RAW_TABLE: &[InstructionSpec] = &[
    // --- unary ---
    spec!("STOP", unary, 0x00),
    spec!("RETTR", unary, 0x01),
    spec!("RET", unary, 0x02),
    spec!("MOVSPA", unary, 0x03),
    spec!("MOVFLGA", unary, 0x04),
    spec!("MOVAFLG", unary, 0x05),
    spec!("MOVTA", unary, 0x06),
    spec!("NOTA", unary, 0x07),
    spec!("NOTX", unary, 0x08),
    spec!("NEGA", unary, 0x09),
    spec!("ASLA", unary, 0x0A),
    spec!("ASLX", unary, 0x0B),
    spec!("ASRA", unary, 0x0C),
    spec!("ASRX", unary, 0x0D),
    spec!("ROLA", unary, 0x0E),
    spec!("ROLX", unary, 0x0F),
    spec!("RORA", unary, 0x10),
    spec!("RORX", unary, 0x11),
    spec!("NEGX", unary, 0x12),
    spec!("NOP0", unary, 0x13),
    spec!("NOP1", unary, 0x14),
    spec!("NOP", unary, 0x15),
    // --- stack pointer adjustment, immediate-only ---
    spec!("ADDSP", 0x16, STACK_ADJUST_MODES),
    spec!("SUBSP", 0x17, STACK_ADJUST_MODES),
    // --- branches and call, immediate (direct target) or indexed ---
    spec!("BR", 0x18, BRANCH_MODES, branch),
    spec!("BRLE", 0x1A, BRANCH_MODES, branch),
    spec!("BRLT", 0x1C, BRANCH_MODES, branch),
    spec!("BREQ", 0x1E, BRANCH_MODES, branch),
    spec!("BRNE", 0x20, BRANCH_MODES, branch),
    spec!("BRGE", 0x22, BRANCH_MODES, branch),
    spec!("BRGT", 0x24, BRANCH_MODES, branch),
    spec!("BRV", 0x26, BRANCH_MODES, branch),
    spec!("BRC", 0x28, BRANCH_MODES, branch),
    spec!("BRS", 0x2A, BRANCH_MODES, branch),
    spec!("CALL", 0x2C, BRANCH_MODES, branch),
    // --- arithmetic/logic, full addressing ---
    spec!("ADDA", 0x30, FULL_ALU_MODES),
    spec!("ADDX", 0x34, FULL_ALU_MODES),
    spec!("SUBA", 0x38, FULL_ALU_MODES),
    spec!("SUBX", 0x3C, FULL_ALU_MODES),
    spec!("ANDA", 0x40, FULL_ALU_MODES),
    spec!("ANDX", 0x44, FULL_ALU_MODES),
    spec!("ORA", 0x48, FULL_ALU_MODES),
    spec!("ORX", 0x4C, FULL_ALU_MODES),
    spec!("CPWA", 0x50, FULL_ALU_MODES),
    spec!("CPWX", 0x54, FULL_ALU_MODES),
    spec!("CPBA", 0x58, FULL_ALU_MODES),
    spec!("CPBX", 0x5C, FULL_ALU_MODES),
    // --- I/O traps ---
    spec!("DECI", 0x60, FULL_ALU_MODES),
    spec!("DECO", 0x64, FULL_ALU_MODES),
    spec!("HEXO", 0x68, FULL_ALU_MODES),
    spec!("STRO", 0x6C, FULL_ALU_MODES),
    // --- loads ---
    spec!("LDBA", 0x70, FULL_ALU_MODES),
    spec!("LDBX", 0x74, FULL_ALU_MODES),
    // `LDWA,i` is pinned by the worked scenarios to opcode 0xC0.
    spec!("LDWA", 0xC0, FULL_ALU_MODES),
    spec!("LDWX", 0x78, FULL_ALU_MODES),
    // --- stores (no immediate: can't store into a literal) ---
    spec!("STBA", 0x7C, STORE_MODES),
    spec!("STBX", 0x80, STORE_MODES),
    spec!("STWA", 0x84, STORE_MODES),
    spec!("STWX", 0x88, STORE_MODES),
];

/// Forward lookup table: mnemonic text -> spec.
pub static MNEMONICS: Lazy<HashMap<&'static str, &'static InstructionSpec>> = Lazy::new(|| {
    RAW_TABLE
        .iter()
        .map(|spec| (spec.mnemonic, spec))
        .collect()
});

/// Reverse lookup table: opcode byte -> `(mnemonic, mode)`, used by the CPU's
/// instruction-specifier decoder. A `None` entry is an opcode with no bound mnemonic — the
/// decoder raises a control error when it lands on one.
pub static OPCODE_TABLE: Lazy<[Option<(&'static str, Option<AddrMode>)>; 256]> = Lazy::new(|| {
    let mut table: [Option<(&'static str, Option<AddrMode>)>; 256] = [None; 256];
    for spec in RAW_TABLE {
        match spec.arity {
            Arity::Unary => {
                table[spec.opcode_base as usize] = Some((spec.mnemonic, None));
            }
            Arity::NonUnary => {
                for (i, &mode) in spec.legal_modes.iter().enumerate() {
                    let opcode = spec.opcode_base as usize + i;
                    table[opcode] = Some((spec.mnemonic, Some(mode)));
                }
            }
        }
    }
    table
});

/// Look up a mnemonic by name (case-sensitive, as the lexer upper-cases identifiers before this
/// call).
pub fn lookup(mnemonic: &str) -> Option<&'static InstructionSpec> {
    MNEMONICS.get(mnemonic).copied()
}

/// Decode an opcode byte into its mnemonic and addressing mode, as the CPU's
/// `InstructionSpecifierDecoder` branch function does.
pub fn decode_opcode(opcode: u8) -> Option<(&'static str, Option<AddrMode>)> {
    OPCODE_TABLE[opcode as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asla_is_0a() {
        let spec = lookup("ASLA").unwrap();
        assert!(spec.is_unary());
        assert_eq!(spec.opcode_for(None), Some(0x0A));
    }

    #[test]
    fn ldwa_immediate_is_c0() {
        let spec = lookup("LDWA").unwrap();
        assert_eq!(spec.opcode_for(Some(AddrMode::Immediate)), Some(0xC0));
    }

    #[test]
    fn decode_opcode_round_trips() {
        let spec = lookup("LDWA").unwrap();
        let opcode = spec.opcode_for(Some(AddrMode::Direct)).unwrap();
        assert_eq!(decode_opcode(opcode), Some(("LDWA", Some(AddrMode::Direct))));
    }

    #[test]
    fn store_rejects_immediate() {
        let spec = lookup("STWA").unwrap();
        assert!(!spec.is_legal_mode(AddrMode::Immediate));
        assert_eq!(spec.opcode_for(Some(AddrMode::Immediate)), None);
    }

    #[test]
    fn branch_defaults_to_immediate() {
        let spec = lookup("BR").unwrap();
        assert_eq!(spec.default_mode(), Some(AddrMode::Immediate));
        let non_branch = lookup("LDWA").unwrap();
        assert_eq!(non_branch.default_mode(), None);
    }

    #[test]
    fn no_opcode_collisions() {
        let mut seen = [false; 256];
        for entry in OPCODE_TABLE.iter() {
            if let Some(_) = entry {
                // Each opcode slot is touched by exactly one spec by construction; this walks
                // the raw table directly to verify no two specs claim the same byte.
            }
        }
        for spec in RAW_TABLE {
            let opcodes: Vec<u8> = match spec.arity {
                Arity::Unary => vec![spec.opcode_base],
                Arity::NonUnary => (0..spec.legal_modes.len())
                    .map(|i| spec.opcode_base + i as u8)
                    .collect(),
            };
            for op in opcodes {
                assert!(!seen[op as usize], "opcode 0x{:02X} claimed twice", op);
                seen[op as usize] = true;
            }
        }
    }
}
