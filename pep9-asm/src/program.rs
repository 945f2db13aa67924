//! `AsmProgram`: a fully assembled program — its codes, symbol table, object code, and listing,
//! laid out at final addresses.

use crate::code::{AsmCode, AsmCodeKind};
use pep9_symtab::SymbolTable;
use std::collections::HashMap;

/// One of the OS's fixed-offset trap vectors, addressed relative to the burn (top-of-ROM) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryVector {
    UserStack,
    SystemStack,
    CharIn,
    CharOut,
    Loader,
    Trap,
}

impl MemoryVector {
    /// Byte offset below the burn value at which this vector's `.ADDRSS` line must sit.
    pub fn offset(self) -> u16 {
        match self {
            MemoryVector::UserStack => 11,
            MemoryVector::SystemStack => 9,
            MemoryVector::CharIn => 7,
            MemoryVector::CharOut => 5,
            MemoryVector::Loader => 3,
            MemoryVector::Trap => 1,
        }
    }
}

/// An assembled program, either the operating system or a user program loaded against one.
#[derive(Debug, Clone)]
pub struct AsmProgram {
    codes: Vec<AsmCode>,
    symbol_table: SymbolTable,
    /// `(first_address, last_address_exclusive)` this program occupies once relocated. The
    /// upper bound may legitimately equal `0x1_0000` (one past the last byte of the 64K address
    /// space), which does not fit in `u16`, hence `u32` here even though every individual line
    /// address does fit in `u16`.
    program_bounds: (u32, u32),
    burn_address: Option<u16>,
    index_to_address: Vec<u16>,
    address_to_index: HashMap<u16, usize>,
}

impl AsmProgram {
    pub fn new(codes: Vec<AsmCode>, symbol_table: SymbolTable, burn_address: Option<u16>) -> Self {
        let mut index_to_address = Vec::with_capacity(codes.len());
        let mut address_to_index = HashMap::new();
        for (i, code) in codes.iter().enumerate() {
            index_to_address.push(code.common.address);
            if code.object_code_len() > 0 {
                address_to_index.insert(code.common.address, i);
            }
        }
        let low = codes.first().map(|c| u32::from(c.common.address)).unwrap_or(0);
        let high = codes
            .iter()
            .map(|c| u32::from(c.common.address) + c.object_code_len())
            .max()
            .unwrap_or(low);
        AsmProgram {
            codes,
            symbol_table,
            program_bounds: (low, high),
            burn_address,
            index_to_address,
            address_to_index,
        }
    }

    pub fn codes(&self) -> &[AsmCode] {
        &self.codes
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn symbol_table_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbol_table
    }

    pub fn program_bounds(&self) -> (u32, u32) {
        self.program_bounds
    }

    pub fn program_byte_length(&self) -> u32 {
        self.program_bounds.1 - self.program_bounds.0
    }

    pub fn burn_address(&self) -> Option<u16> {
        self.burn_address
    }

    /// How many `.BURN` directives this program contains. Per §4.2's end-of-program checks, a
    /// user program must have zero and an operating system must have exactly one.
    pub fn burn_count(&self) -> usize {
        self.codes.iter().filter(|c| matches!(c.kind, AsmCodeKind::Burn { .. })).count()
    }

    /// The complete object code, each line resolved against this program's own symbol table.
    pub fn object_code(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for code in &self.codes {
            out.extend(code.emit_bytes(|name| {
                self.symbol_table
                    .get_by_name(name)
                    .map(|s| s.value().as_i32())
                    .unwrap_or(0)
            }));
        }
        out
    }

    /// The listing text: one row per source line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for code in &self.codes {
            let bytes = code.emit_bytes(|name| {
                self.symbol_table
                    .get_by_name(name)
                    .map(|s| s.value().as_i32())
                    .unwrap_or(0)
            });
            out.push_str(&code.listing_line(&bytes));
            out.push('\n');
        }
        out
    }

    /// The code occupying `address`, if any line's object code starts there.
    pub fn code_at_address(&self, address: u16) -> Option<&AsmCode> {
        self.address_to_index.get(&address).map(|&i| &self.codes[i])
    }

    /// Shift every line's address and every relocatable symbol by `delta`. Used to place an
    /// operating system so its last byte lands on its `.BURN` address.
    pub fn relocate(&mut self, delta: i32) {
        for code in &mut self.codes {
            let shifted = (i64::from(code.common.address) + i64::from(delta)) as u16;
            code.common.address = shifted;
        }
        self.symbol_table.apply_offset(delta);
        self.program_bounds.0 = (i64::from(self.program_bounds.0) + i64::from(delta)) as u32;
        self.program_bounds.1 = (i64::from(self.program_bounds.1) + i64::from(delta)) as u32;
        self.index_to_address = self.codes.iter().map(|c| c.common.address).collect();
        self.address_to_index = self
            .codes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.object_code_len() > 0)
            .map(|(i, c)| (c.common.address, i))
            .collect();
    }

    /// Clear `emit_object_code` on every line positioned (pre-relocation) before the `.BURN`
    /// directive's own line. Per §4.2: "Lines whose address precedes the burn suppress
    /// object-code emission." A no-op for a program with no `.BURN` line, or one where `.BURN`
    /// is the very first directive. Must run before [`AsmProgram::relocate`].
    pub fn suppress_before_burn(&mut self) {
        let Some(burn_line_addr) = self
            .codes
            .iter()
            .find(|c| matches!(c.kind, AsmCodeKind::Burn { .. }))
            .map(|c| c.common.address)
        else {
            return;
        };
        for code in &mut self.codes {
            if code.common.address < burn_line_addr {
                code.common.emit_object_code = false;
            }
        }
    }

    /// Flip every `.ALIGN` that appears before the `.BURN` directive so it realigns downward
    /// from a fixed end address instead of upward from its start, per §4.2's OS-relocation walk:
    /// starting at the (already relocated) `.BURN` line and walking toward the front of the
    /// program, each line is shifted by the cumulative byte-growth of `.ALIGN`s seen so far, and
    /// each `.ALIGN`'s own padding is recomputed so its end address is unchanged but its start is
    /// the nearest multiple of its modulus at or below that end. Must run after
    /// [`AsmProgram::relocate`].
    pub fn flip_aligns_before_burn(&mut self) {
        let Some(burn_idx) = self.codes.iter().position(|c| matches!(c.kind, AsmCodeKind::Burn { .. })) else {
            return;
        };
        let mut rolling_offset: i64 = 0;
        for idx in (1..=burn_idx).rev() {
            let shifted = (i64::from(self.codes[idx].common.address) + rolling_offset) as u16;
            self.codes[idx].common.address = shifted;

            if let AsmCodeKind::Align { modulus, padding } = &mut self.codes[idx].kind {
                let modulus = i64::from(*modulus);
                let start = i64::from(shifted);
                let end = start + i64::from(*padding);
                let block_start = end - end.rem_euclid(modulus);
                *padding = (end - block_start) as u32;
                rolling_offset += start - block_start;
                self.codes[idx].common.address = block_start as u16;
            }

            if let Some(name) = self.codes[idx].common.symbol.clone() {
                let final_addr = self.codes[idx].common.address;
                self.symbol_table.relocate_location(&name, final_addr);
            }
        }
        self.reindex_addresses();
    }

    fn reindex_addresses(&mut self) {
        self.index_to_address = self.codes.iter().map(|c| c.common.address).collect();
        self.address_to_index = self
            .codes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.object_code_len() > 0)
            .map(|(i, c)| (c.common.address, i))
            .collect();
        let low = self.codes.first().map(|c| u32::from(c.common.address)).unwrap_or(0);
        let high = self
            .codes
            .iter()
            .map(|c| u32::from(c.common.address) + c.object_code_len())
            .max()
            .unwrap_or(low);
        self.program_bounds = (low, high);
    }

    /// Look up an `.ADDRSS`-style OS trap vector by the symbol it names, e.g. `"charIn"`.
    pub fn addrss_vector(&self, symbol: &str) -> Option<u16> {
        self.symbol_table.get_by_name(symbol).and_then(|s| match s.value() {
            pep9_symtab::SymbolValue::Location(addr) => Some(addr),
            _ => None,
        })
    }

    /// Resolve one of the OS's fixed-offset memory vectors (§6 "OS vector lookup"). The burn
    /// value is the top-of-ROM address; `vector.offset()` bytes below it must hold a `.ADDRSS`
    /// directive, whose symbolic operand's value is the vector's value. Anything else —
    /// including a burn-less program — is malformed and returns the sentinel `0xDEAD`.
    pub fn memory_vector(&self, vector: MemoryVector) -> u16 {
        const MALFORMED: u16 = 0xDEAD;
        let Some(burn) = self.burn_address else { return MALFORMED };
        let actual = burn.wrapping_sub(vector.offset());
        match self.code_at_address(actual) {
            Some(AsmCode { kind: AsmCodeKind::Addrss { symbol }, .. }) => {
                self.addrss_vector(symbol).unwrap_or(MALFORMED)
            }
            _ => MALFORMED,
        }
    }

    /// Every `.BLOCK`/`.BYTE`/`.WORD` line carrying the given trace-tag symbol, used by the CPU's
    /// stack/heap trace model to pair an allocation with its type descriptor.
    pub fn lines_with_symbol<'a>(&'a self) -> impl Iterator<Item = &'a AsmCode> + 'a {
        self.codes.iter().filter(|c| c.common.symbol.is_some())
    }

    pub fn is_end_marked(&self) -> bool {
        self.codes.iter().any(|c| matches!(c.kind, AsmCodeKind::End))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::AsmCodeCommon;

    fn code(addr: u16, kind: AsmCodeKind) -> AsmCode {
        AsmCode::new(
            AsmCodeCommon {
                line_no: 1,
                address: addr,
                symbol: None,
                source_text: String::new(),
                comment: None,
                emit_object_code: true,
            },
            kind,
        )
    }

    #[test]
    fn program_bounds_span_first_to_past_last_byte() {
        let codes = vec![
            code(0x10, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A }),
            code(0x11, AsmCodeKind::Block { count: 4 }),
        ];
        let program = AsmProgram::new(codes, SymbolTable::new(), None);
        assert_eq!(program.program_bounds(), (0x10, 0x15));
        assert_eq!(program.program_byte_length(), 5);
    }

    #[test]
    fn relocate_shifts_addresses_and_bounds() {
        let codes = vec![code(0x00, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A })];
        let mut program = AsmProgram::new(codes, SymbolTable::new(), None);
        program.relocate(0x100);
        assert_eq!(program.program_bounds(), (0x100, 0x101));
        assert_eq!(program.codes()[0].common.address, 0x100);
    }

    #[test]
    fn memory_vector_resolves_a_fixed_offset_addrss_line() {
        let src = ".BURN 0xFFFF\ntarget: .BLOCK 2\n.ADDRSS target\n.BLOCK 4\n.END\n";
        let outcome = crate::assembler::assemble(src, None).unwrap();
        assert_eq!(outcome.program.memory_vector(MemoryVector::CharOut), 0xFFF8);
    }

    #[test]
    fn burn_suppresses_preamble_and_flips_align_before_it() {
        let src = "pre: .BYTE 1\n.ALIGN 4\n.BURN 0xFFFF\nreal: .BLOCK 2\n.END\n";
        let outcome = crate::assembler::assemble(src, None).unwrap();
        // The preamble (before `.BURN`) contributes no bytes to the object image...
        assert_eq!(outcome.program.object_code(), vec![0x00, 0x00]);
        // ...but `real`, which comes after `.BURN`, still lands right at the burn address.
        assert_eq!(
            outcome.program.symbol_table().get_by_name("real").unwrap().value().as_i32(),
            0xFFFE
        );
    }

    #[test]
    fn memory_vector_is_the_dead_sentinel_when_malformed() {
        let src = "ASLA\n.BURN 0xFFFF\n.END\n";
        let outcome = crate::assembler::assemble(src, None).unwrap();
        assert_eq!(outcome.program.memory_vector(MemoryVector::Trap), 0xDEAD);
    }

    #[test]
    fn memory_vector_is_the_dead_sentinel_without_a_burn_address() {
        let codes = vec![code(0x00, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A })];
        let program = AsmProgram::new(codes, SymbolTable::new(), None);
        assert_eq!(program.memory_vector(MemoryVector::UserStack), 0xDEAD);
    }

    #[test]
    fn code_at_address_finds_byte_producing_lines_only() {
        let codes = vec![
            code(0x00, AsmCodeKind::Blank),
            code(0x00, AsmCodeKind::Unary { mnemonic: "ASLA", opcode: 0x0A }),
        ];
        let program = AsmProgram::new(codes, SymbolTable::new(), None);
        assert!(program.code_at_address(0x00).is_some());
        assert!(program.code_at_address(0x01).is_none());
    }
}
