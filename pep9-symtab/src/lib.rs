//! The symbol table shared by the ISA assembler (`pep9-asm`) and the microcode assembler
//! (`pep9-micro`).
//!
//! A [`Symbol`] starts life `Undefined` the moment a name is first mentioned (either as a
//! forward reference or as a label). The first [`SymbolTable::set_value`] call on it moves it to
//! `Single`; any further call latches it `Multiple` — from then on the symbol is permanently
//! poisoned, matching the original `SymbolEntry` state machine (`SINGLE, MULTIPLE, UNDEFINED`).

use pep9_entity::{entity_impl, EntityRef, PrimaryMap};
use std::collections::HashMap;
use std::fmt;

/// A reference to a [`Symbol`] inside a [`SymbolTable`].
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);
entity_impl!(SymbolId, "sym");

/// What a symbol currently denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue {
    /// The symbol has never been assigned a value.
    Empty,
    /// A plain numeric constant, e.g. from `.EQUATE`. Does not participate in relocation.
    Numeric(i32),
    /// A relocatable byte address, e.g. a code label. Shifts by `applyOffset`'s delta.
    Location(u16),
}

impl SymbolValue {
    /// The value as a plain integer, the way listings and trace tags want to render it.
    pub fn as_i32(self) -> i32 {
        match self {
            SymbolValue::Empty => 0,
            SymbolValue::Numeric(v) => v,
            SymbolValue::Location(v) => i32::from(v),
        }
    }
}

/// The defined-ness of a [`Symbol`], following the original `DefStates` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolState {
    Undefined,
    Single,
    Multiple,
}

/// One entry of a [`SymbolTable`].
#[derive(Debug, Clone)]
pub struct Symbol {
    id: SymbolId,
    name: String,
    value: SymbolValue,
    state: SymbolState,
}

impl Symbol {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> SymbolValue {
        self.value
    }

    pub fn state(&self) -> SymbolState {
        self.state
    }

    pub fn is_defined(&self) -> bool {
        self.state != SymbolState::Undefined
    }

    pub fn is_undefined(&self) -> bool {
        self.state == SymbolState::Undefined
    }

    pub fn is_multiply_defined(&self) -> bool {
        self.state == SymbolState::Multiple
    }

    /// Does this symbol's value shift under [`SymbolTable::apply_offset`]?
    pub fn is_relocatable(&self) -> bool {
        matches!(self.value, SymbolValue::Location(_))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Mapping from name and from id to [`Symbol`], kept consistent with each other.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: PrimaryMap<SymbolId, Symbol>,
    by_name: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: PrimaryMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Insert `name`, creating an `Undefined`/`Empty` entry if this is the first mention.
    /// Re-inserting an existing name is not itself an error — it returns the existing id.
    pub fn insert(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.symbols.push(Symbol {
            id: SymbolId::new(0), // patched below
            name: name.to_string(),
            value: SymbolValue::Empty,
            state: SymbolState::Undefined,
        });
        self.symbols[id].id = id;
        self.by_name.insert(name.to_string(), id);
        log::trace!("symtab: inserted `{}` as {}", name, id);
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).and_then(|&id| self.symbols.get(id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Assign `value` to the symbol `id`. First call moves `Undefined -> Single`; any later
    /// call moves `Single|Multiple -> Multiple` and the new value is discarded (the original
    /// single value is kept, as a multiply-defined symbol's value is meaningless).
    pub fn set_value(&mut self, id: SymbolId, value: SymbolValue) {
        let sym = match self.symbols.get_mut(id) {
            Some(s) => s,
            None => return,
        };
        match sym.state {
            SymbolState::Undefined => {
                sym.value = value;
                sym.state = SymbolState::Single;
            }
            SymbolState::Single => {
                log::debug!("symtab: `{}` redefined, marking multiply-defined", sym.name);
                sym.state = SymbolState::Multiple;
            }
            SymbolState::Multiple => {}
        }
    }

    pub fn set_value_by_name(&mut self, name: &str, value: SymbolValue) -> SymbolId {
        let id = self.insert(name);
        self.set_value(id, value);
        id
    }

    /// Add `delta` to every location-typed symbol's value. Used to relocate an operating system
    /// so that its last byte lands exactly on the burn address.
    pub fn apply_offset(&mut self, delta: i32) {
        for sym in self.symbols.values_mut() {
            if let SymbolValue::Location(v) = sym.value {
                let shifted = (i64::from(v) + i64::from(delta)) as u16;
                sym.value = SymbolValue::Location(shifted);
            }
        }
    }

    /// Overwrite a location symbol's value directly, bypassing the single/multiple state
    /// machine. Used only by OS relocation (`apply_offset`'s per-line counterpart for the
    /// `.ALIGN`-before-`.BURN` flip in `pep9_asm::AsmProgram`), never by ordinary assembly — a
    /// user redefining a symbol must still latch `Multiple` through [`SymbolTable::set_value`].
    pub fn relocate_location(&mut self, name: &str, new_address: u16) {
        if let Some(&id) = self.by_name.get(name) {
            if let Some(sym) = self.symbols.get_mut(id) {
                if matches!(sym.value, SymbolValue::Location(_)) {
                    sym.value = SymbolValue::Location(new_address);
                }
            }
        }
    }

    pub fn undefined_count(&self) -> usize {
        self.symbols
            .values()
            .filter(|s| s.state == SymbolState::Undefined)
            .count()
    }

    pub fn multiply_defined_count(&self) -> usize {
        self.symbols
            .values()
            .filter(|s| s.state == SymbolState::Multiple)
            .count()
    }

    /// Iterate over every symbol in insertion order (the order listings render them in).
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Resolve `name` in `self` by copying the value from `source` if `self` doesn't already
    /// define it. Used to resolve `charIn`/`charOut` from the loaded operating system's symbol
    /// table rather than by inspecting memory directly.
    pub fn copy_value_from(&mut self, name: &str, source: &SymbolTable) -> bool {
        if let Some(existing) = self.get_by_name(name) {
            if existing.is_defined() {
                return true;
            }
        }
        if let Some(src_sym) = source.get_by_name(name) {
            if src_sym.is_defined() {
                let value = src_sym.value();
                self.set_value_by_name(name, value);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut t = SymbolTable::new();
        let a = t.insert("foo");
        let b = t.insert("foo");
        assert_eq!(a, b);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn first_set_value_is_single() {
        let mut t = SymbolTable::new();
        let id = t.insert("foo");
        t.set_value(id, SymbolValue::Numeric(5));
        let sym = t.get(id).unwrap();
        assert_eq!(sym.state(), SymbolState::Single);
        assert_eq!(sym.value(), SymbolValue::Numeric(5));
    }

    #[test]
    fn second_set_value_latches_multiple() {
        let mut t = SymbolTable::new();
        let id = t.insert("foo");
        t.set_value(id, SymbolValue::Numeric(5));
        t.set_value(id, SymbolValue::Numeric(6));
        let sym = t.get(id).unwrap();
        assert_eq!(sym.state(), SymbolState::Multiple);
        // The original single value is retained, not clobbered.
        assert_eq!(sym.value(), SymbolValue::Numeric(5));
        assert_eq!(t.multiply_defined_count(), 1);
    }

    #[test]
    fn never_assigned_is_undefined() {
        let mut t = SymbolTable::new();
        t.insert("foo");
        assert_eq!(t.undefined_count(), 1);
    }

    #[test]
    fn apply_offset_only_shifts_locations() {
        let mut t = SymbolTable::new();
        let loc = t.insert("label");
        t.set_value(loc, SymbolValue::Location(0x10));
        let num = t.insert("CONST");
        t.set_value(num, SymbolValue::Numeric(42));

        t.apply_offset(0x100);

        assert_eq!(t.get(loc).unwrap().value(), SymbolValue::Location(0x110));
        assert_eq!(t.get(num).unwrap().value(), SymbolValue::Numeric(42));
    }

    #[test]
    fn relocate_location_overwrites_without_latching_multiple() {
        let mut t = SymbolTable::new();
        let loc = t.insert("label");
        t.set_value(loc, SymbolValue::Location(0x10));
        t.relocate_location("label", 0x20);
        let sym = t.get(loc).unwrap();
        assert_eq!(sym.value(), SymbolValue::Location(0x20));
        assert_eq!(sym.state(), SymbolState::Single);
    }

    #[test]
    fn relocate_location_leaves_numeric_symbols_untouched() {
        let mut t = SymbolTable::new();
        let num = t.insert("CONST");
        t.set_value(num, SymbolValue::Numeric(5));
        t.relocate_location("CONST", 0x20);
        assert_eq!(t.get(num).unwrap().value(), SymbolValue::Numeric(5));
    }

    #[test]
    fn copy_value_from_os_resolves_char_ports() {
        let mut os = SymbolTable::new();
        os.set_value_by_name("charIn", SymbolValue::Location(0xFC15));

        let mut user = SymbolTable::new();
        user.insert("charIn");
        assert!(user.copy_value_from("charIn", &os));
        assert_eq!(
            user.get_by_name("charIn").unwrap().value(),
            SymbolValue::Location(0xFC15)
        );
    }
}
