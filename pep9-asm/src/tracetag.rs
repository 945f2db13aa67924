//! Trace-tag comments: `#1d`, `#2h`, `#1c`, or `#ident` annotations that tell the symbolic
//! debugger how to interpret the bytes a `.BLOCK`/`.BYTE`/`.WORD` line reserves.
//!
//! Resolution happens in two passes of its own, nested inside the assembler's own two passes:
//! a trace tag may name a struct symbol (`#point`) whose own member layout is only known once
//! every `.EQUATE`/type alias in the program has been seen, so tag resolution runs to a fixed
//! point after symbol values have settled.

use pep9_types::{Fmt, TypeTag};
use std::collections::HashMap;

/// A trace tag as written in a comment, before being resolved against the type table.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceTag {
    /// `#1d`, `#2h`, `#1c` — a primitive format applied to the line's own reserved bytes.
    Format(Fmt),
    /// `#1d3a` — an array of `3` elements, each in the given format.
    Array(Fmt, u32),
    /// `#point` — a reference to a previously defined structure symbol.
    StructRef(String),
}

/// Parse the text following `#` in a trace-tag comment, e.g. `"1d"`, `"2h4a"`, `"point"`.
pub fn parse(text: &str) -> Option<TraceTag> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let first = text.chars().next().unwrap();
    if first.is_ascii_digit() {
        let digit_end = text.find(|c: char| !c.is_ascii_digit())?;
        let (size_str, rest) = text.split_at(digit_end);
        let size: u32 = size_str.parse().ok()?;
        let fmt_char = rest.chars().next()?;
        let fmt = match (size, fmt_char.to_ascii_lowercase()) {
            (1, 'c') => Fmt::OneByteChar,
            (1, 'd') => Fmt::OneByteDec,
            (1, 'h') => Fmt::OneByteHex,
            (2, 'd') => Fmt::TwoByteDec,
            (2, 'h') => Fmt::TwoByteHex,
            _ => return None,
        };
        let after_fmt = &rest[1..];
        if after_fmt.is_empty() {
            return Some(TraceTag::Format(fmt));
        }
        if let Some(stripped) = after_fmt.strip_suffix('a') {
            let count: u32 = stripped.parse().ok()?;
            return Some(TraceTag::Array(fmt, count));
        }
        return None;
    }
    if first.is_ascii_alphabetic() || first == '_' {
        return Some(TraceTag::StructRef(text.to_string()));
    }
    None
}

/// The size in bytes a trace tag implies, once struct references are resolved against `structs`.
pub fn resolved_size(tag: &TraceTag, structs: &HashMap<String, TypeTag>) -> Option<u32> {
    match tag {
        TraceTag::Format(fmt) => Some(fmt.size()),
        TraceTag::Array(fmt, count) => Some(fmt.size() * count),
        TraceTag::StructRef(name) => structs.get(name).map(TypeTag::size),
    }
}

/// Resolve every struct-ref tag to a concrete `TypeTag`, iterating until no entry changes.
/// Mirrors the way the original fixed-point dependency resolution between structure trace tags
/// and preceding `#` definitions is described: struct tags may reference other struct tags
/// defined earlier in the program, so a single linear pass is not always sufficient.
pub fn resolve_to_fixed_point(
    raw: &HashMap<String, TraceTag>,
    structs: &mut HashMap<String, TypeTag>,
) -> Vec<String> {
    let mut unresolved: Vec<String> = raw.keys().cloned().collect();
    loop {
        let before = unresolved.len();
        unresolved.retain(|name| {
            let tag = &raw[name];
            match resolved_size(tag, structs) {
                Some(_) if !structs.contains_key(name) => {
                    if let TraceTag::StructRef(target) = tag {
                        if let Some(resolved) = structs.get(target).cloned() {
                            structs.insert(name.clone(), resolved);
                            return false;
                        }
                        return true;
                    }
                    false
                }
                Some(_) => false,
                None => true,
            }
        });
        if unresolved.len() == before {
            break;
        }
    }
    unresolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_format() {
        assert_eq!(parse("1d"), Some(TraceTag::Format(Fmt::OneByteDec)));
        assert_eq!(parse("2h"), Some(TraceTag::Format(Fmt::TwoByteHex)));
    }

    #[test]
    fn parses_array_tag() {
        assert_eq!(parse("1d3a"), Some(TraceTag::Array(Fmt::OneByteDec, 3)));
    }

    #[test]
    fn parses_struct_reference() {
        assert_eq!(parse("point"), Some(TraceTag::StructRef("point".into())));
    }

    #[test]
    fn rejects_unknown_format_letter() {
        assert_eq!(parse("1z"), None);
    }

    #[test]
    fn resolves_struct_ref_after_its_target_is_known() {
        let mut raw = HashMap::new();
        raw.insert("p".to_string(), TraceTag::StructRef("point".to_string()));
        let mut structs = HashMap::new();
        structs.insert(
            "point".to_string(),
            TypeTag::Struct { symbol: "point".to_string(), members: vec![TypeTag::LiteralPrimitive { fmt: Fmt::TwoByteDec }] },
        );
        let unresolved = resolve_to_fixed_point(&raw, &mut structs);
        assert!(unresolved.is_empty());
        assert!(structs.contains_key("p"));
    }
}
