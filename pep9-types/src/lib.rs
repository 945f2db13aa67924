//! Trace-tag type descriptors.
//!
//! A `#fmt` (and optional `<n>a`) comment attached to a `.BLOCK`/`.BYTE`/`.WORD`/`ADDSP`/`SUBSP`
//! line tells the assembler how to symbolically render the memory it allocates: as a single
//! primitive, a fixed-length array of primitives, or a struct with named members. These
//! descriptors carry no runtime behavior of their own — they are read by the CPU's stack/heap
//! trace model (`pep9-cpu::trace`) to label frames as they come and go.

use std::fmt;

/// The format code that follows the `#` in a trace tag, e.g. `#2h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fmt {
    /// `1c`: one byte, rendered as a character.
    OneByteChar,
    /// `1d`: one byte, rendered as signed decimal.
    OneByteDec,
    /// `1h`: one byte, rendered as hex.
    OneByteHex,
    /// `2d`: two bytes, rendered as signed decimal.
    TwoByteDec,
    /// `2h`: two bytes, rendered as hex.
    TwoByteHex,
}

impl Fmt {
    /// Parse the format token that appears after `#`, e.g. `"2h"`.
    pub fn parse(text: &str) -> Option<Fmt> {
        match text {
            "1c" => Some(Fmt::OneByteChar),
            "1d" => Some(Fmt::OneByteDec),
            "1h" => Some(Fmt::OneByteHex),
            "2d" => Some(Fmt::TwoByteDec),
            "2h" => Some(Fmt::TwoByteHex),
            _ => None,
        }
    }

    /// Size in bytes of one value of this format.
    pub fn size(self) -> u32 {
        match self {
            Fmt::OneByteChar | Fmt::OneByteDec | Fmt::OneByteHex => 1,
            Fmt::TwoByteDec | Fmt::TwoByteHex => 2,
        }
    }
}

impl fmt::Display for Fmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Fmt::OneByteChar => "1c",
            Fmt::OneByteDec => "1d",
            Fmt::OneByteHex => "1h",
            Fmt::TwoByteDec => "2d",
            Fmt::TwoByteHex => "2h",
        };
        write!(f, "{}", s)
    }
}

/// A type descriptor attached to an allocation, either named (bound to a symbol that owns a
/// `.BLOCK`/`.BYTE`/`.WORD`/`SUBSP` frame) or anonymous/"literal" (a stack-effect annotation that
/// names no symbol, just a shape).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeTag {
    /// A single scalar of `fmt`, owned by `symbol`.
    Primitive { symbol: String, fmt: Fmt },
    /// A fixed-length run of `fmt` scalars, owned by `symbol`.
    Array { symbol: String, fmt: Fmt, len: u32 },
    /// A composite of named members, owned by `symbol`. Members may be any `TypeTag` variant
    /// except another unresolved struct reference; arrays of structs are not representable.
    Struct {
        symbol: String,
        members: Vec<TypeTag>,
    },
    /// An anonymous scalar, used in `ADDSP`/`SUBSP`/`CALL malloc` stack-effect annotations that
    /// don't bind a symbol.
    LiteralPrimitive { fmt: Fmt },
    /// An anonymous fixed-length array, same use as `LiteralPrimitive`.
    LiteralArray { fmt: Fmt, len: u32 },
}

impl TypeTag {
    /// Total size in bytes this descriptor contributes to a stack frame or allocation.
    pub fn size(&self) -> u32 {
        match self {
            TypeTag::Primitive { fmt, .. } | TypeTag::LiteralPrimitive { fmt } => fmt.size(),
            TypeTag::Array { fmt, len, .. } | TypeTag::LiteralArray { fmt, len } => {
                fmt.size() * len
            }
            TypeTag::Struct { members, .. } => members.iter().map(TypeTag::size).sum(),
        }
    }

    /// The symbol name this descriptor is attached to, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            TypeTag::Primitive { symbol, .. }
            | TypeTag::Array { symbol, .. }
            | TypeTag::Struct { symbol, .. } => Some(symbol),
            TypeTag::LiteralPrimitive { .. } | TypeTag::LiteralArray { .. } => None,
        }
    }
}

/// Sum the sizes of a list of trace tags, the way `ADDSP`/`SUBSP` byte-mismatch checks do.
pub fn total_size<'a>(tags: impl IntoIterator<Item = &'a TypeTag>) -> u32 {
    tags.into_iter().map(TypeTag::size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_parses_all_codes() {
        assert_eq!(Fmt::parse("1c"), Some(Fmt::OneByteChar));
        assert_eq!(Fmt::parse("2h"), Some(Fmt::TwoByteHex));
        assert_eq!(Fmt::parse("3x"), None);
    }

    #[test]
    fn array_size_multiplies() {
        let t = TypeTag::Array {
            symbol: "buf".into(),
            fmt: Fmt::TwoByteDec,
            len: 4,
        };
        assert_eq!(t.size(), 8);
    }

    #[test]
    fn struct_size_sums_members() {
        let t = TypeTag::Struct {
            symbol: "point".into(),
            members: vec![
                TypeTag::Primitive {
                    symbol: "x".into(),
                    fmt: Fmt::TwoByteDec,
                },
                TypeTag::Primitive {
                    symbol: "y".into(),
                    fmt: Fmt::TwoByteDec,
                },
            ],
        };
        assert_eq!(t.size(), 4);
    }

    #[test]
    fn total_size_sums_a_tag_list() {
        let tags = vec![
            TypeTag::LiteralPrimitive { fmt: Fmt::OneByteDec },
            TypeTag::LiteralArray { fmt: Fmt::TwoByteHex, len: 3 },
        ];
        assert_eq!(total_size(&tags), 1 + 6);
    }
}
