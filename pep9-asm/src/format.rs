//! Object-code text and symbol-table listing rendering, per §6's external-interface formats.
//!
//! These are kept separate from [`crate::program`]'s per-line `listing_line` (which renders one
//! source line) because both the object-code sentinel framing and the symbol-table footer are
//! whole-program concerns that only make sense once every line has been laid out.

use crate::program::AsmProgram;

/// Render `bytes` as the object-code text format: ASCII hex pairs separated by spaces, 16 per
/// line, terminated by the sentinel `zz` on its own trailing line.
pub fn object_code_text(bytes: &[u8]) -> String {
    let mut out = String::new();
    for chunk in bytes.chunks(16) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out.push_str("zz\n");
    out
}

/// Render the trailing `Symbol table` section of a listing, two columns wide, per §6.
pub fn symbol_table_listing(program: &AsmProgram) -> String {
    let mut names: Vec<(&str, i32)> = program
        .symbol_table()
        .iter()
        .map(|sym| (sym.name(), sym.value().as_i32()))
        .collect();
    names.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    out.push_str("Symbol table\n");
    out.push_str("--------------------------------------\n");
    out.push_str("Symbol    Value        Symbol    Value\n");
    out.push_str("--------------------------------------\n");
    for pair in names.chunks(2) {
        let left = pair[0];
        let left_col = format!("{:<10}{:<13}", left.0, format!("{:04X}", left.1 as u16));
        let right_col = match pair.get(1) {
            Some(right) => format!("{:<10}{:04X}", right.0, right.1 as u16),
            None => String::new(),
        };
        out.push_str(left_col.trim_end());
        if !right_col.is_empty() {
            out.push_str("   ");
            out.push_str(&right_col);
        }
        out.push('\n');
    }
    out.push_str("--------------------------------------\n");
    out
}

/// The full listing: per-line rows followed by the symbol-table footer, matching what the
/// original toolchain writes to a program's `.lst` file.
pub fn full_listing(program: &AsmProgram) -> String {
    let mut out = program.listing();
    out.push('\n');
    out.push_str(&symbol_table_listing(program));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_object_code_gets_one_line_plus_sentinel() {
        let text = object_code_text(&[0x0A]);
        assert_eq!(text, "0A\nzz\n");
    }

    #[test]
    fn seventeen_bytes_wrap_to_a_second_line() {
        let bytes = vec![0xFFu8; 17];
        let text = object_code_text(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3); // 16 bytes, 1 byte, zz
        assert_eq!(lines[2], "zz");
    }

    #[test]
    fn symbol_table_listing_has_required_banner_lines() {
        use crate::assemble;
        let outcome = assemble("num: .EQUATE 5\nDECI num,d\n.END\n", None).unwrap();
        let listing = symbol_table_listing(&outcome.program);
        assert!(listing.starts_with("Symbol table\n"));
        assert!(listing.contains("num"));
    }
}
