//! Renders the `.ob`, `.ent` and `.ext` artifacts

use super::images::{DataImage, InstructionImage};
use super::second_pass::ExternalRef;
use super::symbols::{SymbolKind, SymbolTable};
use crate::assembler::LOAD_ADDRESS;

/// Render the object file: a `IC DC` count header, then one line per
/// memory word (`address word`, four-digit decimal and five-digit
/// octal), code image first, data image after it
pub fn render_object(code: &InstructionImage, data: &DataImage) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", code.len(), data.len()));

    let mut address = LOAD_ADDRESS;
    for &word in code.words().iter().chain(data.words()) {
        out.push_str(&format!("{:04} {:05o}\n", address, word));
        address += 1;
    }
    out
}

/// Render the entries file, one `name value` line per entry symbol in
/// definition order. `None` when no symbol is an entry
pub fn render_entries(symbols: &SymbolTable) -> Option<String> {
    let mut out = String::new();
    for symbol in symbols.iter() {
        if symbol.kind == SymbolKind::Entry {
            out.push_str(&format!("{} {}\n", symbol.name, symbol.value));
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Render the externals file, one `name address` line per reference in
/// source order. `None` when nothing external is referenced
pub fn render_externals(externals: &[ExternalRef]) -> Option<String> {
    if externals.is_empty() {
        return None;
    }
    let mut out = String::new();
    for reference in externals {
        out.push_str(&format!("{} {:04}\n", reference.name, reference.address));
    }
    Some(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assembler::symbols::SymbolTable;

    #[test]
    fn object_rows_are_zero_padded() {
        let mut code = InstructionImage::new();
        code.push(0o74004);
        let mut data = DataImage::new();
        data.push_int(6);

        assert_eq!(render_object(&code, &data), "1 1\n0100 74004\n0101 00006\n");
    }

    #[test]
    fn empty_images_render_only_the_header() {
        assert_eq!(
            render_object(&InstructionImage::new(), &DataImage::new()),
            "0 0\n"
        );
    }

    #[test]
    fn entries_only_for_entry_symbols() {
        let mut symbols = SymbolTable::new();
        symbols.insert("MAIN", 100, SymbolKind::Code);
        assert_eq!(render_entries(&symbols), None);

        symbols.mark_entry("MAIN").unwrap();
        assert_eq!(render_entries(&symbols), Some("MAIN 100\n".to_string()));
    }

    #[test]
    fn externals_render_in_reference_order() {
        assert_eq!(render_externals(&[]), None);

        let references = [
            ExternalRef {
                name: "X".to_string(),
                address: 101,
            },
            ExternalRef {
                name: "X".to_string(),
                address: 103,
            },
        ];
        assert_eq!(
            render_externals(&references),
            Some("X 0101\nX 0103\n".to_string())
        );
    }
}
