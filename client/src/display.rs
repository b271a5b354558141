//! Text rendering of menus and chat lines

use shared::MenuEntry;
use std::io::{self, Write};

/// Prints a menu with options numbered from 1. Disabled entries are listed
/// without a number.
pub fn render_menu<W: Write>(
    out: &mut W,
    title: &str,
    entries: &[MenuEntry],
    has_parent: bool,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "== {} ==", title)?;

    if entries.is_empty() {
        writeln!(out, "   (empty)")?;
    }

    for (index, entry) in entries.iter().enumerate() {
        if entry.disabled {
            writeln!(out, "   - {}", entry.label)?;
        } else {
            writeln!(out, "{:>2}. {}", index + 1, entry.label)?;
        }
    }

    if has_parent {
        writeln!(out, " b. Back")?;
    }
    writeln!(out, " q. Close")?;
    out.flush()
}

pub fn render_chat<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "[chat] {}", text)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(entries: &[MenuEntry], has_parent: bool) -> String {
        let mut out = Vec::new();
        render_menu(&mut out, "Servers: AWP", entries, has_parent).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_numbered_entries() {
        let text = rendered(
            &[MenuEntry::new("AWP #1 (3/10)"), MenuEntry::new("AWP #2 (Offline)")],
            true,
        );

        assert!(text.contains("== Servers: AWP =="));
        assert!(text.contains(" 1. AWP #1 (3/10)"));
        assert!(text.contains(" 2. AWP #2 (Offline)"));
        assert!(text.contains(" b. Back"));
        assert!(text.contains(" q. Close"));
    }

    #[test]
    fn test_render_disabled_entries_unnumbered() {
        let text = rendered(&[MenuEntry::disabled("alice | 12 | 01:35")], false);

        assert!(text.contains("   - alice | 12 | 01:35"));
        assert!(!text.contains(" 1."));
        assert!(!text.contains("Back"));
    }

    #[test]
    fn test_render_empty_menu() {
        let text = rendered(&[], true);
        assert!(text.contains("(empty)"));
    }

    #[test]
    fn test_render_chat() {
        let mut out = Vec::new();
        render_chat(&mut out, "AWP #1 is currently offline.").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[chat] AWP #1 is currently offline.\n"
        );
    }
}
