// dump.rs — Plain-text character dumps (*.jcd).

use crate::character::{Character, CharacterField, WeaponSlot};
use crate::error::Result;
use std::fmt::Write as _;
use std::path::Path;

pub const DUMP_EXTENSION: &str = "jcd";

/// Filter string for the save dialog (pairs of NUL-separated entries).
pub const DUMP_FILTER: &str = "JABIA Character Dump (*.jcd)\0*.jcd\0All Files (*.*)\0*.*\0\0";

/// Render a character as `label = value` lines.
pub fn render(c: &Character) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# JABIA character dump");
    let _ = writeln!(out, "address = {:08X}", c.address());

    let slot = WeaponSlot::default();
    for field in CharacterField::ALL {
        if field == CharacterField::Address || field.per_slot() {
            continue;
        }
        let _ = writeln!(out, "{} = {}", field.label(), c.display(field, slot));
    }

    for slot in WeaponSlot::all() {
        let _ = writeln!(out, "\n[inventory {}]", slot);
        for field in CharacterField::ALL.iter().filter(|f| f.per_slot()) {
            let _ = writeln!(out, "{} = {}", field.label(), c.display(*field, slot));
        }
    }
    out
}

/// Write the dump of `c` to `path`, adding the .jcd extension if there is none.
pub fn write_dump(path: &Path, c: &Character) -> Result<std::path::PathBuf> {
    let path = if path.extension().is_none() {
        path.with_extension(DUMP_EXTENSION)
    } else {
        path.to_path_buf()
    };
    std::fs::write(&path, render(c))?;
    log::info!("dumped {} to {}", c.name(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::tests::{sample, REC};

    #[test]
    fn test_render_lists_fields_and_slots() {
        let mem = sample();
        let c = Character::read(&mem, REC).unwrap();
        let text = render(&c);
        assert!(text.starts_with("# JABIA character dump\naddress = 0A000000\n"));
        assert!(text.contains("Name = Ivan\n"));
        assert!(text.contains("Experience = 1250\n"));
        assert!(text.contains("Health = 87.3\n"));
        assert_eq!(text.matches("[inventory ").count(), 3);
        let slot2 = text.split("[inventory 2]").nth(1).unwrap();
        assert!(slot2.contains("Inventory ammo = 30"));
    }

    #[test]
    fn test_write_dump_adds_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mem = sample();
        let c = Character::read(&mem, REC).unwrap();
        let written = write_dump(&dir.path().join("ivan"), &c).unwrap();
        assert_eq!(written, dir.path().join("ivan.jcd"));
        let text = std::fs::read_to_string(&written).unwrap();
        assert_eq!(text, render(&c));

        let kept = write_dump(&dir.path().join("ivan.txt"), &c).unwrap();
        assert_eq!(kept.extension().unwrap(), "txt");
    }
}
