// registry.rs — Character records captured by the constructor hook.
//
// The hook runs on whichever game thread constructs a character; the worker
// and the dialog read the list from their own thread. Everything sits behind
// one Mutex. Record pointers change whenever the game loads a level, so the
// list is cleared when the hook is installed and on the clear hotkey.

use crate::character::WeaponSlot;
use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct Captured {
    addresses: Vec<usize>,
    selected: usize,
    slot: WeaponSlot,
}

impl Captured {
    /// Register a record address; returns false if it was already known.
    pub fn record(&mut self, address: usize) -> bool {
        if address == 0 || self.addresses.contains(&address) {
            return false;
        }
        self.addresses.push(address);
        true
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
        self.selected = 0;
        self.slot = WeaponSlot::default();
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn addresses(&self) -> &[usize] {
        &self.addresses
    }

    /// Select a character by list index; out-of-range indices clamp to the last entry.
    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.addresses.len().saturating_sub(1));
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Address of the selected character, if any were captured.
    pub fn selected(&self) -> Option<usize> {
        self.addresses.get(self.selected).copied()
    }

    pub fn select_slot(&mut self, slot: WeaponSlot) {
        self.slot = slot;
    }

    pub fn slot(&self) -> WeaponSlot {
        self.slot
    }
}

/// Thread-safe wrapper shared between the game threads and the worker.
#[derive(Debug, Default)]
pub struct CharacterRegistry {
    inner: Mutex<Captured>,
}

impl CharacterRegistry {
    pub fn lock(&self) -> MutexGuard<'_, Captured> {
        // A panic while holding the lock leaves the list itself consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, address: usize) -> bool {
        self.lock().record(address)
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn snapshot(&self) -> Vec<usize> {
        self.lock().addresses.clone()
    }
}

/// The process-wide registry used by the hook and the dialog.
pub static CHARACTERS: Lazy<CharacterRegistry> = Lazy::new(CharacterRegistry::default);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_ignores_duplicates_and_null() {
        let reg = CharacterRegistry::default();
        assert!(reg.record(0x1000));
        assert!(reg.record(0x2000));
        assert!(!reg.record(0x1000));
        assert!(!reg.record(0));
        assert_eq!(reg.snapshot(), vec![0x1000, 0x2000]);
    }

    #[test]
    fn test_select_clamps_and_clear_resets() {
        let reg = CharacterRegistry::default();
        {
            let mut c = reg.lock();
            assert_eq!(c.selected(), None);
            c.record(0x10);
            c.record(0x20);
            c.select(7);
            assert_eq!(c.selected_index(), 1);
            assert_eq!(c.selected(), Some(0x20));
            c.select_slot(WeaponSlot::new(2).unwrap());
        }
        reg.clear();
        let c = reg.lock();
        assert!(c.is_empty());
        assert_eq!(c.selected_index(), 0);
        assert_eq!(c.slot(), WeaponSlot::default());
    }

    #[test]
    fn test_concurrent_records_are_all_kept() {
        let reg = Arc::new(CharacterRegistry::default());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for i in 0..50 {
                        reg.record(0x1000 + t * 0x1000 + i * 4);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.lock().len(), 200);
    }
}
