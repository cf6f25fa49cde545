// hotkeys.rs — Edge-triggered hotkey polling.
//
// The worker polls the keyboard every tick. A key "fires" once on the tick
// where it goes from up to down; holding it does not repeat.

use crate::config::Hotkey;
use std::collections::HashMap;

pub trait KeySource {
    fn is_down(&self, key: Hotkey) -> bool;
}

/// The real keyboard, via GetAsyncKeyState.
#[cfg(windows)]
pub struct AsyncKeyboard;

#[cfg(windows)]
impl KeySource for AsyncKeyboard {
    fn is_down(&self, key: Hotkey) -> bool {
        let state = unsafe { winapi::um::winuser::GetAsyncKeyState(key.0) } as u16;
        state & 0x8000 != 0
    }
}

#[derive(Debug, Default)]
pub struct KeyPoller {
    prev: HashMap<i32, bool>,
}

impl KeyPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// True on the first poll that sees `key` held down.
    pub fn pressed<S: KeySource>(&mut self, src: &S, key: Hotkey) -> bool {
        let down = src.is_down(key);
        let was = self.prev.insert(key.0, down).unwrap_or(false);
        down && !was
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeKeys(RefCell<HashSet<i32>>);

    impl FakeKeys {
        fn set(&self, key: Hotkey, down: bool) {
            if down {
                self.0.borrow_mut().insert(key.0);
            } else {
                self.0.borrow_mut().remove(&key.0);
            }
        }
    }

    impl KeySource for FakeKeys {
        fn is_down(&self, key: Hotkey) -> bool {
            self.0.borrow().contains(&key.0)
        }
    }

    #[test]
    fn test_fires_once_per_press() {
        let keys = FakeKeys::default();
        let f7 = Hotkey(0x76);
        let mut poller = KeyPoller::new();

        assert!(!poller.pressed(&keys, f7));
        keys.set(f7, true);
        assert!(poller.pressed(&keys, f7));
        assert!(!poller.pressed(&keys, f7)); // held
        keys.set(f7, false);
        assert!(!poller.pressed(&keys, f7));
        keys.set(f7, true);
        assert!(poller.pressed(&keys, f7));
    }

    #[test]
    fn test_keys_are_tracked_independently() {
        let keys = FakeKeys::default();
        let (f7, f8) = (Hotkey(0x76), Hotkey(0x77));
        let mut poller = KeyPoller::new();
        keys.set(f7, true);
        keys.set(f8, true);
        assert!(poller.pressed(&keys, f7));
        assert!(poller.pressed(&keys, f8));
        assert!(!poller.pressed(&keys, f7));
    }
}
