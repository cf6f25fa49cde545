// capture.rs — Hook on the return of the character constructor.
//
// The constructor is `thiscall` and the game passes extra state in EDX, so we
// leave its entry alone and patch its `retn imm16` instead. When the
// constructor returns, EAX holds `this` (the new character record). The patch
// jumps into a naked stub that hands EAX to record_character(), restores EAX
// and performs the `retn imm16` the patch replaced.
//
// Flow:
//   install()   -> resolve constructor -> verify signature -> check retn site -> patch
//   stub        -> record_character(eax) -> retn imm16
//   uninstall() -> restore the saved bytes
//
// install_at()/uninstall_at() hold the steps and work on any CodeMemory; the
// stubs and the live process glue only exist in the 32-bit Windows build.

use crate::config::GameLayout;
use crate::error::{Error, Result};
use crate::memory::resolve;
use crate::patch::{check_retn_site, CodeMemory, InlinePatch};
use crate::registry::CharacterRegistry;
use crate::signature::{locate, Pattern, CHARACTER_CONSTRUCTOR};

/// JMP rel32 + one NOP over `retn imm16` and its padding.
pub const PATCH_LEN: usize = 6;

/// Entry points of the return stubs, one per `retn` immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnStubs {
    pub retn_1c: usize,
    pub retn_10: usize,
}

impl ReturnStubs {
    /// The stub that finishes a `retn retn_pop`.
    pub fn for_retn(&self, retn_pop: u16) -> Result<usize> {
        match retn_pop {
            0x1C => Ok(self.retn_1c),
            0x10 => Ok(self.retn_10),
            other => Err(Error::SignatureMismatch {
                address: 0,
                expected: "retn 0x1C or retn 0x10".to_string(),
                found: format!("retn {:#X}", other),
            }),
        }
    }
}

/// Find the constructor inside the image [base, base+size), check its return
/// site and patch it to jump to the matching stub. The registry is emptied
/// just before the patch goes in.
pub fn install_at<M: CodeMemory>(
    mem: &mut M,
    registry: &CharacterRegistry,
    base: usize,
    size: usize,
    layout: &GameLayout,
    stubs: &ReturnStubs,
) -> Result<InlinePatch> {
    let stub = stubs.for_retn(layout.retn_pop)?;

    let expected = resolve(base, layout.constructor);
    let pattern = Pattern::parse(CHARACTER_CONSTRUCTOR)?;
    let entry = locate(&*mem, &pattern, expected, base, size)?;
    log::info!("character constructor at {:08X}", entry);

    let retn = entry + layout.constructor_retn;
    check_retn_site(&*mem, retn, layout.retn_pop, PATCH_LEN)?;
    log::info!("constructor retn {:#X} at {:08X}", layout.retn_pop, retn);

    // Pointers from an earlier level are dead.
    registry.clear();

    let mut patch = InlinePatch::new(retn, stub, PATCH_LEN)?;
    if let Err(e) = patch.apply(mem) {
        if patch.is_applied() {
            if let Err(undo) = patch.revert(mem) {
                log::error!("could not restore {:08X} after failed patch: {}", retn, undo);
            }
        }
        return Err(e);
    }
    Ok(patch)
}

/// Revert the patch in `slot`. On failure the patch stays in `slot` so a
/// later attempt can still restore the bytes.
pub fn uninstall_at<M: CodeMemory>(mem: &mut M, slot: &mut Option<InlinePatch>) -> Result<()> {
    if let Some(mut patch) = slot.take() {
        if patch.is_applied() {
            if let Err(e) = patch.revert(mem) {
                *slot = Some(patch);
                return Err(e);
            }
        }
        log::info!("constructor hook removed");
    }
    Ok(())
}

#[cfg(all(windows, target_arch = "x86"))]
pub use live::{install, uninstall};

#[cfg(all(windows, target_arch = "x86"))]
mod live {
    use super::{install_at, uninstall_at, ReturnStubs};
    use crate::config::GameLayout;
    use crate::error::{Error, Result};
    use crate::memory::{module_base, module_size, ProcessMemory};
    use crate::patch::InlinePatch;
    use crate::registry::CHARACTERS;
    use std::arch::naked_asm;
    use std::sync::Mutex;

    /// The installed patch, if any.
    static PATCH: Mutex<Option<InlinePatch>> = Mutex::new(None);

    /// Called from the stub on the game thread that built the character.
    extern "C" fn record_character(this: usize) {
        let _ = std::panic::catch_unwind(|| {
            if CHARACTERS.record(this) {
                log::info!("character at {:08X} ({} captured)", this, CHARACTERS.lock().len());
            } else {
                log::trace!("character at {:08X} already known", this);
            }
        });
    }

    /// Return stub for the full build (`retn 0x1C`).
    #[unsafe(naked)]
    unsafe extern "C" fn return_stub_1c() {
        naked_asm!(
            "push eax",
            "call {record}",
            "pop eax",
            "ret 0x1C",
            record = sym record_character,
        )
    }

    /// Return stub for the demo build (`retn 0x10`).
    #[unsafe(naked)]
    unsafe extern "C" fn return_stub_10() {
        naked_asm!(
            "push eax",
            "call {record}",
            "pop eax",
            "ret 0x10",
            record = sym record_character,
        )
    }

    fn stubs() -> ReturnStubs {
        ReturnStubs {
            retn_1c: return_stub_1c as *const () as usize,
            retn_10: return_stub_10 as *const () as usize,
        }
    }

    /// Patch the constructor's return so every new character is recorded.
    pub fn install(layout: &GameLayout, process_name: &str) -> Result<()> {
        let mut slot = PATCH.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(p) = slot.as_ref() {
            return Err(Error::AlreadyApplied(p.address()));
        }

        let base = module_base(process_name)?;
        let size = module_size(process_name)?;
        log::info!("{} at {:08X} (size {:X})", process_name, base, size);

        let patch = install_at(&mut ProcessMemory, &CHARACTERS, base, size, layout, &stubs())?;
        *slot = Some(patch);
        Ok(())
    }

    /// Put the original return back. Safe to call when nothing is installed.
    pub fn uninstall() -> Result<()> {
        let mut slot = PATCH.lock().unwrap_or_else(|e| e.into_inner());
        uninstall_at(&mut ProcessMemory, &mut slot)
    }
}
