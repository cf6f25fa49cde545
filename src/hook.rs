// hook.rs — MinHook detour on the camera update callback.
//
// The callback is a member function: `this` (the camera object) arrives in
// ECX and it pops its own two stack arguments, which is exactly `thiscall`.
// The detour remembers `this`, then calls the original through the MinHook
// trampoline so the game keeps running normally.
//
// Flow:
//   install()  -> MH_Initialize -> MH_CreateHook(callback) -> MH_EnableHook
//   detour()   -> store camera pointer -> original callback
//   remove()   -> MH_DisableHook -> MH_RemoveHook  (once the pointer is known)
//   shutdown() -> remove() -> MH_Uninitialize

use crate::error::{Error, Result};
use minhook_sys::{
    MH_CreateHook, MH_DisableHook, MH_EnableHook, MH_Initialize, MH_OK, MH_RemoveHook,
    MH_Uninitialize,
};
use once_cell::sync::OnceCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Signature of the game's camera callback.
type CameraCallbackFn = unsafe extern "thiscall" fn(camera: *mut c_void, u1: f32, u2: i32) -> i32;

/// Trampoline to the original (unhooked) callback.
static ORIGINAL: OnceCell<CameraCallbackFn> = OnceCell::new();

/// Address of the hooked callback, 0 when no hook is in place.
static TARGET: AtomicUsize = AtomicUsize::new(0);

/// Camera object seen by the detour, 0 until the first call.
static CAMERA: AtomicUsize = AtomicUsize::new(0);

static INITIALIZED: AtomicBool = AtomicBool::new(false);

fn check(call: &'static str, status: i32) -> Result<()> {
    if status == MH_OK {
        Ok(())
    } else {
        Err(Error::MinHook { call, status })
    }
}

/// Detour the camera callback at `address`.
pub unsafe fn install(address: usize) -> Result<()> {
    if !INITIALIZED.swap(true, Ordering::AcqRel) {
        if let Err(e) = check("MH_Initialize", MH_Initialize()) {
            INITIALIZED.store(false, Ordering::Release);
            return Err(e);
        }
    }

    let target = address as *mut c_void;
    let mut original = ptr::null_mut::<c_void>();
    check("MH_CreateHook", MH_CreateHook(target, detour as *mut c_void, &mut original))?;

    // The trampoline must be known before the first call can reach the detour.
    let _ = ORIGINAL.set(std::mem::transmute::<*mut c_void, CameraCallbackFn>(original));
    TARGET.store(address, Ordering::Release);

    if let Err(e) = check("MH_EnableHook", MH_EnableHook(target)) {
        MH_RemoveHook(target);
        TARGET.store(0, Ordering::Release);
        return Err(e);
    }
    log::info!("camera callback detoured at {:08X}", address);
    Ok(())
}

/// The camera object, once the callback has run at least once.
pub fn camera() -> Option<usize> {
    match CAMERA.load(Ordering::Acquire) {
        0 => None,
        p => Some(p),
    }
}

/// Whether the detour is currently in place.
pub fn is_installed() -> bool {
    TARGET.load(Ordering::Acquire) != 0
}

/// Take the detour out again; the captured camera pointer is kept.
pub unsafe fn remove() {
    let addr = TARGET.swap(0, Ordering::AcqRel);
    if addr != 0 {
        let p = addr as *mut c_void;
        MH_DisableHook(p);
        MH_RemoveHook(p);
        log::info!("camera callback restored");
    }
}

/// Remove all hooks and shut down MinHook.
pub unsafe fn shutdown() {
    remove();
    if INITIALIZED.swap(false, Ordering::AcqRel) {
        MH_Uninitialize();
    }
}

unsafe extern "thiscall" fn detour(camera: *mut c_void, u1: f32, u2: i32) -> i32 {
    let addr = camera as usize;
    if addr != 0 && CAMERA.swap(addr, Ordering::AcqRel) == 0 {
        let _ = std::panic::catch_unwind(|| log::info!("camera at {:08X}", addr));
    }
    match ORIGINAL.get() {
        Some(f) => f(camera, u1, u2),
        None => 0,
    }
}
