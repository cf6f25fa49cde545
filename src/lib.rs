// lib.rs — DLL entry point for the JABIA character trainer.
//
// When this DLL is injected into GameJABiA.exe (or the demo build), DllMain
// fires with DLL_PROCESS_ATTACH. It spawns a background worker thread that:
//   1. Loads jabia_trainer.toml and starts logging next to the DLL
//   2. Patches the character constructor's return to capture new records
//   3. Detours the camera callback once to learn the camera object
//   4. Polls hotkeys: inspector dialog, unload, clear, camera limits
//   5. On unload, reverts every patch and frees the library
//
// Must be compiled as a 32-bit cdylib (i686-pc-windows-msvc). Everything that
// does not touch the live process builds and tests on any host.

#![allow(non_snake_case)]

// Compile-time guard: the hooks only exist for 32-bit x86
#[cfg(all(windows, not(target_arch = "x86")))]
compile_error!("Build with i686-pc-windows-msvc (32-bit x86).");

pub mod camera;    // Camera object layout and limit edits
pub mod capture;   // Constructor return hook
pub mod character; // Character record layout, fields, edits
pub mod config;    // jabia_trainer.toml
pub mod dump;      // *.jcd text dumps
pub mod error;     // Error enum shared by every module
pub mod hotkeys;   // Edge-triggered key polling
pub mod logging;   // simplelog setup
pub mod memory;    // Raw memory access traits
pub mod patch;     // Inline JMP patches
pub mod registry;  // Captured character addresses
pub mod signature; // Byte patterns

#[cfg(all(windows, target_arch = "x86"))]
mod dialog; // Inspector window
#[cfg(all(windows, target_arch = "x86"))]
mod hook; // Camera callback detour

#[cfg(all(windows, target_arch = "x86"))]
pub use entry::DllMain;

#[cfg(all(windows, target_arch = "x86"))]
mod entry {
    use crate::camera::{adjust_min, CameraInfo};
    use crate::config::{TrainerConfig, CONFIG_FILE};
    use crate::error::Result;
    use crate::hotkeys::{AsyncKeyboard, KeyPoller};
    use crate::memory::{module_base, resolve, ProcessMemory};
    use crate::registry::CHARACTERS;
    use crate::{capture, dialog, hook, logging};
    use std::panic::AssertUnwindSafe;
    use std::path::PathBuf;
    use std::ptr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use winapi::shared::minwindef::{BOOL, DWORD, HINSTANCE, LPVOID, TRUE};
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::libloaderapi::{DisableThreadLibraryCalls, FreeLibraryAndExitThread, GetModuleFileNameA};
    use winapi::um::processthreadsapi::CreateThread;
    use winapi::um::winnt::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

    /// Module handle of this DLL, stored on attach.
    static DLL_HINST: AtomicUsize = AtomicUsize::new(0);

    /// Keeps the worker polling. Cleared on DLL_PROCESS_DETACH.
    static RUNNING: AtomicBool = AtomicBool::new(false);

    /// Directory holding the DLL; config and log live there.
    fn dll_dir(hinst: HINSTANCE) -> PathBuf {
        let mut buf = [0u8; 512];
        let len = unsafe { GetModuleFileNameA(hinst as _, buf.as_mut_ptr() as _, buf.len() as u32) } as usize;
        if len > 0 {
            if let Ok(s) = std::str::from_utf8(&buf[..len]) {
                if let Some(dir) = std::path::Path::new(s).parent() {
                    return dir.to_path_buf();
                }
            }
        }
        PathBuf::from(".")
    }

    fn show_camera(camera: usize) {
        match CameraInfo::read(&ProcessMemory, camera) {
            Ok(info) => log::info!("{}", info),
            Err(e) => log::warn!("camera at {:08X} unreadable: {}", camera, e),
        }
    }

    fn move_camera(camera: usize, delta: f32) {
        match adjust_min(&mut ProcessMemory, camera, delta) {
            Ok(v) => log::info!("camera min now {:.1}", v),
            Err(e) => log::warn!("camera edit failed: {}", e),
        }
    }

    /// Install the hooks and poll until asked to stop.
    /// Returns true when the unload hotkey was pressed.
    fn run(hinst: HINSTANCE) -> Result<bool> {
        let dir = dll_dir(hinst);
        let (config, config_error) = TrainerConfig::load_or_default(&dir);
        match logging::init(&dir, &config.log) {
            Ok(path) => log::info!("trainer attached, logging to {}", path.display()),
            Err(e) => log::warn!("trainer attached, log file unavailable ({}); debugger output only", e),
        }
        if let Some(e) = config_error {
            log::warn!("{}: {}; using defaults", CONFIG_FILE, e);
        }

        let layout = config.edition.layout();
        let process = config.process_name();
        log::info!("edition {:?}, process {}", config.edition, process);

        capture::install(&layout, process)?;

        if config.camera {
            match layout.camera_callback {
                Some(offset) => {
                    let installed = module_base(process)
                        .and_then(|base| unsafe { hook::install(resolve(base, offset)) });
                    if let Err(e) = installed {
                        log::warn!("camera hook not installed: {}", e);
                    }
                }
                None => log::info!("no camera callback known for {:?}", config.edition),
            }
        }

        let keys = AsyncKeyboard;
        let mut poller = KeyPoller::new();
        let hk = &config.hotkeys;
        let tick = Duration::from_millis(config.poll_interval_ms.max(1));

        while RUNNING.load(Ordering::Acquire) {
            // One detour call is enough to learn the camera object.
            if hook::is_installed() {
                if let Some(camera) = hook::camera() {
                    unsafe { hook::remove() };
                    show_camera(camera);
                }
            }

            let unload = poller.pressed(&keys, hk.unload);
            let open = poller.pressed(&keys, hk.dialog);
            let clear = poller.pressed(&keys, hk.clear);
            let raise = poller.pressed(&keys, hk.camera_raise);
            let lower = poller.pressed(&keys, hk.camera_lower);
            let info = poller.pressed(&keys, hk.camera_info);

            if unload {
                log::info!("unload requested");
                return Ok(true);
            }
            if open {
                if let Err(e) = dialog::show(hinst) {
                    log::error!("inspector failed: {}", e);
                }
            }
            if clear {
                CHARACTERS.clear();
                log::info!("captured characters cleared");
            }
            if let Some(camera) = hook::camera() {
                if raise {
                    move_camera(camera, config.camera_step);
                }
                if lower {
                    move_camera(camera, -config.camera_step);
                }
                if info {
                    show_camera(camera);
                }
            }

            std::thread::sleep(tick);
        }
        Ok(false)
    }

    /// Undo everything. Returns false if code is still patched, in which
    /// case the library must stay loaded.
    fn teardown(hinst: HINSTANCE) -> bool {
        let restored = match capture::uninstall() {
            Ok(()) => true,
            Err(e) => {
                log::error!("constructor hook not removed: {}", e);
                false
            }
        };
        unsafe { hook::shutdown() };
        dialog::shutdown(hinst);
        log::info!("trainer stopped");
        log::logger().flush();
        restored
    }

    /// Background worker thread entry point.
    unsafe extern "system" fn worker(_: LPVOID) -> DWORD {
        let hinst = DLL_HINST.load(Ordering::Acquire) as HINSTANCE;

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| run(hinst))).unwrap_or(Ok(false));
        let unload = match outcome {
            Ok(unload) => unload,
            Err(e) => {
                log::error!("trainer start failed: {}", e);
                teardown(hinst);
                return 1;
            }
        };

        if teardown(hinst) && unload {
            FreeLibraryAndExitThread(hinst as _, 0);
        }
        0
    }

    /// DLL entry point — called by Windows when the DLL is loaded/unloaded.
    #[no_mangle]
    pub unsafe extern "system" fn DllMain(hinst: HINSTANCE, reason: DWORD, _reserved: LPVOID) -> BOOL {
        match reason {
            DLL_PROCESS_ATTACH => {
                DisableThreadLibraryCalls(hinst);
                DLL_HINST.store(hinst as usize, Ordering::Release);
                RUNNING.store(true, Ordering::Release);

                let h = CreateThread(ptr::null_mut(), 0, Some(worker), ptr::null_mut(), 0, ptr::null_mut());
                if !h.is_null() {
                    CloseHandle(h);
                }
            }
            DLL_PROCESS_DETACH => {
                RUNNING.store(false, Ordering::Release);
            }
            _ => {}
        }
        TRUE
    }
}
