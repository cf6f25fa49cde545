// dialog.rs — Character inspector window.
//
// Built at runtime from plain Win32 controls, no resource script. The window
// runs its own message loop on the worker thread; show() returns once it is
// closed. Selection lives in the registry so it survives reopening.
//
// Layout:
//   [character combo] [slot combo]
//   label edit | label edit | label edit     (one pair per CharacterField)
//   [Set] [Dump] [Close]
//   status line

use crate::character::{apply_edits, Character, CharacterField, WeaponSlot};
use crate::dump::{write_dump, DUMP_EXTENSION, DUMP_FILTER};
use crate::error::{Error, Result};
use crate::memory::ProcessMemory;
use crate::registry::CHARACTERS;
use std::ffi::CString;
use std::mem::{size_of, zeroed};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use winapi::shared::minwindef::{HINSTANCE, HIWORD, LOWORD, LPARAM, LRESULT, MAX_PATH, UINT, WPARAM};
use winapi::shared::windef::{HBRUSH, HMENU, HWND};
use winapi::um::commdlg::{
    GetSaveFileNameA, OFN_EXPLORER, OFN_HIDEREADONLY, OFN_OVERWRITEPROMPT, OFN_PATHMUSTEXIST,
    OPENFILENAMEA,
};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::wingdi::{GetStockObject, DEFAULT_GUI_FONT};
use winapi::um::winuser::{
    CreateWindowExA, DefWindowProcA, DestroyWindow, DispatchMessageA, GetDlgItem, GetMessageA,
    GetWindowTextA, IsDialogMessageA, LoadCursorW, MessageBoxA, PostQuitMessage, RegisterClassExA,
    SendMessageA, SetForegroundWindow, SetWindowTextA, TranslateMessage, UnregisterClassA,
    BS_DEFPUSHBUTTON, BS_PUSHBUTTON, CBN_SELCHANGE, CBS_DROPDOWNLIST, CB_ADDSTRING, CB_ERR,
    CB_GETCURSEL, CB_RESETCONTENT, CB_SETCURSEL, COLOR_BTNFACE, CW_USEDEFAULT, ES_AUTOHSCROLL,
    ES_READONLY, IDCANCEL, IDC_ARROW, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK, MSG,
    SS_LEFT, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_SETFONT, WNDCLASSEXA, WS_BORDER, WS_CAPTION,
    WS_CHILD, WS_EX_CLIENTEDGE, WS_EX_TOPMOST, WS_SYSMENU, WS_TABSTOP, WS_VISIBLE, WS_VSCROLL,
};

const CLASS_NAME: &[u8] = b"JabiaTrainerInspector\0";
const TITLE: &str = "JABIA Character Inspector";

const ID_CHARACTER: i32 = 100;
const ID_SLOT: i32 = 101;
const ID_SET: i32 = 200;
const ID_DUMP: i32 = 201;
const ID_CLOSE: i32 = 202;
const ID_STATUS: i32 = 300;
const ID_EDIT_BASE: i32 = 1000;
const ID_LABEL_BASE: i32 = 2000;

// Geometry in client pixels.
const MARGIN: i32 = 10;
const ROWS: usize = 14;
const ROW_H: i32 = 24;
const LABEL_W: i32 = 130;
const EDIT_W: i32 = 90;
const COL_W: i32 = LABEL_W + EDIT_W + 14;
const GRID_TOP: i32 = 44;
const BUTTON_W: i32 = 80;
const BUTTON_H: i32 = 26;

static REGISTERED: AtomicBool = AtomicBool::new(false);

fn cstring(s: &str) -> CString {
    CString::new(s.replace('\0', " ")).unwrap_or_default()
}

fn grid_bottom() -> i32 {
    GRID_TOP + ROWS as i32 * ROW_H
}

/// Keep names usable as a default file name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "character".to_string()
    } else {
        stem
    }
}

// ============================================================
// Window Class
// ============================================================

unsafe fn register(hinst: HINSTANCE) -> Result<()> {
    if REGISTERED.load(Ordering::Acquire) {
        return Ok(());
    }
    let mut wc: WNDCLASSEXA = zeroed();
    wc.cbSize = size_of::<WNDCLASSEXA>() as UINT;
    wc.lpfnWndProc = Some(wnd_proc);
    wc.hInstance = hinst;
    wc.hCursor = LoadCursorW(ptr::null_mut(), IDC_ARROW);
    wc.hbrBackground = (COLOR_BTNFACE + 1) as usize as HBRUSH;
    wc.lpszClassName = CLASS_NAME.as_ptr() as *const i8;
    if RegisterClassExA(&wc) == 0 {
        return Err(Error::Win32 { call: "RegisterClassExA", code: GetLastError() });
    }
    REGISTERED.store(true, Ordering::Release);
    Ok(())
}

/// Unregister the window class before the DLL goes away.
pub fn shutdown(hinst: HINSTANCE) {
    if REGISTERED.swap(false, Ordering::AcqRel) {
        unsafe { UnregisterClassA(CLASS_NAME.as_ptr() as *const i8, hinst) };
    }
}

// ============================================================
// Controls
// ============================================================

#[allow(clippy::too_many_arguments)]
unsafe fn child(
    parent: HWND,
    hinst: HINSTANCE,
    class: &[u8],
    text: &str,
    style: u32,
    ex_style: u32,
    (x, y, w, h): (i32, i32, i32, i32),
    id: i32,
) -> HWND {
    let text = cstring(text);
    let hwnd = CreateWindowExA(
        ex_style,
        class.as_ptr() as *const i8,
        text.as_ptr(),
        WS_CHILD | WS_VISIBLE | style,
        x, y, w, h,
        parent,
        id as usize as HMENU,
        hinst,
        ptr::null_mut(),
    );
    if !hwnd.is_null() {
        let font = GetStockObject(DEFAULT_GUI_FONT);
        SendMessageA(hwnd, WM_SETFONT, font as WPARAM, 1);
    }
    hwnd
}

unsafe fn build_controls(hwnd: HWND, hinst: HINSTANCE) {
    child(hwnd, hinst, b"STATIC\0", "Character:", SS_LEFT, 0, (MARGIN, MARGIN + 4, 60, 20), -1);
    child(
        hwnd, hinst, b"COMBOBOX\0", "",
        CBS_DROPDOWNLIST | WS_VSCROLL | WS_TABSTOP, 0,
        (MARGIN + 64, MARGIN, 260, 200), ID_CHARACTER,
    );
    child(hwnd, hinst, b"STATIC\0", "Weapon slot:", SS_LEFT, 0, (MARGIN + 340, MARGIN + 4, 70, 20), -1);
    child(
        hwnd, hinst, b"COMBOBOX\0", "",
        CBS_DROPDOWNLIST | WS_TABSTOP, 0,
        (MARGIN + 414, MARGIN, 60, 120), ID_SLOT,
    );

    for (i, field) in CharacterField::ALL.iter().enumerate() {
        let col = (i / ROWS) as i32;
        let row = (i % ROWS) as i32;
        let x = MARGIN + col * COL_W;
        let y = GRID_TOP + row * ROW_H;
        child(
            hwnd, hinst, b"STATIC\0", field.label(), SS_LEFT, 0,
            (x, y + 3, LABEL_W, 18), ID_LABEL_BASE + i as i32,
        );
        let mut style = ES_AUTOHSCROLL | WS_BORDER;
        if field.is_editable() {
            style |= WS_TABSTOP;
        } else {
            style |= ES_READONLY;
        }
        child(
            hwnd, hinst, b"EDIT\0", "", style, WS_EX_CLIENTEDGE,
            (x + LABEL_W, y, EDIT_W, 20), ID_EDIT_BASE + i as i32,
        );
    }

    let y = grid_bottom() + 8;
    child(hwnd, hinst, b"BUTTON\0", "Set", BS_DEFPUSHBUTTON | WS_TABSTOP, 0, (MARGIN, y, BUTTON_W, BUTTON_H), ID_SET);
    child(
        hwnd, hinst, b"BUTTON\0", "Dump", BS_PUSHBUTTON | WS_TABSTOP, 0,
        (MARGIN + BUTTON_W + 8, y, BUTTON_W, BUTTON_H), ID_DUMP,
    );
    child(
        hwnd, hinst, b"BUTTON\0", "Close", BS_PUSHBUTTON | WS_TABSTOP, 0,
        (MARGIN + 2 * (BUTTON_W + 8), y, BUTTON_W, BUTTON_H), ID_CLOSE,
    );
    child(
        hwnd, hinst, b"STATIC\0", "", SS_LEFT, 0,
        (MARGIN, y + BUTTON_H + 8, 3 * COL_W, 18), ID_STATUS,
    );
}

unsafe fn set_text(hwnd: HWND, id: i32, text: &str) {
    let text = cstring(text);
    SetWindowTextA(GetDlgItem(hwnd, id), text.as_ptr());
}

unsafe fn get_text(hwnd: HWND, id: i32) -> String {
    let mut buf = [0u8; 128];
    let n = GetWindowTextA(GetDlgItem(hwnd, id), buf.as_mut_ptr() as *mut i8, buf.len() as i32);
    String::from_utf8_lossy(&buf[..n.max(0) as usize]).into_owned()
}

unsafe fn status(hwnd: HWND, text: &str) {
    set_text(hwnd, ID_STATUS, text);
}

unsafe fn message(hwnd: HWND, text: &str, icon: u32) {
    let text = cstring(text);
    let title = cstring(TITLE);
    MessageBoxA(hwnd, text.as_ptr(), title.as_ptr(), MB_OK | icon);
}

unsafe fn add_item(combo: HWND, text: &str) {
    let text = cstring(text);
    SendMessageA(combo, CB_ADDSTRING, 0, text.as_ptr() as LPARAM);
}

/// Current selection of a combo box, if any.
unsafe fn combo_index(hwnd: HWND, id: i32) -> Option<usize> {
    let i = SendMessageA(GetDlgItem(hwnd, id), CB_GETCURSEL, 0, 0);
    if i == CB_ERR as LRESULT || i < 0 {
        None
    } else {
        Some(i as usize)
    }
}

// ============================================================
// Contents
// ============================================================

unsafe fn populate(hwnd: HWND) {
    let (addresses, selected, slot) = {
        let c = CHARACTERS.lock();
        (c.addresses().to_vec(), c.selected_index(), c.slot())
    };

    let combo = GetDlgItem(hwnd, ID_CHARACTER);
    SendMessageA(combo, CB_RESETCONTENT, 0, 0);
    for (i, &addr) in addresses.iter().enumerate() {
        let label = match Character::read(&ProcessMemory, addr) {
            Ok(c) => format!(
                "{}: {} (lvl {}, {:.0} hp) @ {:08X}",
                i + 1,
                c.name(),
                c.level(),
                c.health(),
                addr
            ),
            Err(_) => format!("{}: <gone> @ {:08X}", i + 1, addr),
        };
        add_item(combo, &label);
    }
    if !addresses.is_empty() {
        SendMessageA(combo, CB_SETCURSEL, selected, 0);
    }

    let slots = GetDlgItem(hwnd, ID_SLOT);
    SendMessageA(slots, CB_RESETCONTENT, 0, 0);
    for s in WeaponSlot::all() {
        add_item(slots, &s.to_string());
    }
    SendMessageA(slots, CB_SETCURSEL, slot.index(), 0);

    fill(hwnd);
}

/// Refill every edit from the selected character and slot.
unsafe fn fill(hwnd: HWND) {
    let (addr, slot) = {
        let c = CHARACTERS.lock();
        (c.selected(), c.slot())
    };
    let clear = |hwnd: HWND| {
        for i in 0..CharacterField::ALL.len() {
            set_text(hwnd, ID_EDIT_BASE + i as i32, "");
        }
    };

    match addr.map(|a| Character::read(&ProcessMemory, a)) {
        None => {
            clear(hwnd);
            status(hwnd, "No characters captured yet.");
        }
        Some(Err(e)) => {
            clear(hwnd);
            status(hwnd, &e.to_string());
        }
        Some(Ok(c)) => {
            for (i, field) in CharacterField::ALL.iter().enumerate() {
                set_text(hwnd, ID_EDIT_BASE + i as i32, &c.display(*field, slot));
            }
            status(hwnd, &format!("{} loaded, weapon slot {}", c.name(), slot));
        }
    }
}

unsafe fn on_set(hwnd: HWND) {
    let (addr, slot) = {
        let c = CHARACTERS.lock();
        (c.selected(), c.slot())
    };
    let Some(addr) = addr else {
        message(hwnd, "No character selected.", MB_ICONINFORMATION);
        return;
    };

    let edits: Vec<(CharacterField, String)> = CharacterField::ALL
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_editable())
        .map(|(i, f)| (*f, get_text(hwnd, ID_EDIT_BASE + i as i32)))
        .collect();

    match apply_edits(&mut ProcessMemory, addr, slot, &edits) {
        Ok(rejected) if rejected.is_empty() => {
            log::info!("character at {:08X} written", addr);
            fill(hwnd);
            status(hwnd, "Character written.");
        }
        Ok(rejected) => {
            let lines: Vec<String> = rejected.iter().map(|e| e.to_string()).collect();
            log::warn!("character at {:08X}: {} fields rejected", addr, lines.len());
            fill(hwnd);
            message(hwnd, &format!("These fields were not written:\n{}", lines.join("\n")), MB_ICONWARNING);
        }
        Err(e) => {
            log::error!("writing character at {:08X}: {}", addr, e);
            message(hwnd, &e.to_string(), MB_ICONERROR);
        }
    }
}

unsafe fn on_dump(hwnd: HWND) {
    let addr = CHARACTERS.lock().selected();
    let character = match addr.map(|a| Character::read(&ProcessMemory, a)) {
        Some(Ok(c)) => c,
        Some(Err(e)) => {
            message(hwnd, &e.to_string(), MB_ICONERROR);
            return;
        }
        None => {
            message(hwnd, "No character selected.", MB_ICONINFORMATION);
            return;
        }
    };

    let mut file = [0u8; MAX_PATH];
    let default = format!("{}.{}", file_stem(&character.name()), DUMP_EXTENSION);
    let n = default.len().min(MAX_PATH - 1);
    file[..n].copy_from_slice(&default.as_bytes()[..n]);

    let mut ofn: OPENFILENAMEA = zeroed();
    ofn.lStructSize = size_of::<OPENFILENAMEA>() as u32;
    ofn.hwndOwner = hwnd;
    ofn.lpstrFilter = DUMP_FILTER.as_ptr() as *const i8;
    ofn.lpstrFile = file.as_mut_ptr() as *mut i8;
    ofn.nMaxFile = file.len() as u32;
    ofn.lpstrDefExt = b"jcd\0".as_ptr() as *const i8;
    ofn.Flags = OFN_EXPLORER | OFN_HIDEREADONLY | OFN_OVERWRITEPROMPT | OFN_PATHMUSTEXIST;
    if GetSaveFileNameA(&mut ofn) == 0 {
        status(hwnd, "Dump cancelled.");
        return;
    }

    let len = file.iter().position(|&b| b == 0).unwrap_or(file.len());
    let path = PathBuf::from(String::from_utf8_lossy(&file[..len]).into_owned());
    match write_dump(&path, &character) {
        Ok(written) => status(hwnd, &format!("Dumped to {}", written.display())),
        Err(e) => {
            log::error!("dump to {} failed: {}", path.display(), e);
            message(hwnd, &e.to_string(), MB_ICONERROR);
        }
    }
}

// ============================================================
// Window Procedure
// ============================================================

/// Returns true when the message was handled.
unsafe fn handle(hwnd: HWND, msg: UINT, wparam: WPARAM) -> bool {
    match msg {
        WM_COMMAND => {
            let id = LOWORD(wparam as u32) as i32;
            let code = HIWORD(wparam as u32);
            match id {
                ID_CHARACTER if code == CBN_SELCHANGE => {
                    if let Some(i) = combo_index(hwnd, ID_CHARACTER) {
                        CHARACTERS.lock().select(i);
                    }
                    fill(hwnd);
                    true
                }
                ID_SLOT if code == CBN_SELCHANGE => {
                    if let Some(slot) = combo_index(hwnd, ID_SLOT).and_then(WeaponSlot::new) {
                        CHARACTERS.lock().select_slot(slot);
                    }
                    fill(hwnd);
                    true
                }
                ID_SET => {
                    on_set(hwnd);
                    true
                }
                ID_DUMP => {
                    on_dump(hwnd);
                    true
                }
                ID_CLOSE | IDCANCEL => {
                    DestroyWindow(hwnd);
                    true
                }
                _ => false,
            }
        }
        WM_CLOSE => {
            DestroyWindow(hwnd);
            true
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            true
        }
        _ => false,
    }
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let handled = panic::catch_unwind(AssertUnwindSafe(|| handle(hwnd, msg, wparam)));
    match handled {
        Ok(true) => 0,
        Ok(false) => DefWindowProcA(hwnd, msg, wparam, lparam),
        Err(_) => {
            log::error!("panic in inspector window procedure (msg {:#X})", msg);
            DefWindowProcA(hwnd, msg, wparam, lparam)
        }
    }
}

// ============================================================
// Entry
// ============================================================

/// Open the inspector and run it until the user closes it.
pub fn show(hinst: HINSTANCE) -> Result<()> {
    if CHARACTERS.lock().is_empty() {
        unsafe {
            message(
                ptr::null_mut(),
                "No characters captured yet.\nLoad a save or start a level, then try again.",
                MB_ICONINFORMATION,
            )
        };
        return Ok(());
    }

    unsafe {
        register(hinst)?;

        let title = cstring(TITLE);
        let width = 2 * MARGIN + 3 * COL_W + 16;
        let height = grid_bottom() + BUTTON_H + 80;
        let hwnd = CreateWindowExA(
            WS_EX_TOPMOST,
            CLASS_NAME.as_ptr() as *const i8,
            title.as_ptr(),
            WS_CAPTION | WS_SYSMENU | WS_VISIBLE,
            CW_USEDEFAULT, CW_USEDEFAULT, width, height,
            ptr::null_mut(),
            ptr::null_mut(),
            hinst,
            ptr::null_mut(),
        );
        if hwnd.is_null() {
            return Err(Error::Win32 { call: "CreateWindowExA", code: GetLastError() });
        }

        build_controls(hwnd, hinst);
        populate(hwnd);
        SetForegroundWindow(hwnd);
        log::debug!("inspector opened");

        let mut msg: MSG = zeroed();
        loop {
            match GetMessageA(&mut msg, ptr::null_mut(), 0, 0) {
                0 => break,
                -1 => return Err(Error::Win32 { call: "GetMessageA", code: GetLastError() }),
                _ => {
                    if IsDialogMessageA(hwnd, &mut msg) == 0 {
                        TranslateMessage(&msg);
                        DispatchMessageA(&msg);
                    }
                }
            }
        }
    }
    log::debug!("inspector closed");
    Ok(())
}
