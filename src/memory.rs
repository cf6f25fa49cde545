// memory.rs — Raw access to the game's address space.
//
// Everything that reads or writes game memory goes through the ReadMemory /
// WriteMemory traits. Inside the injected DLL the implementation is
// ProcessMemory, which checks every span with VirtualQuery before touching it
// so a stale pointer produces an error instead of an access violation.
// BufferMemory maps a plain byte buffer at a fake base for tests.

use crate::error::Result;

pub trait ReadMemory {
    /// Copy `buf.len()` bytes starting at `address`.
    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<()>;

    fn read_u16(&self, address: usize) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_bytes(address, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read_u32(&self, address: usize) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_bytes(address, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read_f32(&self, address: usize) -> Result<f32> {
        self.read_u32(address).map(f32::from_bits)
    }

    fn read_vec(&self, address: usize, len: usize) -> Result<Vec<u8>> {
        let mut v = vec![0u8; len];
        self.read_bytes(address, &mut v)?;
        Ok(v)
    }
}

pub trait WriteMemory: ReadMemory {
    fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<()>;

    fn write_u16(&mut self, address: usize, v: u16) -> Result<()> {
        self.write_bytes(address, &v.to_le_bytes())
    }

    fn write_u32(&mut self, address: usize, v: u32) -> Result<()> {
        self.write_bytes(address, &v.to_le_bytes())
    }

    fn write_f32(&mut self, address: usize, v: f32) -> Result<()> {
        self.write_u32(address, v.to_bits())
    }
}

/// Absolute address of `offset` inside a module loaded at `base`.
pub fn resolve(base: usize, offset: usize) -> usize {
    base.wrapping_add(offset)
}

// ============================================================
// Test backing store
// ============================================================

/// A byte buffer that pretends to live at `base`.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct BufferMemory {
    base: usize,
    bytes: Vec<u8>,
}

#[cfg(test)]
impl BufferMemory {
    pub fn new(base: usize, size: usize) -> Self {
        Self { base, bytes: vec![0u8; size] }
    }

    pub fn with_bytes(base: usize, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, address: usize, len: usize) -> Result<std::ops::Range<usize>> {
        use crate::error::Error;
        let start = address
            .checked_sub(self.base)
            .ok_or(Error::Unreadable { address, len })?;
        let end = start.checked_add(len).ok_or(Error::Unreadable { address, len })?;
        if end > self.bytes.len() {
            return Err(Error::Unreadable { address, len });
        }
        Ok(start..end)
    }
}

#[cfg(test)]
impl ReadMemory for BufferMemory {
    fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<()> {
        let r = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[r]);
        Ok(())
    }
}

#[cfg(test)]
impl WriteMemory for BufferMemory {
    fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
        let r = self.range(address, bytes.len())?;
        self.bytes[r].copy_from_slice(bytes);
        Ok(())
    }
}

// ============================================================
// Live process memory (inside the injected DLL)
// ============================================================

#[cfg(windows)]
pub use live::{module_base, module_size, ProcessMemory};

#[cfg(windows)]
mod live {
    use super::{ReadMemory, WriteMemory};
    use crate::error::{Error, Result};
    use std::ffi::CString;
    use std::mem::{size_of, zeroed};
    use std::ptr;
    use winapi::shared::minwindef::HMODULE;
    use winapi::um::libloaderapi::{GetModuleHandleExA, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT};
    use winapi::um::memoryapi::VirtualQuery;
    use winapi::um::processthreadsapi::GetCurrentProcess;
    use winapi::um::psapi::{GetModuleInformation, MODULEINFO};
    use winapi::um::winnt::{
        MEMORY_BASIC_INFORMATION, MEM_COMMIT, PAGE_EXECUTE_READ, PAGE_EXECUTE_READWRITE,
        PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS, PAGE_READONLY, PAGE_READWRITE,
        PAGE_WRITECOPY,
    };

    const READABLE: u32 = PAGE_READONLY
        | PAGE_READWRITE
        | PAGE_WRITECOPY
        | PAGE_EXECUTE_READ
        | PAGE_EXECUTE_READWRITE
        | PAGE_EXECUTE_WRITECOPY;
    const WRITABLE: u32 = PAGE_READWRITE | PAGE_WRITECOPY | PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY;

    /// Walk every region overlapping [addr, addr+len) and check its protection.
    fn span_has(addr: usize, len: usize, wanted: u32) -> bool {
        if addr == 0 || len == 0 {
            return false;
        }
        let end = match addr.checked_add(len) {
            Some(e) => e,
            None => return false,
        };
        let mut cur = addr;
        while cur < end {
            let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { zeroed() };
            let got = unsafe {
                VirtualQuery(cur as *const _, &mut mbi, size_of::<MEMORY_BASIC_INFORMATION>())
            };
            if got == 0 || mbi.State != MEM_COMMIT {
                return false;
            }
            if mbi.Protect & (PAGE_GUARD | PAGE_NOACCESS) != 0 || mbi.Protect & wanted == 0 {
                return false;
            }
            cur = mbi.BaseAddress as usize + mbi.RegionSize;
        }
        true
    }

    pub fn is_readable(addr: usize, len: usize) -> bool {
        span_has(addr, len, READABLE)
    }

    pub fn is_writable(addr: usize, len: usize) -> bool {
        span_has(addr, len, WRITABLE)
    }

    /// The address space of the process this DLL is loaded into.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ProcessMemory;

    impl ReadMemory for ProcessMemory {
        fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<()> {
            if !is_readable(address, buf.len()) {
                return Err(Error::Unreadable { address, len: buf.len() });
            }
            unsafe { ptr::copy_nonoverlapping(address as *const u8, buf.as_mut_ptr(), buf.len()) };
            Ok(())
        }
    }

    impl WriteMemory for ProcessMemory {
        fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
            if !is_writable(address, bytes.len()) {
                return Err(Error::Unreadable { address, len: bytes.len() });
            }
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len()) };
            Ok(())
        }
    }

    fn module_handle(name: &str) -> Result<HMODULE> {
        let cname = CString::new(name).map_err(|_| Error::ModuleNotFound(name.to_string()))?;
        let mut handle: HMODULE = ptr::null_mut();
        let ok = unsafe {
            GetModuleHandleExA(GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT, cname.as_ptr(), &mut handle)
        };
        if ok == 0 || handle.is_null() {
            return Err(Error::ModuleNotFound(name.to_string()));
        }
        Ok(handle)
    }

    /// Base address of a module already loaded into this process.
    pub fn module_base(name: &str) -> Result<usize> {
        module_handle(name).map(|h| h as usize)
    }

    /// Size of the mapped image of a loaded module.
    pub fn module_size(name: &str) -> Result<usize> {
        let handle = module_handle(name)?;
        let mut info: MODULEINFO = unsafe { zeroed() };
        let ok = unsafe {
            GetModuleInformation(GetCurrentProcess(), handle, &mut info, size_of::<MODULEINFO>() as u32)
        };
        if ok == 0 {
            return Err(Error::ModuleNotFound(name.to_string()));
        }
        Ok(info.SizeOfImage as usize)
    }
}
