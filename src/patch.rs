// patch.rs — Inline JMP patching of game code.
//
// An InlinePatch overwrites `len` bytes at a code address with a 5-byte
// relative jump (E9 rel32) to our stub, padded with NOPs, after saving the
// bytes it replaces. Reverting writes the saved bytes back. Every write is
// bracketed by a protection change to PAGE_EXECUTE_READWRITE and a restore
// of the previous protection, followed by an instruction cache flush.
//
// The game keeps running on its own threads while we patch; the patched site
// must not be executing during apply/revert (it is a constructor epilogue,
// only hit while a level loads).

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, WriteMemory};
use crate::signature::{hex_bytes, RETN_IMM16};

pub const JMP_REL32: u8 = 0xE9;
pub const JMP_LEN: usize = 5;
pub const NOP: u8 = 0x90;
pub const INT3: u8 = 0xCC;

/// Memory that can also have its page protection changed.
pub trait CodeMemory: WriteMemory {
    /// Make [address, address+len) writable; returns the previous protection.
    fn unprotect(&mut self, address: usize, len: usize) -> Result<u32>;

    /// Put back the protection returned by `unprotect`.
    fn reprotect(&mut self, address: usize, len: usize, old: u32) -> Result<()>;

    /// Flush the instruction cache after code was modified.
    fn flush(&mut self, _address: usize, _len: usize) {}
}

/// `E9 rel32` at `from` that lands on `to`.
pub fn jump_rel32(from: usize, to: usize) -> [u8; JMP_LEN] {
    let rel = (to as u32).wrapping_sub(from as u32).wrapping_sub(JMP_LEN as u32);
    let r = rel.to_le_bytes();
    [JMP_REL32, r[0], r[1], r[2], r[3]]
}

/// Target of an `E9 rel32` at `from`, or None if the bytes are not a jump.
pub fn decode_jump(from: usize, bytes: &[u8]) -> Option<usize> {
    match bytes {
        [JMP_REL32, a, b, c, d, ..] => {
            let rel = u32::from_le_bytes([*a, *b, *c, *d]);
            Some((from as u32).wrapping_add(JMP_LEN as u32).wrapping_add(rel) as usize)
        }
        _ => None,
    }
}

/// Write `bytes` at `address`, temporarily lifting page protection.
pub fn write_code<M: CodeMemory>(mem: &mut M, address: usize, bytes: &[u8]) -> Result<()> {
    let old = mem.unprotect(address, bytes.len())?;
    let written = mem.write_bytes(address, bytes);
    // Restore even if the write failed.
    let restored = mem.reprotect(address, bytes.len(), old);
    written?;
    restored?;
    mem.flush(address, bytes.len());
    Ok(())
}

/// Check that `address` holds `retn imm16` with the given immediate, followed
/// by alignment padding (INT3 or NOP) up to `patch_len` bytes, so a patch of
/// that length only covers dead bytes after the return.
pub fn check_retn_site<M: ReadMemory>(mem: &M, address: usize, imm: u16, patch_len: usize) -> Result<()> {
    let found = mem.read_vec(address, patch_len.max(3))?;
    let i = imm.to_le_bytes();
    let expected = [RETN_IMM16, i[0], i[1]];
    let padded = found[3..].iter().all(|&b| b == INT3 || b == NOP);
    if found[..3] != expected || !padded {
        return Err(Error::SignatureMismatch {
            address,
            expected: format!("{} + padding", hex_bytes(&expected)),
            found: hex_bytes(&found),
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct InlinePatch {
    address: usize,
    target: usize,
    len: usize,
    original: Option<Vec<u8>>,
}

impl InlinePatch {
    /// A patch of `len` bytes at `address` jumping to `target`.
    pub fn new(address: usize, target: usize, len: usize) -> Result<Self> {
        if len < JMP_LEN {
            return Err(Error::PatchTooShort(len));
        }
        Ok(Self { address, target, len, original: None })
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn is_applied(&self) -> bool {
        self.original.is_some()
    }

    /// Bytes saved by `apply`, if applied.
    #[cfg(test)]
    pub fn original(&self) -> Option<&[u8]> {
        self.original.as_deref()
    }

    /// The bytes that `apply` writes.
    pub fn bytes(&self) -> Vec<u8> {
        let mut b = vec![NOP; self.len];
        b[..JMP_LEN].copy_from_slice(&jump_rel32(self.address, self.target));
        b
    }

    pub fn apply<M: CodeMemory>(&mut self, mem: &mut M) -> Result<()> {
        if self.original.is_some() {
            return Err(Error::AlreadyApplied(self.address));
        }
        let saved = mem.read_vec(self.address, self.len)?;
        let jmp = self.bytes();
        log::debug!(
            "patch {:08X}: [{}] -> [{}]",
            self.address,
            hex_bytes(&saved),
            hex_bytes(&jmp)
        );
        write_code(mem, self.address, &jmp)?;
        self.original = Some(saved);

        // Read back what the CPU will execute.
        let live = mem.read_vec(self.address, JMP_LEN)?;
        if decode_jump(self.address, &live) != Some(self.target) {
            return Err(Error::SignatureMismatch {
                address: self.address,
                expected: hex_bytes(&jmp[..JMP_LEN]),
                found: hex_bytes(&live),
            });
        }
        Ok(())
    }

    pub fn revert<M: CodeMemory>(&mut self, mem: &mut M) -> Result<()> {
        let saved = self.original.as_ref().ok_or(Error::NotApplied(self.address))?;
        write_code(mem, self.address, saved)?;
        log::debug!("patch {:08X}: restored [{}]", self.address, hex_bytes(saved));
        self.original = None;
        Ok(())
    }
}

#[cfg(windows)]
mod live {
    use super::CodeMemory;
    use crate::error::{Error, Result};
    use crate::memory::ProcessMemory;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::memoryapi::VirtualProtect;
    use winapi::um::processthreadsapi::{FlushInstructionCache, GetCurrentProcess};
    use winapi::um::winnt::PAGE_EXECUTE_READWRITE;

    impl CodeMemory for ProcessMemory {
        fn unprotect(&mut self, address: usize, len: usize) -> Result<u32> {
            let mut old: u32 = 0;
            if unsafe { VirtualProtect(address as *mut _, len, PAGE_EXECUTE_READWRITE, &mut old) } == 0 {
                return Err(Error::ProtectFailed { address, code: unsafe { GetLastError() } });
            }
            Ok(old)
        }

        fn reprotect(&mut self, address: usize, len: usize, old: u32) -> Result<()> {
            let mut ignored: u32 = 0;
            if unsafe { VirtualProtect(address as *mut _, len, old, &mut ignored) } == 0 {
                return Err(Error::ProtectFailed { address, code: unsafe { GetLastError() } });
            }
            Ok(())
        }

        fn flush(&mut self, address: usize, len: usize) {
            unsafe { FlushInstructionCache(GetCurrentProcess(), address as *const _, len) };
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::BufferMemory;

    /// BufferMemory that records protection changes.
    pub(crate) struct Code {
        pub(crate) mem: BufferMemory,
        pub(crate) unprotected: Vec<(usize, usize)>,
        pub(crate) restored: Vec<u32>,
        pub(crate) deny_write: bool,
    }

    impl Code {
        pub(crate) fn new(base: usize, bytes: Vec<u8>) -> Self {
            Self {
                mem: BufferMemory::with_bytes(base, bytes),
                unprotected: Vec::new(),
                restored: Vec::new(),
                deny_write: false,
            }
        }
    }

    impl ReadMemory for Code {
        fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<()> {
            self.mem.read_bytes(address, buf)
        }
    }

    impl WriteMemory for Code {
        fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
            if self.deny_write {
                return Err(Error::Unreadable { address, len: bytes.len() });
            }
            self.mem.write_bytes(address, bytes)
        }
    }

    impl CodeMemory for Code {
        fn unprotect(&mut self, address: usize, len: usize) -> Result<u32> {
            self.unprotected.push((address, len));
            Ok(0x20)
        }

        fn reprotect(&mut self, _address: usize, _len: usize, old: u32) -> Result<()> {
            self.restored.push(old);
            Ok(())
        }
    }

    #[test]
    fn test_jump_rel32_forward_and_backward() {
        assert_eq!(jump_rel32(0x1000, 0x2000), [0xE9, 0xFB, 0x0F, 0x00, 0x00]);
        // Backward jump wraps into a negative displacement.
        assert_eq!(jump_rel32(0x2000, 0x1000), [0xE9, 0xFB, 0xEF, 0xFF, 0xFF]);
        assert_eq!(decode_jump(0x2000, &jump_rel32(0x2000, 0x1000)), Some(0x1000));
        assert_eq!(decode_jump(0x2000, &[0xC3]), None);
    }

    #[test]
    fn test_patch_bytes_padded_with_nops() {
        let p = InlinePatch::new(0x0053_2B58, 0x1000_0000, 6).unwrap();
        let b = p.bytes();
        assert_eq!(b.len(), 6);
        assert_eq!(b[0], JMP_REL32);
        assert_eq!(b[5], NOP);
        assert_eq!(decode_jump(0x0053_2B58, &b), Some(0x1000_0000));
        assert!(InlinePatch::new(0x1000, 0x2000, 4).is_err());
    }

    #[test]
    fn test_apply_then_revert_restores_original() {
        let original = vec![0xC2, 0x1C, 0x00, 0xCC, 0xCC, 0xCC, 0x51, 0x53];
        let mut code = Code::new(0x1000, original.clone());
        let mut p = InlinePatch::new(0x1000, 0x5000, 6).unwrap();

        p.apply(&mut code).unwrap();
        assert!(p.is_applied());
        assert_eq!(p.original(), Some(&original[..6]));
        assert_eq!(&code.mem.as_slice()[..6], &p.bytes()[..]);
        // Bytes after the patch are untouched.
        assert_eq!(&code.mem.as_slice()[6..], &original[6..]);
        assert_eq!(code.unprotected, vec![(0x1000, 6)]);
        assert_eq!(code.restored, vec![0x20]);

        p.revert(&mut code).unwrap();
        assert!(!p.is_applied());
        assert_eq!(code.mem.as_slice(), &original[..]);
        assert_eq!(code.restored, vec![0x20, 0x20]);
    }

    #[test]
    fn test_double_apply_and_stray_revert_are_errors() {
        let mut code = Code::new(0x1000, vec![0u8; 8]);
        let mut p = InlinePatch::new(0x1000, 0x5000, 5).unwrap();
        assert!(matches!(p.revert(&mut code), Err(Error::NotApplied(0x1000))));
        p.apply(&mut code).unwrap();
        assert!(matches!(p.apply(&mut code), Err(Error::AlreadyApplied(0x1000))));
    }

    #[test]
    fn test_failed_write_still_restores_protection() {
        let mut code = Code::new(0x1000, vec![0u8; 8]);
        code.deny_write = true;
        let mut p = InlinePatch::new(0x1000, 0x5000, 5).unwrap();
        assert!(p.apply(&mut code).is_err());
        assert!(!p.is_applied());
        assert_eq!(code.restored, vec![0x20]);
    }

    /// Memory that drops writes on the floor but reports success.
    struct Stuck(Code);

    impl ReadMemory for Stuck {
        fn read_bytes(&self, address: usize, buf: &mut [u8]) -> Result<()> {
            self.0.read_bytes(address, buf)
        }
    }

    impl WriteMemory for Stuck {
        fn write_bytes(&mut self, _address: usize, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    impl CodeMemory for Stuck {
        fn unprotect(&mut self, address: usize, len: usize) -> Result<u32> {
            self.0.unprotect(address, len)
        }

        fn reprotect(&mut self, address: usize, len: usize, old: u32) -> Result<()> {
            self.0.reprotect(address, len, old)
        }
    }

    #[test]
    fn test_apply_verifies_written_jump() {
        let mut stuck = Stuck(Code::new(0x1000, vec![0xC2, 0x1C, 0x00, 0xCC, 0xCC, 0xCC]));
        let mut p = InlinePatch::new(0x1000, 0x5000, 6).unwrap();
        let err = p.apply(&mut stuck).unwrap_err();
        assert!(matches!(err, Error::SignatureMismatch { address: 0x1000, .. }));
        // The saved bytes are kept so the site can still be reverted.
        assert!(p.is_applied());
    }

    #[test]
    fn test_check_retn_site() {
        let code = Code::new(0x1000, vec![0xC2, 0x1C, 0x00, 0xCC, 0xCC, 0x90, 0x51]);
        assert!(check_retn_site(&code, 0x1000, 0x1C, 6).is_ok());
        let err = check_retn_site(&code, 0x1000, 0x10, 6).unwrap_err();
        assert!(err.to_string().contains("C2 10 00"));
        // The next function starts inside the patch.
        assert!(check_retn_site(&code, 0x1000, 0x1C, 7).is_err());
        assert!(check_retn_site(&code, 0x1003, 0x1C, 3).is_err());
    }
}
