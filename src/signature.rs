// signature.rs — Byte patterns with wildcards.
//
// Used to confirm that the configured offset really points at the code we
// expect before it is patched, and to relocate it inside the module image
// when it does not.

use crate::error::{Error, Result};
use crate::memory::ReadMemory;

/// Entry of the character constructor: `push ecx; push ebx; mov ebx,[esp+10];
/// push edi; mov eax,2; lea edi,[esi+18]; mov [esi+4],'char'; mov [esi+8],ax`.
pub const CHARACTER_CONSTRUCTOR: &str =
    "51 53 8B 5C 24 10 57 B8 02 00 00 00 8D 7E 18 C7 46 04 72 61 68 63 66 89 46 08";

/// Opcode of `retn imm16`.
pub const RETN_IMM16: u8 = 0xC2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<Option<u8>>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        parse_pattern(pattern).map(|bytes| Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `data` starts with this pattern.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= self.bytes.len()
            && self
                .bytes
                .iter()
                .zip(data)
                .all(|(p, b)| p.map_or(true, |v| v == *b))
    }

    /// Every offset in `haystack` where the pattern matches.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        if haystack.len() < self.bytes.len() {
            return Vec::new();
        }
        (0..=haystack.len() - self.bytes.len())
            .filter(|&i| self.matches(&haystack[i..]))
            .collect()
    }

    /// The single match in `haystack`; zero or several matches are errors.
    pub fn find_unique(&self, haystack: &[u8]) -> Result<usize> {
        match self.find_all(haystack).as_slice() {
            [one] => Ok(*one),
            [] => Err(Error::SignatureNotFound(self.to_string())),
            many => Err(Error::SignatureNotFound(format!(
                "{} ({} matches)",
                self,
                many.len()
            ))),
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_pattern(&self.bytes))
    }
}

/// Find `pattern` at `expected`, or failing that exactly once inside the
/// image [base, base + size). Returns the address where it matched.
pub fn locate<M: ReadMemory>(
    mem: &M,
    pattern: &Pattern,
    expected: usize,
    base: usize,
    size: usize,
) -> Result<usize> {
    if let Ok(head) = mem.read_vec(expected, pattern.len()) {
        if pattern.matches(&head) {
            return Ok(expected);
        }
        log::warn!(
            "signature mismatch at {:08X}: found [{}], scanning image",
            expected,
            hex_bytes(&head)
        );
    }
    let image = mem.read_vec(base, size)?;
    let off = pattern.find_unique(&image)?;
    log::info!("signature found at {:08X} (+{:X})", base + off, off);
    Ok(base + off)
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }
        let value = u8::from_str_radix(token, 16)
            .map_err(|e| Error::InvalidPattern(format!("token '{}': {}", token, e)))?;
        bytes.push(Some(value));
    }
    if bytes.is_empty() {
        return Err(Error::InvalidPattern("empty pattern".to_string()));
    }
    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex listing of concrete bytes, used in mismatch reports.
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
