// error.rs — Error type shared by every trainer module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("module not loaded: {0}")]
    ModuleNotFound(String),

    #[error("VirtualProtect failed at {address:#010X} (os error {code})")]
    ProtectFailed { address: usize, code: u32 },

    #[error("memory at {address:#010X} (+{len}) is not accessible")]
    Unreadable { address: usize, len: usize },

    #[error("unexpected bytes at {address:#010X}: expected {expected}, found {found}")]
    SignatureMismatch {
        address: usize,
        expected: String,
        found: String,
    },

    #[error("signature not found: {0}")]
    SignatureNotFound(String),

    #[error("invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("patch at {0:#010X} is already applied")]
    AlreadyApplied(usize),

    #[error("patch at {0:#010X} is not applied")]
    NotApplied(usize),

    #[error("patch length {0} is shorter than a rel32 jump")]
    PatchTooShort(usize),

    #[error("MinHook call {call} failed with status {status}")]
    MinHook { call: &'static str, status: i32 },

    #[error("{field}: cannot parse {input:?}")]
    InvalidField { field: &'static str, input: String },

    #[error("record at {0:#010X} is not a character")]
    NotACharacter(usize),

    #[error("{call} failed (os error {code})")]
    Win32 { call: &'static str, code: u32 },

    #[error("unknown hotkey name: {0}")]
    UnknownHotkey(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error comes from a config file that simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        assert!(err.is_not_found());

        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_formats_addresses_as_hex() {
        let err = Error::AlreadyApplied(0x0053_2B58);
        assert_eq!(err.to_string(), "patch at 0x00532B58 is already applied");
    }
}
