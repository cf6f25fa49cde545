// config.rs — Trainer settings loaded from `jabia_trainer.toml` next to the DLL.
//
// Every key is optional. A missing file means defaults; a broken file is
// reported and defaults are used so the trainer still comes up.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "jabia_trainer.toml";

// ============================================================
// Game Builds
// ============================================================

/// Which build of the game we are injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    #[default]
    Full,
    Demo,
}

/// Code locations of one build, relative to the executable's base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    pub process_name: &'static str,
    /// Entry of the character constructor.
    pub constructor: usize,
    /// Distance from the constructor entry to its `retn imm16`.
    pub constructor_retn: usize,
    /// Stack bytes released by that `retn`.
    pub retn_pop: u16,
    /// Camera update callback; only known for the full build.
    pub camera_callback: Option<usize>,
}

impl Edition {
    pub fn layout(self) -> GameLayout {
        match self {
            Edition::Full => GameLayout {
                process_name: "GameJABiA.exe",
                constructor: 0x132880,
                constructor_retn: 0x2D8,
                retn_pop: 0x1C,
                camera_callback: Some(0x001A_7020),
            },
            Edition::Demo => GameLayout {
                process_name: "GameDemo.exe",
                constructor: 0x112450,
                constructor_retn: 0x210,
                retn_pop: 0x10,
                camera_callback: None,
            },
        }
    }
}

// ============================================================
// Hotkeys
// ============================================================

/// A virtual-key code, written in the config by name ("F7", "NUMPAD0", "0x76").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Hotkey(pub i32);

impl Hotkey {
    pub fn parse(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let unknown = || Error::UnknownHotkey(name.to_string());

        if let Some(hex) = upper.strip_prefix("0X") {
            return match i32::from_str_radix(hex, 16) {
                Ok(code @ 0x01..=0xFE) => Ok(Hotkey(code)),
                _ => Err(unknown()),
            };
        }
        if let Some(n) = upper.strip_prefix("NUMPAD") {
            return match n.parse::<i32>() {
                Ok(d @ 0..=9) => Ok(Hotkey(0x60 + d)),
                _ => Err(unknown()),
            };
        }
        if let Some(n) = upper.strip_prefix('F') {
            if let Ok(f @ 1..=24) = n.parse::<i32>() {
                return Ok(Hotkey(0x70 + f - 1));
            }
        }
        let code = match upper.as_str() {
            "ADD" => 0x6B,
            "SUBTRACT" => 0x6D,
            "MULTIPLY" => 0x6A,
            "DIVIDE" => 0x6F,
            "INSERT" => 0x2D,
            "DELETE" => 0x2E,
            "HOME" => 0x24,
            "END" => 0x23,
            "PAGEUP" => 0x21,
            "PAGEDOWN" => 0x22,
            s if s.len() == 1 && s.as_bytes()[0].is_ascii_alphanumeric() => s.as_bytes()[0] as i32,
            _ => return Err(unknown()),
        };
        Ok(Hotkey(code))
    }
}

impl TryFrom<String> for Hotkey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Hotkey::parse(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    pub dialog: Hotkey,
    pub unload: Hotkey,
    pub clear: Hotkey,
    pub camera_raise: Hotkey,
    pub camera_lower: Hotkey,
    pub camera_info: Hotkey,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            dialog: Hotkey(0x76),       // F7
            unload: Hotkey(0x77),       // F8
            clear: Hotkey(0x78),        // F9
            camera_raise: Hotkey(0x6B), // numpad +
            camera_lower: Hotkey(0x6D), // numpad -
            camera_info: Hotkey(0x60),  // numpad 0
        }
    }
}

impl Hotkeys {
    fn bindings(&self) -> [(&'static str, Hotkey); 6] {
        [
            ("dialog", self.dialog),
            ("unload", self.unload),
            ("clear", self.clear),
            ("camera_raise", self.camera_raise),
            ("camera_lower", self.camera_lower),
            ("camera_info", self.camera_info),
        ]
    }

    /// Every action needs its own key; a shared key only ever fires the
    /// first action polled.
    pub fn check_distinct(&self) -> Result<()> {
        let bindings = self.bindings();
        for (i, (name, key)) in bindings.iter().enumerate() {
            if let Some((other, _)) = bindings[..i].iter().find(|(_, k)| k == key) {
                return Err(Error::InvalidConfig(format!(
                    "hotkeys.{} and hotkeys.{} are both bound to {:#04X}",
                    other, name, key.0
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// Top Level
// ============================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of off, error, warn, info, debug, trace.
    pub level: String,
    /// Log file name, relative to the DLL's directory.
    pub file: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            file: "jabia_trainer.log".to_string(),
        }
    }
}

impl LogConfig {
    /// The configured level, or an error naming the bad value.
    pub fn parse_level(&self) -> Result<log::LevelFilter> {
        self.level
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("log.level {:?} is not a log level", self.level)))
    }

    /// Level to log at; `parse_level` has already vetted it for loaded configs.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.parse_level().unwrap_or(log::LevelFilter::Debug)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub edition: Edition,
    /// Overrides the executable name implied by `edition`.
    pub process_name: Option<String>,
    pub hotkeys: Hotkeys,
    /// Install the camera callback detour.
    pub camera: bool,
    /// How much one camera hotkey press moves the minimum height.
    pub camera_step: f32,
    pub poll_interval_ms: u64,
    pub log: LogConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            edition: Edition::default(),
            process_name: None,
            hotkeys: Hotkeys::default(),
            camera: true,
            camera_step: 10.0,
            poll_interval_ms: 100,
            log: LogConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.hotkeys.check_distinct()?;
        config.log.parse_level()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml(&s)
    }

    /// Load from `dir`, falling back to defaults. The error, if any, is handed
    /// back so it can be logged once logging is up.
    pub fn load_or_default(dir: &Path) -> (Self, Option<Error>) {
        match Self::load(dir.join(CONFIG_FILE)) {
            Ok(c) => (c, None),
            Err(e) if e.is_not_found() => (Self::default(), None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn process_name(&self) -> &str {
        self.process_name
            .as_deref()
            .unwrap_or_else(|| self.edition.layout().process_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let c = TrainerConfig::from_toml("").unwrap();
        assert_eq!(c, TrainerConfig::default());
        assert_eq!(c.process_name(), "GameJABiA.exe");
        assert_eq!(c.hotkeys.dialog, Hotkey(0x76));
    }

    #[test]
    fn test_demo_edition_and_overrides() {
        let c = TrainerConfig::from_toml(
            r#"
            edition = "demo"
            camera = false
            poll_interval_ms = 50

            [hotkeys]
            dialog = "F5"
            unload = "numpad9"

            [log]
            level = "trace"
            "#,
        )
        .unwrap();
        assert_eq!(c.edition, Edition::Demo);
        assert_eq!(c.process_name(), "GameDemo.exe");
        assert!(!c.camera);
        assert_eq!(c.poll_interval_ms, 50);
        assert_eq!(c.hotkeys.dialog, Hotkey(0x74));
        assert_eq!(c.hotkeys.unload, Hotkey(0x69));
        assert_eq!(c.hotkeys.clear, Hotkey(0x78));
        assert_eq!(c.log.level_filter(), log::LevelFilter::Trace);
        assert_eq!(c.log.file, "jabia_trainer.log");
    }

    #[test]
    fn test_bad_hotkey_is_an_error() {
        assert!(TrainerConfig::from_toml("[hotkeys]\ndialog = \"F99\"").is_err());
        assert!(TrainerConfig::from_toml("edition = \"gold\"").is_err());
    }

    #[test]
    fn test_shared_hotkey_is_rejected() {
        let err = TrainerConfig::from_toml("[hotkeys]\nunload = \"F7\"").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("hotkeys.dialog and hotkeys.unload"));
        // Swapping two keys is fine.
        assert!(TrainerConfig::from_toml("[hotkeys]\nunload = \"F7\"\ndialog = \"F8\"").is_ok());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let err = TrainerConfig::from_toml("[log]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("loud"));
        assert!(TrainerConfig::from_toml("[log]\nlevel = \"WARN\"").is_ok());
    }

    #[test]
    fn test_hotkey_names() {
        assert_eq!(Hotkey::parse("f8").unwrap(), Hotkey(0x77));
        assert_eq!(Hotkey::parse("ADD").unwrap(), Hotkey(0x6B));
        assert_eq!(Hotkey::parse("0x2d").unwrap(), Hotkey(0x2D));
        assert_eq!(Hotkey::parse("k").unwrap(), Hotkey(b'K' as i32));
        assert_eq!(Hotkey::parse("7").unwrap(), Hotkey(b'7' as i32));
        assert!(Hotkey::parse("numpad10").is_err());
        assert!(Hotkey::parse("0x00").is_err());
        assert!(Hotkey::parse("").is_err());
    }

    #[test]
    fn test_layouts_per_edition() {
        let full = Edition::Full.layout();
        assert_eq!(full.constructor + full.constructor_retn, 0x132B58);
        assert_eq!(full.retn_pop, 0x1C);
        let demo = Edition::Demo.layout();
        assert_eq!(demo.constructor + demo.constructor_retn, 0x112660);
        assert!(demo.camera_callback.is_none());
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (c, err) = TrainerConfig::load_or_default(dir.path());
        assert!(err.is_none());
        assert_eq!(c, TrainerConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), "camera = \"yes\"").unwrap();
        let (c, err) = TrainerConfig::load_or_default(dir.path());
        assert!(err.is_some());
        assert!(c.camera);
    }
}
