//! Persisted user settings
//!
//! Settings are a two-level key-value store (section, key). The tool path
//! overrides read by detection, and written back by `save_tool_paths`, live
//! under separate sections so a host can scope them independently.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

use crate::detect::ToolKind;
use crate::error::{Result, SetupError};

pub const OPENOCD_SECTION: &str = "openocd";
pub const OPENOCD_PATH_KEY: &str = "path";
pub const TOOLCHAIN_SECTION: &str = "toolchain";
pub const TOOLCHAIN_PATH_KEY: &str = "armToolchainPath";

type Table = BTreeMap<String, BTreeMap<String, String>>;

pub trait SettingsStore: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Option<String>;

    fn set(&self, section: &str, key: &str, value: &str) -> Result<()>;
}

/// (section, key) holding the explicit path override for a tool
pub fn tool_path_key(kind: ToolKind) -> (&'static str, &'static str) {
    match kind {
        ToolKind::OpenOcd => (OPENOCD_SECTION, OPENOCD_PATH_KEY),
        ToolKind::CrossCompiler => (TOOLCHAIN_SECTION, TOOLCHAIN_PATH_KEY),
    }
}

/// Explicit override path for a tool, if one is configured and non-empty
pub fn tool_path_override(store: &dyn SettingsStore, kind: ToolKind) -> Option<PathBuf> {
    let (section, key) = tool_path_key(kind);
    store
        .get(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Write both tool paths. Each key is written independently; the first
/// failure is returned after attempting both.
pub fn save_tool_paths(
    store: &dyn SettingsStore,
    openocd: Option<&Path>,
    cross_compiler: Option<&Path>,
) -> Result<usize> {
    let mut written = 0;
    let mut first_error = None;

    for (kind, path) in [(ToolKind::OpenOcd, openocd), (ToolKind::CrossCompiler, cross_compiler)] {
        let Some(path) = path else { continue };
        let (section, key) = tool_path_key(kind);
        match store.set(section, key, &path.to_string_lossy()) {
            Ok(()) => written += 1,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

/// In-memory settings
#[derive(Debug, Default)]
pub struct MemorySettings {
    table: RwLock<Table>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, section: &str, key: &str, value: &str) -> Self {
        if let Ok(mut table) = self.table.write() {
            table
                .entry(section.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        self
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let table = self.table.read().ok()?;
        table.get(section)?.get(key).cloned()
    }

    fn set(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let mut table = self
            .table
            .write()
            .map_err(|_| SetupError::Settings("settings lock poisoned".to_string()))?;
        table
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted to a TOML file, one table per section
#[derive(Debug)]
pub struct TomlSettings {
    path: PathBuf,
    table: RwLock<Table>,
}

impl TomlSettings {
    /// Open a settings file. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                SetupError::Settings(format!("Failed to read {}: {}", path.display(), e))
            })?;
            toml::from_str::<Table>(&content)?
        } else {
            Table::new()
        };
        debug!("Loaded {} settings sections from {}", table.len(), path.display());
        Ok(Self { path, table: RwLock::new(table) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, table: &Table) -> Result<()> {
        let content = toml::to_string_pretty(table)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SetupError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        std::fs::write(&self.path, content).map_err(|e| {
            SetupError::Persistence(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

impl SettingsStore for TomlSettings {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let table = self.table.read().ok()?;
        table.get(section)?.get(key).cloned()
    }

    fn set(&self, section: &str, key: &str, value: &str) -> Result<()> {
        let mut table = self
            .table
            .write()
            .map_err(|_| SetupError::Settings("settings lock poisoned".to_string()))?;
        // Memory only changes once the file does
        let mut updated = table.clone();
        updated
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.flush(&updated)?;
        *table = updated;
        info!("Saved {}.{} to {}", section, key, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct ReadOnlySettings;

    impl SettingsStore for ReadOnlySettings {
        fn get(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }

        fn set(&self, section: &str, _key: &str, _value: &str) -> Result<()> {
            Err(SetupError::Persistence(format!("section {} is read-only", section)))
        }
    }

    #[test]
    fn test_memory_settings_override_lookup() {
        let store = MemorySettings::new().with(OPENOCD_SECTION, OPENOCD_PATH_KEY, "/opt/openocd/bin/openocd");
        assert_eq!(
            tool_path_override(&store, ToolKind::OpenOcd),
            Some(PathBuf::from("/opt/openocd/bin/openocd"))
        );
        assert!(tool_path_override(&store, ToolKind::CrossCompiler).is_none());
    }

    #[test]
    fn test_blank_override_ignored() {
        let store = MemorySettings::new().with(TOOLCHAIN_SECTION, TOOLCHAIN_PATH_KEY, "   ");
        assert!(tool_path_override(&store, ToolKind::CrossCompiler).is_none());
    }

    #[test]
    fn test_save_tool_paths_writes_separate_sections() {
        let store = MemorySettings::new();
        let written = save_tool_paths(
            &store,
            Some(Path::new("/usr/bin/openocd")),
            Some(Path::new("/opt/gcc/bin/arm-none-eabi-gcc")),
        )
        .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.get("openocd", "path").as_deref(), Some("/usr/bin/openocd"));
        assert_eq!(
            store.get("toolchain", "armToolchainPath").as_deref(),
            Some("/opt/gcc/bin/arm-none-eabi-gcc")
        );
    }

    #[test]
    fn test_save_tool_paths_surfaces_failure() {
        let result = save_tool_paths(&ReadOnlySettings, Some(Path::new("/usr/bin/openocd")), None);
        assert!(matches!(result, Err(SetupError::Persistence(_))));
    }

    #[test]
    fn test_toml_settings_round_trip_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.toml");

        let store = TomlSettings::open(&path).unwrap();
        assert!(store.get("openocd", "path").is_none());
        store.set("openocd", "path", "/opt/openocd/bin/openocd").unwrap();

        let reopened = TomlSettings::open(&path).unwrap();
        assert_eq!(reopened.get("openocd", "path").as_deref(), Some("/opt/openocd/bin/openocd"));
    }

    #[test]
    fn test_toml_settings_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(TomlSettings::open(&path), Err(SetupError::Settings(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_flush_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let store = TomlSettings::open(blocker.join("settings.toml")).unwrap();
        let err = store.set("openocd", "path", "/opt/openocd/bin/openocd").unwrap_err();
        assert!(matches!(err, SetupError::Persistence(_)));
        assert!(store.get("openocd", "path").is_none());
    }
}
