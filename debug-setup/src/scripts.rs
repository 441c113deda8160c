//! OpenOCD script catalog
//!
//! OpenOCD ships its `.cfg` scripts either under
//! `<root>/share/openocd/scripts` (package managers, xPack) or
//! `<root>/scripts` (Windows zips, vendor bundles).

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::paths::install_root_of;

/// Candidate scripts directories for an OpenOCD executable, in lookup order
pub fn scripts_dir_candidates(executable: &Path) -> [PathBuf; 2] {
    let root = install_root_of(executable);
    [root.join("share").join("openocd").join("scripts"), root.join("scripts")]
}

/// First existing scripts directory for an OpenOCD executable
pub fn find_scripts_dir(executable: &Path) -> Option<PathBuf> {
    scripts_dir_candidates(executable).into_iter().find(|p| p.is_dir())
}

/// `.cfg` files under `dir`, relative to it, sorted
pub fn list_cfg_files(dir: &Path) -> Vec<String> {
    let pattern = format!("{}/**/*.cfg", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut files: Vec<String> = match glob::glob(&pattern) {
        Ok(paths) => paths
            .flatten()
            .filter(|p| p.is_file())
            .filter_map(|p| {
                p.strip_prefix(dir)
                    .ok()
                    .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            })
            .collect(),
        Err(e) => {
            debug!("Bad script pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    files.sort();
    files
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptCatalog {
    pub scripts_dir: PathBuf,
    /// Entries of `interface/`, e.g. `stlink.cfg`, `ftdi/olimex-arm-usb-ocd.cfg`
    pub interfaces: Vec<String>,
    /// Entries of `target/`, e.g. `stm32f4x.cfg`
    pub targets: Vec<String>,
}

impl ScriptCatalog {
    /// Catalog for an OpenOCD executable; `None` when no scripts directory exists
    pub fn discover(executable: &Path) -> Option<Self> {
        let scripts_dir = find_scripts_dir(executable)?;
        let interfaces = list_cfg_files(&scripts_dir.join("interface"));
        let targets = list_cfg_files(&scripts_dir.join("target"));
        debug!(
            "Found {} interface and {} target scripts in {}",
            interfaces.len(),
            targets.len(),
            scripts_dir.display()
        );
        Some(Self { scripts_dir, interfaces, targets })
    }

    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i == name)
    }

    pub fn has_target(&self, name: &str) -> bool {
        self.targets.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# cfg\n").unwrap();
    }

    #[test]
    fn test_discover_share_layout() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("bin/openocd");
        write(&exe);
        let scripts = tmp.path().join("share/openocd/scripts");
        write(&scripts.join("interface/stlink.cfg"));
        write(&scripts.join("interface/ftdi/um232h.cfg"));
        write(&scripts.join("target/stm32f4x.cfg"));
        write(&scripts.join("target/README.txt"));

        let catalog = ScriptCatalog::discover(&exe).unwrap();
        assert_eq!(catalog.scripts_dir, scripts);
        assert_eq!(catalog.interfaces, vec!["ftdi/um232h.cfg", "stlink.cfg"]);
        assert_eq!(catalog.targets, vec!["stm32f4x.cfg"]);
        assert!(catalog.has_target("stm32f4x.cfg"));
        assert!(!catalog.has_interface("jlink.cfg"));
    }

    #[test]
    fn test_discover_flat_layout() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("bin/openocd");
        write(&exe);
        write(&tmp.path().join("scripts/target/nrf52.cfg"));

        let catalog = ScriptCatalog::discover(&exe).unwrap();
        assert_eq!(catalog.scripts_dir, tmp.path().join("scripts"));
        assert!(catalog.interfaces.is_empty());
        assert_eq!(catalog.targets, vec!["nrf52.cfg"]);
    }

    #[test]
    fn test_no_scripts_is_none() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("bin/openocd");
        write(&exe);
        assert!(ScriptCatalog::discover(&exe).is_none());
    }
}
