//! Path and environment helpers shared by detection and validation

use regex::Regex;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::env::{EnvSource, Platform};

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_()]*)\}|%([A-Za-z_][A-Za-z0-9_()]*)%|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static regex")
    })
}

/// Expand `~`, `${VAR}`, `$VAR` and `%VAR%` references in a path template.
///
/// Returns `None` if any referenced variable is unset, so a template that
/// depends on a missing variable is skipped instead of probing a bogus path.
pub fn expand_template(template: &str, env: &dyn EnvSource) -> Option<String> {
    let mut expanded = if template == "~" || template.starts_with("~/") || template.starts_with("~\\") {
        let home = env.home_dir()?;
        format!("{}{}", home.display(), &template[1..])
    } else {
        template.to_string()
    };

    if !expanded.contains('$') && !expanded.contains('%') {
        return Some(expanded);
    }

    let mut out = String::with_capacity(expanded.len());
    let mut last = 0;
    for caps in var_pattern().captures_iter(&expanded) {
        let whole = caps.get(0)?;
        let name = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?.as_str();
        let value = env.var(name).filter(|v| !v.is_empty())?;
        out.push_str(&expanded[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&expanded[last..]);
    expanded = out;
    Some(expanded)
}

/// Lexically normalize a path: drop `.` segments and fold `..` into its parent
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_in_normal = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if ends_in_normal {
                    out.pop();
                } else {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Split a PATH-like value into directories, ignoring empty entries
pub fn split_path_list(value: &str, platform: Platform) -> Vec<PathBuf> {
    value
        .split(platform.path_list_separator())
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| PathBuf::from(entry.trim_matches('"')))
        .collect()
}

/// Stat a path and report whether it is a regular file.
///
/// Absence is `Ok(false)`. Permission errors propagate so the caller can
/// report them instead of silently moving on.
pub fn probe_file(path: &Path) -> io::Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(io::Error::new(
            e.kind(),
            format!("cannot stat {}: {}", path.display(), e),
        )),
        Err(e) => {
            debug!("Treating {} as absent: {}", path.display(), e);
            Ok(false)
        }
    }
}

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// On Windows, executability is determined by file extension, not permission bits.
#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolve a concrete or wildcard path to the first existing regular file.
///
/// A `*` may appear in any segment. Matching children are visited in
/// lexicographic order and the first one that is a regular file wins.
pub fn resolve_wildcard(pattern: &str) -> io::Result<Option<PathBuf>> {
    if !pattern.contains('*') {
        let path = PathBuf::from(pattern);
        return Ok(probe_file(&path)?.then_some(path));
    }

    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Invalid location pattern {}: {}", pattern, e);
            return Ok(None);
        }
    };

    for entry in entries {
        match entry {
            Ok(path) => {
                if probe_file(&path)? {
                    return Ok(Some(path));
                }
            }
            Err(e) => debug!("Skipping unreadable match for {}: {}", pattern, e),
        }
    }
    Ok(None)
}

/// Install root for an executable living in `<root>/bin/<exe>`
pub fn install_root_of(executable: &Path) -> PathBuf {
    let dir = executable.parent().unwrap_or_else(|| Path::new("."));
    if dir.file_name().map(|n| n == "bin").unwrap_or(false) {
        dir.parent().unwrap_or(dir).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}
