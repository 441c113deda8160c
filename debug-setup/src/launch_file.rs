//! `.vscode/launch.json` reading and merging
//!
//! Editors write this file as JSON with comments and trailing commas, so it
//! is cleaned up before being handed to `serde_json`.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SetupError};
use crate::generator::DebugConfig;

pub const LAUNCH_FILE: &str = ".vscode/launch.json";
const LAUNCH_FILE_VERSION: &str = "0.2.0";

/// Remove `//` and `/* */` comments and trailing commas outside of strings
pub fn strip_json_comments(input: &str) -> String {
    strip_trailing_commas(&strip_comments(input))
}

/// Copy a string literal whose opening quote was just consumed
fn copy_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    out.push('"');
    while let Some(c) = chars.next() {
        out.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '"' => return,
            _ => {}
        }
    }
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => copy_string(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Runs on comment-free input, so the next non-whitespace character decides
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => copy_string(&mut chars, &mut out),
            ',' => {
                let next = chars.clone().find(|n| !n.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

pub fn launch_file_path(workspace: &Path) -> PathBuf {
    workspace.join(LAUNCH_FILE)
}

/// Parsed launch file, `None` when the workspace has none
pub fn read_launch_file(workspace: &Path) -> Result<Option<Value>> {
    let path = launch_file_path(workspace);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_str(&strip_json_comments(&text))?;
    Ok(Some(value))
}

/// Entries of the `configurations` array
pub fn configurations(launch: &Value) -> &[Value] {
    launch
        .get("configurations")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Merge `config` into the workspace launch file, replacing any entry with
/// the same name. Returns the path written.
pub fn write_launch_config(workspace: &Path, config: &DebugConfig) -> Result<PathBuf> {
    if !workspace.is_dir() {
        return Err(SetupError::Persistence(format!(
            "Workspace does not exist: {}",
            workspace.display()
        )));
    }

    let path = launch_file_path(workspace);
    let mut launch = read_launch_file(workspace)
        .map_err(|e| SetupError::Persistence(format!("Cannot read {}: {}", path.display(), e)))?
        .unwrap_or_else(|| json!({ "version": LAUNCH_FILE_VERSION, "configurations": [] }));

    let root = launch.as_object_mut().ok_or_else(|| {
        SetupError::Persistence(format!("{} is not a JSON object", path.display()))
    })?;
    let entries = root
        .entry("configurations")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| {
            SetupError::Persistence(format!("{}: `configurations` is not an array", path.display()))
        })?;

    let entry = serde_json::to_value(config)?;
    match entries
        .iter_mut()
        .find(|e| e.get("name").and_then(Value::as_str) == Some(config.name.as_str()))
    {
        Some(existing) => {
            debug!("Replacing launch configuration '{}'", config.name);
            *existing = entry;
        }
        None => entries.push(entry),
    }

    let text = serde_json::to_string_pretty(&launch)?;
    let persist = |e: std::io::Error| SetupError::Persistence(format!("Cannot write {}: {}", path.display(), e));
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(persist)?;
    }
    fs::write(&path, text + "\n").map_err(persist)?;

    info!("Wrote launch configuration '{}' to {}", config.name, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config(name: &str, executable: &str) -> DebugConfig {
        DebugConfig::base(name, executable, "STM32F407VG")
    }

    #[test]
    fn test_strip_comments_and_trailing_commas() {
        let input = r#"{
            // line comment
            "url": "http://example.com", /* block
            comment */
            "list": [1, 2, ],
            "escaped": "quote \" // not a comment",
        }"#;
        let value: Value = serde_json::from_str(&strip_json_comments(input)).unwrap();
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["list"], json!([1, 2]));
        assert_eq!(value["escaped"], "quote \" // not a comment");
    }

    #[test]
    fn test_comment_after_trailing_comma() {
        let input = "[ {\"name\":\"Debug\",\"type\":\"cortex-debug\"}, // keep\n ]";
        let value: Value = serde_json::from_str(&strip_json_comments(input)).unwrap();
        assert_eq!(value, json!([{ "name": "Debug", "type": "cortex-debug" }]));

        let block = r#"{ "a": 1, /* last */ }"#;
        let value: Value = serde_json::from_str(&strip_json_comments(block)).unwrap();
        assert_eq!(value, json!({ "a": 1 }));
    }

    #[test]
    fn test_write_merges_entry_followed_by_comment() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".vscode")).unwrap();
        fs::write(
            tmp.path().join(".vscode/launch.json"),
            "{\n  \"version\": \"0.2.0\",\n  \"configurations\": [\n    {\"name\":\"Debug\",\"type\":\"cortex-debug\"}, // keep\n  ]\n}\n",
        )
        .unwrap();

        write_launch_config(tmp.path(), &sample_config("Release", "build/app.elf")).unwrap();

        let launch = read_launch_file(tmp.path()).unwrap().unwrap();
        let names: Vec<&str> = configurations(&launch)
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Debug", "Release"]);
    }

    #[test]
    fn test_read_missing_launch_file() {
        let tmp = TempDir::new().unwrap();
        assert!(read_launch_file(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_write_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_launch_config(tmp.path(), &sample_config("Debug", "build/app.elf")).unwrap();
        assert_eq!(path, tmp.path().join(".vscode/launch.json"));

        let launch = read_launch_file(tmp.path()).unwrap().unwrap();
        assert_eq!(launch["version"], "0.2.0");
        assert_eq!(configurations(&launch).len(), 1);
        assert_eq!(configurations(&launch)[0]["type"], "cortex-debug");
    }

    #[test]
    fn test_write_replaces_by_name_and_keeps_others() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".vscode")).unwrap();
        fs::write(
            tmp.path().join(".vscode/launch.json"),
            r#"{
                // existing entries
                "version": "0.2.0",
                "configurations": [
                    { "name": "Python", "type": "python", "request": "launch" },
                    { "name": "Debug", "type": "cortex-debug", "executable": "old.elf" },
                ]
            }"#,
        )
        .unwrap();

        write_launch_config(tmp.path(), &sample_config("Debug", "build/new.elf")).unwrap();

        let launch = read_launch_file(tmp.path()).unwrap().unwrap();
        let entries = configurations(&launch);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["name"], "Python");
        assert_eq!(entries[1]["executable"], "build/new.elf");
    }

    #[test]
    fn test_write_missing_workspace_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let err = write_launch_config(&tmp.path().join("nope"), &sample_config("Debug", "a.elf")).unwrap_err();
        assert!(matches!(err, SetupError::Persistence(_)));
    }

    #[test]
    fn test_write_refuses_to_clobber_garbage() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".vscode")).unwrap();
        fs::write(tmp.path().join(".vscode/launch.json"), "not json").unwrap();

        let err = write_launch_config(tmp.path(), &sample_config("Debug", "a.elf")).unwrap_err();
        assert!(matches!(err, SetupError::Persistence(_)));
        assert_eq!(fs::read_to_string(tmp.path().join(".vscode/launch.json")).unwrap(), "not json");
    }
}
