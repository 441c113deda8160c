//! OpenOCD search table and version parsing

use crate::env::Platform;

use super::strategy::ToolSpec;
use super::version::extract_semver;
use super::ToolKind;

pub const EXECUTABLE: &str = "openocd";

pub const ENV_VARS: &[&str] = &["OPENOCD_PATH", "OPENOCD_HOME", "OPENOCD_DIR", "OPENOCD_ROOT"];

const UNIX_LOCATIONS: &[&str] = &[
    "/usr/local/bin/openocd",
    "/usr/bin/openocd",
    "/opt/openocd/bin/openocd",
    "~/.platformio/packages/tool-openocd/bin/openocd",
    "~/.local/xPacks/@xpack-dev-tools/openocd/*/.content/bin/openocd",
    "~/opt/xPacks/openocd/*/bin/openocd",
    "/opt/st/stm32cubeide_*/plugins/com.st.stm32cube.ide.mcu.externaltools.openocd.*/tools/bin/openocd",
];

const MACOS_LOCATIONS: &[&str] = &[
    "/opt/homebrew/bin/openocd",
    "/usr/local/bin/openocd",
    "/opt/local/bin/openocd",
    "~/.platformio/packages/tool-openocd/bin/openocd",
    "~/Library/xPacks/@xpack-dev-tools/openocd/*/.content/bin/openocd",
    "/Applications/STM32CubeIDE.app/Contents/Eclipse/plugins/com.st.stm32cube.ide.mcu.externaltools.openocd.*/tools/bin/openocd",
];

const WINDOWS_LOCATIONS: &[&str] = &[
    "C:/openocd/bin/openocd.exe",
    "%ProgramFiles%/OpenOCD/bin/openocd.exe",
    "%ProgramFiles(x86)%/OpenOCD/bin/openocd.exe",
    "%APPDATA%/xPacks/@xpack-dev-tools/openocd/*/.content/bin/openocd.exe",
    "%USERPROFILE%/.platformio/packages/tool-openocd/bin/openocd.exe",
    "C:/ST/STM32CubeIDE_*/STM32CubeIDE/plugins/com.st.stm32cube.ide.mcu.externaltools.openocd.*/tools/bin/openocd.exe",
];

/// Default search table for OpenOCD on `platform`
pub fn spec(platform: Platform) -> ToolSpec {
    let locations = match platform {
        Platform::Windows => WINDOWS_LOCATIONS,
        Platform::MacOs => MACOS_LOCATIONS,
        Platform::Linux => UNIX_LOCATIONS,
    };
    ToolSpec::new(ToolKind::OpenOcd, EXECUTABLE)
        .with_env_vars(ENV_VARS.iter().copied())
        .with_common_locations(locations.iter().copied())
}

/// Parse the first line of `openocd --version`.
///
/// e.g. `xPack Open On-Chip Debugger 0.12.0+dev-01312 (2023-09-04-22:32)`
pub fn parse_version_line(line: &str) -> (Option<String>, Option<String>) {
    let version = extract_semver(line);
    let lower = line.to_ascii_lowercase();
    let vendor = if lower.contains("xpack") {
        Some("xPack".to_string())
    } else if lower.contains("stmicroelectronics") || lower.contains("st-openocd") {
        Some("STMicroelectronics".to_string())
    } else if lower.contains("espressif") || lower.contains("esp32") {
        Some("Espressif".to_string())
    } else if lower.contains("open on-chip debugger") {
        Some("OpenOCD".to_string())
    } else {
        None
    };
    (version, vendor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upstream() {
        let (version, vendor) = parse_version_line("Open On-Chip Debugger 0.12.0 (2023-01-14-23:37)");
        assert_eq!(version.as_deref(), Some("0.12.0"));
        assert_eq!(vendor.as_deref(), Some("OpenOCD"));
    }

    #[test]
    fn test_parse_xpack() {
        let (version, vendor) = parse_version_line(
            "xPack Open On-Chip Debugger 0.12.0+dev-01312-g18281b0c4-dirty (2023-09-04-22:32)",
        );
        assert_eq!(version.as_deref(), Some("0.12.0"));
        assert_eq!(vendor.as_deref(), Some("xPack"));
    }

    #[test]
    fn test_parse_garbage() {
        let (version, vendor) = parse_version_line("command not understood");
        assert!(version.is_none());
        assert!(vendor.is_none());
    }

    #[test]
    fn test_spec_per_platform() {
        let linux = spec(Platform::Linux);
        assert_eq!(linux.env_vars[0], "OPENOCD_PATH");
        assert!(linux.common_locations.iter().any(|l| l.contains('*')));

        let windows = spec(Platform::Windows);
        assert!(windows.common_locations.iter().all(|l| l.ends_with(".exe")));
    }
}
