//! ARM GCC (arm-none-eabi) search table and version parsing

use crate::env::Platform;

use super::strategy::ToolSpec;
use super::version::extract_semver;
use super::ToolKind;

pub const EXECUTABLE: &str = "arm-none-eabi-gcc";
pub const DEFAULT_TRIPLE: &str = "arm-none-eabi";

pub const ENV_VARS: &[&str] = &[
    "ARM_TOOLCHAIN_PATH",
    "ARM_GCC_PATH",
    "GCC_ARM_PATH",
    "ARM_NONE_EABI_TOOLCHAIN",
    "GNU_ARM_TOOLCHAIN",
];

const UNIX_LOCATIONS: &[&str] = &[
    "/usr/bin/arm-none-eabi-gcc",
    "/usr/local/bin/arm-none-eabi-gcc",
    "/opt/gcc-arm-none-eabi/bin/arm-none-eabi-gcc",
    "/opt/arm-gnu-toolchain-*/bin/arm-none-eabi-gcc",
    "/opt/gcc-arm-none-eabi-*/bin/arm-none-eabi-gcc",
    "~/.platformio/packages/toolchain-gccarmnoneeabi/bin/arm-none-eabi-gcc",
    "~/.local/xPacks/@xpack-dev-tools/arm-none-eabi-gcc/*/.content/bin/arm-none-eabi-gcc",
    "/opt/st/stm32cubeide_*/plugins/com.st.stm32cube.ide.mcu.externaltools.gnu-tools-for-stm32.*/tools/bin/arm-none-eabi-gcc",
];

const MACOS_LOCATIONS: &[&str] = &[
    "/opt/homebrew/bin/arm-none-eabi-gcc",
    "/usr/local/bin/arm-none-eabi-gcc",
    "/Applications/ArmGNUToolchain/*/arm-none-eabi/bin/arm-none-eabi-gcc",
    "~/.platformio/packages/toolchain-gccarmnoneeabi/bin/arm-none-eabi-gcc",
    "~/Library/xPacks/@xpack-dev-tools/arm-none-eabi-gcc/*/.content/bin/arm-none-eabi-gcc",
    "/Applications/STM32CubeIDE.app/Contents/Eclipse/plugins/com.st.stm32cube.ide.mcu.externaltools.gnu-tools-for-stm32.*/tools/bin/arm-none-eabi-gcc",
];

const WINDOWS_LOCATIONS: &[&str] = &[
    "%ProgramFiles(x86)%/Arm GNU Toolchain arm-none-eabi/*/bin/arm-none-eabi-gcc.exe",
    "%ProgramFiles%/Arm GNU Toolchain arm-none-eabi/*/bin/arm-none-eabi-gcc.exe",
    "%ProgramFiles(x86)%/GNU Arm Embedded Toolchain/*/bin/arm-none-eabi-gcc.exe",
    "%APPDATA%/xPacks/@xpack-dev-tools/arm-none-eabi-gcc/*/.content/bin/arm-none-eabi-gcc.exe",
    "%USERPROFILE%/.platformio/packages/toolchain-gccarmnoneeabi/bin/arm-none-eabi-gcc.exe",
    "C:/ST/STM32CubeIDE_*/STM32CubeIDE/plugins/com.st.stm32cube.ide.mcu.externaltools.gnu-tools-for-stm32.*/tools/bin/arm-none-eabi-gcc.exe",
];

/// Default search table for the cross-compiler on `platform`
pub fn spec(platform: Platform) -> ToolSpec {
    let locations = match platform {
        Platform::Windows => WINDOWS_LOCATIONS,
        Platform::MacOs => MACOS_LOCATIONS,
        Platform::Linux => UNIX_LOCATIONS,
    };
    ToolSpec::new(ToolKind::CrossCompiler, EXECUTABLE)
        .with_env_vars(ENV_VARS.iter().copied())
        .with_common_locations(locations.iter().copied())
}

/// Parsed first line of `arm-none-eabi-gcc --version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GccVersionLine {
    pub version: Option<String>,
    pub target_triple: Option<String>,
    pub vendor: Option<String>,
}

/// Parse e.g. `arm-none-eabi-gcc (Arm GNU Toolchain 12.2.Rel1 (Build arm-12.24)) 12.2.1 20221205`
pub fn parse_version_line(line: &str) -> GccVersionLine {
    let paren = first_parenthesized(line);

    // The release number follows the vendor banner; the banner itself often
    // carries a looser version string of its own.
    let version = paren
        .and_then(|(_, end)| extract_semver(&line[end..]))
        .or_else(|| extract_semver(line));

    let (target_triple, vendor) = match paren {
        Some((text, _)) if looks_like_triple(text) => (Some(text.to_string()), None),
        Some((text, _)) => (triple_from_program(line), Some(text.trim().to_string())),
        None => (triple_from_program(line), None),
    };

    GccVersionLine { version, target_triple, vendor }
}

/// Derive the target triple from a compiler file name such as `arm-none-eabi-gcc.exe`
pub fn triple_from_executable_name(name: &str) -> Option<String> {
    let stem = name.strip_suffix(".exe").unwrap_or(name);
    let triple = stem.strip_suffix("-gcc")?;
    looks_like_triple(triple).then(|| triple.to_string())
}

fn triple_from_program(line: &str) -> Option<String> {
    let program = line.split_whitespace().next()?;
    let name = program.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(program);
    triple_from_executable_name(name)
}

fn looks_like_triple(text: &str) -> bool {
    let parts: Vec<&str> = text.split('-').collect();
    parts.len() >= 3
        && parts.iter().all(|p| {
            !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// First top-level parenthesized group: (inner text, byte index after `)`)
fn first_parenthesized(line: &str) -> Option<(&str, usize)> {
    let start = line.find('(')?;
    let mut depth = 0usize;
    for (i, c) in line[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let close = start + i;
                    return Some((&line[start + 1..close], close + 1));
                }
            }
            _ => {}
        }
    }
    None
}
