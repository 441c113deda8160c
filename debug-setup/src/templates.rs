//! Device template registry
//!
//! Static hardware descriptions keyed by device-id prefix. A lookup
//! normalizes the id, picks the longest key that prefixes it, and falls
//! back to [`DEFAULT_FAMILY`] so it always returns a template.

use serde::Serialize;

/// Family used when no registered key matches
pub const DEFAULT_FAMILY: &str = "STM32F4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFeature {
    /// Serial Wire Output trace (ITM/TPIU)
    Swo,
    /// Instruction and data caches that must be kept coherent while debugging
    Caches,
    /// Aggressive sleep modes that drop the debug port unless DBGMCU is configured
    LowPower,
    Fpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub start: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryMap {
    pub flash: MemoryRegion,
    pub ram: MemoryRegion,
}

const fn memory(flash_start: u32, flash_size: u32, ram_start: u32, ram_size: u32) -> MemoryMap {
    MemoryMap {
        flash: MemoryRegion { start: flash_start, size: flash_size },
        ram: MemoryRegion { start: ram_start, size: ram_size },
    }
}

const KIB: u32 = 1024;
const MHZ: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceTemplate {
    /// Normalized prefix this template is registered under
    pub key: &'static str,
    pub family_id: &'static str,
    pub core_name: &'static str,
    /// Relative to the `interface/` scripts directory
    pub default_interface_script: &'static str,
    /// Relative to the `target/` scripts directory
    pub default_target_script: &'static str,
    pub default_adapter_speed_khz: u32,
    pub svd_file_name: &'static str,
    pub memory_map: MemoryMap,
    pub features: &'static [DeviceFeature],
    /// Core clock used to derive the SWO prescaler
    pub cpu_frequency_hz: u32,
    /// DBGMCU_CR address written to keep debug alive in sleep modes
    pub dbgmcu_cr: Option<u32>,
}

impl DeviceTemplate {
    pub fn has_feature(&self, feature: DeviceFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_cortex_m(&self) -> bool {
        self.core_name.starts_with("cortex-m")
    }

    /// RTT works on every Cortex-M core
    pub fn supports_rtt(&self) -> bool {
        self.is_cortex_m()
    }
}

use DeviceFeature::{Caches, Fpu, LowPower, Swo};

static TEMPLATES: &[DeviceTemplate] = &[
    DeviceTemplate {
        key: "STM32F0",
        family_id: "STM32F0",
        core_name: "cortex-m0",
        default_interface_script: "stlink-v2.cfg",
        default_target_script: "stm32f0x.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32F0x0.svd",
        memory_map: memory(0x0800_0000, 64 * KIB, 0x2000_0000, 8 * KIB),
        features: &[],
        cpu_frequency_hz: 48 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F1",
        family_id: "STM32F1",
        core_name: "cortex-m3",
        default_interface_script: "stlink-v2.cfg",
        default_target_script: "stm32f1x.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32F103.svd",
        memory_map: memory(0x0800_0000, 64 * KIB, 0x2000_0000, 20 * KIB),
        features: &[Swo],
        cpu_frequency_hz: 72 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F3",
        family_id: "STM32F3",
        core_name: "cortex-m4",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f3x.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32F303.svd",
        memory_map: memory(0x0800_0000, 256 * KIB, 0x2000_0000, 40 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 72 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F4",
        family_id: "STM32F4",
        core_name: "cortex-m4",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f4x.cfg",
        default_adapter_speed_khz: 2000,
        svd_file_name: "STM32F4xx.svd",
        memory_map: memory(0x0800_0000, 512 * KIB, 0x2000_0000, 128 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 168 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F407",
        family_id: "STM32F4",
        core_name: "cortex-m4",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f4x.cfg",
        default_adapter_speed_khz: 2000,
        svd_file_name: "STM32F407.svd",
        memory_map: memory(0x0800_0000, 1024 * KIB, 0x2000_0000, 128 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 168 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F411",
        family_id: "STM32F4",
        core_name: "cortex-m4",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f4x.cfg",
        default_adapter_speed_khz: 2000,
        svd_file_name: "STM32F411.svd",
        memory_map: memory(0x0800_0000, 512 * KIB, 0x2000_0000, 128 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 100 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F429",
        family_id: "STM32F4",
        core_name: "cortex-m4",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f4x.cfg",
        default_adapter_speed_khz: 2000,
        svd_file_name: "STM32F429.svd",
        memory_map: memory(0x0800_0000, 2048 * KIB, 0x2000_0000, 192 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 180 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32F7",
        family_id: "STM32F7",
        core_name: "cortex-m7",
        default_interface_script: "stlink-v2-1.cfg",
        default_target_script: "stm32f7x.cfg",
        default_adapter_speed_khz: 4000,
        svd_file_name: "STM32F7x6.svd",
        memory_map: memory(0x0800_0000, 1024 * KIB, 0x2000_0000, 320 * KIB),
        features: &[Swo, Fpu, Caches],
        cpu_frequency_hz: 216 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32G0",
        family_id: "STM32G0",
        core_name: "cortex-m0+",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32g0x.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32G071.svd",
        memory_map: memory(0x0800_0000, 128 * KIB, 0x2000_0000, 36 * KIB),
        features: &[],
        cpu_frequency_hz: 64 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32G4",
        family_id: "STM32G4",
        core_name: "cortex-m4",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32g4x.cfg",
        default_adapter_speed_khz: 2000,
        svd_file_name: "STM32G474xx.svd",
        memory_map: memory(0x0800_0000, 512 * KIB, 0x2000_0000, 128 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 170 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32H7",
        family_id: "STM32H7",
        core_name: "cortex-m7",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32h7x.cfg",
        default_adapter_speed_khz: 4000,
        svd_file_name: "STM32H743.svd",
        memory_map: memory(0x0800_0000, 2048 * KIB, 0x2400_0000, 512 * KIB),
        features: &[Swo, Fpu, Caches],
        cpu_frequency_hz: 480 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "STM32L0",
        family_id: "STM32L0",
        core_name: "cortex-m0+",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32l0.cfg",
        default_adapter_speed_khz: 500,
        svd_file_name: "STM32L0x3.svd",
        memory_map: memory(0x0800_0000, 64 * KIB, 0x2000_0000, 8 * KIB),
        features: &[LowPower],
        cpu_frequency_hz: 32 * MHZ,
        dbgmcu_cr: Some(0x4001_5804),
    },
    DeviceTemplate {
        key: "STM32L4",
        family_id: "STM32L4",
        core_name: "cortex-m4",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32l4x.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32L4x6.svd",
        memory_map: memory(0x0800_0000, 1024 * KIB, 0x2000_0000, 96 * KIB),
        features: &[Swo, Fpu, LowPower],
        cpu_frequency_hz: 80 * MHZ,
        dbgmcu_cr: Some(0xE004_2004),
    },
    DeviceTemplate {
        key: "STM32WB",
        family_id: "STM32WB",
        core_name: "cortex-m4",
        default_interface_script: "stlink.cfg",
        default_target_script: "stm32wbx.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "STM32WB55_CM4.svd",
        memory_map: memory(0x0800_0000, 1024 * KIB, 0x2000_0000, 192 * KIB),
        features: &[Swo, Fpu, LowPower],
        cpu_frequency_hz: 64 * MHZ,
        dbgmcu_cr: Some(0xE004_2004),
    },
    DeviceTemplate {
        key: "NRF52",
        family_id: "NRF52",
        core_name: "cortex-m4",
        default_interface_script: "jlink.cfg",
        default_target_script: "nrf52.cfg",
        default_adapter_speed_khz: 4000,
        svd_file_name: "nrf52840.svd",
        memory_map: memory(0x0000_0000, 1024 * KIB, 0x2000_0000, 256 * KIB),
        features: &[Swo, Fpu],
        cpu_frequency_hz: 64 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "RP2040",
        family_id: "RP2040",
        core_name: "cortex-m0+",
        default_interface_script: "cmsis-dap.cfg",
        default_target_script: "rp2040.cfg",
        default_adapter_speed_khz: 5000,
        svd_file_name: "rp2040.svd",
        memory_map: memory(0x1000_0000, 2048 * KIB, 0x2000_0000, 264 * KIB),
        features: &[],
        cpu_frequency_hz: 125 * MHZ,
        dbgmcu_cr: None,
    },
    DeviceTemplate {
        key: "GD32VF103",
        family_id: "GD32VF103",
        core_name: "riscv-bumblebee",
        default_interface_script: "ftdi/sipeed-rv-debugger.cfg",
        default_target_script: "gd32vf103.cfg",
        default_adapter_speed_khz: 1000,
        svd_file_name: "GD32VF103.svd",
        memory_map: memory(0x0800_0000, 128 * KIB, 0x2000_0000, 32 * KIB),
        features: &[],
        cpu_frequency_hz: 108 * MHZ,
        dbgmcu_cr: None,
    },
];

/// Uppercase and drop everything that is not ASCII alphanumeric
pub fn normalize_device_id(id: &str) -> String {
    id.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Every registered template, in registration order
pub fn all_templates() -> &'static [DeviceTemplate] {
    TEMPLATES
}

/// Result of a registry lookup
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateMatch {
    pub template: &'static DeviceTemplate,
    /// False when nothing matched and the default family was used
    pub matched: bool,
}

fn default_template() -> &'static DeviceTemplate {
    TEMPLATES
        .iter()
        .find(|t| t.key == DEFAULT_FAMILY)
        .unwrap_or(&TEMPLATES[0])
}

/// Longest registered key that prefixes the normalized id
pub fn find_template(device_id: &str) -> TemplateMatch {
    let normalized = normalize_device_id(device_id);
    let best = TEMPLATES
        .iter()
        .filter(|t| !normalized.is_empty() && normalized.starts_with(t.key))
        .max_by_key(|t| t.key.len());

    match best {
        Some(template) => TemplateMatch { template, matched: true },
        None => TemplateMatch {
            template: default_template(),
            matched: false,
        },
    }
}

/// Template for `device_id`; never fails
pub fn lookup(device_id: &str) -> &'static DeviceTemplate {
    find_template(device_id).template
}
