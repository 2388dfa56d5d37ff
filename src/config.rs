//! TOML configuration for the host and the emulated parts
//!
//! ```toml
//! [host]
//! io_mode = "quad"
//! frequency_hz = 50000000
//! poll = { interval_us = 10, max_polls = 100000 }
//!
//! [nor]
//! size = "16 MiB"
//! page_size = 256
//! erase = [
//!     { opcode = 0x20, size = "4 KiB" },
//!     { opcode = 0xD8, size = "64 KiB" },
//! ]
//! quad_enable = 1
//! four_byte_table = false
//!
//! [nand]
//! device_id = 0xAA21
//! ```

use serde::{Deserialize, Deserializer};
use sflash_core::nand;
use sflash_core::transport::HostConfig;
use sflash_dummy::{EraseType, NandConfig, NorConfig};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML or does not match the schema
    #[error("cannot parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// The described part cannot be emulated
    #[error("invalid emulated part")]
    Part(#[from] sflash_dummy::ConfigError),
}

/// Parse a size string like "16 MiB", "4 KiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|_| format!("invalid size: {}", s));
    }

    let lower = s.to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("gib") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('b') {
        (n, 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    num.trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid size: {}", s))
}

/// Size given either as an integer or as a string with a unit
fn size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn opt_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    size(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EraseEntry {
    opcode: u8,
    #[serde(deserialize_with = "size")]
    size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NorSection {
    #[serde(deserialize_with = "opt_size")]
    size: Option<u32>,
    #[serde(deserialize_with = "opt_size")]
    page_size: Option<u32>,
    erase: Option<Vec<EraseEntry>>,
    quad_enable: Option<u8>,
    dual: Option<bool>,
    quad: Option<bool>,
    four_byte_table: Option<bool>,
    busy_polls: Option<u32>,
}

impl NorSection {
    fn into_config(self) -> NorConfig {
        let defaults = NorConfig::default();
        NorConfig {
            size: self.size.unwrap_or(defaults.size),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            erase_types: match self.erase {
                Some(list) => list
                    .into_iter()
                    .map(|e| EraseType::new(e.opcode, e.size))
                    .collect(),
                None => defaults.erase_types,
            },
            quad_enable: self.quad_enable.unwrap_or(defaults.quad_enable),
            dual: self.dual.unwrap_or(defaults.dual),
            quad: self.quad.unwrap_or(defaults.quad),
            four_byte_table: self.four_byte_table.unwrap_or(defaults.four_byte_table),
            busy_polls: self.busy_polls.unwrap_or(defaults.busy_polls),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NandSection {
    manufacturer_id: Option<u8>,
    device_id: Option<u16>,
    busy_polls: Option<u32>,
}

impl NandSection {
    /// Geometry comes from the part table; unknown IDs keep the default
    /// geometry so the engine's identification can be exercised
    fn into_config(self) -> NandConfig {
        let mut config = NandConfig::default();
        let manufacturer = self.manufacturer_id.unwrap_or(config.manufacturer_id);
        let device = self.device_id.unwrap_or(config.device_id);
        if let Ok(part) = nand::lookup(manufacturer, device) {
            config = NandConfig::for_part(part);
        }
        config.manufacturer_id = manufacturer;
        config.device_id = device;
        config.busy_polls = self.busy_polls.unwrap_or(0);
        config
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    host: HostConfig,
    nor: NorSection,
    nand: NandSection,
}

/// Everything the commands need to attach a device
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Host controller settings handed to the engines
    pub host: HostConfig,
    /// Emulated NOR part
    pub nor: NorConfig,
    /// Emulated NAND part
    pub nand: NandConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigFileError::Parse { source, .. } => ConfigFileError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigFileError::Parse {
            path: PathBuf::new(),
            source,
        })?;

        let config = Self {
            host: raw.host,
            nor: raw.nor.into_config(),
            nand: raw.nand.into_config(),
        };
        config.nor.validate()?;
        config.nand.validate()?;
        log::debug!("configuration: {:?}", config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sflash_core::spi::IoMode;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16 MiB").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("256").unwrap(), 256);
        assert_eq!(parse_size("256 B").unwrap(), 256);
        assert!(parse_size("8 GiB").is_err());
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.host, HostConfig::default());
        assert_eq!(config.nor, NorConfig::default());
        assert_eq!(config.nand.device_id, 0xAA21);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [host]
            io_mode = "quad"
            frequency_hz = 50000000
            poll = { interval_us = 5, max_polls = 1000 }

            [nor]
            size = "32 MiB"
            erase = [{ opcode = 0x20, size = "4 KiB" }, { opcode = 0xD8, size = 65536 }]
            quad_enable = 2
            four_byte_table = true

            [nand]
            device_id = 0xBA23
            "#,
        )
        .unwrap();

        assert_eq!(config.host.io_mode, IoMode::Quad);
        assert_eq!(config.host.frequency_hz, Some(50_000_000));
        assert_eq!(config.host.poll.max_polls, 1000);
        assert_eq!(config.nor.size, 32 * 1024 * 1024);
        assert_eq!(config.nor.erase_types.len(), 2);
        assert_eq!(config.nor.erase_types[1], EraseType::new(0xD8, 65536));
        assert!(config.nor.four_byte_table);
        assert_eq!(config.nand.page_size, 2176);
    }

    #[test]
    fn test_invalid_part_is_rejected() {
        let err = Config::from_toml_str("[nor]\nsize = \"3 MiB\"\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Part(_)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = Config::from_toml_str("[nor]\nsise = 4096\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { .. }));
    }
}
