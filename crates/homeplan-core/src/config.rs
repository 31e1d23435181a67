//! Parser configuration
//!
//! Loaded from the `[parse]` section of a TOML file or built in code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::codes::{NodeRole, TypeCodeMap};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Type code {code} is assigned to both {first} and {second}")]
    AmbiguousTypeCode {
        code: i64,
        first: NodeRole,
        second: NodeRole,
    },
}

/// What to do when the system items container holds no items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPolicy {
    /// Return an empty inventory marked [`InventoryStatus::Empty`](crate::InventoryStatus::Empty)
    #[default]
    Accept,
    /// Fail with [`InventoryError::NoItemsFound`](crate::InventoryError::NoItemsFound)
    Reject,
}

/// Settings for turning a project export into an inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Prefix of device metadata entry names (the device id follows it)
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    /// Keep only top-level items whose name contains this text
    #[serde(default)]
    pub root_name: Option<String>,
    #[serde(default)]
    pub empty_policy: EmptyPolicy,
    /// Item type code to role mapping
    #[serde(default)]
    pub type_codes: TypeCodeMap,
}

fn default_metadata_prefix() -> String {
    ":index:".to_string()
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            metadata_prefix: default_metadata_prefix(),
            root_name: None,
            empty_policy: EmptyPolicy::default(),
            type_codes: TypeCodeMap::default(),
        }
    }
}

impl ParseConfig {
    /// Load from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ParseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.type_codes.validate()
    }
}
