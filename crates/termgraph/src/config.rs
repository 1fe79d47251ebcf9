//! Kernel configuration (TOML format)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings shared by a kernel and every unit built on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Evaluation recursion limit; exceeding it aborts the evaluate call
    pub max_eval_depth: usize,

    /// Check input arity and declared types when terms are created
    pub check_input_types: bool,

    /// Record every value change in the unit's change log
    pub record_changes: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_eval_depth: default_max_eval_depth(),
            check_input_types: true,
            record_changes: false,
        }
    }
}

fn default_max_eval_depth() -> usize {
    512
}

impl KernelConfig {
    /// Parse a config file from path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse from TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.max_eval_depth, 512);
    }

    #[test]
    fn test_parse_partial() {
        let toml = r#"
max_eval_depth = 64
record_changes = true
"#;
        let config = KernelConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.max_eval_depth, 64);
        assert!(config.check_input_types);
        assert!(config.record_changes);
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        assert!(KernelConfig::from_toml_str("max_eval_depth = \"deep\"").is_err());
    }
}
