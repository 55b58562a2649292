//! # Memory Configuration
//!
//! Loaded once at startup, usually from `memory.toml`:
//!
//! ```toml
//! tracking_enabled = true
//! record_source_locations = true
//! break_on_error = false
//! ```
//!
//! Missing keys fall back to the build-dependent defaults.

use std::path::Path;
use std::sync::Arc;

use edge_assert::{AssertHandler, DefaultHandler};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Startup settings for the system allocator and its diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Prefix blocks with headers and keep the leak list.
    pub tracking_enabled: bool,
    /// Store the requesting call site in each header.
    pub record_source_locations: bool,
    /// Halt on `Error` reports under the default handler.
    pub break_on_error: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            tracking_enabled: cfg!(debug_assertions),
            record_source_locations: true,
            break_on_error: cfg!(debug_assertions),
        }
    }
}

impl MemoryConfig {
    /// Release config: no headers, errors never halt.
    #[must_use]
    pub const fn release() -> Self {
        Self {
            tracking_enabled: false,
            record_source_locations: false,
            break_on_error: false,
        }
    }

    /// Development config: full tracking, halt on errors.
    #[must_use]
    pub const fn development() -> Self {
        Self {
            tracking_enabled: true,
            record_source_locations: true,
            break_on_error: true,
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the document does not parse.
    pub fn from_toml_str(text: &str) -> MemoryResult<Self> {
        toml::from_str(text).map_err(|e| MemoryError::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the file cannot be read or
    /// does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Builds the default diagnostic handler this config describes.
    #[must_use]
    pub fn assert_handler(&self) -> Arc<dyn AssertHandler> {
        Arc::new(DefaultHandler::new().with_break_on_error(self.break_on_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = MemoryConfig::from_toml_str("tracking_enabled = true").unwrap();
        assert!(config.tracking_enabled);
        assert!(config.record_source_locations);
        assert_eq!(config.break_on_error, cfg!(debug_assertions));
    }

    #[test]
    fn test_full_document() {
        let text = "tracking_enabled = false\nrecord_source_locations = false\nbreak_on_error = false\n";
        let config = MemoryConfig::from_toml_str(text).unwrap();
        assert_eq!(config, MemoryConfig::release());
    }

    #[test]
    fn test_invalid_document() {
        let err = MemoryConfig::from_toml_str("tracking_enabled = \"yes\"").unwrap_err();
        assert!(matches!(err, MemoryError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = MemoryConfig::from_file("/definitely/not/here/memory.toml").unwrap_err();
        assert!(err.to_string().contains("memory.toml"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("edge_memory_config_{}.toml", std::process::id()));
        std::fs::write(&path, "break_on_error = true\n").unwrap();

        let config = MemoryConfig::from_file(&path).unwrap();
        assert!(config.break_on_error);

        std::fs::remove_file(&path).ok();
    }
}
