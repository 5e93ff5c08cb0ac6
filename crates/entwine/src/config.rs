//! Engine configuration loaded from RON.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{Error, Result, WarnLevel};

/// Tunables applied when an engine is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Highest warning level that is emitted. Defaults to [`WarnLevel::None`].
    #[serde(default)]
    pub warning_level: WarnLevel,
}

impl EngineConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a RON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_ron(&text)
    }
}
