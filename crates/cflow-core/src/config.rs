//! YAML configuration loading shared by every crate
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{CflowError, Result};

/// Parse a config struct from YAML
pub fn from_yaml<T: DeserializeOwned>(yaml: &str) -> Result<T> {
    serde_yaml::from_str(yaml).map_err(|e| CflowError::Config(e.to_string()))
}

/// Read and parse a YAML config file
pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CflowError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    from_yaml(&content)
}
