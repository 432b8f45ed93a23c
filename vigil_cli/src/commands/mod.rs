pub mod report;
pub mod simulate;
pub mod slos;
pub mod validate;

use anyhow::Result;
use std::path::Path;
use vigil_config::{parse_config_from_file, VigilConfig};

/// Loads `path` when given, otherwise the defaults.
pub async fn load_config(path: Option<&Path>) -> Result<VigilConfig> {
    match path {
        Some(path) => parse_config_from_file(path).await,
        None => Ok(VigilConfig::default()),
    }
}
