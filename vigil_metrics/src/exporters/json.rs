use crate::exporters::MetricsExport;
use std::path::Path;
use vigil_core::Result;

pub struct JsonExporter;

impl JsonExporter {
    pub async fn export(metrics: &MetricsExport, path: impl AsRef<Path>) -> Result<()> {
        let json = Self::to_string(metrics)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn to_string(metrics: &MetricsExport) -> Result<String> {
        Ok(serde_json::to_string_pretty(metrics)?)
    }

    pub fn parse(json: &str) -> Result<MetricsExport> {
        Ok(serde_json::from_str(json)?)
    }
}
