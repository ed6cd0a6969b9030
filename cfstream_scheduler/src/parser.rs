use crate::config::{ExporterConfig, ExporterConfigFile};
use anyhow::Result;
use std::path::Path;

pub async fn parse_config_from_file(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;

    let extension = path.extension().and_then(|s| s.to_str());

    match extension {
        Some("yaml") | Some("yml") => parse_yaml(&contents),
        Some("toml") => parse_toml(&contents),
        Some("json") => parse_json(&contents),
        _ => Err(anyhow::anyhow!(
            "Unsupported config format. Use .yaml, .yml, .toml, or .json"
        )),
    }
}

pub fn parse_config_from_str(content: &str, format: &str) -> Result<ExporterConfig> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => parse_yaml(content),
        "toml" => parse_toml(content),
        "json" => parse_json(content),
        _ => Err(anyhow::anyhow!("Unsupported format: {}", format)),
    }
}

fn parse_yaml(content: &str) -> Result<ExporterConfig> {
    Ok(serde_yaml::from_str(content)?)
}

fn parse_toml(content: &str) -> Result<ExporterConfig> {
    let file: ExporterConfigFile = toml::from_str(content)?;
    Ok(file.exporter)
}

fn parse_json(content: &str) -> Result<ExporterConfig> {
    Ok(serde_json::from_str(content)?)
}
