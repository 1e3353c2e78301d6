//! TOML hub configuration: the sources and datasets `setup` registers.

use std::path::Path;

use data_hub_store_models::SourceKind;
use serde::Deserialize;
use serde_json::Value;

/// Declarative hub layout loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
}

/// One source to register.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SourceKind,
    pub description: Option<String>,
    /// Connection details passed through to the source row verbatim.
    pub connection: Option<Value>,
}

/// One dataset to register, attached to a source by name.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    /// Name of the owning source, either from this config or an
    /// already registered one.
    pub source: String,
    pub description: Option<String>,
}

/// Loads a hub config from disk.
pub fn load(path: &Path) -> Result<HubConfig, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use data_hub_store_models::SourceKind;
    use serde_json::json;

    use super::HubConfig;

    #[test]
    fn parses_sources_and_datasets() {
        let raw = r#"
            [[sources]]
            name = "city api"
            kind = "API"
            description = "Open data portal"
            connection = { endpoint = "https://example.com/data" }

            [[sources]]
            name = "drop folder"
            kind = "FILE"

            [[datasets]]
            name = "events"
            source = "city api"
        "#;

        let config: HubConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "city api");
        assert_eq!(config.sources[0].kind, SourceKind::Api);
        assert_eq!(
            config.sources[0].connection,
            Some(json!({"endpoint": "https://example.com/data"}))
        );
        assert_eq!(config.sources[1].kind, SourceKind::File);
        assert!(config.sources[1].description.is_none());

        assert_eq!(config.datasets.len(), 1);
        assert_eq!(config.datasets[0].source, "city api");
    }

    #[test]
    fn an_empty_file_is_a_valid_config() {
        let config: HubConfig = toml::from_str("").unwrap();

        assert!(config.sources.is_empty());
        assert!(config.datasets.is_empty());
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let raw = r#"
            [[sources]]
            name = "bad"
            kind = "CARRIER_PIGEON"
        "#;

        assert!(toml::from_str::<HubConfig>(raw).is_err());
    }
}
