use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_families")]
    pub families: Vec<FamilyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// A group of entities sharing one model root and CSV layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FamilyConfig {
    pub name: String,
    pub model_dir: PathBuf,
    pub value_column: String,
    /// Key the entity is reported under in responses.
    pub entity_label: String,
    #[serde(default = "default_model_type")]
    pub default_model_type: String,
}

fn default_model_type() -> String {
    "LSTM".to_string()
}

fn default_families() -> Vec<FamilyConfig> {
    vec![
        FamilyConfig {
            name: "district".to_string(),
            model_dir: PathBuf::from("models/district_models"),
            value_column: "GR-1 - Price".to_string(),
            entity_label: "district".to_string(),
            default_model_type: default_model_type(),
        },
        FamilyConfig {
            name: "price".to_string(),
            model_dir: PathBuf::from("models/pickle_models"),
            value_column: "National_Price".to_string(),
            entity_label: "pepper_type".to_string(),
            default_model_type: default_model_type(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            families: default_families(),
        }
    }
}

impl Config {
    /// Reads `path` if present, then applies `PEPPER_*` environment overrides
    /// (`PEPPER_LOGGING__FILTER=debug`).
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PEPPER").separator("__"))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.families.is_empty(), "at least one model family is required");
        let mut seen = HashSet::new();
        for family in &self.families {
            ensure!(!family.name.trim().is_empty(), "model family name is empty");
            ensure!(
                seen.insert(family.name.as_str()),
                "model family {} is defined twice",
                family.name
            );
            ensure!(
                !family.value_column.trim().is_empty(),
                "model family {} has no value_column",
                family.name
            );
        }
        Ok(())
    }

    pub fn family(&self, name: &str) -> Option<&FamilyConfig> {
        self.families.iter().find(|f| f.name == name)
    }
}
