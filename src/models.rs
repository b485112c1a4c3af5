use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::fixture::Fixture;

mod fixtures;
pub use fixtures::*;

mod link;
pub use link::*;

mod scheduler;
pub use scheduler::*;

/// RGB color used by color fixtures
pub type Color = palette::rgb::LinSrgb<u8>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("error serializing configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("fixture {fixture}: unknown model {model}")]
    UnknownModel { fixture: String, model: String },
    #[error("fixture {0} is defined more than once")]
    DuplicateFixture(String),
}

/// Placement of a catalog fixture in the universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FixturePlacement {
    #[validate(length(min = 1))]
    pub name: String,
    pub model: String,
    #[validate(range(min = 1, max = 512))]
    pub address: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub link: Link,
    #[serde(default)]
    #[validate(nested)]
    pub scheduler: Scheduler,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(nested)]
    pub fixtures: Vec<FixturePlacement>,
    /// Extra fixture specs, on top of the built-in catalog
    #[serde(default, skip_serializing_if = "FixtureCatalog::is_empty")]
    pub catalog: FixtureCatalog,
}

impl Config {
    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let full = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml(&full)?;

        debug!(
            path = %path.display(),
            link = %<&'static str>::from(&config.link),
            fixtures = %config.fixtures.len(),
            specs = %config.catalog.len(),
            "loaded",
        );

        Ok(config)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dmxctl").join("config.toml"))
    }

    /// Built-in catalog extended with the specs of this configuration
    pub fn catalog(&self) -> FixtureCatalog {
        let mut catalog = FixtureCatalog::builtin();
        catalog.extend(self.catalog.clone());
        catalog
    }

    /// Resolve the fixture placements against `catalog`
    pub fn rig(&self, catalog: &FixtureCatalog) -> Result<Vec<Fixture>, ConfigError> {
        let mut fixtures: Vec<Fixture> = Vec::with_capacity(self.fixtures.len());

        for placement in &self.fixtures {
            if fixtures.iter().any(|f| f.name() == placement.name) {
                return Err(ConfigError::DuplicateFixture(placement.name.clone()));
            }

            let spec = catalog
                .get(&placement.model)
                .ok_or_else(|| ConfigError::UnknownModel {
                    fixture: placement.name.clone(),
                    model: placement.model.clone(),
                })?;

            fixtures.push(Fixture::new(&placement.name, placement.address, spec));
        }

        Ok(fixtures)
    }
}
