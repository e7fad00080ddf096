use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{
    env,
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::{error::ParleyError, labels::LabelPrefixes};

/// Read-only sync settings. Persistence belongs to the host application; the
/// core only consumes a loaded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory holding the markdown articles, relative to the host root.
    pub articles_root: PathBuf,
    pub owner: String,
    pub repo_name: String,
    /// Discussion category the synced records live in.
    pub category_name: String,
    pub draft_label: String,
    pub tag_prefix: String,
    pub series_prefix: String,
}

impl SyncConfig {
    pub fn prefixes(&self) -> LabelPrefixes {
        LabelPrefixes {
            tag: self.tag_prefix.clone(),
            series: self.series_prefix.clone(),
            draft: self.draft_label.clone(),
        }
    }
}

pub trait SyncConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<SyncConfig, ParleyError>;
    fn set_config(&self, config: SyncConfig) -> Result<(), ParleyError>;
}

/// File-backed provider storing the config under a `sync` table in a TOML
/// file.
#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl SyncConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<SyncConfig, ParleyError> {
        tracing::debug!("Attempting to read sync config from: {:?}", &self.path);
        let content = read_to_string(&self.path)?;
        let config: BTreeMap<String, SyncConfig> = toml::from_str(&content)?;
        config
            .get("sync")
            .cloned()
            .ok_or_else(|| ParleyError::NotFound("sync table not found in config".to_string()))
    }

    fn set_config(&self, config: SyncConfig) -> Result<(), ParleyError> {
        tracing::debug!("Attempting to write sync config to: {:?}", &self.path);
        let mut table = BTreeMap::new();
        table.insert("sync".to_string(), config);
        let toml_string = toml::to_string(&table)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// A pre-obtained bearer token for the remote endpoint. The token itself is
/// opaque; absence is a precondition failure, not an authentication flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, ParleyError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ParleyError::PreconditionFailed(
                "credential token is empty".to_string(),
            ));
        }
        Ok(Credential(token))
    }

    /// Loads the token from an environment variable.
    pub fn from_env(var: &str) -> Result<Self, ParleyError> {
        match env::var(var) {
            Ok(token) => Credential::new(token),
            Err(_) => Err(ParleyError::PreconditionFailed(format!(
                "credential environment variable '{var}' is not set"
            ))),
        }
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

// Keep tokens out of logs.
impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig {
            articles_root: PathBuf::from("articles"),
            owner: "buildonomy".to_string(),
            repo_name: "parley".to_string(),
            category_name: "Articles".to_string(),
            draft_label: "state/draft".to_string(),
            tag_prefix: "tag/".to_string(),
            series_prefix: "series/".to_string(),
        }
    }

    #[test]
    fn toml_provider_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("config.toml"));
        provider.set_config(config()).unwrap();
        assert_eq!(provider.get_config().unwrap(), config());
    }

    #[test]
    fn empty_credential_is_a_precondition_failure() {
        assert!(matches!(
            Credential::new("  "),
            Err(ParleyError::PreconditionFailed(_))
        ));
        assert!(Credential::new("ghp_token").is_ok());
    }
}
