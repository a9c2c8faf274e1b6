//! Configuration loading for mednlp.
//! Reads mednlp.toml from the current directory or path in MEDNLP_CONFIG env var.

use std::path::{Path, PathBuf};

use mednlp_embed::Cui2VecConfig;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::ctakes::CTakesConfig;
use crate::resource::CacheScope;

#[derive(Debug, Default, Deserialize)]
pub struct MedNlpConfig {
    #[serde(default)]
    pub uts: UtsConfig,
    #[serde(default)]
    pub concepts: ConceptsConfig,
    /// cui2vec model; similarity queries fail when absent.
    pub embedding: Option<Cui2VecConfig>,
    /// cTAKES installation; only needed for [`crate::CTakesParserStash`].
    pub ctakes: Option<CTakesConfig>,
    #[serde(default)]
    pub resources: ResourcesConfig,
}

#[derive(Debug, Deserialize)]
pub struct UtsConfig {
    /// UMLS API key; `UMLS_API_KEY` takes precedence.
    pub api_key: Option<SecretString>,
    #[serde(default = "default_uts_url")]
    pub base_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_uts_version")]
    pub version: String,
    /// Cache responses on disk.
    #[serde(default = "bool_true")]
    pub cache: bool,
    /// Defaults to `<user cache dir>/mednlp/uts`.
    pub cache_dir: Option<PathBuf>,
    /// Reuse the ticket-granting ticket for this many seconds.
    pub tgt_lifetime_secs: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_uts_url()     -> String { mednlp_uts::client::URI.to_string() }
fn default_auth_url()    -> String { mednlp_uts::auth::AUTH_URI.to_string() }
fn default_uts_version() -> String { mednlp_uts::client::DEFAULT_VERSION.to_string() }
fn default_timeout_secs() -> u64   { 30 }
fn bool_true()           -> bool   { true }

impl Default for UtsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_uts_url(),
            auth_url: default_auth_url(),
            version: default_uts_version(),
            cache: bool_true(),
            cache_dir: None,
            tgt_lifetime_secs: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local concept data used by the parser and entity linking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptsConfig {
    /// JSON array of concept records.
    pub path: Option<PathBuf>,
    /// UMLS semantic types file (`abbrev|tui|desc`).
    pub tuis_path: Option<PathBuf>,
    /// UMLS semantic groups file (`abbrev|name|tui|desc`).
    pub groups_path: Option<PathBuf>,
    #[serde(default)]
    pub filter_tuis: Vec<String>,
    #[serde(default)]
    pub filter_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub cache_scope: CacheScope,
}


impl MedNlpConfig {
    /// Load configuration from mednlp.toml.
    /// Checks MEDNLP_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MEDNLP_CONFIG")
            .unwrap_or_else(|_| "mednlp.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Create mednlp.toml or point MEDNLP_CONFIG at a config file.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.override_api_key(std::env::var("UMLS_API_KEY").ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Replace the configured API key with a non-empty `key`.
    pub fn override_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.uts.api_key = Some(SecretString::from(key));
        }
    }
}
