//! Configuration du client pmosoap
//!
//! La configuration est construite en trois couches :
//! 1. la configuration par défaut intégrée (`pmosoap.yaml`)
//! 2. un fichier YAML optionnel fusionné par-dessus
//! 3. les variables d'environnement préfixées par `PMOSOAP__`
//!    (`PMOSOAP__CLIENT__USERNAME=alice`, `PMOSOAP__CLIENT__REFRESH_INTERVAL_SECS=1800`)
//!
//! ```no_run
//! use pmosoap::SoapClientConfig;
//!
//! let config = SoapClientConfig::load(Some("soap.yaml".as_ref()))?;
//! let client = config.build_client()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::client::{ClientBuilder, DEFAULT_TIMEOUT_SECS, SoapClient};
use crate::params::Params;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmosoap.yaml");

pub const ENV_PREFIX: &str = "PMOSOAP__";

/// Settings of a [`SoapClient`], read from the `client` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SoapClientConfig {
    pub wsdl: Option<String>,
    pub username: String,
    pub password: String,
    pub refresh_interval_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub header: HeaderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub name: Option<String>,
    pub params: IndexMap<String, String>,
}

impl Default for SoapClientConfig {
    fn default() -> Self {
        Self {
            wsdl: None,
            username: String::new(),
            password: String::new(),
            refresh_interval_secs: 0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            header: HeaderConfig::default(),
        }
    }
}

impl SoapClientConfig {
    /// Load the embedded defaults, merge `path` if given, then apply
    /// `PMOSOAP__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, env::vars())
    }

    /// Same as [`load`](Self::load) with an explicit set of variables
    pub fn load_with_env<I>(path: Option<&Path>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        if let Some(path) = path {
            let data = fs::read(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let external: Value = serde_yaml::from_slice(&data)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?;
            merge_yaml(&mut value, &external);
            info!(config_file=%path.display(), "Loaded config file");
        }

        apply_env_overrides(&mut value, vars);
        Self::from_value(&value)
    }

    /// Parse a complete YAML document (no defaults, no environment)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self> {
        match value.get("client") {
            Some(client) => {
                serde_yaml::from_value(client.clone()).context("Invalid client configuration")
            }
            None => Ok(Self::default()),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Builder pre-filled from this configuration
    pub fn builder(&self) -> crate::Result<ClientBuilder> {
        let wsdl = self
            .wsdl
            .as_deref()
            .filter(|wsdl| !wsdl.is_empty())
            .ok_or_else(|| anyhow!("No WSDL locator configured (client.wsdl)"))?;

        let mut builder = ClientBuilder::new(wsdl)
            .credentials(&self.username, &self.password)
            .refresh_interval(self.refresh_interval())
            .timeout(Duration::from_secs(self.timeout_secs))
            .header_params(
                self.header
                    .params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str()))
                    .collect::<Params>(),
            );

        if let Some(name) = &self.header.name {
            builder = builder.header_name(name);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent);
        }
        Ok(builder)
    }

    pub fn build_client(&self) -> crate::Result<SoapClient> {
        self.builder()?.build()
    }
}

/// Deep merge of `overlay` into `base`; mappings merge, other values replace
fn merge_yaml(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(path) = key.strip_prefix(ENV_PREFIX) {
            let key_path = path.split("__").collect::<Vec<_>>();
            let _ = set_value(config, &key_path, convert_env_value(&value));
        }
    }
}

fn set_value(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key, value);
        } else {
            let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
            set_value(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}
