//! TOML configuration for the `run` subcommand.
//!
//! A config file declares the services to register at startup:
//!
//! ```toml
//! [[service]]
//! name = "frontend"
//! types = ["demo.Frontend"]
//! owned = ["backend"]
//!
//! [[service]]
//! name = "backend"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Service name in canonical text form, e.g. `db:role=primary`.
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    /// Canonical names of services this one owns.
    #[serde(default)]
    pub owned: Vec<String>,
    #[serde(default)]
    pub restartable: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Built-in demo topology used when no config file is given: a small
    /// ownership chain so recursive start/stop has something to walk.
    pub fn demo() -> Self {
        Self {
            services: vec![
                ServiceConfig {
                    name: "frontend".to_string(),
                    types: vec!["demo.Frontend".to_string()],
                    owned: vec!["backend".to_string()],
                    restartable: None,
                },
                ServiceConfig {
                    name: "backend".to_string(),
                    types: vec!["demo.Backend".to_string()],
                    owned: vec!["store".to_string()],
                    restartable: None,
                },
                ServiceConfig {
                    name: "store".to_string(),
                    types: vec!["demo.Store".to_string()],
                    owned: Vec::new(),
                    restartable: None,
                },
            ],
        }
    }
}
