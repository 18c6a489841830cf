use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::cluster::ClusterConfig;
use crate::error::{Error, Result};

/// Clusters shipped with nbsubmit
static BUILTIN: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/clusters.json"));

/// JSON schema every registry file must satisfy
static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/clusters.json"));

#[derive(Deserialize)]
struct RegistryFile {
    clusters: Vec<ClusterConfig>,
}

/// Lookup from a short cluster name to its configuration
///
/// Built once at startup and passed to whatever needs a cluster.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    clusters: BTreeMap<String, ClusterConfig>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        info!("Reading cluster registry at {}", path.display());
        let json = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("can't read cluster registry {}", path.display()), err))?;
        Self::from_json(&json)
    }

    /// Parse, validate against the schema, then deserialise
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| Error::configuration(format!("cluster registry is not valid JSON: {err}")))?;
        validate(&value)?;

        let file: RegistryFile = serde_json::from_value(value)
            .map_err(|err| Error::configuration(format!("can't deserialise cluster registry: {err}")))?;

        let mut registry = ClusterRegistry::new();
        for config in file.clusters {
            registry.insert(config)?;
        }
        Ok(registry)
    }

    /// Add a cluster, names must be unique
    pub fn insert(&mut self, config: ClusterConfig) -> Result<()> {
        config.validate()?;
        if self.clusters.contains_key(&config.name) {
            return Err(Error::configuration(format!("cluster {} is defined twice", config.name)));
        }
        self.clusters.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&ClusterConfig> {
        self.clusters.get(name).ok_or_else(|| {
            Error::configuration(format!(
                "unknown cluster {name}, known clusters: {}",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }
}

fn validate(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SCHEMA)
        .map_err(|err| Error::configuration(format!("registry schema is not valid JSON: {err}")))?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| Error::configuration(format!("registry schema doesn't compile: {err}")))?;

    let result = compiled.validate(value);
    if let Err(errors) = result {
        let reasons: Vec<String> = errors
            .map(|err| format!("{} (at {})", err, err.instance_path))
            .collect();
        warn!("Cluster registry fails validation");
        return Err(Error::configuration(format!("invalid cluster registry: {}", reasons.join("; "))));
    }
    Ok(())
}
