//! Service configuration
//!
//! Loaded once at startup from environment variables:
//!
//! | Variable | Default |
//! |---|---|
//! | `POOL_MANAGER_BIND_ADDR` | `0.0.0.0:8080` |
//! | `POOL_MANAGER_API_PREFIX` | `/api/v1` |
//! | `POOL_MANAGER_COMMIT_ATTEMPTS` | `3` |
//! | `POOL_MANAGER_SEED_FILE` | unset |
//!
//! The optional seed file is YAML listing pools to create before the server
//! starts accepting requests.

use crate::error::ServiceError;
use crate::manager::{DEFAULT_COMMIT_ATTEMPTS, PoolManager};
use chrono::Utc;
use pool_core::{AddressFamily, AddressPool, ValuePool, ValuePoolSpec};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Path the pool routes are mounted under; empty mounts them at the root
    pub api_prefix: String,
    /// Commit attempts per allocation before a conflict is surfaced
    pub commit_attempts: u32,
    /// YAML file with pools to create at startup
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
        let bind_addr = lookup("POOL_MANAGER_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|e| {
            ServiceError::InvalidConfig(format!("POOL_MANAGER_BIND_ADDR '{bind_addr}': {e}"))
        })?;

        let api_prefix = normalize_prefix(
            &lookup("POOL_MANAGER_API_PREFIX").unwrap_or_else(|| DEFAULT_API_PREFIX.to_string()),
        )?;

        let commit_attempts = match lookup("POOL_MANAGER_COMMIT_ATTEMPTS") {
            None => DEFAULT_COMMIT_ATTEMPTS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ServiceError::InvalidConfig(format!(
                        "POOL_MANAGER_COMMIT_ATTEMPTS must be a positive integer (got '{raw}')"
                    )));
                }
            },
        };

        let seed_file = lookup("POOL_MANAGER_SEED_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            bind_addr,
            api_prefix,
            commit_attempts,
            seed_file,
        })
    }
}

fn normalize_prefix(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        return Err(ServiceError::InvalidConfig(format!(
            "POOL_MANAGER_API_PREFIX must start with '/' (got '{raw}')"
        )));
    }
    Ok(trimmed.to_string())
}

/// An address pool entry of the seed file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AddressPoolSeed {
    /// Unique pool name
    pub name: String,
    /// Purpose of the pool
    #[serde(default)]
    pub description: Option<String>,
    /// Declared family; must match the CIDR when given
    #[serde(default, alias = "pool_type")]
    pub family: Option<AddressFamily>,
    /// Base CIDR
    pub cidr: String,
}

/// Pools to create at startup
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SeedFile {
    /// IPv4/IPv6 pools
    #[serde(default)]
    pub address_pools: Vec<AddressPoolSeed>,
    /// RT/RD pools
    #[serde(default)]
    pub value_pools: Vec<ValuePoolSpec>,
}

impl SeedFile {
    /// Parse a seed document
    pub fn from_yaml(yaml: &str) -> Result<Self, ServiceError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ServiceError::InvalidConfig(format!("invalid seed file: {e}")))
    }

    /// Read and parse a seed file
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::InvalidConfig(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&yaml)
    }

    /// Create every listed pool, stopping at the first failure.
    ///
    /// Returns the number of address and value pools created.
    pub async fn apply(
        self,
        address_pools: &PoolManager<AddressPool>,
        value_pools: &PoolManager<ValuePool>,
    ) -> Result<(usize, usize), ServiceError> {
        let counts = (self.address_pools.len(), self.value_pools.len());

        for seed in self.address_pools {
            let pool = AddressPool::new(seed.name, &seed.cidr, seed.family, seed.description, Utc::now())?;
            address_pools.create_pool(pool).await?;
        }
        for spec in self.value_pools {
            value_pools.create_pool(ValuePool::new(spec, Utc::now())?).await?;
        }

        Ok(counts)
    }
}
