use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub updates: UpdatesConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub counters: CountersConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdatesConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuotaConfig {
    /// Bytes applied to newly provisioned users; 0 means unlimited.
    pub default_bytes: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { default_bytes: 0 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BatchingConfig {
    pub bulk_batch_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            bulk_batch_size: inboxd_collections::mail::BULK_BATCH_SIZE,
        }
    }
}

/// `exp`/`rdate` are always computed on every message; this only gates
/// whether a sweep job would later act on them. No sweep job exists yet.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RetentionConfig {
    pub sweep_enabled: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CountersConfig {
    /// Seconds a mailbox's unseen count may be served stale before a
    /// `COUNTERS` recompute is forced.
    pub ttl_secs: u64,
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self { ttl_secs: 30 }
    }
}

pub fn read_config(config_file: PathBuf) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(config_file)?;
    Ok(toml::from_str(&raw)?)
}
