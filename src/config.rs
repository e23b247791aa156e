//! Engine configuration.
//!
//! Read once per process from `SEQFLOW_CONFIG` (a TOML file) and the
//! `SEQFLOW_*` environment overrides. The result sizes the worker pool and the
//! chunks handed to it.

use crate::error::ConfigError;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "SEQFLOW_CONFIG";
pub const WORKERS_VAR: &str = "SEQFLOW_WORKERS";
pub const CHUNK_SIZE_VAR: &str = "SEQFLOW_CHUNK_SIZE";
pub const WAVE_CHUNKS_VAR: &str = "SEQFLOW_WAVE_CHUNKS";

/// Chunk size used when a pipeline has no known length bound.
pub const UNBOUNDED_CHUNK_SIZE: usize = 64;

/// Largest chunk size derived from a length bound. Bounds beyond
/// `workers * CHUNKS_PER_WORKER * MAX_DERIVED_CHUNK_SIZE` just give more chunks.
pub const MAX_DERIVED_CHUNK_SIZE: usize = UNBOUNDED_CHUNK_SIZE * 64;

/// Target number of chunks per worker when the length bound is known.
const CHUNKS_PER_WORKER: usize = 4;

lazy_static! {
    static ref GLOBAL_CONFIG: EngineConfig = EngineConfig::from_env().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "rejected engine configuration, using defaults");
        EngineConfig::default()
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Threads in the process-wide worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Fixed chunk size for parallel evaluation. Derived per pipeline when unset.
    #[serde(default)]
    pub chunk_size: Option<usize>,

    /// Chunks dispatched per worker in one wave.
    #[serde(default = "default_wave_chunks")]
    pub wave_chunks_per_worker: usize,
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_wave_chunks() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chunk_size: None,
            wave_chunks_per_worker: default_wave_chunks(),
        }
    }
}

impl EngineConfig {
    /// The process-wide configuration, resolved on first use.
    pub fn global() -> &'static EngineConfig {
        &GLOBAL_CONFIG
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then the file named by `SEQFLOW_CONFIG`, then the
    /// individual `SEQFLOW_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `SEQFLOW_*` overrides from `lookup` and re-validates.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(WORKERS_VAR) {
            self.workers = parse_count(WORKERS_VAR, &value)?;
        }
        if let Some(value) = lookup(CHUNK_SIZE_VAR) {
            self.chunk_size = Some(parse_count(CHUNK_SIZE_VAR, &value)?);
        }
        if let Some(value) = lookup(WAVE_CHUNKS_VAR) {
            self.wave_chunks_per_worker = parse_count(WAVE_CHUNKS_VAR, &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::invalid("chunk_size", "must be at least 1"));
        }
        if self.wave_chunks_per_worker == 0 {
            return Err(ConfigError::invalid(
                "wave_chunks_per_worker",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Chunk size for a pipeline whose length is bounded by `len_bound`.
    pub fn chunk_size_for(&self, len_bound: Option<usize>) -> usize {
        if let Some(size) = self.chunk_size {
            return size;
        }
        match len_bound {
            Some(len) => len
                .div_ceil(self.workers * CHUNKS_PER_WORKER)
                .clamp(1, MAX_DERIVED_CHUNK_SIZE),
            None => UNBOUNDED_CHUNK_SIZE,
        }
    }

    /// Number of chunks handed to the pool at once.
    pub fn wave_size(&self) -> usize {
        self.workers * self.wave_chunks_per_worker
    }
}

fn parse_count(field: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| ConfigError::invalid(field, format!("'{value}' is not a count: {err}")))
}
