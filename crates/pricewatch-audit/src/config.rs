//! Audit run configuration.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. built-in defaults ([`AuditConfig::new`])
//! 2. an optional TOML file ([`AuditConfigFile`])
//! 3. command-line flags (applied by the caller with the `with_*` methods)
//!
//! ```toml
//! output_dir = "audit-output"
//! policy = "candidates"
//! revalidation = "originating-stream"
//! entities = [1001, 1002]
//! limit = 50000
//!
//! [inputs]
//! deals = "data/deal.csv"
//! options = "cache/option.bin"
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use pricewatch_core::event::EntityKey;
use pricewatch_core::policy::PricingPolicy;
use pricewatch_core::reducer::Revalidation;
use pricewatch_core::replay::ReplayConfig;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

pub const DEFAULT_OUTPUT_DIR: &str = "audit-output";

/// Where each stream is read from. A path ending in `.bin` is a cache
/// written by `ingest`; anything else is a CSV export. An absent stream is
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    pub deals: Option<PathBuf>,
    pub options: Option<PathBuf>,
    pub consumers: Option<PathBuf>,
    pub adjustments: Option<PathBuf>,
}

impl InputPaths {
    /// Fill every stream not set here from `other`.
    fn or(self, other: InputPaths) -> InputPaths {
        InputPaths {
            deals: self.deals.or(other.deals),
            options: self.options.or(other.options),
            consumers: self.consumers.or(other.consumers),
            adjustments: self.adjustments.or(other.adjustments),
        }
    }
}

/// Input encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Cache,
}

impl InputFormat {
    pub fn of(path: &Path) -> InputFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => InputFormat::Cache,
            _ => InputFormat::Csv,
        }
    }
}

/// Configuration of an `audit` or `compare` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub inputs: InputPaths,
    /// Directory for report artifacts.
    pub output_dir: PathBuf,
    pub policy: PricingPolicy,
    pub revalidation: Revalidation,
    /// Audit only these goods.
    pub entities: Option<BTreeSet<EntityKey>>,
    /// Read at most this many data rows per input file.
    pub limit: Option<usize>,
}

impl AuditConfig {
    pub fn new(inputs: InputPaths) -> Self {
        AuditConfig {
            inputs,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            policy: PricingPolicy::default(),
            revalidation: Revalidation::default(),
            entities: None,
            limit: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_policy(mut self, policy: PricingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_revalidation(mut self, revalidation: Revalidation) -> Self {
        self.revalidation = revalidation;
        self
    }

    pub fn with_entities(mut self, entities: impl IntoIterator<Item = EntityKey>) -> Self {
        self.entities = Some(entities.into_iter().collect());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig::new(self.policy, self.revalidation)
    }
}

/// The TOML file form of [`AuditConfig`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfigFile {
    #[serde(default)]
    pub inputs: InputPaths,
    pub output_dir: Option<PathBuf>,
    pub policy: Option<PricingPolicy>,
    pub revalidation: Option<Revalidation>,
    pub entities: Option<Vec<EntityKey>>,
    pub limit: Option<usize>,
}

impl AuditConfigFile {
    pub fn load(path: &Path) -> Result<Self, AuditError> {
        let text = fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
        Self::parse(&text).map_err(|source| AuditError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay the values set in this file onto `config`.
    ///
    /// Inputs already set in `config` are kept.
    pub fn apply(self, mut config: AuditConfig) -> AuditConfig {
        config.inputs = config.inputs.or(self.inputs);
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(revalidation) = self.revalidation {
            config.revalidation = revalidation;
        }
        if let Some(entities) = self.entities {
            config = config.with_entities(entities);
        }
        if let Some(limit) = self.limit {
            config.limit = Some(limit);
        }
        config
    }
}

/// Configuration of an `orders` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAuditConfig {
    pub log_paths: Vec<PathBuf>,
    pub item_paths: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub limit: Option<usize>,
}

impl OrderAuditConfig {
    pub fn new(log_paths: Vec<PathBuf>, item_paths: Vec<PathBuf>) -> Self {
        OrderAuditConfig {
            log_paths,
            item_paths,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            limit: None,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
