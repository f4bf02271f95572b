//! Ingest configuration
//!
//! Read from the `[ingest]` table of the shared TOML file. Every field has a
//! compiled default, so a missing file or table yields a working pipeline.

use mediakit_common::config::read_config_file;
use mediakit_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::detection::{CascadeEstimator, EnricherConfig};
use crate::extractors::metadata_extractor::{default_date_tags, default_keyword_tags};
use crate::extractors::source_extractor::default_sidecar_extensions;
use crate::proxy::{ProxyFormat, ProxySpec};

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Typed `[ingest]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Proxy renditions to generate
    pub proxies: Vec<ProxySpec>,
    /// Date tags in descending priority
    pub date_tags: Vec<String>,
    /// Tags whose values become keywords
    pub keyword_tags: Vec<String>,
    /// Extensions treated as secondary representations
    pub sidecar_extensions: Vec<String>,
    /// Documents processed in parallel
    pub concurrency: usize,
    /// Where proxies and the index are written (CLI `--output` wins)
    pub output_dir: Option<PathBuf>,
    /// Base URI for stored proxies instead of `file://` URIs
    pub proxy_base_uri: Option<String>,
    /// Cascade-classifier enrichers, run in order after proxy generation
    pub enrichers: Vec<EnricherConfig>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            proxies: ProxySpec::defaults(),
            date_tags: default_date_tags(),
            keyword_tags: default_keyword_tags(),
            sidecar_extensions: default_sidecar_extensions(),
            concurrency: default_concurrency(),
            output_dir: None,
            proxy_base_uri: None,
            enrichers: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    ingest: IngestConfig,
}

impl IngestConfig {
    /// Parse the `[ingest]` table from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        file.ingest.validate()?;
        Ok(file.ingest)
    }

    /// Load from a config file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = match read_config_file(path)? {
            Some(content) => Self::from_toml_str(&content)?,
            None => Self::default(),
        };
        info!(
            path = %path.display(),
            proxies = config.proxies.len(),
            enrichers = config.enrichers.len(),
            concurrency = config.concurrency,
            "Ingest configuration loaded"
        );
        Ok(config)
    }

    /// Reject values no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("ingest.concurrency must be at least 1".to_string()));
        }

        for spec in &self.proxies {
            if spec.width == 0 {
                return Err(Error::Config("proxy width must be positive".to_string()));
            }
            let quality_ok = spec.quality > 0.0 && spec.quality <= 1.0;
            if spec.format == ProxyFormat::Jpg && !quality_ok {
                return Err(Error::Config(format!(
                    "proxy {}px: quality {} is outside (0, 1]",
                    spec.width, spec.quality
                )));
            }
        }

        let mut namespaces = HashSet::new();
        for enricher in &self.enrichers {
            let ns = enricher.namespace.trim();
            if ns.is_empty() || ns.contains('.') {
                return Err(Error::Config(format!(
                    "enricher namespace '{}' must be a non-empty name without dots",
                    enricher.namespace
                )));
            }
            if !namespaces.insert(ns) {
                return Err(Error::Config(format!("duplicate enricher namespace '{ns}'")));
            }
            CascadeEstimator::new(enricher.levels.clone(), enricher.large_ratio)
                .map_err(|e| Error::Config(format!("enricher {ns}: {e}")))?;
        }
        Ok(())
    }

    /// Output directory: explicit override, then config, then `./mediakit-output`
    pub fn output_dir_or(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("mediakit-output"))
    }
}
