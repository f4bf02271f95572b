//! Document workflow
//!
//! - `dispatch` decides which processors apply to a document
//! - `pipeline` runs the processor chain over one document
//! - `worker` runs pipelines across many documents and indexes the results

pub mod dispatch;
pub mod pipeline;
pub mod worker;

pub use pipeline::{DocumentOutcome, Pipeline, PipelineBuilder, PipelineReport};
pub use worker::{DirectoryScanner, ScanError, TaskSource, Worker, WorkerSummary};

use std::sync::Arc;

use thiserror::Error;

use crate::config::IngestConfig;
use crate::detection::{CascadeEnricher, CascadeError, ClassifierBackend};
use crate::extractors::{MetadataProcessor, SourceProcessor};
use crate::proxy::ProxyProcessor;
use crate::storage::ObjectStore;

/// Errors assembling the standard chain
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid cascade configuration: {0}")]
    Cascade(#[from] CascadeError),

    #[error("Cascade enrichers {0:?} are configured but no classifier backend is available")]
    MissingBackend(Vec<String>),
}

/// Builder for the standard chain: source, metadata, proxies, then one cascade
/// enricher per configured entry
///
/// Configured enrichers without a classifier backend are an error.
pub fn standard_pipeline(
    config: &IngestConfig,
    store: Arc<dyn ObjectStore>,
    backend: Option<Arc<dyn ClassifierBackend>>,
) -> Result<PipelineBuilder, ChainError> {
    let mut builder = PipelineBuilder::new()
        .add(SourceProcessor::new(config.sidecar_extensions.clone()))
        .add(MetadataProcessor::new(
            config.date_tags.clone(),
            config.keyword_tags.clone(),
        ))
        .add(ProxyProcessor::new(config.proxies.clone(), store));

    if config.enrichers.is_empty() {
        return Ok(builder);
    }
    let Some(backend) = backend else {
        return Err(ChainError::MissingBackend(
            config.enrichers.iter().map(|e| e.namespace.clone()).collect(),
        ));
    };
    for enricher in &config.enrichers {
        builder = builder.add(CascadeEnricher::new(enricher.clone(), Arc::clone(&backend))?);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detector, EnricherConfig};
    use crate::error::InitError;
    use crate::resources::{ModelResources, ResourceBlob};
    use crate::storage::MemoryObjectStore;

    struct NoBackend;

    impl ClassifierBackend for NoBackend {
        fn load(&self, definition: &ResourceBlob) -> Result<Box<dyn Detector>, InitError> {
            Err(InitError::InvalidResource {
                name: definition.name.clone(),
                reason: "no classifier available".to_string(),
            })
        }
    }

    #[test]
    fn test_standard_chain_order() {
        let config = IngestConfig::default();
        let pipeline = standard_pipeline(&config, Arc::new(MemoryObjectStore::new()), None)
            .unwrap()
            .build(&ModelResources::new("/nonexistent"))
            .unwrap();
        assert_eq!(pipeline.processor_names(), vec!["source", "metadata", "proxy"]);
    }

    #[test]
    fn test_enrichers_require_backend_and_resources() {
        let config = IngestConfig {
            enrichers: vec![EnricherConfig::default()],
            ..IngestConfig::default()
        };

        let without = standard_pipeline(&config, Arc::new(MemoryObjectStore::new()), None);
        assert!(matches!(
            without,
            Err(ChainError::MissingBackend(ref names)) if names == &["Logos".to_string()]
        ));

        let with = standard_pipeline(
            &config,
            Arc::new(MemoryObjectStore::new()),
            Some(Arc::new(NoBackend)),
        )
        .unwrap();
        assert_eq!(with.len(), 4);
        // Cascade definition is missing under this root
        assert!(matches!(
            with.build(&ModelResources::new("/nonexistent")),
            Err(InitError::MissingResource(_))
        ));
    }
}
