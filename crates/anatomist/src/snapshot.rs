//! The read-only analysis snapshot shared by all detectors.

use crate::cache::FileCache;
use crate::graph::DependencyGraph;
use crate::symbols::SymbolIndex;
use crate::AnatomistError;
use common::config::CollectorConfig;
use common::{CapabilitySet, WardenConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Cache, symbol tables and dependency graph of one run.
///
/// Built once before any detector starts; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cache: FileCache,
    pub symbols: SymbolIndex,
    pub graph: DependencyGraph,
}

impl Snapshot {
    /// Collects `project_root` and builds symbols and graph over it.
    ///
    /// # Errors
    /// Fails only when the project root cannot be canonicalized.
    pub fn build(project_root: &Path, config: &WardenConfig) -> Result<Self, AnatomistError> {
        let cache =
            FileCache::collect(project_root, &config.collector, &config.isolation.work_dir)?;
        Ok(Self::from_cache(
            cache,
            Arc::new(config.capabilities.clone()),
            &config.collector,
        ))
    }

    pub fn from_cache(
        cache: FileCache,
        capabilities: Arc<CapabilitySet>,
        collector: &CollectorConfig,
    ) -> Self {
        let symbols = SymbolIndex::build(&cache, capabilities);
        let graph = DependencyGraph::build(&cache, &collector.extensions);
        info!(
            files = cache.len(),
            edges = graph.edge_count(),
            "snapshot ready"
        );
        Self {
            cache,
            symbols,
            graph,
        }
    }
}
