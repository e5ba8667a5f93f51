//! Collaborators shared by every actor

use crate::diagnostics::Diagnostics;
use crate::engine::ModelEngine;
use crate::gateway::{CatalogResolver, DataGateway, MemoryGateway, SqliteGateway};
use std::sync::Arc;

/// Handles to the external collaborators
///
/// Cloned into every worker; cloning only bumps reference counts.
#[derive(Clone)]
pub struct RecContext {
    pub gateway: Arc<dyn DataGateway>,
    pub catalog: Arc<dyn CatalogResolver>,
    pub engine: Arc<dyn ModelEngine>,
    pub diagnostics: Arc<dyn Diagnostics>,
}

impl RecContext {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        catalog: Arc<dyn CatalogResolver>,
        engine: Arc<dyn ModelEngine>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            gateway,
            catalog,
            engine,
            diagnostics,
        }
    }

    /// Context whose gateway and catalog are the same SQLite database
    pub fn sqlite(
        store: SqliteGateway,
        engine: Arc<dyn ModelEngine>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store, engine, diagnostics)
    }

    /// Context whose gateway and catalog are the same in-memory store
    pub fn in_memory(
        store: Arc<MemoryGateway>,
        engine: Arc<dyn ModelEngine>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self::new(store.clone(), store, engine, diagnostics)
    }
}
