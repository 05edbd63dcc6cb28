//! Shared application state handed to every request handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::database::{InstanceSource, PgInstanceSource};

/// Process-wide collaborators. The store is only read through it; each
/// request borrows a connection for the length of its single query.
#[derive(Clone)]
pub struct AppState {
    pub instances: Arc<dyn InstanceSource>,
}

impl AppState {
    pub fn new(instances: Arc<dyn InstanceSource>) -> Self {
        Self { instances }
    }

    /// State backed by the shared Postgres pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self::new(Arc::new(PgInstanceSource::new(pool)))
    }
}
