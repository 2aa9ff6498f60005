//! Ordered ownership of closable resources.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;

/// A resource with an explicit async shutdown.
#[async_trait]
pub trait Closeable: Send + Sync {
    async fn close(&self) -> Result<()>;
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl Closeable for crate::storage::Database {
    async fn close(&self) -> Result<()> {
        crate::storage::Database::close(self);
        Ok(())
    }
}

/// Resources registered while building an agent, closed together in
/// reverse registration order.
#[derive(Default)]
pub struct ResourceScope {
    resources: Vec<(String, Arc<dyn Closeable>)>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, resource: Arc<dyn Closeable>) {
        self.resources.push((name.into(), resource));
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Close everything, last registered first. Failures are logged and do
    /// not stop the remaining closes. Returns the number of failures.
    pub async fn close(&mut self) -> usize {
        let mut failures = 0;
        while let Some((name, resource)) = self.resources.pop() {
            match resource.close().await {
                Ok(()) => debug!(resource = %name, "resource closed"),
                Err(e) => {
                    failures += 1;
                    warn!(resource = %name, error = %e, "failed to close resource");
                }
            }
        }
        failures
    }
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.resources.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("ResourceScope").field("resources", &names).finish()
    }
}
