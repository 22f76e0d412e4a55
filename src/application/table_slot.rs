//! Shared, atomically replaced snapshot of a price table.
//!
//! The refresh pull writes, converter queries read. Readers get an `Arc` to
//! the snapshot current at call time and never see a half-built table.

use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct TableSlot<T> {
    inner: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T> Clone for TableSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TableSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }
}

impl<T> TableSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, table: T) {
        *self.inner.write().await = Some(Arc::new(table));
    }

    /// `None` until the first successful refresh
    pub async fn snapshot(&self) -> Option<Arc<T>> {
        self.inner.read().await.clone()
    }
}
