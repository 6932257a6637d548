//! Lazily established, shared connection handle

use anyhow::Result;
use std::future::Future;
use tokio::sync::OnceCell;

/// A connection opened on first use and shared afterwards
///
/// Concurrent first callers wait on a single connection attempt instead of
/// racing to open their own. A failed attempt is not remembered: the next
/// caller tries again.
#[derive(Debug)]
pub struct LazyConnection<C> {
    cell: OnceCell<C>,
}

impl<C> Default for LazyConnection<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> LazyConnection<C> {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// The connection, opening it with `connect` if needed
    pub async fn get_or_connect<F, Fut>(&self, connect: F) -> Result<&C>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        self.cell.get_or_try_init(connect).await
    }

    /// The connection, if already open
    pub fn get(&self) -> Option<&C> {
        self.cell.get()
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
