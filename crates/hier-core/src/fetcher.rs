//! Level-addressed loading
//!
//! [`Fetcher`] is the shape the cascade controller consumes: one call per
//! level, filtered by the parent id. [`SourceFetcher`] adapts a
//! [`HierarchySource`] to it.

use crate::error::FetchError;
use crate::source::HierarchySource;
use async_trait::async_trait;
use hier_model::{Level, Node, NodeId};
use std::sync::Arc;
use std::time::Duration;

/// Load the collection for one level
///
/// `parent` is ignored for [`Level::Project`]. For every other level a
/// missing parent yields an empty list without touching the service.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<Node>, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<Node>, FetchError> {
        (**self).fetch(level, parent).await
    }
}

/// [`Fetcher`] over a [`HierarchySource`]
#[derive(Debug, Clone)]
pub struct SourceFetcher<S> {
    source: Arc<S>,
    timeout: Option<Duration>,
}

impl<S: HierarchySource> SourceFetcher<S> {
    #[inline]
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            timeout: None,
        }
    }

    /// Fail calls that take longer than `timeout` with `Unreachable`
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Underlying source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    async fn list(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<Node>, FetchError> {
        let source = &self.source;
        let nodes = match (level, parent) {
            (Level::Project, _) => into_nodes(source.list_projects().await?),
            (_, None) => Vec::new(),
            (Level::Client, Some(id)) => into_nodes(source.list_clients(id).await?),
            (Level::Site, Some(id)) => into_nodes(source.list_sites(id).await?),
            (Level::Plant, Some(id)) => into_nodes(source.list_plants(id).await?),
        };
        Ok(nodes)
    }
}

fn into_nodes<T: Into<Node>>(records: Vec<T>) -> Vec<Node> {
    records.into_iter().map(Into::into).collect()
}

#[async_trait]
impl<S: HierarchySource + 'static> Fetcher for SourceFetcher<S> {
    async fn fetch(&self, level: Level, parent: Option<NodeId>) -> Result<Vec<Node>, FetchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.list(level, parent))
                .await
                .unwrap_or_else(|_| Err(FetchError::timed_out(limit.as_secs_f64()))),
            None => self.list(level, parent).await,
        }
    }
}
