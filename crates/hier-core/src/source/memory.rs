//! In-memory data service
//!
//! Serves a [`HierarchyDataset`] with optional random latency and injected
//! failures. Backs the CLI browser and the simulator.

use super::HierarchySource;
use crate::error::{ConfigError, FetchError};
use async_trait::async_trait;
use hier_model::{Client, Level, NodeId, Plant, Project, Site};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Full hierarchy contents, in service order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyDataset {
    pub projects: Vec<Project>,
    pub clients: Vec<Client>,
    pub sites: Vec<Site>,
    pub plants: Vec<Plant>,
}

impl HierarchyDataset {
    /// Parse a JSON dataset
    ///
    /// # Errors
    /// `ConfigError::Json` on malformed input.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a JSON dataset file
    ///
    /// # Errors
    /// `ConfigError::Io` or `ConfigError::Json`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Total number of records across all levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len() + self.clients.len() + self.sites.len() + self.plants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dataset-backed [`HierarchySource`]
#[derive(Debug)]
pub struct MemorySource {
    data: Mutex<HierarchyDataset>,
    latency: Option<(Duration, Duration)>,
    rng: Mutex<StdRng>,
    failures: Mutex<HashMap<Level, FetchError>>,
    calls: [AtomicU64; Level::COUNT],
}

impl MemorySource {
    #[must_use]
    pub fn new(data: HierarchyDataset) -> Self {
        Self {
            data: Mutex::new(data),
            latency: None,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            failures: Mutex::new(HashMap::new()),
            calls: Default::default(),
        }
    }

    /// Delay every call by a random duration in `min..=max`
    #[must_use]
    pub fn with_latency(mut self, min: Duration, max: Duration, seed: u64) -> Self {
        self.latency = Some((min, max.max(min)));
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Make every list call for `level` fail with `error`
    pub fn fail_level(&self, level: Level, error: FetchError) {
        self.failures.lock().insert(level, error);
    }

    /// Remove an injected failure
    pub fn heal_level(&self, level: Level) {
        self.failures.lock().remove(&level);
    }

    /// Swap the served data, as if the service had changed underneath
    pub fn replace_data(&self, data: HierarchyDataset) {
        *self.data.lock() = data;
    }

    /// Number of list calls made for `level`
    #[must_use]
    pub fn calls(&self, level: Level) -> u64 {
        self.calls[level.index()].load(Ordering::SeqCst)
    }

    /// List calls across all levels
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        Level::ALL.iter().map(|l| self.calls(*l)).sum()
    }

    async fn enter(&self, level: Level) -> Result<(), FetchError> {
        self.calls[level.index()].fetch_add(1, Ordering::SeqCst);

        if let Some((min, max)) = self.latency {
            let delay = {
                let mut rng = self.rng.lock();
                let span = u64::try_from((max - min).as_micros()).unwrap_or(u64::MAX);
                min + Duration::from_micros(rng.random_range(0..=span))
            };
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().get(&level) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HierarchySource for MemorySource {
    async fn list_projects(&self) -> Result<Vec<Project>, FetchError> {
        self.enter(Level::Project).await?;
        Ok(self.data.lock().projects.clone())
    }

    async fn list_clients(&self, project_id: NodeId) -> Result<Vec<Client>, FetchError> {
        self.enter(Level::Client).await?;
        let data = self.data.lock();
        Ok(data
            .clients
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_sites(&self, client_id: NodeId) -> Result<Vec<Site>, FetchError> {
        self.enter(Level::Site).await?;
        let data = self.data.lock();
        Ok(data
            .sites
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn list_plants(&self, site_id: NodeId) -> Result<Vec<Plant>, FetchError> {
        self.enter(Level::Plant).await?;
        let data = self.data.lock();
        Ok(data
            .plants
            .iter()
            .filter(|p| p.site_id == site_id)
            .cloned()
            .collect())
    }
}
