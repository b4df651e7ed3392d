//! Hierarchy CLI
//!
//! Command implementations behind the `hier` binary. Each returns its output
//! as a string so the binary only decides where to print and which exit code
//! to use.

#![allow(missing_docs)]

pub mod logging;

use anyhow::{bail, Context};
use hier_core::{
    AlwaysAuthorized, HierarchyConfig, HierarchyController, HierarchyDataset, MemorySource,
    SourceFetcher,
};
use hier_model::Level;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments of `hier browse`
#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    /// Dataset JSON file
    pub data: PathBuf,
    /// Optional TOML configuration
    pub config: Option<PathBuf>,
    /// Codes to select, top-down; levels without one keep the auto-selection
    pub codes: Vec<(Level, String)>,
    /// Print the tree below the path
    pub tree: bool,
}

/// Load the config file if given, the defaults otherwise
///
/// # Errors
/// Fails when the file cannot be read or does not validate.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<HierarchyConfig> {
    match path {
        Some(path) => HierarchyConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(HierarchyConfig::default()),
    }
}

/// Load a dataset file
///
/// # Errors
/// Fails when the file cannot be read or parsed.
pub fn load_dataset(path: &Path) -> anyhow::Result<HierarchyDataset> {
    HierarchyDataset::load(path).with_context(|| format!("loading dataset from {}", path.display()))
}

/// Activate a controller over the dataset, apply the requested selections
/// and render the resulting path
///
/// # Errors
/// Fails when an input file is unusable or a requested code is not among
/// the entities listed under the current selection.
pub async fn browse(options: &BrowseOptions) -> anyhow::Result<String> {
    let config = load_config(options.config.as_deref())?;
    let data = load_dataset(&options.data)?;
    tracing::info!(entities = data.len(), "dataset loaded");

    let fetcher = SourceFetcher::new(Arc::new(MemorySource::new(data)))
        .with_timeout(config.fetch_timeout());
    let controller = HierarchyController::new(fetcher, Arc::new(AlwaysAuthorized), config);
    controller.activate().await;

    let mut codes = options.codes.clone();
    codes.sort_by_key(|(level, _)| *level);
    for (level, code) in &codes {
        let snapshot = controller.snapshot();
        let Some(node) = snapshot.items(*level).iter().find(|n| n.code == *code) else {
            let available: Vec<&str> = snapshot.items(*level).iter().map(|n| n.code.as_str()).collect();
            bail!(
                "no {level} with code {code} under the current selection (available: {})",
                if available.is_empty() { "none".to_string() } else { available.join(", ") }
            );
        };
        controller.select_at(*level, Some(node)).await?;
    }

    let snapshot = controller.snapshot();
    let mut out = String::new();
    writeln!(out, "{}", snapshot.current_path())?;
    if options.tree {
        writeln!(out)?;
        for row in snapshot.tree_rows() {
            writeln!(out, "{}", row.render())?;
        }
    }
    if let Some(error) = snapshot.last_error() {
        writeln!(out, "error: {error}")?;
    }
    Ok(out)
}

/// Entity counts and integrity findings for a dataset file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub projects: usize,
    pub clients: usize,
    pub sites: usize,
    pub plants: usize,
    /// Entities whose parent id is not in the dataset
    pub orphans: usize,
    /// Ids used more than once within a level
    pub duplicate_ids: usize,
}

impl DatasetReport {
    #[must_use]
    pub fn from_dataset(data: &HierarchyDataset) -> Self {
        let project_ids: HashSet<_> = data.projects.iter().map(|p| p.id).collect();
        let client_ids: HashSet<_> = data.clients.iter().map(|c| c.id).collect();
        let site_ids: HashSet<_> = data.sites.iter().map(|s| s.id).collect();

        let orphans = data
            .clients
            .iter()
            .filter(|c| !project_ids.contains(&c.project_id))
            .count()
            + data
                .sites
                .iter()
                .filter(|s| !client_ids.contains(&s.client_id))
                .count()
            + data
                .plants
                .iter()
                .filter(|p| !site_ids.contains(&p.site_id))
                .count();

        let plant_ids: HashSet<_> = data.plants.iter().map(|p| p.id).collect();
        let duplicate_ids = (data.projects.len() - project_ids.len())
            + (data.clients.len() - client_ids.len())
            + (data.sites.len() - site_ids.len())
            + (data.plants.len() - plant_ids.len());

        Self {
            projects: data.projects.len(),
            clients: data.clients.len(),
            sites: data.sites.len(),
            plants: data.plants.len(),
            orphans,
            duplicate_ids,
        }
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.orphans == 0 && self.duplicate_ids == 0
    }

    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dataset Report");
        let _ = writeln!(out, "==============");
        let _ = writeln!(out, "Projects:       {}", self.projects);
        let _ = writeln!(out, "Clients:        {}", self.clients);
        let _ = writeln!(out, "Sites:          {}", self.sites);
        let _ = writeln!(out, "Plants:         {}", self.plants);
        let _ = writeln!(out, "Orphans:        {}", self.orphans);
        let _ = writeln!(out, "Duplicate ids:  {}", self.duplicate_ids);
        let _ = writeln!(
            out,
            "Result:         {}",
            if self.is_clean() { "CLEAN" } else { "ISSUES FOUND" }
        );
        out
    }

    /// # Errors
    /// Serialization of this plain struct does not fail in practice.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the report for a dataset file
///
/// # Errors
/// Fails when the file cannot be read or parsed.
pub fn report(path: &Path) -> anyhow::Result<DatasetReport> {
    let data = load_dataset(path)?;
    Ok(DatasetReport::from_dataset(&data))
}
