//! Cascade simulator
//!
//! Drives a controller with randomized, overlapping selections against an
//! in-memory source with random latency and injected failures, then checks
//! the parent/child invariants after every batch has settled.

use crate::config::{HierarchyConfig, RefreshPolicy};
use crate::controller::{ControllerStats, HierarchyController};
use crate::error::FetchError;
use crate::fetcher::SourceFetcher;
use crate::source::{AlwaysAuthorized, HierarchyDataset, MemorySource};
use futures::future::join_all;
use hier_model::{Client, Level, Node, Plant, Project, Site};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Total operations to execute
    pub total_operations: u64,
    /// Operations issued concurrently per batch
    pub batch_size: usize,
    /// Number of projects in the generated dataset
    pub projects: usize,
    /// Maximum children per entity (each entity gets `0..=fanout`)
    pub fanout: usize,
    /// Upper bound on simulated service latency
    pub max_latency: Duration,
    /// Probability that a level starts failing before a batch
    pub failure_rate: f64,
    /// Probability that an operation targets an entity outside the current list
    pub invalid_rate: f64,
    /// Refresh policy under test
    pub refresh_policy: RefreshPolicy,
    /// Stop on the first invariant violation
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_operations: 1_000,
            batch_size: 4,
            projects: 5,
            fanout: 3,
            max_latency: Duration::from_millis(3),
            failure_rate: 0.05,
            invalid_rate: 0.10,
            refresh_policy: RefreshPolicy::PreserveIfPresent,
            stop_on_first_violation: true,
        }
    }
}

/// Operations the simulator can generate
#[derive(Debug, Clone)]
pub enum SimulatedOperation {
    Select(Level, Node),
    Clear(Level),
    Refresh,
}

/// Invariant breach found after a batch settled
#[derive(Debug, Clone)]
pub struct Violation {
    pub batch: u64,
    pub details: String,
}

/// Outcome of a simulation run
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub seed: u64,
    pub operations: u64,
    pub batches: u64,
    pub rejected: u64,
    pub injected_failures: u64,
    pub stats: ControllerStats,
    pub violations: Vec<Violation>,
}

impl SimulationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Plain-text summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Cascade Simulation Report");
        let _ = writeln!(out, "=========================");
        let _ = writeln!(out, "Seed:               {}", self.seed);
        let _ = writeln!(out, "Operations:         {}", self.operations);
        let _ = writeln!(out, "Batches:            {}", self.batches);
        let _ = writeln!(out, "Rejected:           {}", self.rejected);
        let _ = writeln!(out, "Injected failures:  {}", self.injected_failures);
        let _ = writeln!(out, "Fetches issued:     {}", self.stats.fetches_issued);
        let _ = writeln!(out, "Stale discarded:    {}", self.stats.stale_discarded);
        let _ = writeln!(out, "Fetch failures:     {}", self.stats.failures);
        let _ = writeln!(out, "Violations:         {}", self.violations.len());
        for v in &self.violations {
            let _ = writeln!(out, "  batch {}: {}", v.batch, v.details);
        }
        let _ = writeln!(
            out,
            "Result:             {}",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        out
    }
}

/// Build a random dataset: `projects` roots, each entity with `0..=fanout` children
#[must_use]
pub fn generate_dataset(rng: &mut StdRng, projects: usize, fanout: usize) -> HierarchyDataset {
    let mut data = HierarchyDataset::default();
    let mut next_id = 1_i64;
    let mut take_id = || {
        let id = next_id;
        next_id += 1;
        id
    };

    for p in 0..projects {
        let project_id = take_id();
        data.projects
            .push(Project::new(project_id, format!("P{p}"), format!("Project {p}")));

        for c in 0..rng.random_range(0..=fanout) {
            let client_id = take_id();
            data.clients.push(Client::new(
                client_id,
                project_id,
                format!("C{client_id}"),
                format!("Client {c}"),
            ));

            for s in 0..rng.random_range(0..=fanout) {
                let site_id = take_id();
                data.sites.push(Site::new(
                    site_id,
                    client_id,
                    format!("S{site_id}"),
                    format!("Site {s}"),
                ));

                for n in 0..rng.random_range(0..=fanout) {
                    let plant_id = take_id();
                    data.plants.push(Plant::new(
                        plant_id,
                        site_id,
                        format!("PL{plant_id}"),
                        format!("Plant {n}"),
                    ));
                }
            }
        }
    }

    data
}

fn all_nodes(data: &HierarchyDataset, level: Level) -> Vec<Node> {
    match level {
        Level::Project => data.projects.iter().cloned().map(Node::from).collect(),
        Level::Client => data.clients.iter().cloned().map(Node::from).collect(),
        Level::Site => data.sites.iter().cloned().map(Node::from).collect(),
        Level::Plant => data.plants.iter().cloned().map(Node::from).collect(),
    }
}

fn pick_operation(
    rng: &mut StdRng,
    config: &SimulatorConfig,
    controller: &HierarchyController<SourceFetcher<MemorySource>>,
    data: &HierarchyDataset,
) -> SimulatedOperation {
    let roll: f64 = rng.random();
    if roll < 0.05 {
        return SimulatedOperation::Refresh;
    }

    let level = Level::ALL[rng.random_range(0..Level::COUNT)];
    if roll < 0.12 {
        return SimulatedOperation::Clear(level);
    }

    let snapshot = controller.snapshot();
    let current = snapshot.items(level);
    let invalid = rng.random_bool(config.invalid_rate.clamp(0.0, 1.0));

    if invalid || current.is_empty() {
        let pool = all_nodes(data, level);
        if pool.is_empty() {
            return SimulatedOperation::Clear(level);
        }
        let node = pool[rng.random_range(0..pool.len())].clone();
        SimulatedOperation::Select(level, node)
    } else {
        let node = current[rng.random_range(0..current.len())].clone();
        SimulatedOperation::Select(level, node)
    }
}

/// Run the simulator
pub async fn run_simulator(config: SimulatorConfig) -> SimulationReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let data = generate_dataset(&mut rng, config.projects, config.fanout);

    let source = Arc::new(
        MemorySource::new(data.clone()).with_latency(Duration::ZERO, config.max_latency, config.seed),
    );
    let controller = HierarchyController::new(
        SourceFetcher::new(Arc::clone(&source)),
        Arc::new(AlwaysAuthorized),
        HierarchyConfig::new().with_refresh_policy(config.refresh_policy),
    );

    let mut report = SimulationReport {
        seed: config.seed,
        ..SimulationReport::default()
    };

    controller.activate().await;

    let batch_size = config.batch_size.max(1);
    while report.operations < config.total_operations {
        report.batches += 1;

        for level in Level::ALL {
            if rng.random_bool(config.failure_rate.clamp(0.0, 1.0)) {
                source.fail_level(level, FetchError::ServerFault("injected".to_string()));
                report.injected_failures += 1;
            } else {
                source.heal_level(level);
            }
        }

        let remaining = config.total_operations - report.operations;
        let count = usize::try_from(remaining).map_or(batch_size, |r| r.min(batch_size));
        let ops: Vec<SimulatedOperation> = (0..count)
            .map(|_| pick_operation(&mut rng, &config, &controller, &data))
            .collect();
        report.operations += count as u64;

        let outcomes = join_all(ops.into_iter().map(|op| {
            let controller = controller.clone();
            async move {
                match op {
                    SimulatedOperation::Select(level, node) => {
                        controller.select_at(level, Some(&node)).await.is_ok()
                    }
                    SimulatedOperation::Clear(level) => controller.select_at(level, None).await.is_ok(),
                    SimulatedOperation::Refresh => {
                        controller.refresh().await;
                        true
                    }
                }
            }
        }))
        .await;
        report.rejected += outcomes.iter().filter(|ok| !**ok).count() as u64;

        controller.settled().await;

        let breaches = controller.with_store(|store| store.check_invariants());
        for details in breaches {
            tracing::error!(batch = report.batches, %details, "invariant violated");
            report.violations.push(Violation {
                batch: report.batches,
                details,
            });
        }
        if config.stop_on_first_violation && !report.violations.is_empty() {
            break;
        }
    }

    report.stats = controller.stats();
    report
}
