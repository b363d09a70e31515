//! Best-effort index migration.
//!
//! An upgrade is planned as a flat list of steps per store and every step is
//! applied on its own. A step that fails is logged and recorded, then the
//! next one runs. Only failing to create a store aborts the upgrade.

use tracing::{debug, info, warn};

use super::layout::{IndexSpec, StoreSpec};
use crate::error::OpenError;
use crate::metrics;

/// Storage operations the migration needs. Implemented by the SQLite backend
/// and by test doubles that fail on chosen steps.
pub trait SchemaBackend {
    fn store_exists(&self, store: &str) -> Result<bool, String>;

    fn create_store(&self, store: &StoreSpec) -> Result<(), String>;

    /// Names of secondary indexes currently defined on `store`.
    fn index_names(&self, store: &str) -> Result<Vec<String>, String>;

    fn drop_index(&self, store: &str, index: &str) -> Result<(), String>;

    fn create_index(&self, store: &str, index: &IndexSpec) -> Result<(), String>;
}

/// A single index maintenance action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStep {
    DropIndex { store: String, index: String },
    CreateIndex { store: String, index: IndexSpec },
}

impl MigrationStep {
    pub fn store(&self) -> &str {
        match self {
            MigrationStep::DropIndex { store, .. } | MigrationStep::CreateIndex { store, .. } => {
                store
            }
        }
    }

    pub fn index_name(&self) -> &str {
        match self {
            MigrationStep::DropIndex { index, .. } => index,
            MigrationStep::CreateIndex { index, .. } => &index.name,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            MigrationStep::DropIndex { .. } => "drop_index",
            MigrationStep::CreateIndex { .. } => "create_index",
        }
    }
}

/// A step (or index listing) that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    pub store: String,
    /// `None` when the existing indexes of the store could not be listed.
    pub step: Option<MigrationStep>,
    pub message: String,
}

/// What an upgrade did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub stores_created: Vec<String>,
    pub applied: Vec<MigrationStep>,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    /// True when no index maintenance step failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Steps that bring `store` from its `existing` indexes to its used index set.
///
/// Drops come before creates.
pub fn plan_index_steps(store: &StoreSpec, existing: &[String]) -> Vec<MigrationStep> {
    let drops = existing
        .iter()
        .filter(|name| !store.uses_index(name))
        .map(|name| MigrationStep::DropIndex {
            store: store.name.to_string(),
            index: name.clone(),
        });

    let creates = store
        .indexes
        .iter()
        .filter(|spec| !existing.contains(&spec.name))
        .map(|spec| MigrationStep::CreateIndex {
            store: store.name.to_string(),
            index: spec.clone(),
        });

    drops.chain(creates).collect()
}

fn apply_step(backend: &dyn SchemaBackend, step: &MigrationStep) -> Result<(), String> {
    match step {
        MigrationStep::DropIndex { store, index } => backend.drop_index(store, index),
        MigrationStep::CreateIndex { store, index } => backend.create_index(store, index),
    }
}

/// Bring every store in `layout` to its declared shape.
///
/// Existing stores and their records are kept. Fails only when a missing
/// store cannot be created.
pub fn run_migration(
    backend: &dyn SchemaBackend,
    layout: &[StoreSpec],
    from_version: u32,
    to_version: u32,
) -> Result<MigrationReport, OpenError> {
    info!(from_version, to_version, "Upgrading cache schema");

    let mut report = MigrationReport {
        from_version,
        to_version,
        ..MigrationReport::default()
    };

    for store in layout {
        let exists = backend
            .store_exists(store.name)
            .map_err(OpenError::Database)?;
        if !exists {
            backend.create_store(store).map_err(|e| {
                OpenError::Database(format!("failed to create store {}: {}", store.name, e))
            })?;
            debug!(store = store.name, "Created store");
            report.stores_created.push(store.name.to_string());
        }

        let existing = match backend.index_names(store.name) {
            Ok(names) => names,
            Err(message) => {
                warn!(store = store.name, %message, "Could not list indexes, skipping index maintenance");
                report.failures.push(MigrationFailure {
                    store: store.name.to_string(),
                    step: None,
                    message,
                });
                continue;
            }
        };

        for step in plan_index_steps(store, &existing) {
            match apply_step(backend, &step) {
                Ok(()) => {
                    debug!(store = step.store(), index = step.index_name(), action = step.action(), "Applied migration step");
                    metrics::MIGRATION_STEPS
                        .with_label_values(&[step.action(), "ok"])
                        .inc();
                    report.applied.push(step);
                }
                Err(message) => {
                    warn!(store = step.store(), index = step.index_name(), action = step.action(), %message, "Migration step failed, skipping");
                    metrics::MIGRATION_STEPS
                        .with_label_values(&[step.action(), "failed"])
                        .inc();
                    report.failures.push(MigrationFailure {
                        store: step.store().to_string(),
                        step: Some(step),
                        message,
                    });
                }
            }
        }
    }

    if report.is_complete() {
        info!(steps = report.applied.len(), "Cache schema upgrade complete");
    } else {
        warn!(
            steps = report.applied.len(),
            failures = report.failures.len(),
            "Cache schema upgraded with skipped steps"
        );
    }

    Ok(report)
}
