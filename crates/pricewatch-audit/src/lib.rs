//! Pricewatch audit: load, replay, report.
//!
//! # Pipeline
//!
//! ```text
//! exports / caches → load + filter → replay → Revisions → artifacts
//! ```
//!
//! Entry points:
//!
//! - [`run_audit`]: one policy, writes `revisions.csv`, `summary.json`,
//!   `revisions.hash`
//! - [`run_comparison`]: both policies over the same dataset, writes
//!   `delta.json`
//! - [`run_order_audit`]: order items against price logs, writes
//!   `invalid_orders.csv`, `orders_summary.json`
//! - [`run_ingest`]: parse one export and save it as a binary cache
//!
//! # Determinism
//!
//! No wall clock, no randomness, `BTreeMap` everywhere. Same inputs and
//! config produce byte-identical artifacts.

mod artifacts;
pub mod config;
pub mod error;
pub mod load;
mod summary;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use pricewatch_core::delta::{diff_revisions, PolicyDelta};
use pricewatch_core::event::{
    AdjustmentEvent, ConsumerEvent, DealEvent, EntityKey, OptionEvent, StreamEvent, StreamKind,
};
use pricewatch_core::order_audit::{reconcile_orders, OrderAuditStats, OrderItem, PriceLog};
use pricewatch_core::policy::PricingPolicy;
use pricewatch_core::replay::{replay_dataset, ReplayConfig};
use pricewatch_core::revision::{revision_hash, Revision};
use pricewatch_import::cache::save_cache;
use pricewatch_import::export::{load_export, load_exports};
use pricewatch_import::layout::RowLayout;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use artifacts::{
    DELTA_JSON, INVALID_ORDERS_CSV, ORDERS_SUMMARY_JSON, REVISIONS_CSV, REVISIONS_HASH,
    SUMMARY_JSON,
};
pub use config::{AuditConfig, AuditConfigFile, InputPaths, OrderAuditConfig};
pub use error::AuditError;
pub use summary::{AuditSummary, StreamCounts};

use artifacts::{emit_audit_artifacts, emit_delta, emit_order_artifacts};
use load::load_dataset;
use summary::{build_summary, SummaryInputs};

/// Result of an audit run.
#[derive(Debug)]
pub struct AuditResult {
    pub output_dir: PathBuf,
    pub summary: AuditSummary,
    pub revisions: Vec<Revision>,
    pub artifacts: Vec<PathBuf>,
}

/// Load, replay under `config.policy`, and write the audit artifacts.
pub fn run_audit(config: &AuditConfig) -> Result<AuditResult, AuditError> {
    let loaded = load_dataset(config)?;
    let outcome = replay_dataset(&loaded.dataset, config.replay_config());

    let hash = revision_hash(&outcome.revisions).map_err(|e| AuditError::serialize("revisions", e))?;
    let summary = build_summary(SummaryInputs {
        policy: config.policy,
        revalidation: config.revalidation,
        inputs: StreamCounts::of(&loaded.dataset),
        stats: &outcome.stats,
        wrong_price_revisions: outcome.revisions.iter().filter(|r| r.is_wrong_price()).count()
            as u64,
        skipped_entities: loaded.skipped_entities,
        revision_hash: hash,
    });

    let artifacts = emit_audit_artifacts(&config.output_dir, &outcome.revisions, &summary)?;
    info!(
        output_dir = %config.output_dir.display(),
        revisions = summary.revisions,
        hash = %summary.revision_hash,
        "audit artifacts written"
    );

    Ok(AuditResult {
        output_dir: config.output_dir.clone(),
        summary,
        revisions: outcome.revisions,
        artifacts,
    })
}

/// Result of a policy comparison.
#[derive(Debug)]
pub struct ComparisonResult {
    pub output_dir: PathBuf,
    pub delta: PolicyDelta,
    pub artifact: PathBuf,
}

/// Replay the dataset under `left` and `right` and write `delta.json`.
///
/// `config.policy` is ignored; the revalidation mode applies to both sides.
pub fn run_comparison(
    config: &AuditConfig,
    left: PricingPolicy,
    right: PricingPolicy,
) -> Result<ComparisonResult, AuditError> {
    let loaded = load_dataset(config)?;
    let left_out = replay_dataset(&loaded.dataset, ReplayConfig::new(left, config.revalidation));
    let right_out = replay_dataset(&loaded.dataset, ReplayConfig::new(right, config.revalidation));

    let delta = diff_revisions(left, &left_out.revisions, right, &right_out.revisions);
    let artifact = emit_delta(&config.output_dir, &delta)?;
    info!(
        left = %left,
        right = %right,
        divergences = delta.divergences.len(),
        shared = delta.shared_count,
        "policy comparison written"
    );

    Ok(ComparisonResult {
        output_dir: config.output_dir.clone(),
        delta,
        artifact,
    })
}

/// Result of an order reconciliation run.
#[derive(Debug)]
pub struct OrderAuditResult {
    pub output_dir: PathBuf,
    pub stats: OrderAuditStats,
    pub artifacts: Vec<PathBuf>,
}

/// Reconcile order items against price logs and write the report.
pub fn run_order_audit(config: &OrderAuditConfig) -> Result<OrderAuditResult, AuditError> {
    if config.log_paths.is_empty() {
        return Err(AuditError::MissingInput("price log"));
    }
    if config.item_paths.is_empty() {
        return Err(AuditError::MissingInput("order item"));
    }
    let logs: Vec<PriceLog> = load_exports(&config.log_paths, config.limit)?;
    let items: Vec<OrderItem> = load_exports(&config.item_paths, config.limit)?;

    let audit = reconcile_orders(&logs, &items);
    let artifacts = emit_order_artifacts(&config.output_dir, &audit.invalid, &audit.stats)?;

    Ok(OrderAuditResult {
        output_dir: config.output_dir.clone(),
        stats: audit.stats,
        artifacts,
    })
}

/// What `run_ingest` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub kind: StreamKind,
    pub records: usize,
    pub entities: usize,
    pub output: PathBuf,
}

/// Parse one export and save it, grouped by goods, as a binary cache.
pub fn run_ingest(
    kind: StreamKind,
    input: &Path,
    output: &Path,
    limit: Option<usize>,
) -> Result<IngestReport, AuditError> {
    match kind {
        StreamKind::Deal => ingest::<DealEvent>(input, output, limit),
        StreamKind::Option => ingest::<OptionEvent>(input, output, limit),
        StreamKind::Consumer => ingest::<ConsumerEvent>(input, output, limit),
        StreamKind::Adjustment => ingest::<AdjustmentEvent>(input, output, limit),
    }
}

fn ingest<E>(input: &Path, output: &Path, limit: Option<usize>) -> Result<IngestReport, AuditError>
where
    E: RowLayout + StreamEvent + Serialize,
{
    let events: Vec<E> = load_export(input, limit)?;
    let entities: BTreeSet<EntityKey> = events.iter().map(|e| e.entity_key()).collect();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;
    }
    save_cache(output, &events)?;
    Ok(IngestReport {
        kind: E::KIND,
        records: events.len(),
        entities: entities.len(),
        output: output.to_path_buf(),
    })
}
