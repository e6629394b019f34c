use pricewatch_core::dataset::PricingDataset;
use pricewatch_core::event::EntityKey;
use pricewatch_core::policy::PricingPolicy;
use pricewatch_core::reducer::Revalidation;
use pricewatch_core::replay::ReplayStats;
use pricewatch_core::revision::REPLAY_VERSION;
use serde::{Deserialize, Serialize};

/// Input record counts per stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCounts {
    pub deals: usize,
    pub options: usize,
    pub consumers: usize,
    pub adjustments: usize,
}

impl StreamCounts {
    pub fn of(dataset: &PricingDataset) -> Self {
        let [deals, options, consumers, adjustments] = dataset.event_counts();
        StreamCounts {
            deals,
            options,
            consumers,
            adjustments,
        }
    }
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Replay logic version the hash was computed under.
    pub replay_version: String,
    pub policy: PricingPolicy,
    pub revalidation: Revalidation,
    pub inputs: StreamCounts,
    pub entities: u64,
    pub observations: u64,
    pub folds: u64,
    pub consistent: u64,
    pub suppressed: u64,
    pub revisions: u64,
    /// Revisions whose displayed price undercuts the discounted platform price.
    pub wrong_price_revisions: u64,
    /// Requested goods with no deal events.
    pub skipped_entities: Vec<EntityKey>,
    pub revision_hash: String,
}

pub(crate) struct SummaryInputs<'a> {
    pub policy: PricingPolicy,
    pub revalidation: Revalidation,
    pub inputs: StreamCounts,
    pub stats: &'a ReplayStats,
    pub wrong_price_revisions: u64,
    pub skipped_entities: Vec<EntityKey>,
    pub revision_hash: String,
}

pub(crate) fn build_summary(inputs: SummaryInputs<'_>) -> AuditSummary {
    let stats = inputs.stats;
    AuditSummary {
        replay_version: REPLAY_VERSION.to_string(),
        policy: inputs.policy,
        revalidation: inputs.revalidation,
        inputs: inputs.inputs,
        entities: stats.entities,
        observations: stats.observations,
        folds: stats.folds,
        consistent: stats.consistent,
        suppressed: stats.suppressed,
        revisions: stats.revisions,
        wrong_price_revisions: inputs.wrong_price_revisions,
        skipped_entities: inputs.skipped_entities,
        revision_hash: inputs.revision_hash,
    }
}
