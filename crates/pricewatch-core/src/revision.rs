//! Revisions -- immutable discrepancy records and their determinism hash.
//!
//! A [`Revision`] owns copies of the Context and the triggering deal taken
//! at emission time. Later folds into the live Context never reach an
//! emitted Revision.
//!
//! # revision_hash
//!
//! `revision_hash = BLAKE3(REPLAY_VERSION + canonical_serialize(revisions))`
//!
//! Serialization is serde_json in struct declaration order. Same inputs and
//! config produce the same hash, run after run.

use serde::{Deserialize, Serialize};

use crate::context::{known, Context};
use crate::event::{DealEvent, EntityKey, Timestamp};

/// Replay logic version. Included in the hash so that engine changes
/// produce visibly different hashes.
pub const REPLAY_VERSION: &str = "pricewatch-replay-v1";

/// One observation point whose recorded price matched no expected price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub entity_key: EntityKey,
    /// Position of the triggering deal in the goods' time-ordered deal queue.
    pub observation_index: usize,
    pub observed_at: Timestamp,
    /// Expected prices the policy produced (empty when none were available).
    pub expected_prices: Vec<i64>,
    pub context: Context,
    pub deal: DealEvent,
}

impl Revision {
    /// The recorded displayed price.
    pub fn observed_price(&self) -> i64 {
        self.deal.thumbnail_price
    }

    /// Whether the displayed price undercuts the discounted platform price.
    ///
    /// False when either operand is unknown.
    pub fn is_wrong_price(&self) -> bool {
        match (
            known(self.context.platform_consumer),
            known(self.context.discount_price),
        ) {
            (Some(platform), Some(discount)) => self.context.thumbnail_price < platform - discount,
            _ => false,
        }
    }
}

/// Compute the determinism hash over an ordered Revision sequence.
pub fn revision_hash(revisions: &[Revision]) -> Result<String, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(REPLAY_VERSION.as_bytes());
    let bytes = serde_json::to_vec(revisions)?;
    hasher.update(&bytes);
    Ok(hasher.finalize().to_hex().to_string())
}
