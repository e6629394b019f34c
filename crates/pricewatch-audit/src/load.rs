//! Dataset assembly from configured inputs.

use std::path::Path;

use pricewatch_core::dataset::{group_by_entity, EventMap, PricingDataset};
use pricewatch_core::event::{EntityKey, StreamEvent};
use pricewatch_import::cache::load_cache;
use pricewatch_import::export::load_export;
use pricewatch_import::layout::RowLayout;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::{AuditConfig, InputFormat};
use crate::error::AuditError;

/// A loaded dataset plus what the entity filter dropped.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: PricingDataset,
    /// Requested goods that have no deal events.
    pub skipped_entities: Vec<EntityKey>,
}

/// Load one stream; an absent path is an empty stream.
///
/// `limit` counts source rows for both formats: a cache keeps only the
/// records that came from the first `limit` rows of the export it was
/// built from.
pub fn load_stream<E>(path: Option<&Path>, limit: Option<usize>) -> Result<EventMap<E>, AuditError>
where
    E: RowLayout + StreamEvent + DeserializeOwned,
{
    let Some(path) = path else {
        return Ok(EventMap::new());
    };
    let map = match InputFormat::of(path) {
        InputFormat::Cache => load_cache(path, limit)?,
        InputFormat::Csv => group_by_entity(load_export::<E>(path, limit)?),
    };
    Ok(map)
}

/// Load all four streams and apply the entity filter.
pub fn load_dataset(config: &AuditConfig) -> Result<LoadedDataset, AuditError> {
    let inputs = &config.inputs;
    let deals_path = inputs.deals.as_deref().ok_or(AuditError::MissingInput("deal"))?;

    let mut dataset = PricingDataset::new(
        load_stream(Some(deals_path), config.limit)?,
        load_stream(inputs.options.as_deref(), config.limit)?,
        load_stream(inputs.consumers.as_deref(), config.limit)?,
        load_stream(inputs.adjustments.as_deref(), config.limit)?,
    );

    let skipped_entities = match &config.entities {
        Some(keys) => {
            let missing = dataset.retain_entities(keys);
            if !missing.is_empty() {
                warn!(count = missing.len(), keys = ?missing, "requested goods have no deal events");
            }
            missing
        }
        None => Vec::new(),
    };

    let [deals, options, consumers, adjustments] = dataset.event_counts();
    info!(
        entities = dataset.entity_count(),
        deals,
        options,
        consumers,
        adjustments,
        "dataset loaded"
    );
    Ok(LoadedDataset {
        dataset,
        skipped_entities,
    })
}
