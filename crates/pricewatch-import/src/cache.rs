//! Binary cache of grouped event maps.
//!
//! Parsing large exports is slow, so a parsed and grouped stream can be
//! saved once and reloaded. The file is a bincode envelope:
//!
//! ```text
//! { cache_version, kind, entries: BTreeMap<EntityKey, Vec<(row, Event)>> }
//! ```
//!
//! `row` is the 0-based data-row index in the source export, so a row limit
//! applied at load time keeps exactly the records the same limit would keep
//! when reading the export itself.
//!
//! The header fields are decoded first, so a cache written by another
//! version or for another stream is rejected before its entries are
//! touched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pricewatch_core::dataset::EventMap;
use pricewatch_core::event::{EntityKey, StreamEvent, StreamKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ImportError;

/// Cache format version. Bump when any event layout changes.
pub const CACHE_VERSION: &str = "pricewatch-cache-v2";

type RowMap<E> = BTreeMap<EntityKey, Vec<(u64, E)>>;

#[derive(Debug, Deserialize)]
struct CacheHeader {
    cache_version: String,
    kind: StreamKind,
}

#[derive(Serialize)]
struct CacheEnvelopeRef<'a, E> {
    cache_version: &'a str,
    kind: StreamKind,
    entries: BTreeMap<EntityKey, Vec<(u64, &'a E)>>,
}

#[derive(Deserialize)]
struct CacheEnvelope<E> {
    #[allow(dead_code)]
    cache_version: String,
    #[allow(dead_code)]
    kind: StreamKind,
    entries: RowMap<E>,
}

/// Encode a stream given in source row order, grouped by goods.
pub fn encode_cache<E>(records: &[E]) -> Result<Vec<u8>, ImportError>
where
    E: StreamEvent + Serialize,
{
    let mut entries: BTreeMap<EntityKey, Vec<(u64, &E)>> = BTreeMap::new();
    for (row, event) in (0u64..).zip(records) {
        entries.entry(event.entity_key()).or_default().push((row, event));
    }
    let envelope = CacheEnvelopeRef {
        cache_version: CACHE_VERSION,
        kind: E::KIND,
        entries,
    };
    Ok(bincode::serialize(&envelope)?)
}

/// Decode a grouped stream, checking version and kind first.
///
/// With a `limit`, only records from the first `limit` source rows are kept.
pub fn decode_cache<E>(bytes: &[u8], limit: Option<usize>) -> Result<EventMap<E>, ImportError>
where
    E: StreamEvent + DeserializeOwned,
{
    let header: CacheHeader = bincode::deserialize(bytes)?;
    if header.cache_version != CACHE_VERSION {
        return Err(ImportError::CacheVersion {
            expected: CACHE_VERSION.to_string(),
            found: header.cache_version,
        });
    }
    if header.kind != E::KIND {
        return Err(ImportError::CacheKind {
            expected: E::KIND,
            found: header.kind,
        });
    }
    let envelope: CacheEnvelope<E> = bincode::deserialize(bytes)?;
    let keep = |row: u64| limit.map_or(true, |max| row < max as u64);
    Ok(envelope
        .entries
        .into_iter()
        .filter_map(|(key, rows)| {
            let events: Vec<E> = rows
                .into_iter()
                .filter(|(row, _)| keep(*row))
                .map(|(_, event)| event)
                .collect();
            (!events.is_empty()).then_some((key, events))
        })
        .collect())
}

pub fn save_cache<E>(path: &Path, records: &[E]) -> Result<(), ImportError>
where
    E: StreamEvent + Serialize,
{
    let bytes = encode_cache(records)?;
    fs::write(path, &bytes).map_err(|e| ImportError::io(path.display().to_string(), e))?;
    info!(
        kind = %E::KIND,
        path = %path.display(),
        records = records.len(),
        bytes = bytes.len(),
        "wrote cache"
    );
    Ok(())
}

pub fn load_cache<E>(path: &Path, limit: Option<usize>) -> Result<EventMap<E>, ImportError>
where
    E: StreamEvent + DeserializeOwned,
{
    let bytes = fs::read(path).map_err(|e| ImportError::io(path.display().to_string(), e))?;
    let entries = decode_cache(&bytes, limit)?;
    info!(kind = %E::KIND, path = %path.display(), entities = entries.len(), "loaded cache");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pricewatch_core::dataset::group_by_entity;
    use pricewatch_core::event::{AdjustmentEvent, OptionEvent, Operation};

    fn options() -> Vec<OptionEvent> {
        let at = NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        vec![
            OptionEvent::new(2, Operation::Create, at, 43000, 14900),
            OptionEvent::new(1, Operation::Delete, at, 100, 90),
            OptionEvent::new(2, Operation::Update, at, 43000, 15000),
        ]
    }

    #[test]
    fn decode_restores_grouped_entries() {
        let bytes = encode_cache(&options()).unwrap();
        let back: EventMap<OptionEvent> = decode_cache(&bytes, None).unwrap();
        assert_eq!(back, group_by_entity(options()));
    }

    #[test]
    fn limit_keeps_leading_source_rows() {
        let bytes = encode_cache(&options()).unwrap();
        let limited: EventMap<OptionEvent> = decode_cache(&bytes, Some(2)).unwrap();
        assert_eq!(limited, group_by_entity(options().into_iter().take(2)));

        let first_only: EventMap<OptionEvent> = decode_cache(&bytes, Some(1)).unwrap();
        assert_eq!(first_only.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(first_only[&2].len(), 1);

        let none: EventMap<OptionEvent> = decode_cache(&bytes, Some(0)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let bytes = encode_cache(&options()).unwrap();
        let err = decode_cache::<AdjustmentEvent>(&bytes, None).unwrap_err();
        assert!(matches!(
            err,
            ImportError::CacheKind {
                expected: StreamKind::Adjustment,
                found: StreamKind::Option,
            }
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let envelope = CacheEnvelopeRef::<OptionEvent> {
            cache_version: "pricewatch-cache-v1",
            kind: StreamKind::Option,
            entries: BTreeMap::new(),
        };
        let bytes = bincode::serialize(&envelope).unwrap();
        let err = decode_cache::<OptionEvent>(&bytes, None).unwrap_err();
        assert!(matches!(err, ImportError::CacheVersion { .. }));
    }

    #[test]
    fn truncated_bytes_are_a_codec_error() {
        let bytes = encode_cache(&options()).unwrap();
        let err = decode_cache::<OptionEvent>(&bytes[..bytes.len() / 2], None).unwrap_err();
        assert!(matches!(err, ImportError::Codec(_)));
    }
}
