//! Report artifacts.
//!
//! | Artifact | Format | Written by |
//! |---|---|---|
//! | `revisions.csv` | CSV | audit |
//! | `summary.json` | pretty JSON | audit |
//! | `revisions.hash` | BLAKE3 hex, newline-terminated | audit |
//! | `delta.json` | pretty JSON | compare |
//! | `invalid_orders.csv` | CSV | orders |
//! | `orders_summary.json` | pretty JSON | orders |
//!
//! Artifact bytes depend only on inputs and config; same run, same bytes.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use pricewatch_core::delta::PolicyDelta;
use pricewatch_core::event::Timestamp;
use pricewatch_core::order_audit::{InvalidOrder, OrderAuditStats};
use pricewatch_core::revision::Revision;
use serde::Serialize;

use crate::error::AuditError;
use crate::summary::AuditSummary;

pub const REVISIONS_CSV: &str = "revisions.csv";
pub const SUMMARY_JSON: &str = "summary.json";
pub const REVISIONS_HASH: &str = "revisions.hash";
pub const DELTA_JSON: &str = "delta.json";
pub const INVALID_ORDERS_CSV: &str = "invalid_orders.csv";
pub const ORDERS_SUMMARY_JSON: &str = "orders_summary.json";

const REVISION_HEADERS: [&str; 12] = [
    "goods_sno",
    "deal_sno",
    "goods_discount_policy_sno",
    "thumbnail_price",
    "consumer_origin",
    "price_origin",
    "platform_consumer",
    "discount_price",
    "discount_type",
    "is_wrong_price",
    "transaction_time",
    "expected_prices",
];

const INVALID_ORDER_HEADERS: [&str; 13] = [
    "goods_sno",
    "goods_name",
    "order_sno",
    "item_sno",
    "price",
    "correct_price",
    "consumer_origin",
    "price_origin",
    "discount_type",
    "discount_rate",
    "discount_price",
    "checked_at",
    "updated_at",
];

pub(crate) fn emit_audit_artifacts(
    output_dir: &Path,
    revisions: &[Revision],
    summary: &AuditSummary,
) -> Result<Vec<PathBuf>, AuditError> {
    create_dir(output_dir)?;
    let csv = write(output_dir, REVISIONS_CSV, render_revisions_csv(revisions))?;
    let json = write_json(output_dir, SUMMARY_JSON, "summary", summary)?;
    let hash = write(
        output_dir,
        REVISIONS_HASH,
        format!("{}\n", summary.revision_hash),
    )?;
    Ok(vec![csv, json, hash])
}

pub(crate) fn emit_delta(output_dir: &Path, delta: &PolicyDelta) -> Result<PathBuf, AuditError> {
    create_dir(output_dir)?;
    write_json(output_dir, DELTA_JSON, "delta", delta)
}

pub(crate) fn emit_order_artifacts(
    output_dir: &Path,
    invalid: &[InvalidOrder],
    stats: &OrderAuditStats,
) -> Result<Vec<PathBuf>, AuditError> {
    create_dir(output_dir)?;
    let csv = write(output_dir, INVALID_ORDERS_CSV, render_invalid_orders_csv(invalid))?;
    let json = write_json(output_dir, ORDERS_SUMMARY_JSON, "order summary", stats)?;
    Ok(vec![csv, json])
}

fn create_dir(dir: &Path) -> Result<(), AuditError> {
    fs::create_dir_all(dir).map_err(|e| AuditError::io(dir, e))
}

fn write(dir: &Path, name: &str, contents: String) -> Result<PathBuf, AuditError> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|e| AuditError::io(&path, e))?;
    Ok(path)
}

fn write_json<T: Serialize>(
    dir: &Path,
    name: &str,
    what: &'static str,
    value: &T,
) -> Result<PathBuf, AuditError> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| AuditError::serialize(what, e))?;
    json.push('\n');
    write(dir, name, json)
}

// ---------------------------------------------------------------------------
// CSV rendering
// ---------------------------------------------------------------------------

pub(crate) fn render_revisions_csv(revisions: &[Revision]) -> String {
    let mut buf = REVISION_HEADERS.join(",");
    buf.push('\n');
    for rev in revisions {
        let ctx = &rev.context;
        let expected = rev
            .expected_prices
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(";");
        let _ = writeln!(
            buf,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            rev.entity_key,
            rev.deal.deal_sno,
            rev.deal.policy_sno,
            ctx.thumbnail_price,
            ctx.consumer_origin,
            ctx.price_origin,
            ctx.platform_consumer,
            ctx.discount_price,
            ctx.discount_type,
            rev.is_wrong_price(),
            format_time(rev.observed_at),
            expected,
        );
    }
    buf
}

pub(crate) fn render_invalid_orders_csv(invalid: &[InvalidOrder]) -> String {
    let mut buf = INVALID_ORDER_HEADERS.join(",");
    buf.push('\n');
    for order in invalid {
        let ctx = &order.context;
        let item = &order.item;
        let _ = writeln!(
            buf,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            item.goods_sno,
            csv_field(&item.goods_name),
            item.order_sno,
            item.item_sno,
            item.price,
            order.correct_price,
            ctx.consumer_origin,
            ctx.price_origin,
            ctx.discount_type,
            ctx.discount_rate,
            ctx.discount_price,
            format_time(item.checked_at),
            format_time(ctx.updated_at),
        );
    }
    buf
}

fn format_time(at: Timestamp) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Quote a free-text field when it would break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pricewatch_core::context::Context;
    use pricewatch_core::event::{DealEvent, Operation};

    fn at() -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn revisions_csv_has_header_and_one_row_per_revision() {
        let mut deal = DealEvent::new(1001, Operation::Update, at(), 14910);
        deal.deal_sno = 11;
        deal.policy_sno = 5;
        let mut context = Context::new(1001);
        context.thumbnail_price = 14910;
        context.consumer_origin = 43000;
        context.price_origin = 14900;
        let rev = Revision {
            entity_key: 1001,
            observation_index: 0,
            observed_at: at(),
            expected_prices: vec![14900, 14890],
            context,
            deal,
        };
        let csv = render_revisions_csv(&[rev]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], REVISION_HEADERS.join(","));
        assert_eq!(
            lines[1],
            "1001,11,5,14910,43000,14900,-1,-1,-1,false,2025-01-07 10:00:00,14900;14890"
        );
    }

    #[test]
    fn free_text_is_quoted_only_when_needed() {
        assert_eq!(csv_field("coat"), "coat");
        assert_eq!(csv_field("coat, grey"), "\"coat, grey\"");
        assert_eq!(csv_field("5\" heel"), "\"5\"\" heel\"");
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let t = NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, 250)
            .unwrap();
        assert_eq!(format_time(t), "2025-01-07 10:00:00.250");
    }
}
