//! Column layouts of every upstream export.
//!
//! Each importable record type implements [`RowLayout`]: a fixed column
//! list and a row parser. Columns are positional; header names are not
//! checked, only counted. Extra trailing columns are ignored.
//!
//! # Layouts
//!
//! | Export | Columns |
//! |--------|---------|
//! | deal | `sno, goods_sno, goods_discount_policy_sno, thumbnail_price, is_enabled, priority, app_type, started_at, ended_at, operation_type, deleted, transaction_time, dt` |
//! | option | `market_sno, goods_sno, option_sno, consumer_origin, price_origin, total_additional_price, operation_type, deleted, transaction_time, dt` |
//! | consumer | `market_sno, goods_sno, consumer_origin, total_additional_price, operation_type, deleted, transaction_time, dt` |
//! | adjustment | `market_sno, goods_sno, discount_type, discount_rate, discount_price, started_at, ended_at, operation_type, deleted, transaction_time, dt` |
//! | price log | `Date, market_sno, goods_sno, consumer_origin, price_origin, discount_type, discount_rate, discount_price, ended_at, started_at, Message` |
//! | order item | `sno, ordno, market_sno, goodsno, goodsnm, price, memberdc, emoney, coupon, ea, reserve, checked_at` |
//!
//! `transaction_time` becomes the event's `occurred_at`.

use pricewatch_core::event::{
    epoch, far_future, AdjustmentEvent, ConsumerEvent, DealEvent, Operation, OptionEvent,
    Timestamp, MISSING,
};
use pricewatch_core::order_audit::{OrderItem, PriceLog};

use crate::error::ImportError;
use crate::timestamp::{parse_export_timestamp, parse_log_timestamp, parse_wall_clock};

/// A record type with a fixed positional CSV layout.
pub trait RowLayout: Sized {
    /// Short name used in logs.
    const SOURCE: &'static str;
    /// Column names, in file order.
    const COLUMNS: &'static [&'static str];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError>;
}

/// One split data row plus its position for error reporting.
#[derive(Debug)]
pub struct Row<'a> {
    label: &'a str,
    line: usize,
    fields: Vec<String>,
}

impl<'a> Row<'a> {
    /// `line` is 1-based and counts the header.
    pub fn new(label: &'a str, line: usize, fields: Vec<String>) -> Self {
        Row {
            label,
            line,
            fields,
        }
    }

    fn error(&self, column: &'static str, message: impl Into<String>) -> ImportError {
        ImportError::Parse {
            label: self.label.to_string(),
            line: self.line,
            column,
            message: message.into(),
        }
    }

    pub fn text(&self, index: usize, column: &'static str) -> Result<&str, ImportError> {
        self.fields
            .get(index)
            .map(|f| f.trim())
            .ok_or_else(|| self.error(column, "missing column"))
    }

    pub fn int(&self, index: usize, column: &'static str) -> Result<i64, ImportError> {
        let raw = self.text(index, column)?;
        raw.parse()
            .map_err(|_| self.error(column, format!("invalid integer {raw:?}")))
    }

    /// Blank means `None`.
    pub fn opt_int(&self, index: usize, column: &'static str) -> Result<Option<i64>, ImportError> {
        match self.text(index, column)? {
            "" => Ok(None),
            _ => self.int(index, column).map(Some),
        }
    }

    pub fn int_or(&self, index: usize, column: &'static str, blank: i64) -> Result<i64, ImportError> {
        Ok(self.opt_int(index, column)?.unwrap_or(blank))
    }

    /// A decimal amount truncated toward zero (`14900.0` -> `14900`).
    pub fn amount(&self, index: usize, column: &'static str) -> Result<i64, ImportError> {
        let raw = self.text(index, column)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v.trunc() as i64),
            _ => Err(self.error(column, format!("invalid amount {raw:?}"))),
        }
    }

    /// `true` (any case) is true, everything else false.
    pub fn flag(&self, index: usize, column: &'static str) -> Result<bool, ImportError> {
        Ok(self.text(index, column)?.eq_ignore_ascii_case("true"))
    }

    pub fn operation(&self, index: usize, column: &'static str) -> Result<Operation, ImportError> {
        let raw = self.text(index, column)?;
        raw.parse().map_err(|e| self.error(column, format!("{e}")))
    }

    /// Export timestamp; blank is the epoch.
    pub fn export_time(&self, index: usize, column: &'static str) -> Result<Timestamp, ImportError> {
        let raw = self.text(index, column)?;
        parse_export_timestamp(raw)
            .ok_or_else(|| self.error(column, format!("invalid timestamp {raw:?}")))
    }

    /// Export timestamp; blank is `blank`.
    pub fn export_time_or(
        &self,
        index: usize,
        column: &'static str,
        blank: Timestamp,
    ) -> Result<Timestamp, ImportError> {
        if self.text(index, column)?.is_empty() {
            return Ok(blank);
        }
        self.export_time(index, column)
    }

    /// Log timestamp; blank is `blank`.
    pub fn log_time_or(
        &self,
        index: usize,
        column: &'static str,
        blank: Timestamp,
    ) -> Result<Timestamp, ImportError> {
        let raw = self.text(index, column)?;
        if raw.is_empty() {
            return Ok(blank);
        }
        parse_log_timestamp(raw)
            .ok_or_else(|| self.error(column, format!("invalid log timestamp {raw:?}")))
    }

    pub fn wall_clock(&self, index: usize, column: &'static str) -> Result<Timestamp, ImportError> {
        let raw = self.text(index, column)?;
        parse_wall_clock(raw)
            .ok_or_else(|| self.error(column, format!("invalid timestamp {raw:?}")))
    }
}

// ---------------------------------------------------------------------------
// Stream exports
// ---------------------------------------------------------------------------

impl RowLayout for DealEvent {
    const SOURCE: &'static str = "deal";
    const COLUMNS: &'static [&'static str] = &[
        "sno",
        "goods_sno",
        "goods_discount_policy_sno",
        "thumbnail_price",
        "is_enabled",
        "priority",
        "app_type",
        "started_at",
        "ended_at",
        "operation_type",
        "deleted",
        "transaction_time",
        "dt",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(DealEvent {
            deal_sno: row.int(0, "sno")?,
            entity_key: row.int(1, "goods_sno")?,
            policy_sno: row.int(2, "goods_discount_policy_sno")?,
            thumbnail_price: row.amount(3, "thumbnail_price")?,
            is_enabled: row.flag(4, "is_enabled")?,
            priority: row.int(5, "priority")?,
            app_type: row.int(6, "app_type")?,
            started_at: row.export_time(7, "started_at")?,
            ended_at: row.export_time(8, "ended_at")?,
            operation: row.operation(9, "operation_type")?,
            deleted: row.flag(10, "deleted")?,
            occurred_at: row.export_time(11, "transaction_time")?,
        })
    }
}

impl RowLayout for OptionEvent {
    const SOURCE: &'static str = "option";
    const COLUMNS: &'static [&'static str] = &[
        "market_sno",
        "goods_sno",
        "option_sno",
        "consumer_origin",
        "price_origin",
        "total_additional_price",
        "operation_type",
        "deleted",
        "transaction_time",
        "dt",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(OptionEvent {
            market_sno: row.int_or(0, "market_sno", 0)?,
            entity_key: row.int_or(1, "goods_sno", 0)?,
            option_sno: row.int(2, "option_sno")?,
            consumer_origin: row.int(3, "consumer_origin")?,
            price_origin: row.int(4, "price_origin")?,
            total_additional_price: row.int(5, "total_additional_price")?,
            operation: row.operation(6, "operation_type")?,
            occurred_at: row.export_time(8, "transaction_time")?,
        })
    }
}

impl RowLayout for ConsumerEvent {
    const SOURCE: &'static str = "consumer";
    const COLUMNS: &'static [&'static str] = &[
        "market_sno",
        "goods_sno",
        "consumer_origin",
        "total_additional_price",
        "operation_type",
        "deleted",
        "transaction_time",
        "dt",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(ConsumerEvent {
            market_sno: row.int_or(0, "market_sno", 0)?,
            entity_key: row.int_or(1, "goods_sno", 0)?,
            consumer_origin: row.int(2, "consumer_origin")?,
            total_additional_price: row.int_or(3, "total_additional_price", 0)?,
            operation: row.operation(4, "operation_type")?,
            occurred_at: row.export_time(6, "transaction_time")?,
        })
    }
}

impl RowLayout for AdjustmentEvent {
    const SOURCE: &'static str = "adjustment";
    const COLUMNS: &'static [&'static str] = &[
        "market_sno",
        "goods_sno",
        "discount_type",
        "discount_rate",
        "discount_price",
        "started_at",
        "ended_at",
        "operation_type",
        "deleted",
        "transaction_time",
        "dt",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(AdjustmentEvent {
            market_sno: row.int_or(0, "market_sno", 0)?,
            entity_key: row.int_or(1, "goods_sno", 0)?,
            discount_type: row.int_or(2, "discount_type", MISSING)?,
            discount_rate: row.opt_int(3, "discount_rate")?,
            discount_price: row.opt_int(4, "discount_price")?,
            started_at: row.export_time(5, "started_at")?,
            ended_at: row.export_time_or(6, "ended_at", far_future())?,
            operation: row.operation(7, "operation_type")?,
            occurred_at: row.export_time(9, "transaction_time")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Order reconciliation exports
// ---------------------------------------------------------------------------

impl RowLayout for PriceLog {
    const SOURCE: &'static str = "price-log";
    const COLUMNS: &'static [&'static str] = &[
        "Date",
        "market_sno",
        "goods_sno",
        "consumer_origin",
        "price_origin",
        "discount_type",
        "discount_rate",
        "discount_price",
        "ended_at",
        "started_at",
        "Message",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        if row.text(0, "Date")?.is_empty() {
            return Err(row.error("Date", "blank request time"));
        }
        let request_time = row.log_time_or(0, "Date", epoch())?;
        Ok(PriceLog {
            market_sno: row.int(1, "market_sno")?,
            goods_sno: row.int(2, "goods_sno")?,
            consumer_origin: row.int(3, "consumer_origin")?,
            price_origin: row.int(4, "price_origin")?,
            discount_type: row.opt_int(5, "discount_type")?,
            discount_rate: row.opt_int(6, "discount_rate")?,
            discount_price: row.opt_int(7, "discount_price")?,
            discount_ended_at: row.log_time_or(8, "ended_at", far_future())?,
            discount_started_at: row.log_time_or(9, "started_at", epoch())?,
            request_time,
        })
    }
}

impl RowLayout for OrderItem {
    const SOURCE: &'static str = "order-item";
    const COLUMNS: &'static [&'static str] = &[
        "sno", "ordno", "market_sno", "goodsno", "goodsnm", "price", "memberdc", "emoney",
        "coupon", "ea", "reserve", "checked_at",
    ];

    fn parse_row(row: &Row<'_>) -> Result<Self, ImportError> {
        Ok(OrderItem {
            item_sno: row.int(0, "sno")?,
            order_sno: row.int(1, "ordno")?,
            market_sno: row.int(2, "market_sno")?,
            goods_sno: row.int(3, "goodsno")?,
            goods_name: row.text(4, "goodsnm")?.to_string(),
            price: row.int(5, "price")?,
            quantity: row.int(9, "ea")?,
            checked_at: row.wall_clock(11, "checked_at")?,
        })
    }
}
