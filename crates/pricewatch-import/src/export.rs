//! CSV export reader.
//!
//! # Overview
//!
//! - The first line is a header and is skipped.
//! - Blank lines are skipped.
//! - Every other line is one record, parsed with its type's [`RowLayout`].
//! - The first malformed line aborts the read with its 1-based line number.
//! - Source order is preserved; sorting happens when the dataset is built.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::csv_line::split_line;
use crate::error::ImportError;
use crate::layout::{Row, RowLayout};

/// Parse an export from `reader`.
///
/// `label` names the source in errors. At most `limit` data rows are read.
pub fn parse_export<E: RowLayout, R: BufRead>(
    reader: R,
    label: &str,
    limit: Option<usize>,
) -> Result<Vec<E>, ImportError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| ImportError::io(label, e))?;
        if index == 0 {
            debug!(source = E::SOURCE, header = %line.trim(), "skipping header");
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if limit.is_some_and(|max| records.len() >= max) {
            break;
        }

        let fields = split_line(&line).ok_or_else(|| ImportError::UnterminatedQuote {
            label: label.to_string(),
            line: line_number,
        })?;
        if fields.len() < E::COLUMNS.len() {
            return Err(ImportError::ColumnCount {
                label: label.to_string(),
                line: line_number,
                expected: E::COLUMNS.len(),
                found: fields.len(),
            });
        }
        let row = Row::new(label, line_number, fields);
        records.push(E::parse_row(&row)?);
    }
    Ok(records)
}

/// Read and parse one export file.
pub fn load_export<E: RowLayout>(path: &Path, limit: Option<usize>) -> Result<Vec<E>, ImportError> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|e| ImportError::io(&label, e))?;
    let records = parse_export(BufReader::new(file), &label, limit)?;
    info!(source = E::SOURCE, path = %label, records = records.len(), "loaded export");
    Ok(records)
}

/// Read several export files of the same layout, concatenated in order.
///
/// `limit` applies per file.
pub fn load_exports<E: RowLayout>(
    paths: &[impl AsRef<Path>],
    limit: Option<usize>,
) -> Result<Vec<E>, ImportError> {
    let mut out = Vec::new();
    for path in paths {
        out.extend(load_export(path.as_ref(), limit)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricewatch_core::event::{ConsumerEvent, Operation};
    use std::io::Cursor;

    const HEADER: &str =
        "market_sno,goods_sno,consumer_origin,total_additional_price,operation_type,deleted,transaction_time,dt";

    fn consumer_line(goods: i64, price: i64) -> String {
        format!("1,{goods},{price},0,u,false,2025-01-07 00:00:00.000 Asia/Seoul,2025-01-07")
    }

    fn parse(text: &str, limit: Option<usize>) -> Result<Vec<ConsumerEvent>, ImportError> {
        parse_export(Cursor::new(text.to_string()), "consumer.csv", limit)
    }

    #[test]
    fn header_only_is_empty() {
        assert!(parse(HEADER, None).unwrap().is_empty());
        assert!(parse("", None).unwrap().is_empty());
    }

    #[test]
    fn rows_keep_source_order_and_skip_blanks() {
        let text = format!(
            "{HEADER}\n{}\n\n{}\n",
            consumer_line(2, 500),
            consumer_line(1, 700)
        );
        let events = parse(&text, None).unwrap();
        let keys: Vec<_> = events.iter().map(|e| e.entity_key).collect();
        assert_eq!(keys, vec![2, 1]);
        assert_eq!(events[0].operation, Operation::Update);
    }

    #[test]
    fn limit_counts_data_rows_only() {
        let text = format!(
            "{HEADER}\n{}\n{}\n{}\n",
            consumer_line(1, 1),
            consumer_line(2, 2),
            consumer_line(3, 3)
        );
        assert_eq!(parse(&text, Some(2)).unwrap().len(), 2);
        assert!(parse(&text, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn short_row_reports_line_number() {
        let text = format!("{HEADER}\n{}\n1,2,3\n", consumer_line(1, 1));
        let err = parse(&text, None).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ColumnCount {
                line: 3,
                expected: 8,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn first_bad_row_aborts() {
        let text = format!(
            "{HEADER}\n{}\n{}\n",
            consumer_line(1, 1).replace(",u,", ",?,"),
            "also,broken"
        );
        let err = parse(&text, None).unwrap_err();
        assert!(matches!(err, ImportError::Parse { line: 2, .. }));
        assert!(err.to_string().starts_with("consumer.csv:2:"));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let text = format!("{HEADER}\n\"1,2\n");
        assert!(matches!(
            parse(&text, None),
            Err(ImportError::UnterminatedQuote { line: 2, .. })
        ));
    }
}
