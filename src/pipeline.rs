use serde::Serialize;
use tracing::{debug, info};

use crate::error::ExtractError;
use crate::model::{
    APPROVED_AMOUNT_COLUMN, CLAIM_ID_COLUMN, CleanedRecord, FPK_COLUMNS, RawTable,
};
use crate::options::{CleanOptions, ZeroAmountPolicy};
use crate::warning::{ExtractWarning, WarningCode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub table_count: usize,
    pub candidate_table_count: usize,
    pub merged_row_count: usize,
    pub data_row_count: usize,
    pub record_count: usize,
    pub dropped_row_count: usize,
    pub warnings: Vec<ExtractWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<CleanedRecord>,
    pub report: ExtractionReport,
}

pub(crate) fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim().replace(',', "");
    trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

pub(crate) fn clean_claim_id(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

// Drops every non-digit (signs and decimal points included) and reads the
// rest as an integer. No digits reads as 0, overflow saturates.
pub(crate) fn parse_amount(raw: &str) -> u64 {
    let digits = raw
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().unwrap_or(u64::MAX)
}

fn merge_candidates(tables: Vec<RawTable>) -> Vec<Vec<String>> {
    tables
        .into_iter()
        .flat_map(RawTable::into_rows)
        .map(|row| row.into_iter().take(FPK_COLUMNS).collect::<Vec<_>>())
        .collect()
}

fn clean_row(row: &[String]) -> CleanedRecord {
    CleanedRecord {
        claim_id: clean_claim_id(&row[CLAIM_ID_COLUMN]),
        approved_amount: parse_amount(&row[APPROVED_AMOUNT_COLUMN]),
    }
}

fn keep_record(record: &CleanedRecord, policy: ZeroAmountPolicy) -> bool {
    if record.claim_id.is_empty() {
        return false;
    }
    match policy {
        ZeroAmountPolicy::Drop => record.approved_amount > 0,
        ZeroAmountPolicy::Keep => true,
    }
}

pub fn clean_tables(
    tables: Vec<RawTable>,
    options: &CleanOptions,
) -> Result<Extraction, ExtractError> {
    if tables.is_empty() {
        return Err(ExtractError::NoTablesExtracted);
    }

    let table_count = tables.len();
    let mut warnings = Vec::new();
    let mut candidates = Vec::new();
    for table in tables {
        if table.has_candidate_shape() {
            candidates.push(table);
            continue;
        }

        debug!(
            page = table.page,
            columns = table.column_count(),
            rows = table.row_count(),
            "skipping table without FPK shape"
        );
        warnings.push(
            ExtractWarning::new(
                WarningCode::TableShapeRejected,
                format!(
                    "skipped table with {} column(s) and {} row(s)",
                    table.column_count(),
                    table.row_count()
                ),
            )
            .with_page(table.page),
        );
    }

    if candidates.is_empty() {
        return Err(ExtractError::NoMatchingStructure);
    }

    let candidate_table_count = candidates.len();
    let merged = merge_candidates(candidates);
    let merged_row_count = merged.len();

    let data_rows = merged
        .iter()
        .filter(|row| is_numeric(&row[0]))
        .collect::<Vec<_>>();
    let data_row_count = data_rows.len();
    if data_row_count < merged_row_count {
        warnings.push(ExtractWarning::new(
            WarningCode::RowWithoutSequenceNumber,
            format!(
                "{} row(s) without a numeric sequence number were discarded",
                merged_row_count - data_row_count
            ),
        ));
    }

    let records = data_rows
        .into_iter()
        .map(|row| clean_row(row))
        .filter(|record| keep_record(record, options.zero_amount))
        .collect::<Vec<_>>();
    let dropped_row_count = data_row_count - records.len();
    if dropped_row_count > 0 {
        warnings.push(ExtractWarning::new(
            WarningCode::RecordDropped,
            format!(
                "{dropped_row_count} record(s) dropped for an empty claim id or zero amount"
            ),
        ));
    }

    info!(
        tables = table_count,
        candidates = candidate_table_count,
        rows = merged_row_count,
        records = records.len(),
        "cleaned FPK tables"
    );

    Ok(Extraction {
        report: ExtractionReport {
            table_count,
            candidate_table_count,
            merged_row_count,
            data_row_count,
            record_count: records.len(),
            dropped_row_count,
            warnings,
        },
        records,
    })
}
