use comfy_table::{Cell, CellAlignment, Table};

use crate::model::{APPROVED_AMOUNT_HEADER, CLAIM_ID_HEADER, CleanedRecord};

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

#[must_use]
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

#[must_use]
pub fn preview_table(records: &[CleanedRecord], limit: usize) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["No.", CLAIM_ID_HEADER, APPROVED_AMOUNT_HEADER]);
    for (index, record) in records.iter().take(limit).enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&record.claim_id),
            Cell::new(format_amount(record.approved_amount)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
