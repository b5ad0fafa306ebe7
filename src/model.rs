use serde::{Deserialize, Serialize};

pub const FPK_COLUMNS: usize = 6;

pub const CLAIM_ID_COLUMN: usize = 1;
pub const APPROVED_AMOUNT_COLUMN: usize = 5;

pub const CLAIM_ID_HEADER: &str = "No.SEP";
pub const APPROVED_AMOUNT_HEADER: &str = "Disetujui";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

// One block of cells as produced by a table extractor. Rows are kept
// rectangular: shorter rows are padded with empty cells on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub page: u32,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    #[must_use]
    pub fn new(page: u32, rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { page, rows }
    }

    #[must_use]
    pub fn from_cells(page: u32, rows: &[&[&str]]) -> Self {
        Self::new(
            page,
            rows.iter()
                .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
                .collect(),
        )
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn has_candidate_shape(&self) -> bool {
        self.column_count() >= FPK_COLUMNS && self.row_count() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedRecord {
    #[serde(rename = "No.SEP")]
    pub claim_id: String,
    #[serde(rename = "Disetujui")]
    pub approved_amount: u64,
}

impl CleanedRecord {
    #[must_use]
    pub fn new(claim_id: impl Into<String>, approved_amount: u64) -> Self {
        Self {
            claim_id: claim_id.into(),
            approved_amount,
        }
    }
}
