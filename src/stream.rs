use std::sync::LazyLock;

use regex::Regex;

use crate::model::{PageText, RawTable};

const MIN_STREAM_COLUMNS: usize = 2;

// A tab, or two or more whitespace characters, separates cells.
static CELL_GAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t|\s{2,}").expect("cell gap pattern should compile"));

pub(crate) fn split_line_into_cells(line: &str) -> Vec<String> {
    CELL_GAP_RE
        .split(line.trim())
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

pub(crate) fn soft_split_line_into_cells(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

// Falls back to single-space splitting for numeric lines that are not prose.
fn cells_for_line(line: &str, min_cols: usize) -> Vec<String> {
    let cells = split_line_into_cells(line);
    if cells.len() >= min_cols {
        return cells;
    }

    let soft_cells = soft_split_line_into_cells(line);
    let has_numeric = soft_cells
        .iter()
        .any(|cell| cell.chars().any(|ch| ch.is_ascii_digit()));
    let looks_like_sentence = ['.', '!', '?']
        .iter()
        .any(|punctuation| line.trim_end().ends_with(*punctuation));
    if soft_cells.len() >= min_cols && !looks_like_sentence && has_numeric {
        soft_cells
    } else {
        cells
    }
}

fn detect_tables_in_page(page: &PageText, min_cols: usize) -> Vec<RawTable> {
    let mut tables = Vec::new();
    let mut current_rows: Vec<Vec<String>> = Vec::new();

    let flush_current = |rows: &mut Vec<Vec<String>>, tables: &mut Vec<RawTable>| {
        if rows.len() >= 2 {
            tables.push(RawTable::new(page.page_number, std::mem::take(rows)));
        } else {
            rows.clear();
        }
    };

    for line in page.text.lines() {
        let cells = cells_for_line(line, min_cols);
        if cells.len() >= min_cols {
            current_rows.push(cells);
        } else {
            flush_current(&mut current_rows, &mut tables);
        }
    }

    flush_current(&mut current_rows, &mut tables);
    tables
}

pub(crate) fn detect_stream_tables(pages: &[PageText]) -> Vec<RawTable> {
    pages
        .iter()
        .flat_map(|page| detect_tables_in_page(page, MIN_STREAM_COLUMNS))
        .collect()
}
