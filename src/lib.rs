mod csv_out;
mod error;
mod extractor;
mod fonts;
mod lattice;
mod layout;
mod model;
mod options;
mod pdf_reader;
mod period;
mod pipeline;
mod preview;
mod stream;
mod warning;

use std::path::Path;

use tracing::debug;

use crate::pdf_reader::read_pdf_pages;

pub use csv_out::{read_csv, write_csv, write_csv_to_string};
pub use error::{ExtractError, ExtractorError};
pub use extractor::{PdfTableExtractor, TableExtractor};
pub use model::{
    APPROVED_AMOUNT_HEADER, CLAIM_ID_HEADER, CleanedRecord, FPK_COLUMNS, RawTable,
};
pub use options::{
    CleanOptions, ExtractOptions, PageSelection, ReadOptions, TableDetection,
    ZeroAmountPolicy,
};
pub use pdf_reader::PdfSource;
pub use period::{Period, detect_period};
pub use pipeline::{Extraction, ExtractionReport, clean_tables};
pub use preview::{DEFAULT_PREVIEW_ROWS, format_amount, preview_table};
pub use warning::{ExtractWarning, WarningCode};

pub fn extract_with<E>(
    extractor: &E,
    source: PdfSource<'_>,
    options: &ExtractOptions,
) -> Result<Extraction, ExtractError>
where
    E: TableExtractor + ?Sized,
{
    let tables = extractor.read_tables(source, &options.read)?;
    debug!(tables = tables.len(), "extractor returned tables");
    clean_tables(tables, &options.clean)
}

pub fn extract_with_report(
    input_pdf: &Path,
    options: &ExtractOptions,
) -> Result<Extraction, ExtractError> {
    extract_with(&PdfTableExtractor, PdfSource::Path(input_pdf), options)
}

pub fn extract(input_pdf: &Path) -> Result<Vec<CleanedRecord>, ExtractError> {
    extract_with_report(input_pdf, &ExtractOptions::default()).map(|extraction| extraction.records)
}

pub fn extract_pdf_to_csv(
    input_pdf: &Path,
    output_csv: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    let extraction = extract_with_report(input_pdf, options)?;
    write_csv(output_csv, &extraction.records)?;
    Ok(extraction.report)
}

pub fn extract_pdf_bytes_to_csv_string(
    input_pdf: &[u8],
    options: &ExtractOptions,
) -> Result<(String, ExtractionReport), ExtractError> {
    let extraction = extract_with(&PdfTableExtractor, PdfSource::Bytes(input_pdf), options)?;
    let csv = write_csv_to_string(&extraction.records)?;
    Ok((csv, extraction.report))
}

pub fn detect_period_in_pdf(source: PdfSource<'_>) -> Result<Option<Period>, ExtractError> {
    let pages = read_pdf_pages(source, Some(&PageSelection::single(1)))?;
    Ok(pages.first().and_then(|page| detect_period(&page.text)))
}
