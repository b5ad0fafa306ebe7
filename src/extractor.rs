use tracing::debug;

use crate::error::ExtractorError;
use crate::lattice::detect_lattice_tables;
use crate::layout::read_page_layout;
use crate::model::RawTable;
use crate::options::{PageSelection, ReadOptions, TableDetection};
use crate::pdf_reader::{PdfSource, read_pdf_pages, selected_pages};
use crate::stream::detect_stream_tables;

pub trait TableExtractor {
    fn read_tables(
        &self,
        source: PdfSource<'_>,
        options: &ReadOptions,
    ) -> Result<Vec<RawTable>, ExtractorError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTableExtractor;

impl PdfTableExtractor {
    fn read_lattice_tables(
        source: PdfSource<'_>,
        pages: Option<&PageSelection>,
    ) -> Result<Vec<RawTable>, ExtractorError> {
        let document = source.load()?;
        let mut tables = Vec::new();
        for (page_no, page_id) in selected_pages(&document, pages)? {
            let layout = read_page_layout(&document, page_no, page_id)?;
            tables.extend(detect_lattice_tables(&layout));
        }
        Ok(tables)
    }

    fn read_stream_tables(
        source: PdfSource<'_>,
        pages: Option<&PageSelection>,
    ) -> Result<Vec<RawTable>, ExtractorError> {
        let pages = read_pdf_pages(source, pages)?;
        Ok(detect_stream_tables(&pages))
    }
}

impl TableExtractor for PdfTableExtractor {
    fn read_tables(
        &self,
        source: PdfSource<'_>,
        options: &ReadOptions,
    ) -> Result<Vec<RawTable>, ExtractorError> {
        let tables = match options.detection {
            TableDetection::Lattice => Self::read_lattice_tables(source, options.pages.as_ref())?,
            TableDetection::Stream => Self::read_stream_tables(source, options.pages.as_ref())?,
        };
        debug!(
            tables = tables.len(),
            detection = ?options.detection,
            "tables read from PDF"
        );
        Ok(arrange_tables(tables, options))
    }
}

pub(crate) fn arrange_tables(tables: Vec<RawTable>, options: &ReadOptions) -> Vec<RawTable> {
    let tables = if options.first_row_is_header {
        tables
            .into_iter()
            .map(|table| {
                let page = table.page;
                RawTable::new(page, table.into_rows().into_iter().skip(1).collect())
            })
            .collect::<Vec<_>>()
    } else {
        tables
    };

    if options.multiple_tables || tables.len() <= 1 {
        return tables;
    }

    let page = tables[0].page;
    let rows = tables.into_iter().flat_map(RawTable::into_rows).collect();
    vec![RawTable::new(page, rows)]
}
