use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to decode page {page} content: {message}")]
    PageContent { page: u32, message: String },

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no tables extracted")]
    NoTablesExtracted,

    #[error("no table matches expected structure (at least 6 columns and more than 1 row)")]
    NoMatchingStructure,

    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid utf-8 csv output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl ExtractError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoTablesExtracted => "empty_extraction",
            Self::NoMatchingStructure => "structure_mismatch",
            Self::Extractor(_) => "extractor_error",
            Self::Io(_) => "io_error",
            Self::Csv(_) | Self::Utf8(_) => "csv_error",
        }
    }
}
