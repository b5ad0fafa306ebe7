use std::panic;
use std::path::Path;
use std::rc::Rc;

use encoding_rs::UTF_16BE;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::error::ExtractorError;
use crate::fonts::{FontDecoder, decode_with, page_fonts};
use crate::model::PageText;
use crate::options::PageSelection;
use crate::stream::{soft_split_line_into_cells, split_line_into_cells};

#[derive(Debug, Clone, Copy)]
pub enum PdfSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl PdfSource<'_> {
    pub(crate) fn load(self) -> Result<Document, ExtractorError> {
        let document = match self {
            Self::Path(path) => Document::load(path)?,
            Self::Bytes(bytes) => Document::load_mem(bytes)?,
        };
        Ok(document)
    }

    // pdf-extract panics on some font dictionaries; the lopdf candidates still apply.
    fn extract_text(self) -> Option<String> {
        let text = panic::catch_unwind(|| match self {
            Self::Path(path) => pdf_extract::extract_text(path),
            Self::Bytes(bytes) => pdf_extract::extract_text_from_mem(bytes),
        });
        match text {
            Ok(Ok(text)) => Some(text),
            Ok(Err(error)) => {
                debug!(%error, "pdf-extract could not read document text");
                None
            }
            Err(_) => {
                debug!("pdf-extract panicked while reading document text");
                None
            }
        }
    }
}

pub(crate) fn selected_pages(
    document: &Document,
    selection: Option<&PageSelection>,
) -> Result<Vec<(u32, ObjectId)>, ExtractorError> {
    let pages = document
        .get_pages()
        .into_iter()
        .filter(|(page_no, _)| selection.is_none_or(|selection| selection.contains(*page_no)))
        .collect::<Vec<_>>();

    if pages.is_empty() {
        return Err(ExtractorError::NoPagesSelected);
    }
    Ok(pages)
}

pub(crate) fn decode_page_content(
    document: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<Content, ExtractorError> {
    let raw_content = document.get_page_content(page_id)?;
    Content::decode(&raw_content).map_err(|error| ExtractorError::PageContent {
        page: page_number,
        message: error.to_string(),
    })
}

fn split_text_into_pages(raw_text: &str) -> Vec<String> {
    let raw_text = raw_text.strip_suffix('\u{000C}').unwrap_or(raw_text);
    raw_text.split('\u{000C}').map(str::to_string).collect()
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let (mut total, mut replacement, mut control) = (0_usize, 0_usize, 0_usize);
    for ch in text.chars() {
        total += 1;
        if ch == '\u{FFFD}' {
            replacement += 1;
        } else if ch.is_control() && !matches!(ch, '\n' | '\r' | '\t') {
            control += 1;
        }
    }

    total > 0 && (replacement * 8 > total || control * 5 > total)
}

pub(crate) fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    let has_bom = bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]);
    let wide_encoding = encoding.is_some_and(|name| {
        let lower = name.to_ascii_lowercase();
        ["utf16", "ucs2", "identity-h", "unicode"]
            .iter()
            .any(|marker| lower.contains(marker))
    });

    if has_bom || wide_encoding {
        let body = if has_bom && bytes.len() > 2 {
            &bytes[2..]
        } else {
            bytes
        };
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(body);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

// A claim row starts with a sequence number and carries an SEP-like token:
// letters and digits mixed, at least eight characters.
fn looks_like_claim_row(line: &str) -> bool {
    let cells = soft_split_line_into_cells(line);
    let starts_numbered = cells
        .first()
        .is_some_and(|cell| cell.chars().all(|ch| ch.is_ascii_digit()));
    starts_numbered
        && cells.iter().skip(1).any(|cell| {
            cell.len() >= 8
                && cell.chars().all(|ch| ch.is_ascii_alphanumeric())
                && cell.chars().any(|ch| ch.is_ascii_digit())
                && cell.chars().any(|ch| ch.is_ascii_alphabetic())
        })
}

fn extraction_quality_score(text: &str) -> i64 {
    if text.trim().is_empty() {
        return i64::MIN / 4;
    }

    let mut score = 0_i64;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        score += 1;
        if split_line_into_cells(line).len() >= 2 || soft_split_line_into_cells(line).len() >= 3 {
            score += 50;
        }
        if looks_like_claim_row(line) {
            score += 25;
        }
    }

    if looks_decoding_broken(text) {
        score -= 800;
    }
    score
}

fn choose_best_text(candidates: &[String]) -> String {
    candidates
        .iter()
        .max_by_key(|text| extraction_quality_score(text))
        .cloned()
        .unwrap_or_default()
}

fn collect_text(text: &mut String, font: Option<&FontDecoder<'_>>, operands: &[Object]) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_with(font, bytes)),
            Object::Array(items) => {
                collect_text(text, font, items);
                text.push(' ');
            }
            Object::Integer(value) if *value < -100 => text.push(' '),
            _ => {}
        }
    }
}

fn extract_text_from_page_content(
    document: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Option<String> {
    let content = decode_page_content(document, page_number, page_id).ok()?;
    let fonts = page_fonts(document, page_id);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut font: Option<Rc<FontDecoder<'_>>> = None;
    for operation in content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                font = operation
                    .operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .and_then(|name| fonts.get(name).cloned());
            }
            "Tj" | "TJ" | "'" | "\"" => {
                collect_text(&mut current, font.as_deref(), &operation.operands);
            }
            "T*" | "Td" | "TD" | "Tm" | "ET" if !current.trim().is_empty() => {
                lines.push(std::mem::take(&mut current));
            }
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }
    (!lines.is_empty()).then(|| lines.join("\n"))
}

pub(crate) fn read_pdf_pages(
    source: PdfSource<'_>,
    page_selection: Option<&PageSelection>,
) -> Result<Vec<PageText>, ExtractorError> {
    let document = source.load()?;
    let page_count = document.get_pages().len();
    let pdf_extract_pages = source
        .extract_text()
        .map(|text| split_text_into_pages(&text))
        .filter(|pages| pages.len() == page_count);

    let mut pages = Vec::new();
    for (page_no, page_id) in selected_pages(&document, page_selection)? {
        let mut candidates = Vec::new();
        if let Some(text) = pdf_extract_pages
            .as_ref()
            .and_then(|fallback| fallback.get(page_no as usize - 1).cloned())
            .filter(|text| !text.trim().is_empty())
        {
            candidates.push(text);
        }
        if let Some(text) = extract_text_from_page_content(&document, page_no, page_id) {
            candidates.push(text);
        }
        if let Some(text) = document
            .extract_text(&[page_no])
            .ok()
            .filter(|text| !text.trim().is_empty())
        {
            candidates.push(text);
        }

        pages.push(PageText {
            page_number: page_no,
            text: choose_best_text(&candidates),
        });
    }

    Ok(pages)
}
