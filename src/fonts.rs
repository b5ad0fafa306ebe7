use std::collections::BTreeMap;
use std::rc::Rc;

use encoding_rs::UTF_16BE;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::pdf_reader::decode_pdf_bytes;

// Codes covered by one bfrange entry are capped; larger ranges are malformed.
const MAX_RANGE_LEN: u32 = 0x1_0000;

pub(crate) type FontMap<'a> = BTreeMap<Vec<u8>, Rc<FontDecoder<'a>>>;

pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => document.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

pub(crate) fn stream_data(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToUnicodeMap {
    code_width: usize,
    mappings: BTreeMap<u32, String>,
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0_u32, |value, byte| (value << 8) | u32::from(*byte))
}

fn utf16be_shifted(bytes: &[u8], offset: u32) -> String {
    let mut units = bytes.to_vec();
    let len = units.len();
    if offset > 0 && len >= 2 {
        let last = u16::from_be_bytes([units[len - 2], units[len - 1]]);
        let shifted = last.wrapping_add(u16::try_from(offset).unwrap_or(u16::MAX));
        units[len - 2..].copy_from_slice(&shifted.to_be_bytes());
    }
    let (text, _) = UTF_16BE.decode_without_bom_handling(&units);
    text.into_owned()
}

// PostScript comments are not part of the content syntax lopdf tokenizes.
fn strip_comments(data: &[u8]) -> Vec<u8> {
    data.split(|byte| *byte == b'\n' || *byte == b'\r')
        .filter(|line| {
            matches!(
                line.iter().find(|byte| !byte.is_ascii_whitespace()),
                Some(byte) if *byte != b'%'
            )
        })
        .flat_map(|line| line.iter().copied().chain(std::iter::once(b'\n')))
        .collect()
}

impl ToUnicodeMap {
    pub(crate) fn parse(data: &[u8]) -> Option<Self> {
        let content = match Content::decode(&strip_comments(data)) {
            Ok(content) => content,
            Err(error) => {
                debug!(%error, "unreadable ToUnicode CMap");
                return None;
            }
        };

        let mut map = Self::default();
        for operation in &content.operations {
            match operation.operator.as_str() {
                "endbfchar" => {
                    for pair in operation.operands.chunks_exact(2) {
                        if let (Ok(code), Ok(target)) = (pair[0].as_str(), pair[1].as_str()) {
                            map.insert(code, utf16be_shifted(target, 0));
                        }
                    }
                }
                "endbfrange" => {
                    for triple in operation.operands.chunks_exact(3) {
                        map.insert_range(&triple[0], &triple[1], &triple[2]);
                    }
                }
                _ => {}
            }
        }

        if map.mappings.is_empty() {
            None
        } else {
            Some(map)
        }
    }

    fn insert(&mut self, code: &[u8], text: String) {
        self.code_width = self.code_width.max(code.len());
        self.mappings.insert(code_value(code), text);
    }

    fn insert_range(&mut self, low: &Object, high: &Object, target: &Object) {
        let (Ok(low), Ok(high)) = (low.as_str(), high.as_str()) else {
            return;
        };
        let (first, last) = (code_value(low), code_value(high));
        if last < first || last - first >= MAX_RANGE_LEN {
            return;
        }
        self.code_width = self.code_width.max(low.len());

        match target {
            Object::String(bytes, _) => {
                for code in first..=last {
                    self.mappings
                        .insert(code, utf16be_shifted(bytes, code - first));
                }
            }
            Object::Array(items) => {
                for (code, item) in (first..=last).zip(items) {
                    if let Ok(bytes) = item.as_str() {
                        self.mappings.insert(code, utf16be_shifted(bytes, 0));
                    }
                }
            }
            _ => {}
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        bytes
            .chunks(self.code_width.max(1))
            .filter_map(|code| self.mappings.get(&code_value(code)))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FontDecoder<'a> {
    encoding: Option<&'a str>,
    to_unicode: Option<ToUnicodeMap>,
}

impl<'a> FontDecoder<'a> {
    pub(crate) fn from_font(document: &'a Document, font: &'a Dictionary) -> Self {
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .map(|object| resolve(document, object))
            .and_then(|object| object.as_stream().ok())
            .and_then(|stream| ToUnicodeMap::parse(&stream_data(stream)));
        Self {
            encoding: Some(font.get_font_encoding()),
            to_unicode,
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        if let Some(map) = &self.to_unicode {
            let text = map.decode(bytes);
            if !text.is_empty() {
                return text;
            }
        }
        decode_pdf_bytes(self.encoding, bytes)
    }
}

pub(crate) fn decode_with(font: Option<&FontDecoder<'_>>, bytes: &[u8]) -> String {
    match font {
        Some(font) => font.decode(bytes),
        None => decode_pdf_bytes(None, bytes),
    }
}

pub(crate) fn page_fonts(document: &Document, page_id: ObjectId) -> FontMap<'_> {
    document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, Rc::new(FontDecoder::from_font(document, font))))
        .collect()
}

pub(crate) fn resource_fonts<'a>(document: &'a Document, resources: &'a Dictionary) -> FontMap<'a> {
    let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .map(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
    else {
        return FontMap::new();
    };

    fonts
        .iter()
        .filter_map(|(name, font)| {
            let font = resolve(document, font).as_dict().ok()?;
            Some((name.clone(), Rc::new(FontDecoder::from_font(document, font))))
        })
        .collect()
}
