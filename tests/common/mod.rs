use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

// No., No.SEP, Tgl. Verifikasi, Biaya Riil, Diajukan, Disetujui
const COLUMN_WIDTHS: [i64; 6] = [30, 120, 70, 80, 80, 80];
const TABLE_LEFT: i64 = 30;
const TABLE_TOP: i64 = 700;
const ROW_HEIGHT: i64 = 20;
const FONT_SIZE: i64 = 8;
// Identity-H glyph ids are the ASCII code shifted down by this much.
const GLYPH_SHIFT: u16 = 0x1D;

pub struct FixturePage<'a> {
    pub heading: Vec<&'a str>,
    pub rows: Vec<Vec<&'a str>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureOptions {
    // Type0 Identity-H font whose glyph ids only its ToUnicode CMap can decode.
    pub identity_font: bool,
    // Page body drawn by a form XObject instead of the page content stream.
    pub wrap_in_form: bool,
}

fn integer(value: i64) -> Object {
    Object::Integer(value)
}

fn index(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn text_object(text: &str, identity_font: bool) -> Object {
    if !identity_font {
        return Object::string_literal(text);
    }
    let bytes = text
        .bytes()
        .flat_map(|byte| (u16::from(byte) - GLYPH_SHIFT).to_be_bytes())
        .collect();
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn show_text(operations: &mut Vec<Operation>, at: (i64, i64), size: i64, text: Object) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec!["F1".into(), integer(size)]));
    operations.push(Operation::new("Td", vec![integer(at.0), integer(at.1)]));
    operations.push(Operation::new("Tj", vec![text]));
    operations.push(Operation::new("ET", vec![]));
}

fn stroke_line(operations: &mut Vec<Operation>, from: (i64, i64), to: (i64, i64)) {
    operations.push(Operation::new("m", vec![integer(from.0), integer(from.1)]));
    operations.push(Operation::new("l", vec![integer(to.0), integer(to.1)]));
    operations.push(Operation::new("S", vec![]));
}

fn page_operations(page: &FixturePage<'_>, identity_font: bool) -> Vec<Operation> {
    let mut operations = Vec::new();
    for (line_no, line) in page.heading.iter().enumerate() {
        let y = 800 - 14 * index(line_no);
        show_text(&mut operations, (TABLE_LEFT, y), 10, text_object(line, identity_font));
    }

    let columns = page.rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return operations;
    }

    let mut column_edges = vec![TABLE_LEFT];
    for width in COLUMN_WIDTHS.iter().take(columns) {
        column_edges.push(column_edges[column_edges.len() - 1] + width);
    }
    let row_count = index(page.rows.len());
    let bottom = TABLE_TOP - ROW_HEIGHT * row_count;
    let right = column_edges[column_edges.len() - 1];

    operations.push(Operation::new("w", vec![Object::Real(0.5)]));
    for row in 0..=row_count {
        let y = TABLE_TOP - ROW_HEIGHT * row;
        stroke_line(&mut operations, (TABLE_LEFT, y), (right, y));
    }
    for x in &column_edges {
        stroke_line(&mut operations, (*x, TABLE_TOP), (*x, bottom));
    }

    for (row_index, row) in page.rows.iter().enumerate() {
        let row_bottom = TABLE_TOP - ROW_HEIGHT * (index(row_index) + 1);
        for (column, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            show_text(
                &mut operations,
                (column_edges[column] + 3, row_bottom + 6),
                FONT_SIZE,
                text_object(cell, identity_font),
            );
        }
    }
    operations
}

fn add_fonts(doc: &mut Document, identity_font: bool) -> ObjectId {
    let font_id = if identity_font {
        let cmap = format!(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
             1 beginbfrange\n<{:04X}> <{:04X}> <0020>\nendbfrange\n\
             endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n",
            0x20 - GLYPH_SHIFT,
            0x7E - GLYPH_SHIFT
        );
        let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "CourierNew",
            "Flags" => integer(32),
            "FontBBox" => vec![integer(-21), integer(-680), integer(638), integer(1021)],
            "ItalicAngle" => integer(0),
            "Ascent" => integer(833),
            "Descent" => integer(-300),
            "CapHeight" => integer(571),
            "StemV" => integer(80),
        });
        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "CourierNew",
            "FontDescriptor" => descriptor_id,
            "DW" => integer(600),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => integer(0),
            },
        });
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "CourierNew",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![descendant_id.into()],
            "ToUnicode" => to_unicode_id,
        })
    } else {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        })
    };

    doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    })
}

fn finish(
    mut doc: Document,
    pages_id: ObjectId,
    page_ids: &[ObjectId],
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<Object>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "MediaBox" => vec![integer(0), integer(0), integer(595), integer(842)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    doc.save(path)?;
    Ok(())
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    resources: Object,
    operations: Vec<Operation>,
) -> Result<ObjectId, Box<dyn std::error::Error>> {
    let content = Content { operations }.encode()?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

pub fn create_fpk_pdf_with(
    path: &Path,
    pages: &[FixturePage<'_>],
    options: FixtureOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let resources_id = add_fonts(&mut doc, options.identity_font);

    let mut page_ids = Vec::new();
    for page in pages {
        let operations = page_operations(page, options.identity_font);
        let page_id = if options.wrap_in_form {
            let body = Content { operations }.encode()?;
            let form_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![integer(0), integer(0), integer(595), integer(842)],
                    "Resources" => resources_id,
                },
                body,
            ));
            let mut xobjects = Dictionary::new();
            xobjects.set("Fm1", form_id);
            add_page(
                &mut doc,
                pages_id,
                Object::Dictionary(dictionary! { "XObject" => xobjects }),
                vec![
                    Operation::new("q", vec![]),
                    Operation::new("Do", vec!["Fm1".into()]),
                    Operation::new("Q", vec![]),
                ],
            )?
        } else {
            add_page(&mut doc, pages_id, resources_id.into(), operations)?
        };
        page_ids.push(page_id);
    }

    finish(doc, pages_id, &page_ids, path)
}

pub fn create_fpk_pdf(
    path: &Path,
    pages: &[FixturePage<'_>],
) -> Result<(), Box<dyn std::error::Error>> {
    create_fpk_pdf_with(path, pages, FixtureOptions::default())
}

pub fn create_unruled_pdf(
    path: &Path,
    lines: &[&str],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let resources_id = add_fonts(&mut doc, false);

    let mut operations = Vec::new();
    for (line_no, line) in lines.iter().enumerate() {
        let y = 780 - 12 * index(line_no);
        show_text(&mut operations, (50, y), 10, text_object(line, false));
    }
    let page_id = add_page(&mut doc, pages_id, resources_id.into(), operations)?;

    finish(doc, pages_id, &[page_id], path)
}

pub fn fpk_header() -> Vec<&'static str> {
    vec![
        "No.",
        "No.SEP",
        "Tgl. Verifikasi",
        "Biaya Riil RS",
        "Diajukan",
        "Disetujui",
    ]
}
