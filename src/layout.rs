use std::collections::BTreeMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::ExtractorError;
use crate::fonts::{
    FontDecoder, FontMap, decode_with, page_fonts, resolve, resource_fonts, stream_data,
};
use crate::pdf_reader::decode_page_content;

// Font metrics are not read; glyph advance is estimated as half the font size.
const APPROX_GLYPH_WIDTH: f32 = 0.5;
const MAX_FORM_DEPTH: usize = 8;
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    pub(crate) const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub(crate) const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub(crate) const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    // `self × other`: apply `self` first, then `other`.
    pub(crate) fn then(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub(crate) fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextFragment {
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Segment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PageLayout {
    pub page_number: u32,
    pub fragments: Vec<TextFragment>,
    pub segments: Vec<Segment>,
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(out)
}

#[derive(Debug, Clone, Default)]
struct Scope<'a> {
    fonts: FontMap<'a>,
    xobjects: BTreeMap<Vec<u8>, ObjectId>,
}

fn xobjects_of(document: &Document, resources: &Dictionary) -> BTreeMap<Vec<u8>, ObjectId> {
    resources
        .get(b"XObject")
        .ok()
        .map(|object| resolve(document, object))
        .and_then(|object| object.as_dict().ok())
        .map(|xobjects| {
            xobjects
                .iter()
                .filter_map(|(name, object)| Some((name.clone(), object.as_reference().ok()?)))
                .collect()
        })
        .unwrap_or_default()
}

fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(document, resources).as_dict().ok();
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

impl<'a> Scope<'a> {
    fn of_page(document: &'a Document, page_id: ObjectId) -> Self {
        Self {
            fonts: page_fonts(document, page_id),
            xobjects: page_resources(document, page_id)
                .map(|resources| xobjects_of(document, resources))
                .unwrap_or_default(),
        }
    }

    fn of_resources(document: &'a Document, resources: &'a Dictionary) -> Self {
        Self {
            fonts: resource_fonts(document, resources),
            xobjects: xobjects_of(document, resources),
        }
    }
}

struct LayoutBuilder<'a> {
    document: &'a Document,
    scope: Scope<'a>,
    depth: usize,
    ctm: Matrix,
    saved_ctm: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
    font_size: f32,
    font: Option<Rc<FontDecoder<'a>>>,
    path: Vec<Segment>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    layout: PageLayout,
}

impl<'a> LayoutBuilder<'a> {
    fn new(document: &'a Document, page_number: u32, scope: Scope<'a>) -> Self {
        Self {
            document,
            scope,
            depth: 0,
            ctm: Matrix::IDENTITY,
            saved_ctm: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 0.0,
            font: None,
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            layout: PageLayout {
                page_number,
                ..PageLayout::default()
            },
        }
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => self.saved_ctm.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved_ctm.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some([a, b, c, d, e, f]) = numbers::<6>(operands) {
                    self.ctm = Matrix::new(a, b, c, d, e, f).then(&self.ctm);
                }
            }
            "m" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    let point = self.ctm.apply(x, y);
                    self.current_point = Some(point);
                    self.subpath_start = Some(point);
                }
            }
            "l" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    let point = self.ctm.apply(x, y);
                    if let Some(from) = self.current_point {
                        self.push_segment(from, point);
                    }
                    self.current_point = Some(point);
                }
            }
            "re" => {
                if let Some([x, y, width, height]) = numbers::<4>(operands) {
                    let corners = [
                        self.ctm.apply(x, y),
                        self.ctm.apply(x + width, y),
                        self.ctm.apply(x + width, y + height),
                        self.ctm.apply(x, y + height),
                    ];
                    for index in 0..corners.len() {
                        self.push_segment(corners[index], corners[(index + 1) % corners.len()]);
                    }
                    self.current_point = Some(corners[0]);
                    self.subpath_start = Some(corners[0]);
                }
            }
            "h" => self.close_subpath(),
            "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint_path(),
            "s" | "b" | "b*" => {
                self.close_subpath();
                self.paint_path();
            }
            "n" => self.discard_path(),
            "Do" => {
                let form = operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                    .and_then(|name| self.scope.xobjects.get(name).copied());
                if let Some(form) = form {
                    self.draw_form(form);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(font_name) = operands.first().and_then(|operand| operand.as_name().ok())
                {
                    self.font = self.scope.fonts.get(font_name).cloned();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some([a, b, c, d, e, f]) = numbers::<6>(operands) {
                    self.line_matrix = Matrix::new(a, b, c, d, e, f);
                    self.text_matrix = self.line_matrix;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" | "TJ" => self.show(operands),
            "'" => {
                self.move_line(0.0, -self.leading);
                self.show(operands);
            }
            "\"" => {
                self.move_line(0.0, -self.leading);
                self.show(operands.get(2..).unwrap_or_default());
            }
            _ => {}
        }
    }

    // Form XObjects run with their own matrix and resources; graphics and
    // text state are restored afterwards as if wrapped in q/Q.
    fn draw_form(&mut self, id: ObjectId) {
        let document = self.document;
        if self.depth >= MAX_FORM_DEPTH {
            debug!(?id, "form nesting too deep, skipped");
            return;
        }
        let Ok(stream) = document.get_object(id).and_then(Object::as_stream) else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Form");
        if !is_form {
            return;
        }
        let content = match Content::decode(&stream_data(stream)) {
            Ok(content) => content,
            Err(error) => {
                debug!(?id, %error, "unreadable form content, skipped");
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|items| numbers::<6>(items))
            .map_or(Matrix::IDENTITY, |[a, b, c, d, e, f]| {
                Matrix::new(a, b, c, d, e, f)
            });
        let form_scope = stream
            .dict
            .get(b"Resources")
            .ok()
            .map(|object| resolve(document, object))
            .and_then(|object| object.as_dict().ok())
            .map(|resources| Scope::of_resources(document, resources));

        let saved_ctm = self.ctm;
        let saved_stack = self.saved_ctm.len();
        let saved_text = (self.text_matrix, self.line_matrix, self.leading, self.font_size);
        let saved_font = self.font.clone();
        let outer_scope = form_scope.map(|scope| std::mem::replace(&mut self.scope, scope));

        self.ctm = matrix.then(&self.ctm);
        self.depth += 1;
        for operation in &content.operations {
            self.apply(operation);
        }
        self.depth -= 1;

        if let Some(scope) = outer_scope {
            self.scope = scope;
        }
        self.saved_ctm.truncate(saved_stack);
        self.ctm = saved_ctm;
        (self.text_matrix, self.line_matrix, self.leading, self.font_size) = saved_text;
        self.font = saved_font;
        self.discard_path();
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn show(&mut self, operands: &[Object]) {
        let font = self.font.as_deref();
        let mut text = String::new();
        let mut kerning = 0.0_f32;
        for operand in operands {
            match operand {
                Object::String(bytes, _) => text.push_str(&decode_with(font, bytes)),
                Object::Array(items) => {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => text.push_str(&decode_with(font, bytes)),
                            other => {
                                if let Some(adjustment) = number(other) {
                                    kerning += adjustment;
                                    if adjustment < -100.0 {
                                        text.push(' ');
                                    }
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let rendering = self.text_matrix.then(&self.ctm);
        let (x, y) = rendering.apply(0.0, 0.0);
        let glyphs = text.chars().count() as f32;
        if !text.trim().is_empty() {
            self.layout.fragments.push(TextFragment {
                x,
                y,
                font_size: self.font_size * rendering.vertical_scale(),
                text,
            });
        }

        let advance = glyphs * self.font_size * APPROX_GLYPH_WIDTH - kerning / 1000.0 * self.font_size;
        self.text_matrix = Matrix::translation(advance, 0.0).then(&self.text_matrix);
    }

    fn push_segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.path.push(Segment {
            x0: from.0,
            y0: from.1,
            x1: to.0,
            y1: to.1,
        });
    }

    fn close_subpath(&mut self) {
        if let (Some(from), Some(start)) = (self.current_point, self.subpath_start) {
            if from != start {
                self.push_segment(from, start);
                self.current_point = Some(start);
            }
        }
    }

    fn paint_path(&mut self) {
        self.layout.segments.append(&mut self.path);
        self.current_point = None;
        self.subpath_start = None;
    }

    fn discard_path(&mut self) {
        self.path.clear();
        self.current_point = None;
        self.subpath_start = None;
    }
}

pub(crate) fn read_page_layout(
    document: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<PageLayout, ExtractorError> {
    let content = decode_page_content(document, page_number, page_id)?;
    let mut builder = LayoutBuilder::new(document, page_number, Scope::of_page(document, page_id));
    for operation in &content.operations {
        builder.apply(operation);
    }
    Ok(builder.layout)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, ObjectId, Stream, dictionary};

    use super::{LayoutBuilder, Matrix, Scope, Segment};

    fn run(operations: Vec<Operation>) -> super::PageLayout {
        let document = Document::with_version("1.5");
        run_in(&document, Scope::default(), &operations)
    }

    fn run_in(document: &Document, scope: Scope<'_>, operations: &[Operation]) -> super::PageLayout {
        let mut builder = LayoutBuilder::new(document, 1, scope);
        for operation in operations {
            builder.apply(operation);
        }
        builder.layout
    }

    fn add_form(document: &mut Document, operations: Vec<Operation>) -> ObjectId {
        let content = Content { operations }.encode().expect("form content should encode");
        document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 200.into()],
            },
            content,
        ))
    }

    fn scope_with_form(id: ObjectId) -> Scope<'static> {
        Scope {
            xobjects: BTreeMap::from([(b"Fm1".to_vec(), id)]),
            ..Scope::default()
        }
    }

    #[test]
    fn composes_translation_after_scale() {
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let moved = scale.then(&Matrix::translation(10.0, 5.0));
        assert_eq!(moved.apply(1.0, 1.0), (12.0, 7.0));
    }

    #[test]
    fn positions_text_from_text_matrix_and_ctm() {
        let layout = run(vec![
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 20.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 8.into()]),
            Operation::new("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("0301R001")]),
            Operation::new("TL", vec![12.into()]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("next")]),
            Operation::new("ET", vec![]),
        ]);

        assert_eq!(layout.fragments.len(), 2);
        assert_eq!((layout.fragments[0].x, layout.fragments[0].y), (110.0, 720.0));
        assert_eq!(layout.fragments[0].text, "0301R001");
        assert_eq!((layout.fragments[1].x, layout.fragments[1].y), (110.0, 708.0));
        assert_eq!(layout.fragments[1].font_size, 8.0);
    }

    #[test]
    fn records_stroked_lines_and_rectangles_only_when_painted() {
        let layout = run(vec![
            Operation::new("m", vec![0.into(), 0.into()]),
            Operation::new("l", vec![100.into(), 0.into()]),
            Operation::new("S", vec![]),
            Operation::new("re", vec![0.into(), 0.into(), 50.into(), 20.into()]),
            Operation::new("n", vec![]),
            Operation::new("re", vec![0.into(), 0.into(), 50.into(), 20.into()]),
            Operation::new("f", vec![]),
        ]);

        assert_eq!(layout.segments.len(), 5);
        assert_eq!(
            layout.segments[0],
            Segment {
                x0: 0.0,
                y0: 0.0,
                x1: 100.0,
                y1: 0.0
            }
        );
    }

    #[test]
    fn restores_ctm_on_q_pop() {
        let layout = run(vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 50.into()]),
            Operation::new("Q", vec![]),
            Operation::new("m", vec![0.into(), 0.into()]),
            Operation::new("l", vec![0.into(), 10.into()]),
            Operation::new("S", vec![]),
        ]);

        assert_eq!(layout.segments[0].x0, 0.0);
        assert_eq!(layout.segments[0].y1, 10.0);
    }

    #[test]
    fn draws_form_xobjects_through_their_matrix() {
        let mut document = Document::with_version("1.5");
        let form = add_form(
            &mut document,
            vec![
                Operation::new("m", vec![0.into(), 0.into()]),
                Operation::new("l", vec![50.into(), 0.into()]),
                Operation::new("S", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 8.into()]),
                Operation::new("Td", vec![2.into(), 2.into()]),
                Operation::new("Tj", vec![Object::string_literal("1")]),
                Operation::new("ET", vec![]),
            ],
        );

        let layout = run_in(
            &document,
            scope_with_form(form),
            &[
                Operation::new("q", vec![]),
                Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 0.into()]),
                Operation::new("Do", vec!["Fm1".into()]),
                Operation::new("Q", vec![]),
                Operation::new("m", vec![0.into(), 0.into()]),
                Operation::new("l", vec![0.into(), 10.into()]),
                Operation::new("S", vec![]),
            ],
        );

        assert_eq!(
            layout.segments[0],
            Segment {
                x0: 110.0,
                y0: 200.0,
                x1: 160.0,
                y1: 200.0
            }
        );
        assert_eq!(layout.segments[1].x0, 0.0);
        assert_eq!(layout.fragments.len(), 1);
        assert_eq!((layout.fragments[0].x, layout.fragments[0].y), (112.0, 202.0));
    }

    #[test]
    fn self_referencing_form_stops_at_depth_limit() {
        let mut document = Document::with_version("1.5");
        let form = add_form(
            &mut document,
            vec![
                Operation::new("m", vec![0.into(), 0.into()]),
                Operation::new("l", vec![50.into(), 0.into()]),
                Operation::new("S", vec![]),
                Operation::new("Do", vec!["Fm1".into()]),
            ],
        );

        let layout = run_in(
            &document,
            scope_with_form(form),
            &[Operation::new("Do", vec!["Fm1".into()])],
        );
        assert_eq!(layout.segments.len(), super::MAX_FORM_DEPTH);
    }

    #[test]
    fn unknown_xobject_names_are_ignored() {
        let layout = run(vec![Operation::new("Do", vec!["Im0".into()])]);
        assert!(layout.segments.is_empty());
        assert!(layout.fragments.is_empty());
    }
}
