use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Encoding, Error as LopdfError, Object, ObjectId};
use tracing::{debug, trace, warn};

use crate::fonts::{is_bold_font_name, sanitize_font_name};
use crate::logging::PDF_PARSING;

/// Glyph width used when a font carries no `/Widths` entry, in 1/1000 em.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;
const DEFAULT_ASCENT: f32 = 0.8;
const DEFAULT_DESCENT: f32 = -0.2;
/// `/FontDescriptor /Flags` bit 19.
const FORCE_BOLD_FLAG: i64 = 1 << 18;
/// Text render mode 2 (fill then stroke) is how most producers fake bold.
const FILL_STROKE_RENDER_MODE: u8 = 2;
const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

pub fn load_pdf<P: AsRef<Path>>(path: P) -> Result<Document, LopdfError> {
    Document::load(path)
}

/// A single text-showing run (`Tj`, `TJ`, `'` or `"`) placed on a page.
///
/// Coordinates are top-down: `bbox.1` is the top edge, `bbox.3` the bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub font_size: f32,
    pub font_name: Option<String>,
    pub bold: bool,
    /// Baseline position measured from the top of the page.
    pub baseline: f32,
    pub bbox: (f32, f32, f32, f32),
    pub page_number: u32,
}

impl fmt::Display for TextElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" p{} {:?} {}pt{}{}",
            self.text,
            self.page_number,
            self.bbox,
            self.font_size,
            if self.bold { " bold" } else { "" },
            self.font_name
                .as_ref()
                .map(|n| format!(" {}", n))
                .unwrap_or_default()
        )
    }
}

/// What the interpreter needs to know about one font resource.
struct PageFont<'a> {
    base_font: String,
    encoding: Option<Encoding<'a>>,
    first_char: i64,
    widths: Vec<f32>,
    two_byte: bool,
    bold: bool,
    ascent: f32,
    descent: f32,
}

impl<'a> PageFont<'a> {
    fn from_dict(doc: &'a Document, dict: &'a Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|name| sanitize_font_name(&String::from_utf8_lossy(name)).to_string())
            .unwrap_or_default();

        let two_byte = dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|s| s == b"Type0")
            .unwrap_or(false);

        let encoding = match dict.get_font_encoding(doc) {
            Ok(encoding) => Some(encoding),
            Err(e) => {
                warn!(target: PDF_PARSING, font = %base_font, "unsupported font encoding: {}", e);
                None
            }
        };

        let first_char = dict
            .get(b"FirstChar")
            .and_then(Object::as_i64)
            .unwrap_or(0);

        let widths = dict
            .get(b"Widths")
            .and_then(|obj| resolve(doc, obj).as_array())
            .map(|arr| arr.iter().map(number).collect())
            .unwrap_or_default();

        let descriptor = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_dict().ok());

        let (mut bold, mut ascent, mut descent) =
            (is_bold_font_name(&base_font), DEFAULT_ASCENT, DEFAULT_DESCENT);
        if let Some(desc) = descriptor {
            let flags = desc.get(b"Flags").and_then(Object::as_i64).unwrap_or(0);
            let weight = desc.get(b"FontWeight").map(number).unwrap_or(0.0);
            bold |= flags & FORCE_BOLD_FLAG != 0 || weight >= 600.0;
            if let Ok(a) = desc.get(b"Ascent") {
                let a = number(a) / 1000.0;
                if a > 0.0 {
                    ascent = a;
                }
            }
            if let Ok(d) = desc.get(b"Descent") {
                let d = number(d) / 1000.0;
                if d < 0.0 {
                    descent = d;
                }
            }
        }

        PageFont {
            base_font,
            encoding,
            first_char,
            widths,
            two_byte,
            bold,
            ascent,
            descent,
        }
    }

    /// Advance width of a glyph code in 1/1000 em.
    fn glyph_width(&self, code: i64) -> f32 {
        let idx = code - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        DEFAULT_GLYPH_WIDTH
    }
}

#[derive(Clone, Debug)]
struct TextState {
    font: Option<Vec<u8>>,
    font_size: f32,
    character_spacing: f32,  // Tc
    word_spacing: f32,       // Tw
    horizontal_scaling: f32, // Tz as a fraction, 1.0 = 100%
    leading: f32,            // TL
    rise: f32,               // Ts
    render_mode: u8,         // Tr
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font: None,
            font_size: 0.0,
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct GraphicsState {
    ctm: [f32; 6],
    text_state: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: IDENTITY,
            text_state: TextState::default(),
        }
    }
}

/// Interpreter for the text operators of one page's content stream.
struct PageInterpreter<'a> {
    page_number: u32,
    page_height: f32,
    fonts: BTreeMap<Vec<u8>, PageFont<'a>>,
    gs_stack: Vec<GraphicsState>,
    text_matrix: [f32; 6],      // Tm
    text_line_matrix: [f32; 6], // Tlm
    elements: Vec<TextElement>,
}

impl<'a> PageInterpreter<'a> {
    fn gs(&mut self) -> &mut GraphicsState {
        if self.gs_stack.is_empty() {
            self.gs_stack.push(GraphicsState::default());
        }
        let last = self.gs_stack.len() - 1;
        &mut self.gs_stack[last]
    }

    fn ts(&mut self) -> &mut TextState {
        &mut self.gs().text_state
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.text_line_matrix = multiply_matrices(&translate_matrix(tx, ty), &self.text_line_matrix);
        self.text_matrix = self.text_line_matrix;
    }

    fn handle(&mut self, op: &Operation) -> Result<(), LopdfError> {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => {
                let top = self.gs().clone();
                self.gs_stack.push(top);
            }
            "Q" => {
                if self.gs_stack.len() > 1 {
                    self.gs_stack.pop();
                }
            }
            "cm" => {
                let m = matrix_from_operands(operands);
                let gs = self.gs();
                gs.ctm = multiply_matrices(&m, &gs.ctm);
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.text_line_matrix = IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) = (operands.first(), operands.get(1)) {
                    let size = number(size);
                    let ts = self.ts();
                    ts.font = Some(name.clone());
                    ts.font_size = size;
                }
            }
            "Tc" => {
                if let Some(v) = operands.first() {
                    self.ts().character_spacing = number(v);
                }
            }
            "Tw" => {
                if let Some(v) = operands.first() {
                    self.ts().word_spacing = number(v);
                }
            }
            "Tz" => {
                if let Some(v) = operands.first() {
                    self.ts().horizontal_scaling = number(v) / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = operands.first() {
                    self.ts().leading = number(v);
                }
            }
            "Ts" => {
                if let Some(v) = operands.first() {
                    self.ts().rise = number(v);
                }
            }
            "Tr" => {
                if let Some(v) = operands.first() {
                    self.ts().render_mode = number(v).max(0.0) as u8;
                }
            }
            "Tm" => {
                self.text_matrix = matrix_from_operands(operands);
                self.text_line_matrix = self.text_matrix;
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (operands.first(), operands.get(1)) {
                    self.next_line(number(tx), number(ty));
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (operands.first(), operands.get(1)) {
                    let ty = number(ty);
                    self.ts().leading = -ty;
                    self.next_line(number(tx), ty);
                }
            }
            "T*" => {
                let leading = self.ts().leading;
                self.next_line(0.0, -leading);
            }
            "Tj" | "TJ" => self.show(operands)?,
            "'" => {
                let leading = self.ts().leading;
                self.next_line(0.0, -leading);
                self.show(operands)?;
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (operands.first(), operands.get(1)) {
                    let ts = self.ts();
                    ts.word_spacing = number(aw);
                    ts.character_spacing = number(ac);
                }
                let leading = self.ts().leading;
                self.next_line(0.0, -leading);
                self.show(operands.get(2..).unwrap_or(&[]))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Lays out one text-showing operation and records it as a [`TextElement`].
    fn show(&mut self, operands: &[Object]) -> Result<(), LopdfError> {
        let gs = self.gs().clone();
        let ts = &gs.text_state;
        let Some(font) = ts.font.as_ref().and_then(|name| self.fonts.get(name)) else {
            trace!(target: PDF_PARSING, page = self.page_number, "text shown without a usable font");
            return Ok(());
        };
        let Some(encoding) = font.encoding.as_ref() else {
            return Ok(());
        };

        let start = multiply_matrices(&self.text_matrix, &gs.ctm);
        let mut text = String::new();
        let mut advance = 0.0f32;

        let mut runs: Vec<&Object> = Vec::new();
        for operand in operands {
            match operand {
                Object::Array(items) => runs.extend(items.iter()),
                other => runs.push(other),
            }
        }

        for run in runs {
            match run {
                Object::String(bytes, _) => {
                    text.push_str(&Document::decode_text(encoding, bytes)?);
                    if font.two_byte {
                        for pair in bytes.chunks(2) {
                            let code = pair.iter().fold(0i64, |acc, b| (acc << 8) | *b as i64);
                            advance += (font.glyph_width(code) / 1000.0) * ts.font_size
                                + ts.character_spacing;
                        }
                    } else {
                        for b in bytes {
                            let mut w = (font.glyph_width(*b as i64) / 1000.0) * ts.font_size
                                + ts.character_spacing;
                            if *b == b' ' {
                                w += ts.word_spacing;
                            }
                            advance += w;
                        }
                    }
                }
                Object::Integer(_) | Object::Real(_) => {
                    let shift = -number(run) / 1000.0 * ts.font_size;
                    advance += shift;
                    // Large negative kerning is how many producers encode a word gap.
                    if shift > ts.font_size * 0.2 && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }

        let advance = advance * ts.horizontal_scaling;
        self.text_matrix = multiply_matrices(&translate_matrix(advance, 0.0), &self.text_matrix);

        if text.trim().is_empty() {
            return Ok(());
        }

        // Effective size is the nominal size scaled by the vertical axis of Tm x CTM.
        let scale_y = (start[2] * start[2] + start[3] * start[3]).sqrt();
        let scale_x = (start[0] * start[0] + start[1] * start[1]).sqrt();
        let font_size = (ts.font_size * scale_y).abs();
        if font_size <= 0.0 {
            return Ok(());
        }

        let (x0, baseline_up) = transform_point(&start, 0.0, ts.rise);
        let x1 = x0 + advance * scale_x;
        let top = baseline_up + font.ascent * font_size;
        let bottom = baseline_up + font.descent * font_size;

        let element = TextElement {
            text,
            font_size,
            font_name: Some(font.base_font.clone()).filter(|n| !n.is_empty()),
            bold: font.bold || ts.render_mode == FILL_STROKE_RENDER_MODE,
            baseline: self.page_height - baseline_up,
            bbox: (
                x0.min(x1),
                self.page_height - top,
                x0.max(x1),
                self.page_height - bottom,
            ),
            page_number: self.page_number,
        };
        trace!(target: PDF_PARSING, "{}", element);
        self.elements.push(element);
        Ok(())
    }
}

/// Extracts positioned text runs for every page, keyed by 1-based page number.
pub fn get_pdf_text(doc: &Document) -> Result<BTreeMap<u32, Vec<TextElement>>, LopdfError> {
    let mut pages_map = BTreeMap::new();
    for (page_num, page_id) in doc.get_pages() {
        let elements = get_page_text_elements(doc, page_num, page_id)?;
        debug!(
            target: PDF_PARSING,
            page = page_num,
            elements = elements.len(),
            "extracted page text"
        );
        pages_map.insert(page_num, elements);
    }
    Ok(pages_map)
}

fn get_page_text_elements(
    doc: &Document,
    page_number: u32,
    page_id: ObjectId,
) -> Result<Vec<TextElement>, LopdfError> {
    let content = doc.get_and_decode_page_content(page_id)?;
    let page_height = media_box(doc, page_id)
        .map(|mb| (mb[3] - mb[1]).abs())
        .unwrap_or(792.0);

    let fonts = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, dict)| (name, PageFont::from_dict(doc, dict)))
        .collect();

    let mut interpreter = PageInterpreter {
        page_number,
        page_height,
        fonts,
        gs_stack: vec![GraphicsState::default()],
        text_matrix: IDENTITY,
        text_line_matrix: IDENTITY,
        elements: Vec::new(),
    };

    for op in &content.operations {
        interpreter.handle(op)?;
    }
    Ok(interpreter.elements)
}

/// MediaBox of a page, following `/Parent` links for inherited values.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = doc.get_dictionary(page_id).ok();
    while let Some(dict) = current {
        if let Ok(obj) = dict.get(b"MediaBox") {
            let arr = resolve(doc, obj).as_array().ok()?;
            let mut mb = [0.0; 4];
            for (i, v) in arr.iter().take(4).enumerate() {
                mb[i] = number(v);
            }
            return Some(mb);
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

fn matrix_from_operands(operands: &[Object]) -> [f32; 6] {
    operands
        .iter()
        .map(number)
        .collect::<Vec<f32>>()
        .try_into()
        .unwrap_or(IDENTITY)
}

fn transform_point(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

pub fn multiply_matrices(a: &[f32; 6], b: &[f32; 6]) -> [f32; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

pub fn translate_matrix(x: f32, y: f32) -> [f32; 6] {
    [1.0, 0.0, 0.0, 1.0, x, y]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_composes_with_scale() {
        let scale = [12.0, 0.0, 0.0, 12.0, 0.0, 0.0];
        let m = multiply_matrices(&translate_matrix(2.0, 3.0), &scale);
        assert_eq!(m, [12.0, 0.0, 0.0, 12.0, 24.0, 36.0]);
    }

    #[test]
    fn malformed_matrix_falls_back_to_identity() {
        let operands = vec![Object::Integer(1), Object::Integer(0)];
        assert_eq!(matrix_from_operands(&operands), IDENTITY);
    }

    #[test]
    fn number_reads_integers_and_reals() {
        assert_eq!(number(&Object::Integer(7)), 7.0);
        assert_eq!(number(&Object::Real(1.5)), 1.5);
        assert_eq!(number(&Object::Null), 0.0);
    }
}
