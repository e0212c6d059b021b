use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Rect,
};

use super::{ReportTable, NO_RECORDS};
use crate::errors::ServiceError;

// A4 landscape for tables, portrait for receipts
const TABLE_PAGE: (f32, f32) = (297.0, 210.0);
const RECEIPT_PAGE: (f32, f32) = (210.0, 297.0);
const MARGIN: f32 = 10.0;
const ROW_HEIGHT: f32 = 6.0;
const BODY_SIZE: f32 = 8.0;
/// Rough advance of one Helvetica character at 8 pt, in mm
const CHAR_WIDTH: f32 = 1.6;

fn pdf_err(e: printpdf::Error) -> ServiceError {
    ServiceError::RenderError(format!("PDF rendering failed: {e}"))
}

/// Text restricted to what the built-in fonts can show.
/// Common accented letters lose their accent; anything else becomes `?`.
pub fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            '\t' | '\n' | '\r' => ' ',
            _ => '?',
        })
        .collect()
}

fn fit(text: &str, width_mm: f32) -> String {
    let max = ((width_mm / CHAR_WIDTH) as usize).max(3);
    let text = pdf_safe(text);
    if text.chars().count() <= max {
        text
    } else {
        let mut cut: String = text.chars().take(max - 2).collect();
        cut.push_str("..");
        cut
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self, ServiceError> {
        Ok(Self {
            regular: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
            bold: doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(pdf_err)?,
        })
    }
}

fn rule(layer: &PdfLayerReference, y: f32, width: f32) {
    layer.add_rect(Rect::new(Mm(MARGIN), Mm(y), Mm(MARGIN + width), Mm(y + 0.3)));
}

/// Table report over as many landscape pages as needed
pub fn render_table(table: &ReportTable) -> Result<Vec<u8>, ServiceError> {
    let (page_w, page_h) = TABLE_PAGE;
    let (doc, page, layer) = PdfDocument::new(&table.title, Mm(page_w), Mm(page_h), "Layer 1");
    let fonts = Fonts::load(&doc)?;

    let usable = page_w - 2.0 * MARGIN;
    let col_width = usable / table.columns.len().max(1) as f32;
    let x_of = |i: usize| Mm(MARGIN + i as f32 * col_width);

    let header = |layer: &PdfLayerReference, mut y: f32, first: bool| -> f32 {
        if first {
            layer.use_text(pdf_safe(&table.title), 16.0, Mm(MARGIN), Mm(y), &fonts.bold);
            y -= 7.0;
            if let Some(subtitle) = &table.subtitle {
                layer.use_text(pdf_safe(subtitle), 9.0, Mm(MARGIN), Mm(y), &fonts.regular);
                y -= 6.0;
            }
            y -= 2.0;
        }
        for (i, column) in table.columns.iter().enumerate() {
            layer.use_text(fit(column, col_width), BODY_SIZE, x_of(i), Mm(y), &fonts.bold);
        }
        rule(layer, y - 1.5, usable);
        y - ROW_HEIGHT
    };

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut y = header(&layer, page_h - MARGIN - 5.0, true);

    if table.rows.is_empty() {
        layer.use_text(NO_RECORDS, 10.0, Mm(MARGIN), Mm(y - 2.0), &fonts.regular);
    }

    for row in &table.rows {
        if y < MARGIN + ROW_HEIGHT {
            let (next_page, next_layer) = doc.add_page(Mm(page_w), Mm(page_h), "Layer 1");
            layer = doc.get_page(next_page).get_layer(next_layer);
            y = header(&layer, page_h - MARGIN - 5.0, false);
        }
        for (i, cell) in row.iter().enumerate() {
            layer.use_text(
                fit(&cell.display(), col_width),
                BODY_SIZE,
                x_of(i),
                Mm(y),
                &fonts.regular,
            );
        }
        y -= ROW_HEIGHT;
    }

    if !table.rows.is_empty() {
        rule(&layer, y + ROW_HEIGHT - 2.0, usable);
        layer.use_text(
            format!("Total: {} record(s)", table.rows.len()),
            9.0,
            Mm(MARGIN),
            Mm(y - 2.0),
            &fonts.bold,
        );
    }

    doc.save_to_bytes().map_err(pdf_err)
}

/// Titled group of label/value lines
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub heading: String,
    pub lines: Vec<(String, String)>,
}

impl Section {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, label: &str, value: impl Into<String>) -> Self {
        self.lines.push((label.to_string(), value.into()));
        self
    }
}

/// One-page portrait document: title, sections and signature boxes
pub fn render_sections(
    title: &str,
    subtitle: Option<&str>,
    sections: &[Section],
    signatures: &[&str],
) -> Result<Vec<u8>, ServiceError> {
    let (page_w, page_h) = RECEIPT_PAGE;
    let (doc, page, layer) = PdfDocument::new(title, Mm(page_w), Mm(page_h), "Layer 1");
    let fonts = Fonts::load(&doc)?;
    let layer = doc.get_page(page).get_layer(layer);
    let usable = page_w - 2.0 * MARGIN;

    let mut y = page_h - 20.0;
    layer.use_text(pdf_safe(title), 18.0, Mm(MARGIN), Mm(y), &fonts.bold);
    y -= 8.0;
    if let Some(subtitle) = subtitle {
        layer.use_text(pdf_safe(subtitle), 9.0, Mm(MARGIN), Mm(y), &fonts.regular);
        y -= 6.0;
    }
    rule(&layer, y, usable);
    y -= 10.0;

    for section in sections {
        layer.use_text(pdf_safe(&section.heading), 12.0, Mm(MARGIN), Mm(y), &fonts.bold);
        y -= 7.0;
        for (label, value) in &section.lines {
            layer.use_text(pdf_safe(label), 10.0, Mm(MARGIN + 2.0), Mm(y), &fonts.bold);
            layer.use_text(fit(value, usable - 52.0), 10.0, Mm(MARGIN + 50.0), Mm(y), &fonts.regular);
            y -= 6.0;
        }
        y -= 4.0;
    }

    if !signatures.is_empty() {
        let box_width = usable / signatures.len() as f32;
        let sign_y = (y - 20.0).max(MARGIN + 15.0);
        for (i, who) in signatures.iter().enumerate() {
            let x = MARGIN + i as f32 * box_width;
            layer.add_rect(Rect::new(
                Mm(x + 5.0),
                Mm(sign_y),
                Mm(x + box_width - 5.0),
                Mm(sign_y + 0.3),
            ));
            layer.use_text(pdf_safe(who), 9.0, Mm(x + 5.0), Mm(sign_y - 5.0), &fonts.regular);
        }
    }

    doc.save_to_bytes().map_err(pdf_err)
}
