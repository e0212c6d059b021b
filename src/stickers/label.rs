use printpdf::{BuiltinFont, Color, Mm, PdfDocument, Rect, Rgb};

use super::qr;
use crate::{errors::ServiceError, reports::pdf::pdf_safe};

/// Text printed on a product label
#[derive(Debug, Clone, Default)]
pub struct LabelContent {
    pub code: String,
    pub serial: String,
    pub internal_code: String,
    pub brand: String,
    pub model: String,
    pub category: String,
    pub location: Option<String>,
}

fn pdf_err(e: printpdf::Error) -> ServiceError {
    ServiceError::RenderError(format!("label rendering failed: {e}"))
}

/// 70 x 35 mm label with text only
pub fn render_simple(content: &LabelContent) -> Result<Vec<u8>, ServiceError> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Label {}", content.code),
        Mm(70.0),
        Mm(35.0),
        "Label",
    );
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let layer = doc.get_page(page).get_layer(layer);

    layer.use_text(pdf_safe(&content.serial), 14.0, Mm(4.0), Mm(26.0), &bold);
    layer.use_text(
        pdf_safe(&format!("{} {}", content.brand, content.model)),
        9.0,
        Mm(4.0),
        Mm(19.0),
        &regular,
    );
    layer.use_text(pdf_safe(&content.internal_code), 9.0, Mm(4.0), Mm(13.0), &regular);
    layer.use_text(pdf_safe(&content.code), 7.0, Mm(4.0), Mm(5.0), &regular);

    doc.save_to_bytes().map_err(pdf_err)
}

/// 100 x 50 mm label with the QR symbol of `payload` on the left
pub fn render_full(content: &LabelContent, payload: &str) -> Result<Vec<u8>, ServiceError> {
    let matrix = qr::matrix(payload)?;
    let (doc, page, layer) = PdfDocument::new(
        format!("Label {}", content.code),
        Mm(100.0),
        Mm(50.0),
        "Label",
    );
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let layer = doc.get_page(page).get_layer(layer);

    // symbol area: 42 mm square at (4, 4), one module of quiet zone
    let side = 42.0_f32;
    let module = side / (matrix.width as f32 + 2.0);
    let (left, top) = (4.0 + module, 4.0 + side - module);
    layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    for y in 0..matrix.width {
        for x in 0..matrix.width {
            if matrix.is_dark(x, y) {
                let x0 = left + x as f32 * module;
                let y1 = top - y as f32 * module;
                layer.add_rect(Rect::new(Mm(x0), Mm(y1 - module), Mm(x0 + module), Mm(y1)));
            }
        }
    }

    let text_x = Mm(50.0);
    layer.use_text(pdf_safe(&content.serial), 13.0, text_x, Mm(40.0), &bold);
    layer.use_text(pdf_safe(&content.brand), 9.0, text_x, Mm(33.0), &regular);
    layer.use_text(pdf_safe(&content.model), 9.0, text_x, Mm(28.0), &regular);
    layer.use_text(pdf_safe(&content.category), 8.0, text_x, Mm(22.0), &regular);
    layer.use_text(pdf_safe(&content.internal_code), 8.0, text_x, Mm(17.0), &regular);
    if let Some(location) = &content.location {
        layer.use_text(pdf_safe(location), 7.0, text_x, Mm(12.0), &regular);
    }
    layer.use_text(pdf_safe(&content.code), 7.0, text_x, Mm(5.0), &regular);

    doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> LabelContent {
        LabelContent {
            code: "LF-LAP0001".into(),
            serial: "LAP0001".into(),
            internal_code: "COM-000042".into(),
            brand: "Lenovo".into(),
            model: "ThinkPad T14".into(),
            category: "Computing".into(),
            location: Some("HQ, room B12".into()),
        }
    }

    #[test]
    fn labels_are_pdf_documents() {
        let simple = render_simple(&content()).unwrap();
        assert!(simple.starts_with(b"%PDF"));

        let full = render_full(&content(), "LAP0001|Lenovo|ThinkPad T14").unwrap();
        assert!(full.starts_with(b"%PDF"));
        assert!(full.len() > simple.len());
    }
}
