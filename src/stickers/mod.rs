//! Rendering of sticker artifacts: QR and barcode PNGs, PDF labels.

pub mod barcode;
pub mod label;
pub mod qr;

use crate::{entities::StickerKind, errors::ServiceError};

pub use label::LabelContent;

/// Renders the artifact of a sticker of `kind`
pub fn render(kind: StickerKind, payload: &str, label: &LabelContent) -> Result<Vec<u8>, ServiceError> {
    match kind {
        StickerKind::Qr => qr::render_png(payload),
        StickerKind::Barcode => barcode::render_png(payload),
        StickerKind::SimpleLabel => label::render_simple(label),
        StickerKind::FullLabel => label::render_full(label, payload),
    }
}

/// Payload encoded by a sticker of `kind`.
///
/// QR codes and labels carry `serial|brand|model`; barcodes carry the
/// product barcode, falling back to the serial number.
pub fn payload_for(
    kind: StickerKind,
    serial: &str,
    brand: &str,
    model: &str,
    barcode: Option<&str>,
) -> String {
    match kind {
        StickerKind::Barcode => barcode
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(serial)
            .to_string(),
        StickerKind::Qr | StickerKind::SimpleLabel | StickerKind::FullLabel => {
            format!("{serial}|{brand}|{model}")
        }
    }
}

/// `{QR|BC|LS|LF}-{serial}`
pub fn code_for(kind: StickerKind, serial: &str) -> String {
    format!("{}-{}", kind.code_prefix(), serial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_payloads() {
        assert_eq!(code_for(StickerKind::Qr, "LAP0001"), "QR-LAP0001");
        assert_eq!(code_for(StickerKind::FullLabel, "LAP0001"), "LF-LAP0001");

        assert_eq!(
            payload_for(StickerKind::Qr, "LAP0001", "Lenovo", "T14", Some("8400001")),
            "LAP0001|Lenovo|T14"
        );
        assert_eq!(
            payload_for(StickerKind::Barcode, "LAP0001", "Lenovo", "T14", Some("8400001")),
            "8400001"
        );
        assert_eq!(
            payload_for(StickerKind::Barcode, "LAP0001", "Lenovo", "T14", None),
            "LAP0001"
        );
    }
}
