use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;

use crate::errors::ServiceError;

/// Pixels per module in rendered PNGs
const MODULE_PX: u32 = 10;
/// Quiet zone around the symbol, in modules
const QUIET_ZONE: u32 = 4;

/// Square module grid of a QR symbol, row-major, `true` for dark
#[derive(Debug, Clone)]
pub struct QrMatrix {
    pub width: usize,
    pub modules: Vec<bool>,
}

impl QrMatrix {
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[y * self.width + x]
    }
}

pub fn matrix(payload: &str) -> Result<QrMatrix, ServiceError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| ServiceError::RenderError(format!("QR encoding failed: {e}")))?;

    Ok(QrMatrix {
        width: code.width(),
        modules: code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect(),
    })
}

pub fn render_png(payload: &str) -> Result<Vec<u8>, ServiceError> {
    let matrix = matrix(payload)?;
    let side = (matrix.width as u32 + 2 * QUIET_ZONE) * MODULE_PX;
    let mut img = GrayImage::from_pixel(side, side, Luma([255u8]));

    for y in 0..matrix.width {
        for x in 0..matrix.width {
            if !matrix.is_dark(x, y) {
                continue;
            }
            let px = (x as u32 + QUIET_ZONE) * MODULE_PX;
            let py = (y as u32 + QUIET_ZONE) * MODULE_PX;
            for dy in 0..MODULE_PX {
                for dx in 0..MODULE_PX {
                    img.put_pixel(px + dx, py + dy, Luma([0u8]));
                }
            }
        }
    }

    encode_png(DynamicImage::ImageLuma8(img))
}

pub(crate) fn encode_png(img: DynamicImage) -> Result<Vec<u8>, ServiceError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ServiceError::RenderError(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_png_with_quiet_zone() {
        let bytes = render_png("LAP0001|Lenovo|ThinkPad T14").unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.width(), img.height());
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        let edge = QUIET_ZONE * MODULE_PX;
        assert_eq!(img.get_pixel(edge, edge), &Luma([0u8]));
    }

    #[test]
    fn matrix_is_square() {
        let m = matrix("QR-LAP0001").unwrap();
        assert_eq!(m.modules.len(), m.width * m.width);
        assert!(m.is_dark(0, 0));
    }
}
