use barcoders::sym::code128::Code128;
use image::{DynamicImage, GrayImage, Luma};

use super::qr::encode_png;
use crate::errors::ServiceError;

const BAR_PX: u32 = 2;
const HEIGHT_PX: u32 = 80;
const QUIET_ZONE: u32 = 10;

/// Code 128 modules of `data`, `1` for a bar
pub fn encode(data: &str) -> Result<Vec<u8>, ServiceError> {
    if data.is_empty() || !data.chars().all(|c| (' '..='~').contains(&c)) {
        return Err(ServiceError::RenderError(format!(
            "barcode payload must be printable ASCII: {data:?}"
        )));
    }
    // Character set B covers printable ASCII
    let barcode = Code128::new(format!("\u{0181}{data}"))
        .map_err(|e| ServiceError::RenderError(format!("barcode encoding failed: {e}")))?;
    Ok(barcode.encode())
}

pub fn render_png(data: &str) -> Result<Vec<u8>, ServiceError> {
    let modules = encode(data)?;
    let width = (modules.len() as u32 + 2 * QUIET_ZONE) * BAR_PX;
    let mut img = GrayImage::from_pixel(width, HEIGHT_PX, Luma([255u8]));

    for (i, module) in modules.iter().enumerate() {
        if *module == 0 {
            continue;
        }
        let x0 = (i as u32 + QUIET_ZONE) * BAR_PX;
        for x in x0..x0 + BAR_PX {
            for y in 0..HEIGHT_PX {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    }

    encode_png(DynamicImage::ImageLuma8(img))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_code128() {
        let bytes = render_png("LAP0001").unwrap();
        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.height(), HEIGHT_PX);
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        // start symbol begins with a bar
        assert_eq!(img.get_pixel(QUIET_ZONE * BAR_PX, 10), &Luma([0u8]));
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(encode("ÑANDÚ").is_err());
        assert!(encode("").is_err());
    }
}
