//! Product card images.
//!
//! Products either point at a pre-made JPEG asset or get a synthesized
//! 400×400 card: background swatch, white border, product name wrapped at
//! eight characters per line with a drop shadow, and the price in yellow.
//!
//! Text uses a built-in 5×7 bitmap face covering digits and the price
//! symbols. Characters outside the face are drawn as solid glyph tiles so the
//! layout still reflects the name's length and wrapping.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tracing::{debug, instrument, warn};

use crate::catalog::{ImageSource, Product};

/// Canvas edge length in pixels.
pub const CARD_SIZE: u32 = 400;
/// MIME type of every produced image.
pub const JPEG_MIME: &str = "image/jpeg";

const JPEG_QUALITY: u8 = 85;
const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];
const CHARS_PER_LINE: usize = 8;
const LINE_HEIGHT: i64 = 40;
const NAME_SCALE: i64 = 4;
const PRICE_SCALE: i64 = 3;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const PRICE_YELLOW: Rgb<u8> = Rgb([255, 230, 0]);

/// Errors that can occur while producing an image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// JPEG encoding failed.
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Produces JPEG bytes for catalog products.
#[derive(Debug, Clone, Default)]
pub struct ProductImages {
    assets_dir: Option<PathBuf>,
}

impl ProductImages {
    /// Create a producer. `assets_dir` is where [`ImageSource::Asset`] paths
    /// are resolved; without it every product is synthesized.
    #[must_use]
    pub const fn new(assets_dir: Option<PathBuf>) -> Self {
        Self { assets_dir }
    }

    /// Produce a JPEG for `product`.
    ///
    /// # Errors
    ///
    /// Returns an error if the synthesized card cannot be encoded.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn produce(&self, product: &Product) -> Result<Vec<u8>, ImageError> {
        if let ImageSource::Asset { path, .. } = &product.image {
            if let Some(bytes) = self.load_asset(path) {
                debug!(bytes = bytes.len(), "Loaded product image asset");
                return Ok(bytes);
            }
        }

        render_card(product)
    }

    fn load_asset(&self, relative: &Path) -> Option<Vec<u8>> {
        let dir = self.assets_dir.as_ref()?;
        let path = dir.join(relative);

        match std::fs::read(&path) {
            Ok(bytes) if bytes.starts_with(&JPEG_MAGIC) => Some(bytes),
            Ok(_) => {
                warn!(path = %path.display(), "Product asset is not a JPEG, synthesizing instead");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read product asset, synthesizing instead");
                None
            }
        }
    }
}

/// Whether `bytes` begins with the JPEG start-of-image marker.
#[must_use]
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_MAGIC)
}

/// Synthesize the product card and encode it as JPEG.
fn render_card(product: &Product) -> Result<Vec<u8>, ImageError> {
    let mut canvas = RgbImage::from_pixel(CARD_SIZE, CARD_SIZE, Rgb(product.image.background()));
    let size = i64::from(CARD_SIZE);

    draw_border(&mut canvas, 10, size - 10, 3, WHITE);

    let chars: Vec<char> = product.name.chars().collect();
    let lines: Vec<&[char]> = chars.chunks(CHARS_PER_LINE).collect();
    let line_count = i64::try_from(lines.len()).unwrap_or(1);
    let y_start = 160 - (line_count - 1) * (LINE_HEIGHT / 2);

    for (i, line) in (0_i64..).zip(&lines) {
        let width = text_width(line.len(), NAME_SCALE);
        let x = (size - width) / 2;
        let y = y_start + i * LINE_HEIGHT;
        draw_text(&mut canvas, line, x + 2, y + 2, NAME_SCALE, BLACK);
        draw_text(&mut canvas, line, x, y, NAME_SCALE, WHITE);
    }

    let price: Vec<char> = product.price.to_string().chars().collect();
    let width = text_width(price.len(), PRICE_SCALE);
    draw_text(&mut canvas, &price, (size - width) / 2, 320, PRICE_SCALE, PRICE_YELLOW);

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(&canvas)?;
    Ok(bytes)
}

fn text_width(chars: usize, scale: i64) -> i64 {
    let n = i64::try_from(chars).unwrap_or(0);
    if n == 0 {
        return 0;
    }
    n * GLYPH_ADVANCE * scale - scale
}

fn draw_text(canvas: &mut RgbImage, text: &[char], x: i64, y: i64, scale: i64, color: Rgb<u8>) {
    for (i, &ch) in (0_i64..).zip(text) {
        let gx = x + i * GLYPH_ADVANCE * scale;
        match glyph(ch) {
            Some(rows) => {
                for (row, bits) in (0_i64..).zip(rows) {
                    for col in 0..GLYPH_WIDTH {
                        if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                            fill_rect(canvas, gx + col * scale, y + row * scale, scale, scale, color);
                        }
                    }
                }
            }
            None if ch.is_whitespace() => {}
            None => fill_rect(
                canvas,
                gx,
                y + scale,
                GLYPH_WIDTH * scale,
                (GLYPH_HEIGHT - 1) * scale,
                color,
            ),
        }
    }
}

fn draw_border(canvas: &mut RgbImage, from: i64, to: i64, width: i64, color: Rgb<u8>) {
    let span = to - from + 1;
    fill_rect(canvas, from, from, span, width, color);
    fill_rect(canvas, from, to - width + 1, span, width, color);
    fill_rect(canvas, from, from, width, span, color);
    fill_rect(canvas, to - width + 1, from, width, span, color);
}

/// Fill a rectangle, clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (x0, y0) = (x.clamp(0, cw), y.clamp(0, ch));
    let (x1, y1) = ((x + w).clamp(0, cw), (y + h).clamp(0, ch));

    for py in y0..y1 {
        for px in x0..x1 {
            if let (Ok(px), Ok(py)) = (u32::try_from(px), u32::try_from(py)) {
                canvas.put_pixel(px, py, color);
            }
        }
    }
}

// =============================================================================
// Bitmap face
// =============================================================================

const GLYPH_WIDTH: i64 = 5;
const GLYPH_HEIGHT: i64 = 7;
const GLYPH_ADVANCE: i64 = 6;

/// 5×7 glyph rows, most significant of the low five bits is the leftmost column.
const fn glyph(ch: char) -> Option<[u8; 7]> {
    Some(match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        '$' => [0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_produce_returns_jpeg_for_every_product() {
        let images = ProductImages::default();
        for product in Catalog::demo().products() {
            let bytes = images.produce(product).expect("encode");
            assert!(is_jpeg(&bytes), "{} is not a JPEG", product.id);
            assert!(bytes.len() > 100, "image too small for {}", product.id);
        }
    }

    #[test]
    fn test_card_decodes_at_expected_size() {
        let catalog = Catalog::demo();
        let product = catalog.get_product("P001").expect("P001 exists");
        let bytes = ProductImages::default().produce(product).expect("encode");

        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!(decoded.width(), CARD_SIZE);
        assert_eq!(decoded.height(), CARD_SIZE);
    }

    #[test]
    fn test_missing_asset_falls_back_to_card() {
        let catalog = Catalog::demo();
        let mut product = catalog.get_product("P002").expect("P002 exists").clone();
        product.image = ImageSource::Asset {
            path: PathBuf::from("does-not-exist.jpg"),
            fallback: [10, 20, 30],
        };

        let images = ProductImages::new(Some(std::env::temp_dir()));
        let bytes = images.produce(&product).expect("encode");
        assert!(is_jpeg(&bytes));
    }

    #[test]
    fn test_asset_bytes_are_returned_verbatim() {
        let dir = std::env::temp_dir().join(format!("sc-assets-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let asset = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        std::fs::write(dir.join("p.jpg"), asset).expect("write asset");

        let catalog = Catalog::demo();
        let mut product = catalog.get_product("P003").expect("P003 exists").clone();
        product.image = ImageSource::Asset {
            path: PathBuf::from("p.jpg"),
            fallback: [0, 0, 0],
        };

        let bytes = ProductImages::new(Some(dir.clone()))
            .produce(&product)
            .expect("produce");
        assert_eq!(bytes, asset);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(0, 3), 0);
        assert_eq!(text_width(1, 3), 15);
        assert_eq!(text_width(8, 4), 188);
    }

    #[test]
    fn test_price_glyphs_are_covered() {
        for ch in "NT$ 1,234,567,890".chars() {
            assert!(glyph(ch).is_some(), "missing glyph for {ch:?}");
        }
        assert!(glyph('外').is_none());
    }
}
