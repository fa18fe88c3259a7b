use super::data_url;
use crate::{
    common::{
        ProductData,
        utils::{color_hex, parse_hex_color},
    },
    server::cascade::{GeneratedImage, GenerationRequest, ImageProducer, ProducerError},
};
use ab_glyph::{FontVec, PxScale};
use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use std::{
    io::{Cursor, ErrorKind},
    path::PathBuf,
};

const CANVAS: u32 = 1024;
const SHADOW: Rgba<u8> = Rgba([224, 224, 224, 255]);
const OUTLINE: Rgba<u8> = Rgba([51, 51, 51, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// DejaVu Sans Bold, used when no font exists at the configured path.
const BUNDLED_FONT: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans-Bold.ttf");

/// Draws a flat package mockup locally with the product name and tagline.
pub struct BitmapFallback {
    font_path: PathBuf,
}

impl BitmapFallback {
    pub const fn new(font_path: PathBuf) -> Self {
        Self { font_path }
    }

    async fn load_font(&self) -> Result<FontVec, ProducerError> {
        let data = match tokio::fs::read(&self.font_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No font at {}, using the bundled face", self.font_path.display());
                BUNDLED_FONT.to_vec()
            }
            Err(e) => {
                return Err(ProducerError::Render(format!(
                    "font {} unavailable: {e}",
                    self.font_path.display()
                )));
            }
        };
        FontVec::try_from_vec(data).map_err(|e| ProducerError::Render(format!("invalid font: {e}")))
    }
}

#[async_trait]
impl ImageProducer for BitmapFallback {
    fn name(&self) -> &'static str {
        "bitmap-fallback"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let font = self.load_font().await?;

        let product = request.product.clone();
        let png = tokio::task::spawn_blocking(move || render_png(&product, &font))
            .await
            .map_err(|e| ProducerError::Render(e.to_string()))??;

        Ok(GeneratedImage {
            image_url: data_url("image/png", &png),
            generator: "Bitmap Fallback".to_string(),
            cost: "FREE".to_string(),
            prompt_used: None,
            confidence: 0.85,
            advice: None,
        })
    }
}

fn render_png(product: &ProductData, font: &FontVec) -> Result<Vec<u8>, ProducerError> {
    let main_color = parse_hex_color(&color_hex(product.primary_color(), "#2E7D32"))
        .unwrap_or(Rgba([46, 125, 50, 255]));

    // Light vertical gradient from near-white to pale grey.
    let mut canvas = RgbaImage::from_fn(CANVAS, CANVAS, |_, y| {
        let shade = 250 - (y * 20 / CANVAS) as u8;
        Rgba([shade, shade, shade.saturating_add(2), 255])
    });
    draw_filled_rect_mut(&mut canvas, Rect::at(210, 210).of_size(600, 600), SHADOW);
    draw_filled_rect_mut(&mut canvas, Rect::at(200, 200).of_size(600, 600), main_color);
    for inset in 0..6 {
        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(200 + inset, 200 + inset).of_size(600 - 2 * inset as u32, 600 - 2 * inset as u32),
            OUTLINE,
        );
    }
    draw_filled_rect_mut(&mut canvas, Rect::at(220, 220).of_size(560, 100), WHITE);
    draw_filled_rect_mut(&mut canvas, Rect::at(220, 680).of_size(560, 100), WHITE);

    draw_centered(&mut canvas, font, 54.0, 380, &product.product_name, true);
    draw_centered(&mut canvas, font, 36.0, 480, product.tagline_or_default(), true);
    draw_centered(&mut canvas, font, 24.0, 580, "AI Generated Design", false);

    let mut png = Vec::new();
    canvas
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ProducerError::Render(e.to_string()))?;
    Ok(png)
}

/// Centres `text` inside the package face, optionally with a dark outline.
fn draw_centered(canvas: &mut RgbaImage, font: &FontVec, size: f32, y: i32, text: &str, outlined: bool) {
    let scale = PxScale::from(size);
    let (width, _) = text_size(scale, font, text);
    let x = 500 - i32::try_from(width / 2).unwrap_or(0);
    if outlined {
        for (dx, dy) in [(-2, -2), (-2, 2), (2, -2), (2, 2)] {
            draw_text_mut(canvas, BLACK, x + dx, y + dy, scale, font, text);
        }
    }
    draw_text_mut(canvas, WHITE, x, y, scale, font, text);
}
