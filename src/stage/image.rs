//! Raster image encoding.
//!
//! `png`/`jpg`/`jpeg` inputs become `webp` (via `image`) and/or `avif`
//! (via `ravif`). Everything else, including `svg` and existing `webp`,
//! passes through unchanged.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use ravif::{Encoder, Img, RGBA8};

use super::{Asset, Stage, StageContext, TransformError};

const RASTER_EXTS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Debug, Clone)]
pub struct ImageEncode {
    pub webp: bool,
    pub avif: bool,
    /// AVIF quality, 1-100.
    pub quality: f32,
    /// Also emit the untouched raster input.
    pub keep_original: bool,
}

impl Default for ImageEncode {
    fn default() -> Self {
        Self {
            webp: true,
            avif: true,
            quality: 50.0,
            keep_original: false,
        }
    }
}

impl ImageEncode {
    fn encode(&self, asset: &Asset) -> Result<Vec<Asset>, String> {
        let img = image::load_from_memory(&asset.contents).map_err(|e| e.to_string())?;
        let mut out = Vec::with_capacity(2);

        if self.webp {
            out.push(Asset::new(
                asset.path.with_extension("webp"),
                encode_webp(&img)?,
            ));
        }
        if self.avif {
            out.push(Asset::new(
                asset.path.with_extension("avif"),
                encode_avif(&img, self.quality)?,
            ));
        }
        Ok(out)
    }
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut buf = Cursor::new(Vec::new());
    // The webp encoder only accepts 8-bit RGB(A)
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_to(&mut buf, ImageFormat::WebP)
        .map_err(|e| e.to_string())?;
    Ok(buf.into_inner())
}

fn encode_avif(img: &DynamicImage, quality: f32) -> Result<Vec<u8>, String> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<RGBA8> = rgba
        .pixels()
        .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();

    let encoded = Encoder::new()
        .with_quality(quality.clamp(1.0, 100.0))
        .with_speed(6)
        .encode_rgba(Img::new(&pixels[..], width as usize, height as usize))
        .map_err(|e| e.to_string())?;
    Ok(encoded.avif_file)
}

impl Stage for ImageEncode {
    fn name(&self) -> &str {
        "image"
    }

    fn run(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let mut out = Vec::with_capacity(assets.len() * 2);
        for asset in assets {
            if !RASTER_EXTS.contains(&asset.ext().to_ascii_lowercase().as_str()) {
                out.push(asset);
                continue;
            }
            let encoded = self.encode(&asset).map_err(|e| {
                TransformError::new(self.name(), format!("{}: {e}", asset.path.display()))
            })?;
            if self.keep_original {
                out.push(asset);
            }
            out.extend(encoded);
        }
        Ok(out)
    }
}
