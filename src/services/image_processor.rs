// src/services/image_processor.rs
//! Client-style photo normalization: rotate, center-crop to an aspect mode,
//! cap the resolution, filter, and re-encode as JPEG.
//!
//! Rotation is restricted to quarter turns and applied about the image center,
//! so it is performed as an exact pixel transposition. Combined with a centered
//! crop this produces the same framing as drawing the source onto a canvas whose
//! coordinate space was translated to the center, rotated, and scaled.

use crate::errors::HeadshotError;
use crate::models::{AspectMode, FilterOp, FilterSpec, NormalizedImage, TransformParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use log::debug;

pub const DEFAULT_MAX_DIM: u32 = 1200;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Geometry derived from source dimensions and transform parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropPlan {
    /// Clockwise quarter turns after normalizing the rotation into [0, 360).
    pub quarter_turns: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    /// Uniform downscale factor, never above 1.
    pub scale: f64,
}

/// Computes the crop and output geometry for a `width` x `height` source.
pub fn plan_transform(
    width: u32,
    height: u32,
    params: &TransformParams,
    max_dim: u32,
) -> Result<CropPlan, HeadshotError> {
    if params.rotation % 90 != 0 {
        return Err(HeadshotError::InvalidParams(format!(
            "rotation must be a multiple of 90 degrees, got {}",
            params.rotation
        )));
    }
    if width == 0 || height == 0 {
        return Err(HeadshotError::Decode("image has zero size".to_string()));
    }
    if max_dim == 0 {
        return Err(HeadshotError::InvalidParams(
            "maximum dimension must be positive".to_string(),
        ));
    }

    let quarter_turns = (params.rotation.rem_euclid(360) / 90) as u32;
    let (eff_w, eff_h) = if quarter_turns % 2 == 1 {
        (height as f64, width as f64)
    } else {
        (width as f64, height as f64)
    };

    let (target_w, target_h) = match params.aspect {
        AspectMode::Original => (eff_w, eff_h),
        AspectMode::Square => {
            let side = eff_w.min(eff_h);
            (side, side)
        }
        AspectMode::Portrait4x5 => {
            // Wider than 4:5 keeps the full height, otherwise the full width.
            if eff_w * 5.0 > eff_h * 4.0 {
                (eff_h * 4.0 / 5.0, eff_h)
            } else {
                (eff_w, eff_w * 5.0 / 4.0)
            }
        }
    };

    let longest = target_w.max(target_h);
    let limit = max_dim as f64;
    let (scale, output_w, output_h) = if longest > limit {
        (
            limit / longest,
            (target_w * limit / longest).floor(),
            (target_h * limit / longest).floor(),
        )
    } else {
        (1.0, target_w.floor(), target_h.floor())
    };

    let clamp_px = |v: f64, bound: f64| v.floor().clamp(1.0, bound.max(1.0)) as u32;
    Ok(CropPlan {
        quarter_turns,
        crop_width: clamp_px(target_w, eff_w),
        crop_height: clamp_px(target_h, eff_h),
        output_width: clamp_px(output_w, limit),
        output_height: clamp_px(output_h, limit),
        scale,
    })
}

pub struct ImageProcessor {
    max_dim: u32,
    jpeg_quality: u8,
    max_upload_bytes: usize,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIM, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl ImageProcessor {
    pub fn new(max_dim: u32, jpeg_quality: u8, max_upload_bytes: usize) -> Self {
        Self {
            max_dim,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_upload_bytes,
        }
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), HeadshotError> {
        if data.is_empty() {
            return Err(HeadshotError::Validation("Empty upload".to_string()));
        }
        if data.len() > self.max_upload_bytes {
            return Err(HeadshotError::Validation(format!(
                "Upload of {} bytes exceeds the {} byte limit",
                data.len(),
                self.max_upload_bytes
            )));
        }

        let img = image::load_from_memory(data)
            .map_err(|e| HeadshotError::Decode(format!("Invalid image format: {}", e)))?;

        Ok(img.dimensions())
    }

    /// Runs the full pipeline over encoded `source` bytes. Inputs are not modified.
    pub fn normalize(
        &self,
        source: &[u8],
        params: &TransformParams,
    ) -> Result<NormalizedImage, HeadshotError> {
        let img = image::load_from_memory(source)
            .map_err(|e| HeadshotError::Decode(format!("Failed to load image: {}", e)))?;
        let (width, height) = img.dimensions();
        let plan = plan_transform(width, height, params, self.max_dim)?;

        debug!(
            "normalize {}x{} rotation={} aspect={:?} -> {}x{} (scale {:.3})",
            width,
            height,
            params.rotation,
            params.aspect,
            plan.output_width,
            plan.output_height,
            plan.scale
        );

        let flat = flatten_on_black(&img);
        let rotated = match plan.quarter_turns {
            1 => imageops::rotate90(&flat),
            2 => imageops::rotate180(&flat),
            3 => imageops::rotate270(&flat),
            _ => flat,
        };

        let x = (rotated.width() - plan.crop_width) / 2;
        let y = (rotated.height() - plan.crop_height) / 2;
        let cropped = imageops::crop_imm(&rotated, x, y, plan.crop_width, plan.crop_height).to_image();

        let mut canvas = if (plan.crop_width, plan.crop_height)
            == (plan.output_width, plan.output_height)
        {
            cropped
        } else {
            imageops::resize(
                &cropped,
                plan.output_width,
                plan.output_height,
                FilterType::Lanczos3,
            )
        };

        apply_filter(&mut canvas, &params.filter);

        let data = encode_jpeg(&canvas, self.jpeg_quality)?;
        Ok(NormalizedImage {
            data,
            width: canvas.width(),
            height: canvas.height(),
        })
    }
}

/// Composites the image over opaque black, dropping alpha.
fn flatten_on_black(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let over = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        Rgb([over(r), over(g), over(b)])
    })
}

/// Applies the filter chain in place using the CSS Filter Effects color matrices.
pub fn apply_filter(img: &mut RgbImage, filter: &FilterSpec) {
    if filter.is_none() {
        return;
    }

    for pixel in img.pixels_mut() {
        let mut rgb = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
        for op in &filter.ops {
            rgb = apply_op(*op, rgb);
        }
        *pixel = Rgb(rgb.map(|c| c.round().clamp(0.0, 255.0) as u8));
    }
}

fn apply_op(op: FilterOp, [r, g, b]: [f32; 3]) -> [f32; 3] {
    let out = match op {
        FilterOp::Grayscale(amount) => {
            let k = 1.0 - amount;
            [
                (0.2126 + 0.7874 * k) * r + (0.7152 - 0.7152 * k) * g + (0.0722 - 0.0722 * k) * b,
                (0.2126 - 0.2126 * k) * r + (0.7152 + 0.2848 * k) * g + (0.0722 - 0.0722 * k) * b,
                (0.2126 - 0.2126 * k) * r + (0.7152 - 0.7152 * k) * g + (0.0722 + 0.9278 * k) * b,
            ]
        }
        FilterOp::Sepia(amount) => {
            let k = 1.0 - amount;
            [
                (0.393 + 0.607 * k) * r + (0.769 - 0.769 * k) * g + (0.189 - 0.189 * k) * b,
                (0.349 - 0.349 * k) * r + (0.686 + 0.314 * k) * g + (0.168 - 0.168 * k) * b,
                (0.272 - 0.272 * k) * r + (0.534 - 0.534 * k) * g + (0.131 + 0.869 * k) * b,
            ]
        }
        FilterOp::Contrast(amount) => {
            let c = |v: f32| (v - 127.5) * amount + 127.5;
            [c(r), c(g), c(b)]
        }
    };
    out.map(|c| c.clamp(0.0, 255.0))
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, HeadshotError> {
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .encode_image(img)
        .map_err(|e| HeadshotError::Encode(format!("Failed to encode JPEG: {}", e)))?;
    Ok(output)
}
