// src/catalog.rs
// Fixed style presets and the placeholder result set shown when generation is unavailable.
use crate::errors::HeadshotError;
use crate::models::{ImageData, NORMALIZED_MEDIA_TYPE, ResultImage};
use crate::services::image_processor::encode_jpeg;
use image::{Rgb, RgbImage};
use serde::Serialize;

pub const DEFAULT_STYLE_ID: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleSpec {
    pub id: u32,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub category: &'static str,
    pub prompt: &'static str,
}

pub static STYLES: &[StyleSpec] = &[
    StyleSpec {
        id: 1,
        title: "Corporate Executive",
        subtitle: "Corporate, navy suit, studio lighting",
        category: "Corporate",
        prompt: "Professional corporate headshot. Tailored navy suit, crisp white shirt, \
                 soft studio key light, neutral grey seamless backdrop, confident expression.",
    },
    StyleSpec {
        id: 2,
        title: "Modern Office",
        subtitle: "Corporate, blazer, blurred open office",
        category: "Corporate",
        prompt: "Business headshot in a bright modern office. Smart blazer, shallow depth of \
                 field with a softly blurred open-plan background, natural window light.",
    },
    StyleSpec {
        id: 3,
        title: "Creative Studio",
        subtitle: "Creative, moody tones, textured backdrop",
        category: "Creative",
        prompt: "Editorial portrait with moody, low-key lighting against a hand-painted \
                 textured backdrop. Rich shadows, subtle rim light, artistic color grade.",
    },
    StyleSpec {
        id: 4,
        title: "Bold Color",
        subtitle: "Creative, vibrant gels, graphic look",
        category: "Creative",
        prompt: "Fashion-style headshot lit with vibrant colored gels, saturated teal and \
                 magenta tones, clean graphic composition, sharp focus on the eyes.",
    },
    StyleSpec {
        id: 5,
        title: "Golden Hour",
        subtitle: "Casual, outdoor, warm sunlight",
        category: "Casual",
        prompt: "Relaxed outdoor portrait at golden hour. Warm backlight through trees, \
                 casual knitwear, gentle smile, creamy bokeh background.",
    },
    StyleSpec {
        id: 6,
        title: "Friendly Everyday",
        subtitle: "Casual, soft daylight, approachable",
        category: "Casual",
        prompt: "Approachable casual headshot in soft diffused daylight. Simple light \
                 background, relaxed posture, natural skin tones.",
    },
];

/// Styles belonging to `category`; `All` lists everything.
pub fn styles_in(category: &str) -> Vec<&'static StyleSpec> {
    let category = category.trim();
    if category.is_empty() || category.eq_ignore_ascii_case("all") {
        return STYLES.iter().collect();
    }

    STYLES
        .iter()
        .filter(|s| {
            s.category.eq_ignore_ascii_case(category)
                || s.title.contains(category)
                || s.subtitle.contains(category)
        })
        .collect()
}

pub fn find_style(id: u32) -> Result<&'static StyleSpec, HeadshotError> {
    STYLES
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| HeadshotError::NotFound(format!("style {}", id)))
}

const PLACEHOLDER_WIDTH: u32 = 320;
const PLACEHOLDER_HEIGHT: u32 = 400;

static PLACEHOLDERS: &[(&str, &str, [u8; 3])] = &[
    ("Studio Lighting, Business", "Corporate", [40, 62, 120]),
    ("Natural Light, Casual", "Casual", [168, 120, 64]),
    ("Office Backdrop, Professional", "Corporate", [72, 88, 96]),
    ("Textured Backdrop, Creative", "Creative", [110, 48, 96]),
];

/// The fixed fallback set. Images are synthesized locally so the fallback
/// never depends on the network.
pub fn placeholder_results() -> Result<Vec<ResultImage>, HeadshotError> {
    PLACEHOLDERS
        .iter()
        .enumerate()
        .map(|(index, (title, category, tint))| -> Result<ResultImage, HeadshotError> {
            let data = encode_jpeg(&placeholder_image(*tint), 90)?;
            Ok(ResultImage {
                id: index as u32 + 1,
                title: title.to_string(),
                category: Some(category.to_string()),
                image: ImageData {
                    media_type: NORMALIZED_MEDIA_TYPE.to_string(),
                    data,
                },
                selected: index == 0,
            })
        })
        .collect()
}

// Vertical gradient from the tint to near-black with a lighter oval where a face would sit.
fn placeholder_image(tint: [u8; 3]) -> RgbImage {
    let (w, h) = (PLACEHOLDER_WIDTH as f32, PLACEHOLDER_HEIGHT as f32);
    RgbImage::from_fn(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, |x, y| {
        let fade = 1.0 - 0.7 * (y as f32 / h);
        let dx = (x as f32 - w / 2.0) / (w * 0.22);
        let dy = (y as f32 - h * 0.4) / (h * 0.24);
        let glow = if dx * dx + dy * dy <= 1.0 { 1.35 } else { 1.0 };
        let channel = |c: u8| (c as f32 * fade * glow).clamp(0.0, 255.0) as u8;
        Rgb([channel(tint[0]), channel(tint[1]), channel(tint[2])])
    })
}
