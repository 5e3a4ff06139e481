// src/models.rs
use crate::errors::HeadshotError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Media type of every image the transform pipeline produces.
pub const NORMALIZED_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectMode {
    Original,
    Square,
    Portrait4x5,
}

impl FromStr for AspectMode {
    type Err = HeadshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Original" | "original" => Ok(AspectMode::Original),
            "1:1" | "Square" | "square" => Ok(AspectMode::Square),
            "4:5" | "Portrait4x5" | "portrait" => Ok(AspectMode::Portrait4x5),
            other => Err(HeadshotError::InvalidParams(format!(
                "unknown aspect mode '{}'",
                other
            ))),
        }
    }
}

/// One raster filter function. Amounts use the CSS scale where 1.0 is 100%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    Grayscale(f32),
    Sepia(f32),
    Contrast(f32),
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, amount) = match self {
            FilterOp::Grayscale(a) => ("grayscale", a),
            FilterOp::Sepia(a) => ("sepia", a),
            FilterOp::Contrast(a) => ("contrast", a),
        };
        write!(f, "{}({}%)", name, (amount * 100.0).round())
    }
}

/// Ordered filter chain applied after geometry. Empty means no filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub ops: Vec<FilterOp>,
}

impl FilterSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn black_and_white() -> Self {
        Self {
            ops: vec![FilterOp::Grayscale(1.0)],
        }
    }

    pub fn sepia() -> Self {
        Self {
            ops: vec![FilterOp::Sepia(1.0)],
        }
    }

    pub fn warm() -> Self {
        Self {
            ops: vec![FilterOp::Sepia(0.5), FilterOp::Contrast(1.1)],
        }
    }

    pub fn is_none(&self) -> bool {
        self.ops.is_empty()
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "none");
        }
        let parts: Vec<String> = self.ops.iter().map(|op| op.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for FilterSpec {
    type Err = HeadshotError;

    /// Accepts a preset name (`none`, `B&W`, `Sepia`, `Warm`) or a CSS filter list
    /// such as `sepia(50%) contrast(110%)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "none" => return Ok(FilterSpec::none()),
            "b&w" | "bw" => return Ok(FilterSpec::black_and_white()),
            "sepia" => return Ok(FilterSpec::sepia()),
            "warm" => return Ok(FilterSpec::warm()),
            _ => {}
        }

        let ops = trimmed
            .split_whitespace()
            .map(parse_filter_function)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterSpec { ops })
    }
}

fn parse_filter_function(token: &str) -> Result<FilterOp, HeadshotError> {
    let invalid = || HeadshotError::InvalidParams(format!("unrecognized filter '{}'", token));

    let (name, rest) = token.split_once('(').ok_or_else(invalid)?;
    let arg = rest.strip_suffix(')').ok_or_else(invalid)?.trim();

    let amount = match arg.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().map_err(|_| invalid())? / 100.0,
        None => arg.parse::<f32>().map_err(|_| invalid())?,
    };
    if !amount.is_finite() || amount < 0.0 {
        return Err(invalid());
    }

    match name.to_ascii_lowercase().as_str() {
        "grayscale" => Ok(FilterOp::Grayscale(amount.min(1.0))),
        "sepia" => Ok(FilterOp::Sepia(amount.min(1.0))),
        "contrast" => Ok(FilterOp::Contrast(amount)),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    /// Degrees, clockwise. Any multiple of 90, including negative values.
    pub rotation: i32,
    pub aspect: AspectMode,
    pub filter: FilterSpec,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            rotation: 0,
            aspect: AspectMode::Original,
            filter: FilterSpec::none(),
        }
    }
}

impl TransformParams {
    pub fn parse(rotation: i32, aspect: &str, filter: &str) -> Result<Self, HeadshotError> {
        Ok(Self {
            rotation,
            aspect: aspect.parse()?,
            filter: filter.parse()?,
        })
    }
}

/// Pipeline output: an encoded JPEG no larger than the configured maximum dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn media_type(&self) -> &'static str {
        NORMALIZED_MEDIA_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub media_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultImage {
    pub id: u32,
    pub title: String,
    pub category: Option<String>,
    pub image: ImageData,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResultSet {
    /// Token of the batch that produced this set.
    pub batch: u64,
    pub results: Vec<ResultImage>,
    /// True when the placeholder set was returned instead of generated images.
    pub used_fallback: bool,
}

impl GenerationResultSet {
    /// Returns a copy where only the result with `id` is selected.
    pub fn select(&self, id: u32) -> Result<Self, HeadshotError> {
        if !self.results.iter().any(|r| r.id == id) {
            return Err(HeadshotError::NotFound(format!("result {}", id)));
        }

        let mut next = self.clone();
        for result in &mut next.results {
            result.selected = result.id == id;
        }
        Ok(next)
    }

    pub fn selected(&self) -> Option<&ResultImage> {
        self.results.iter().find(|r| r.selected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl GalleryRecord {
    pub fn from_image(image: &NormalizedImage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            data: image.data.clone(),
            width: image.width,
            height: image.height,
            created_at: Utc::now(),
        }
    }

    pub fn to_image(&self) -> NormalizedImage {
        NormalizedImage {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u32, selected: bool) -> ResultImage {
        ResultImage {
            id,
            title: format!("Variation {}", id),
            category: None,
            image: ImageData {
                media_type: "image/png".to_string(),
                data: vec![id as u8],
            },
            selected,
        }
    }

    fn sample_set() -> GenerationResultSet {
        GenerationResultSet {
            batch: 1,
            results: vec![result(1, true), result(2, false), result(3, false)],
            used_fallback: false,
        }
    }

    #[test]
    fn select_moves_the_single_selection() {
        let set = sample_set().select(3).unwrap();
        let selected: Vec<u32> = set
            .results
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.id)
            .collect();
        assert_eq!(selected, vec![3]);
        assert_eq!(set.selected().map(|r| r.id), Some(3));
    }

    #[test]
    fn select_is_idempotent() {
        let once = sample_set().select(2).unwrap();
        let twice = once.select(2).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn select_unknown_id_is_not_found() {
        let err = sample_set().select(42).unwrap_err();
        assert!(matches!(err, HeadshotError::NotFound(_)));
    }

    #[test]
    fn aspect_modes_parse_from_ui_labels() {
        assert_eq!("Original".parse::<AspectMode>().unwrap(), AspectMode::Original);
        assert_eq!("1:1".parse::<AspectMode>().unwrap(), AspectMode::Square);
        assert_eq!("4:5".parse::<AspectMode>().unwrap(), AspectMode::Portrait4x5);
        assert!(matches!(
            "16:9".parse::<AspectMode>(),
            Err(HeadshotError::InvalidParams(_))
        ));
    }

    #[test]
    fn filter_presets_and_css_syntax_agree() {
        assert_eq!("none".parse::<FilterSpec>().unwrap(), FilterSpec::none());
        assert_eq!(
            "grayscale(100%)".parse::<FilterSpec>().unwrap(),
            FilterSpec::black_and_white()
        );
        assert_eq!("sepia(1)".parse::<FilterSpec>().unwrap(), FilterSpec::sepia());
        assert_eq!(
            "sepia(50%) contrast(110%)".parse::<FilterSpec>().unwrap(),
            FilterSpec::warm()
        );
        assert_eq!("Warm".parse::<FilterSpec>().unwrap(), FilterSpec::warm());
    }

    #[test]
    fn filter_display_round_trips_presets() {
        let warm = FilterSpec::warm();
        assert_eq!(warm.to_string(), "sepia(50%) contrast(110%)");
        assert_eq!(warm.to_string().parse::<FilterSpec>().unwrap(), warm);
    }

    #[test]
    fn malformed_filters_are_invalid_params() {
        for input in ["blur(2px)", "sepia(", "sepia(abc)", "contrast(-10%)", "vintage"] {
            assert!(
                matches!(input.parse::<FilterSpec>(), Err(HeadshotError::InvalidParams(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn gallery_record_serializes_bytes_as_base64() {
        let record = GalleryRecord {
            id: "abc".to_string(),
            data: vec![0xff, 0xd8, 0xff],
            width: 10,
            height: 20,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["data"], "/9j/");

        let back: GalleryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
