// src/config.rs
use crate::services::generation_service::DEFAULT_FAN_OUT;
use crate::services::image_processor::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIM, DEFAULT_MAX_UPLOAD_BYTES,
};
use anyhow::{Context, bail};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub fan_out: usize,
    pub request_timeout: Option<Duration>,
    pub max_dim: u32,
    pub jpeg_quality: u8,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fan_out: usize = parse_or(&get, "GENERATION_FAN_OUT", DEFAULT_FAN_OUT)?;
        if fan_out == 0 {
            bail!("GENERATION_FAN_OUT must be at least 1");
        }
        let max_dim: u32 = parse_or(&get, "MAX_IMAGE_DIM", DEFAULT_MAX_DIM)?;
        if max_dim == 0 {
            bail!("MAX_IMAGE_DIM must be at least 1");
        }
        let jpeg_quality: u8 = parse_or(&get, "JPEG_QUALITY", DEFAULT_JPEG_QUALITY)?;
        if !(1..=100).contains(&jpeg_quality) {
            bail!("JPEG_QUALITY must be between 1 and 100");
        }
        let timeout_secs: u64 = parse_or(&get, "GENERATION_TIMEOUT_SECS", 90)?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            redis_url: get("REDIS_URL"),
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string()),
            fan_out,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_dim,
            jpeg_quality,
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
