// src/services/mod.rs
pub mod generation_service;
pub mod image_processor;
pub mod redis_service;

pub use generation_service::{GeminiClient, ImageGenerationClient, Orchestrator};
pub use image_processor::ImageProcessor;
pub use redis_service::{KeyValueStore, MemoryStore, RedisService};
