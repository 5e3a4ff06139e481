// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeadshotError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid transform parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Generation request failed: {0}")]
    Generation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Login required")]
    Unauthorized,

    #[error("Batch {0} was superseded by a newer generation request")]
    Superseded(u64),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ResponseError for HeadshotError {
    fn error_response(&self) -> HttpResponse {
        match self {
            HeadshotError::Decode(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Unreadable image",
                "message": self.to_string()
            })),
            HeadshotError::InvalidParams(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid parameters",
                "message": self.to_string()
            })),
            HeadshotError::Encode(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Image processing error",
                    "message": self.to_string()
                }))
            }
            HeadshotError::Generation(_) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI service error",
                    "message": self.to_string()
                }))
            }
            HeadshotError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "Not found",
                "message": self.to_string()
            })),
            HeadshotError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            HeadshotError::Unauthorized => HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Unauthorized",
                "message": self.to_string()
            })),
            HeadshotError::Superseded(_) => HttpResponse::Conflict().json(serde_json::json!({
                "error": "Superseded",
                "message": self.to_string()
            })),
            HeadshotError::Store(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Database error",
                    "message": self.to_string()
                }))
            }
            HeadshotError::Serialization(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Data processing error",
                    "message": self.to_string()
                }))
            }
        }
    }
}
