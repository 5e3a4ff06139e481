// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

mod catalog;
mod config;
mod errors;
mod handlers;
mod models;
mod services;
mod state;

use crate::config::Config;
use crate::services::{
    GeminiClient, ImageGenerationClient, ImageProcessor, KeyValueStore, MemoryStore, Orchestrator,
    RedisService,
};
use crate::state::AppSession;

#[derive(Clone)]
pub struct AppState {
    session: Arc<AppSession>,
    orchestrator: Arc<Orchestrator>,
    image_processor: Arc<ImageProcessor>,
    max_upload_bytes: usize,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting headshot studio...");
    let config = Config::from_env()?;

    // Initialize services
    let store: Arc<dyn KeyValueStore> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(RedisService::new(url).await?),
        None => {
            warn!("REDIS_URL not set, user and gallery will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let session = Arc::new(AppSession::load(store).await?);

    let mut events = session.subscribe();
    actix_web::rt::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!("State changed: {:?}", event),
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} state events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let client = config.gemini_api_key.clone().map(|key| {
        let client: Arc<dyn ImageGenerationClient> = Arc::new(GeminiClient::new(
            key,
            config.gemini_model.clone(),
            config.gemini_api_base.clone(),
        ));
        client
    });
    if client.is_none() {
        warn!("GEMINI_API_KEY not set, generation will return placeholder results");
    }
    let orchestrator = Arc::new(Orchestrator::new(
        client,
        config.fan_out,
        config.request_timeout,
        catalog::placeholder_results()?,
    ));
    let image_processor = Arc::new(ImageProcessor::new(
        config.max_dim,
        config.jpeg_quality,
        config.max_upload_bytes,
    ));

    let app_state = AppState {
        session,
        orchestrator,
        image_processor,
        max_upload_bytes: config.max_upload_bytes,
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;

    Ok(())
}
