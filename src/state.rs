// src/state.rs
//! Shared session state: the signed-in user, the photo being worked on, the
//! current generation batch and the persisted gallery.
//!
//! Every mutation publishes a [`StateEvent`]. User and gallery changes are
//! written to the key-value store first and only applied once the write succeeds.
//! Generation results are only accepted from the most recently started batch.

use crate::catalog::{self, DEFAULT_STYLE_ID};
use crate::errors::HeadshotError;
use crate::models::*;
use crate::services::KeyValueStore;
use crate::services::redis_service::{GALLERY_KEY, USER_KEY};
use chrono::Utc;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    UserChanged,
    ImageChanged,
    StyleChanged,
    ResultsChanged,
    SelectionChanged,
    GalleryChanged,
}

#[derive(Debug)]
pub struct SessionState {
    pub user: Option<User>,
    /// Raw upload waiting for the editor.
    pub pending_upload: Option<Vec<u8>>,
    /// Edited photo that feeds generation.
    pub current_image: Option<NormalizedImage>,
    pub selected_style_id: u32,
    pub results: Option<GenerationResultSet>,
    pub selected_result: Option<ResultImage>,
    /// Newest first.
    pub gallery: Vec<GalleryRecord>,
    pub current_batch: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            pending_upload: None,
            current_image: None,
            selected_style_id: DEFAULT_STYLE_ID,
            results: None,
            selected_result: None,
            gallery: Vec::new(),
            current_batch: 0,
        }
    }
}

pub struct AppSession {
    state: RwLock<SessionState>,
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StateEvent>,
}

impl AppSession {
    /// Restores the persisted user and gallery from `store`.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, HeadshotError> {
        let user: Option<User> = read_record(store.as_ref(), USER_KEY).await?;
        let gallery: Vec<GalleryRecord> = read_record(store.as_ref(), GALLERY_KEY)
            .await?
            .unwrap_or_default();

        info!(
            "Session restored: user={}, gallery={} item(s)",
            user.as_ref().map(|u| u.email.as_str()).unwrap_or("none"),
            gallery.len()
        );

        let (events, _) = broadcast::channel(64);
        Ok(Self {
            state: RwLock::new(SessionState {
                user,
                gallery,
                ..SessionState::default()
            }),
            store,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StateEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn require_user(&self) -> Result<User, HeadshotError> {
        self.user().await.ok_or(HeadshotError::Unauthorized)
    }

    pub async fn login(&self, email: &str, name: &str) -> Result<User, HeadshotError> {
        let (email, name) = (email.trim(), name.trim());
        if email.is_empty() || name.is_empty() {
            return Err(HeadshotError::Validation(
                "Please fill in all fields".to_string(),
            ));
        }

        let user = User {
            id: Utc::now().timestamp_millis().to_string(),
            name: name.to_string(),
            email: email.to_string(),
        };

        let mut state = self.state.write().await;
        self.store.set(USER_KEY, &to_json(&user)?).await?;
        state.user = Some(user.clone());
        drop(state);

        info!("User {} logged in", user.email);
        self.notify(StateEvent::UserChanged);
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), HeadshotError> {
        let mut state = self.state.write().await;
        self.store.delete(USER_KEY).await?;
        state.user = None;
        drop(state);

        self.notify(StateEvent::UserChanged);
        Ok(())
    }

    pub async fn set_pending_upload(&self, data: Vec<u8>) {
        self.state.write().await.pending_upload = Some(data);
        self.notify(StateEvent::ImageChanged);
    }

    /// Bytes the editor should work from: the fresh upload, else the current image.
    pub async fn editable_source(&self) -> Option<Vec<u8>> {
        let state = self.state.read().await;
        state
            .pending_upload
            .clone()
            .or_else(|| state.current_image.as_ref().map(|img| img.data.clone()))
    }

    pub async fn current_image(&self) -> Option<NormalizedImage> {
        self.state.read().await.current_image.clone()
    }

    /// Makes `image` the working photo and records it in the gallery.
    pub async fn save_edit(&self, image: NormalizedImage) -> Result<GalleryRecord, HeadshotError> {
        let record = GalleryRecord::from_image(&image);

        let mut state = self.state.write().await;
        let mut gallery = Vec::with_capacity(state.gallery.len() + 1);
        gallery.push(record.clone());
        gallery.extend(state.gallery.iter().cloned());
        self.store.set(GALLERY_KEY, &to_json(&gallery)?).await?;

        state.gallery = gallery;
        state.pending_upload = None;
        state.current_image = Some(image);
        drop(state);

        self.notify(StateEvent::ImageChanged);
        self.notify(StateEvent::GalleryChanged);
        Ok(record)
    }

    pub async fn gallery(&self) -> Vec<GalleryRecord> {
        self.state.read().await.gallery.clone()
    }

    pub async fn remove_from_gallery(&self, id: &str) -> Result<(), HeadshotError> {
        let mut state = self.state.write().await;
        let gallery: Vec<GalleryRecord> = state
            .gallery
            .iter()
            .filter(|item| item.id != id)
            .cloned()
            .collect();
        if gallery.len() == state.gallery.len() {
            return Err(HeadshotError::NotFound(format!("gallery item {}", id)));
        }
        self.store.set(GALLERY_KEY, &to_json(&gallery)?).await?;
        state.gallery = gallery;
        drop(state);

        self.notify(StateEvent::GalleryChanged);
        Ok(())
    }

    /// Reuses a gallery photo as the working image, skipping the editor.
    pub async fn use_gallery_image(&self, id: &str) -> Result<NormalizedImage, HeadshotError> {
        let mut state = self.state.write().await;
        let image = state
            .gallery
            .iter()
            .find(|item| item.id == id)
            .map(GalleryRecord::to_image)
            .ok_or_else(|| HeadshotError::NotFound(format!("gallery item {}", id)))?;
        state.pending_upload = None;
        state.current_image = Some(image.clone());
        drop(state);

        self.notify(StateEvent::ImageChanged);
        Ok(image)
    }

    pub async fn selected_style_id(&self) -> u32 {
        self.state.read().await.selected_style_id
    }

    pub async fn select_style(&self, id: u32) -> Result<(), HeadshotError> {
        catalog::find_style(id)?;
        self.state.write().await.selected_style_id = id;
        self.notify(StateEvent::StyleChanged);
        Ok(())
    }

    /// Starts a new generation batch, superseding any batch still in flight.
    pub async fn begin_batch(&self) -> u64 {
        let mut state = self.state.write().await;
        state.current_batch += 1;
        state.current_batch
    }

    /// Stores `set` if it belongs to the current batch. Returns false when a newer
    /// batch has started since, in which case the set is dropped.
    pub async fn apply_results(&self, set: GenerationResultSet) -> bool {
        let mut state = self.state.write().await;
        if set.batch != state.current_batch {
            info!(
                "Discarding results of stale batch {} (current batch {})",
                set.batch, state.current_batch
            );
            return false;
        }

        state.selected_result = set.selected().cloned();
        state.results = Some(set);
        drop(state);

        self.notify(StateEvent::ResultsChanged);
        true
    }

    pub async fn results(&self) -> Option<GenerationResultSet> {
        self.state.read().await.results.clone()
    }

    pub async fn select_result(&self, id: u32) -> Result<ResultImage, HeadshotError> {
        let mut state = self.state.write().await;
        let current = state
            .results
            .as_ref()
            .ok_or_else(|| HeadshotError::NotFound("no generated results".to_string()))?;
        let next = current.select(id)?;
        let selected = next
            .selected()
            .cloned()
            .ok_or_else(|| HeadshotError::NotFound(format!("result {}", id)))?;
        state.results = Some(next);
        state.selected_result = Some(selected.clone());
        drop(state);

        self.notify(StateEvent::SelectionChanged);
        Ok(selected)
    }

    pub async fn selected_result(&self) -> Option<ResultImage> {
        self.state.read().await.selected_result.clone()
    }
}

async fn read_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, HeadshotError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unreadable record {}: {}", key, e);
            Ok(None)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, HeadshotError> {
    serde_json::to_string(value).map_err(|e| HeadshotError::Serialization(e.to_string()))
}
