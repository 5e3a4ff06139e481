// src/handlers.rs
use crate::{AppState, catalog, errors::HeadshotError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use log::info;
use serde::Deserialize;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/upload", web::post().to(upload_image))
            .route("/edit", web::post().to(edit_image))
            .route("/image", web::get().to(current_image))
            .route("/styles", web::get().to(list_styles))
            .route("/style", web::put().to(select_style))
            .route("/generate", web::post().to(generate))
            .route("/results", web::get().to(get_results))
            .route("/results/{id}/select", web::post().to(select_result))
            .route("/download", web::get().to(download))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me))
            .route("/gallery", web::get().to(list_gallery))
            .route("/gallery/{id}", web::delete().to(delete_gallery_item))
            .route("/gallery/{id}/use", web::post().to(use_gallery_item)),
    )
    .route("/health", web::get().to(health_check));
}

pub async fn upload_image(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let limit = data.max_upload_bytes;
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(mut field) = payload.try_next().await? {
        if field.content_disposition().get_filename().is_none() {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(HeadshotError::Validation(format!(
                    "Upload exceeds the {} byte limit",
                    limit
                ))
                .into());
            }
            bytes.extend_from_slice(&chunk);
        }
        image_data = Some(bytes);
        break;
    }

    let image_data =
        image_data.ok_or_else(|| HeadshotError::Validation("No image provided".to_string()))?;
    let processor = data.image_processor.clone();
    let ((width, height), image_data) = web::block(move || {
        processor
            .validate_image(&image_data)
            .map(|dims| (dims, image_data))
    })
    .await
    .map_err(|e| HeadshotError::Encode(format!("Image worker failed: {}", e)))??;
    let size = image_data.len();

    data.session.set_pending_upload(image_data).await;
    info!("Accepted upload {}x{} ({} bytes)", width, height, size);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "width": width,
        "height": height,
        "size": size
    })))
}

fn default_aspect() -> String {
    "Original".to_string()
}

fn default_filter() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub rotation: i32,
    #[serde(default = "default_aspect")]
    pub aspect: String,
    #[serde(default = "default_filter")]
    pub filter: String,
}

pub async fn edit_image(
    body: web::Json<EditRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    let params = TransformParams::parse(body.rotation, &body.aspect, &body.filter)?;
    let source = data
        .session
        .editable_source()
        .await
        .ok_or_else(|| HeadshotError::Validation("Upload a photo first".to_string()))?;

    let processor = data.image_processor.clone();
    let normalized = web::block(move || processor.normalize(&source, &params))
        .await
        .map_err(|e| HeadshotError::Encode(format!("Image worker failed: {}", e)))??;

    let record = data.session.save_edit(normalized).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "gallery_id": record.id,
        "width": record.width,
        "height": record.height,
        "size": record.data.len()
    })))
}

pub async fn current_image(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    let image = data
        .session
        .current_image()
        .await
        .ok_or_else(|| HeadshotError::NotFound("no edited photo".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(image.media_type())
        .body(image.data))
}

#[derive(Debug, Deserialize)]
pub struct StylesQuery {
    pub category: Option<String>,
}

pub async fn list_styles(
    query: web::Query<StylesQuery>,
    data: web::Data<AppState>,
) -> HttpResponse {
    let category = query.category.as_deref().unwrap_or("All");
    HttpResponse::Ok().json(serde_json::json!({
        "styles": catalog::styles_in(category),
        "selected_style_id": data.session.selected_style_id().await
    }))
}

#[derive(Debug, Deserialize)]
pub struct SelectStyleRequest {
    pub style_id: u32,
}

pub async fn select_style(
    body: web::Json<SelectStyleRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    data.session.select_style(body.style_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "selected_style_id": body.style_id })))
}

/// Starts a new batch; a batch that finishes after a newer one started is dropped.
pub async fn generate(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    let batch = data.session.begin_batch().await;
    let image = data.session.current_image().await;
    let style = catalog::find_style(data.session.selected_style_id().await)?;

    let set = data.orchestrator.generate(batch, image.as_ref(), style).await;
    if !data.session.apply_results(set.clone()).await {
        return Err(HeadshotError::Superseded(batch));
    }

    Ok(HttpResponse::Ok().json(&set))
}

pub async fn get_results(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    let set = data
        .session
        .results()
        .await
        .ok_or_else(|| HeadshotError::NotFound("no generated results".to_string()))?;
    Ok(HttpResponse::Ok().json(&set))
}

pub async fn select_result(
    path: web::Path<u32>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    let selected = data.session.select_result(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&selected))
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

pub async fn download(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    let result = data
        .session
        .selected_result()
        .await
        .ok_or_else(|| HeadshotError::NotFound("no result selected".to_string()))?;

    let filename = format!(
        "headshot-{}.{}",
        result.id,
        extension_for(&result.image.media_type)
    );
    Ok(HttpResponse::Ok()
        .content_type(result.image.media_type.as_str())
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(result.image.data))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

pub async fn login(
    body: web::Json<LoginRequest>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    let user = data.session.login(&body.email, &body.name).await?;
    Ok(HttpResponse::Ok().json(&user))
}

pub async fn logout(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    data.session.logout().await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn me(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "user": data.session.user().await }))
}

pub async fn list_gallery(data: web::Data<AppState>) -> Result<HttpResponse, HeadshotError> {
    data.session.require_user().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "items": data.session.gallery().await
    })))
}

pub async fn delete_gallery_item(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    data.session.require_user().await?;
    data.session.remove_from_gallery(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn use_gallery_item(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, HeadshotError> {
    data.session.require_user().await?;
    let image = data.session.use_gallery_image(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "width": image.width,
        "height": image.height
    })))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "headshot-studio",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::placeholder_results;
    use crate::services::{ImageProcessor, MemoryStore, Orchestrator};
    use crate::state::AppSession;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Arc;

    const BOUNDARY: &str = "----headshot-test-boundary";

    async fn app_state() -> AppState {
        let session = AppSession::load(Arc::new(MemoryStore::new())).await.unwrap();
        AppState {
            session: Arc::new(session),
            orchestrator: Arc::new(Orchestrator::new(
                None,
                4,
                None,
                placeholder_results().unwrap(),
            )),
            image_processor: Arc::new(ImageProcessor::default()),
            max_upload_bytes: 1024 * 1024,
        }
    }

    fn photo_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn multipart_body(file: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(file: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/v1/upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(file))
    }

    #[actix_web::test]
    async fn health_reports_service() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;
        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn upload_edit_generate_download_flow() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;

        let photo = photo_png(80, 60);
        let uploaded: serde_json::Value =
            test::call_and_read_body_json(&app, upload_request(&photo).to_request()).await;
        assert_eq!(uploaded["width"], 80);
        assert_eq!(uploaded["height"], 60);
        assert_eq!(uploaded["size"], photo.len());

        let edit = test::TestRequest::post()
            .uri("/api/v1/edit")
            .set_json(serde_json::json!({ "rotation": 90, "aspect": "1:1", "filter": "B&W" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, edit).await;
        assert_eq!(body["width"], 60);
        assert_eq!(body["height"], 60);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/image").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/jpeg");

        let set: GenerationResultSet = test::call_and_read_body_json(
            &app,
            test::TestRequest::post().uri("/api/v1/generate").to_request(),
        )
        .await;
        assert!(set.used_fallback);
        assert_eq!(set.results.iter().filter(|r| r.selected).count(), 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/v1/results/2/select").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.contains("headshot-2.jpg"));
    }

    #[actix_web::test]
    async fn edit_rejects_bad_params_and_missing_upload() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;

        let no_upload = test::TestRequest::post()
            .uri("/api/v1/edit")
            .set_json(serde_json::json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, no_upload).await.status(), StatusCode::BAD_REQUEST);

        test::call_service(&app, upload_request(&photo_png(20, 20)).to_request()).await;
        for body in [
            serde_json::json!({ "aspect": "16:9" }),
            serde_json::json!({ "rotation": 45 }),
            serde_json::json!({ "filter": "blur(3px)" }),
        ] {
            let req = test::TestRequest::post().uri("/api/v1/edit").set_json(&body).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[actix_web::test]
    async fn corrupt_upload_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;
        let resp = test::call_service(&app, upload_request(b"not really a png").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn gallery_requires_login() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/gallery").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let bad_login = test::TestRequest::post()
            .uri("/api/v1/login")
            .set_json(serde_json::json!({ "email": "", "name": "Ana" }))
            .to_request();
        assert_eq!(test::call_service(&app, bad_login).await.status(), StatusCode::BAD_REQUEST);

        let login = test::TestRequest::post()
            .uri("/api/v1/login")
            .set_json(serde_json::json!({ "email": "ana@example.com", "name": "Ana" }))
            .to_request();
        assert_eq!(test::call_service(&app, login).await.status(), StatusCode::OK);

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/gallery").to_request(),
        )
        .await;
        assert_eq!(body["items"], serde_json::json!([]));

        let resp = test::call_service(
            &app,
            test::TestRequest::delete().uri("/api/v1/gallery/unknown").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn styles_filter_by_category() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state().await))
                .configure(configure),
        )
        .await;

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/v1/styles?category=Casual").to_request(),
        )
        .await;
        let styles = body["styles"].as_array().unwrap();
        assert!(!styles.is_empty());
        assert!(styles.iter().all(|s| s["category"] == "Casual"));
        assert_eq!(body["selected_style_id"], catalog::DEFAULT_STYLE_ID);

        let unknown = test::TestRequest::put()
            .uri("/api/v1/style")
            .set_json(serde_json::json!({ "style_id": 404 }))
            .to_request();
        assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::NOT_FOUND);
    }
}
