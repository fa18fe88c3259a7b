use crate::{
    common::{
        Concepts, DataResponse, DesignPayload, DesignRecord, ProductData, ProductPhoto,
        RegenerateRequest, SaveDesignRequest, SaveDesignResponse, SavedDesign, StorageStats,
        UploadCheckResponse, utils::short_id,
    },
    server::{
        AppState,
        cascade::{GeneratedImage, Generation, GenerationRequest},
        concepts::{fallback_concepts, generate_concepts},
        error::{ApiError, ApiResult},
        prompt,
        providers::decode_data_url,
        report,
    },
};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Query, State},
};
use chrono::Utc;
use image::ImageReader;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{io::Cursor, time::Instant};

/// File part of a multipart request.
struct Upload {
    bytes: Bytes,
    file_name: Option<String>,
    content_type: String,
}

/// Fields of the generate form, as sent by the frontend.
#[derive(Default)]
struct ProductForm {
    image: Option<Upload>,
    product_name: String,
    tagline: String,
    preferred_colors: String,
    sales_platform: String,
    desired_emotion: String,
    product_story: String,
    language: String,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "image" {
                let file_name = field.file_name().map(ToString::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Image read error: {e}")))?;
                form.image = Some(Upload {
                    bytes,
                    file_name,
                    content_type,
                });
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Field read error: {e}")))?;
            let text = text.trim().to_string();
            match name.as_str() {
                "productName" => form.product_name = text,
                "tagline" => form.tagline = text,
                "preferredColors" => form.preferred_colors = text,
                "salesPlatform" => form.sales_platform = text,
                "desiredEmotion" => form.desired_emotion = text,
                "productStory" => form.product_story = text,
                "language" => form.language = text,
                _ => {}
            }
        }
        Ok(form)
    }

    /// Validates the text fields and builds the normalised product.
    fn product(&self, photo: Option<ProductPhoto>) -> ApiResult<ProductData> {
        if self.product_name.is_empty() {
            return Err(ApiError::bad_request("productName is required"));
        }
        let mut product = ProductData::new(self.product_name.clone());
        product.tagline.clone_from(&self.tagline);
        product.colors = parse_colors(&self.preferred_colors)?;
        if !self.sales_platform.is_empty() {
            product.sales_platform.clone_from(&self.sales_platform);
        }
        if !self.desired_emotion.is_empty() {
            product.desired_emotion.clone_from(&self.desired_emotion);
        }
        product.product_story.clone_from(&self.product_story);
        if !self.language.is_empty() {
            product.language.clone_from(&self.language);
        }
        product.photo = photo;
        Ok(product)
    }
}

/// `preferredColors` is a JSON array of strings; blank means none.
fn parse_colors(raw: &str) -> ApiResult<Vec<String>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let colors: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| ApiError::bad_request("preferredColors must be a JSON array of strings"))?;
    Ok(colors
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}

fn validate_upload(upload: &Upload, max_file_size: usize) -> ApiResult<()> {
    if !upload.content_type.starts_with("image/") {
        return Err(ApiError::bad_request("File must be an image"));
    }
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("Image file is empty"));
    }
    if upload.bytes.len() > max_file_size {
        return Err(ApiError::bad_request(format!(
            "File too large, the limit is {max_file_size} bytes"
        )));
    }
    ImageReader::new(Cursor::new(&upload.bytes))
        .with_guessed_format()
        .ok()
        .filter(|reader| reader.format().is_some())
        .and_then(|reader| reader.into_dimensions().ok())
        .map(|_| ())
        .ok_or_else(|| ApiError::bad_request("Invalid image file"))
}

fn mockup_extension(mime: &str) -> &'static str {
    match mime {
        "image/svg+xml" => "svg",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Stores the mockup under the design and returns its public URL. Remote
/// URLs are downloaded when possible and passed through otherwise.
async fn persist_mockup(state: &AppState, design_id: &str, image: &GeneratedImage) -> String {
    let stored = if let Some((mime, bytes)) = decode_data_url(&image.image_url) {
        state
            .storage
            .save_mockup(design_id, &bytes, mockup_extension(&mime))
            .await
    } else {
        match download(state, &image.image_url).await {
            Ok((mime, bytes)) => {
                state
                    .storage
                    .save_mockup(design_id, &bytes, mockup_extension(&mime))
                    .await
            }
            Err(e) => Err(e),
        }
    };

    match stored {
        Ok(path) => {
            let path = path.to_string_lossy().into_owned();
            if let Err(e) = state
                .storage
                .append_mockup(design_id, path.clone(), &image.generator)
                .await
            {
                log::warn!("Could not update manifest for {design_id}: {e:?}");
            }
            state.storage.get_public_url(&path)
        }
        Err(e) => {
            log::warn!("Keeping remote mockup URL for {design_id}: {e:?}");
            image.image_url.clone()
        }
    }
}

async fn download(state: &AppState, url: &str) -> anyhow::Result<(String, Vec<u8>)> {
    let response = state
        .client
        .get(url)
        .timeout(state.config.provider_timeout)
        .send()
        .await?
        .error_for_status()?;
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();
    Ok((mime, response.bytes().await?.to_vec()))
}

fn advisory_payload(
    design_id: String,
    generation: &Generation,
    concepts: Option<&Concepts>,
    elapsed: f64,
) -> DesignPayload {
    let mut payload = DesignPayload {
        design_id,
        processing_time: elapsed,
        ai_confidence: generation.confidence(),
        generator: generation.generator().to_string(),
        cost: generation.cost().to_string(),
        ..DesignPayload::default()
    };
    if let Generation::Advice(advice) = generation {
        payload.advice_mode = Some(true);
        payload.professional_advice = Some(advice.professional_advice.clone());
        payload.concept_summary = Some(advice.concept_summary.clone());
        payload.next_steps = Some(advice.next_steps.clone());
        payload.user_message = Some(advice.user_message.clone());
    }
    if let Some(concepts) = concepts {
        payload.concepts = Some(concepts.concepts.clone());
        payload.styles_suggestions = Some(concepts.styles.clone());
        payload.color_palette = Some(concepts.colors.clone());
    }
    payload
}

fn image_payload(
    design_id: String,
    image: &GeneratedImage,
    mockup_url: String,
    report_url: Option<String>,
    concepts: Option<&Concepts>,
    elapsed: f64,
) -> DesignPayload {
    let mut payload = DesignPayload {
        design_id,
        mockup_url: Some(mockup_url),
        report_url,
        prompt_used: image.prompt_used.clone(),
        processing_time: elapsed,
        ai_confidence: image.confidence,
        generator: image.generator.clone(),
        cost: image.cost.clone(),
        ..DesignPayload::default()
    };
    if let Some(advice) = &image.advice {
        payload.has_professional_advice = Some(true);
        payload.professional_advice = Some(advice.professional_advice.clone());
        payload.concept_summary = Some(advice.concept_summary.clone());
        payload.user_message = Some(advice.user_message.clone());
    }
    if let Some(concepts) = concepts {
        payload.concepts = Some(concepts.concepts.clone());
        payload.styles_suggestions = Some(concepts.styles.clone());
        payload.color_palette = Some(concepts.colors.clone());
    }
    payload
}

fn seconds_since(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

pub async fn generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse<DesignPayload>>> {
    const FAILED: &str = "Generation failed";
    let started = Instant::now();

    let form = ProductForm::read(multipart).await?;
    let upload = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("Image file is required"))?;
    validate_upload(upload, state.config.max_file_size)?;
    let product = form.product(Some(ProductPhoto {
        bytes: upload.bytes.to_vec(),
        mime: upload.content_type.clone(),
    }))?;

    let design_id = short_id("design");
    log::info!("Generating design {design_id} for '{}'", product.product_name);

    let upload_path = state
        .storage
        .save_upload(
            &upload.bytes,
            upload.file_name.as_deref(),
            Some(&upload.content_type),
            &design_id,
        )
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;
    state
        .storage
        .create_design_directory(&design_id)
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    let concepts = generate_concepts(
        &product.product_name,
        &product.desired_emotion,
        &product.sales_platform,
    );
    let request = GenerationRequest {
        product,
        concepts,
        instructions: None,
    };
    let generation = state.cascade.run(&request).await;

    state
        .storage
        .write_design_record(&DesignRecord {
            design_id: design_id.clone(),
            product_name: Some(request.product.product_name.clone()),
            original_upload: Some(upload_path.to_string_lossy().into_owned()),
            mockups: Vec::new(),
            report: None,
            generator: generation.generator().to_string(),
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| ApiError::internal(FAILED, e))?;

    let payload = match &generation {
        Generation::Advice(_) => advisory_payload(
            design_id,
            &generation,
            Some(&request.concepts),
            seconds_since(started),
        ),
        Generation::Image(image) => {
            let mockup_url = persist_mockup(&state, &design_id, image).await;
            let report_url = match report::write_report(
                &state.storage,
                &design_id,
                &request.product,
                &request.concepts,
                &generation,
            )
            .await
            {
                Ok(path) => {
                    let path = path.to_string_lossy().into_owned();
                    record_report(&state, &design_id, &path).await;
                    Some(state.storage.get_public_url(&path))
                }
                Err(e) => {
                    log::warn!("Report for {design_id} not written: {e:?}");
                    None
                }
            };
            image_payload(
                design_id,
                image,
                mockup_url,
                report_url,
                Some(&request.concepts),
                seconds_since(started),
            )
        }
    };

    Ok(Json(DataResponse::ok(payload)))
}

async fn record_report(state: &AppState, design_id: &str, path: &str) {
    let result = state
        .storage
        .update_design_record(design_id, |record| record.report = Some(path.to_string()))
        .await;
    if let Err(e) = result {
        log::warn!("Could not record report for {design_id}: {e:?}");
    }
}

pub async fn regenerate(
    State(state): State<AppState>,
    Json(request): Json<RegenerateRequest>,
) -> ApiResult<Json<DataResponse<DesignPayload>>> {
    let started = Instant::now();
    if !state.storage.design_exists(&request.design_id).await {
        return Err(ApiError::NotFound("Design not found".to_string()));
    }

    let record = state
        .storage
        .read_design_record(&request.design_id)
        .await
        .map_err(|e| ApiError::internal("Regeneration failed", e))?;
    let product_name = record
        .as_ref()
        .and_then(|r| r.product_name.clone())
        .unwrap_or_else(|| "Updated Product".to_string());

    let customizations = &request.customizations;
    let mut product = ProductData::new(product_name);
    product.colors.clone_from(&customizations.colors);
    if let Some(tagline) = customizations.text_changes.get("tagline") {
        product.tagline.clone_from(tagline);
    }
    if let Some(upload) = state.storage.find_upload(&request.design_id).await {
        match tokio::fs::read(&upload).await {
            Ok(bytes) => {
                let mime = mime_guess::from_path(&upload).first_or_octet_stream();
                product.photo = Some(ProductPhoto {
                    bytes,
                    mime: mime.essence_str().to_string(),
                });
            }
            Err(e) => log::warn!("Original upload for {} unreadable: {e:?}", request.design_id),
        }
    }

    let mut concepts = fallback_concepts(&product.product_name);
    if !customizations.style_preferences.is_empty() {
        concepts.styles = customizations.style_preferences.values().cloned().collect();
    }
    if !customizations.colors.is_empty() {
        concepts.colors.clone_from(&customizations.colors);
    }

    let generation_request = GenerationRequest {
        product,
        concepts,
        instructions: Some(prompt::customization_prompt(customizations)),
    };
    let generation = state.cascade.run(&generation_request).await;

    let payload = match &generation {
        Generation::Advice(_) => advisory_payload(
            request.design_id,
            &generation,
            None,
            seconds_since(started),
        ),
        Generation::Image(image) => {
            let mockup_url = persist_mockup(&state, &request.design_id, image).await;
            let mut payload = image_payload(
                request.design_id,
                image,
                mockup_url,
                None,
                None,
                seconds_since(started),
            );
            payload.prompt_used = None;
            payload
        }
    };
    Ok(Json(DataResponse::ok(payload)))
}

pub async fn save_design(
    State(state): State<AppState>,
    Json(request): Json<SaveDesignRequest>,
) -> ApiResult<Json<SaveDesignResponse>> {
    let design_id = request.design_id.trim();
    let user_email = request.user_email.trim();
    let design_name = request.design_name.trim();
    if design_id.is_empty() || user_email.is_empty() || design_name.is_empty() {
        return Err(ApiError::bad_request(
            "designId, userEmail and designName are required",
        ));
    }

    let saved_design_id = short_id("saved");
    let record = SavedDesign {
        saved_design_id: saved_design_id.clone(),
        original_design_id: design_id.to_string(),
        user_email: user_email.to_string(),
        design_name: design_name.to_string(),
        timestamp: Utc::now(),
    };
    if !state.storage.save_design_metadata(record).await {
        return Err(ApiError::internal(
            "Save failed",
            anyhow::anyhow!("metadata store rejected {saved_design_id}"),
        ));
    }

    Ok(Json(SaveDesignResponse {
        success: true,
        saved_design_id,
        message: "Design saved successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct DesignsQuery {
    email: String,
}

pub async fn list_designs(
    State(state): State<AppState>,
    Query(query): Query<DesignsQuery>,
) -> ApiResult<Json<DataResponse<Vec<SavedDesign>>>> {
    let email = query.email.trim();
    if email.is_empty() {
        return Err(ApiError::bad_request("email is required"));
    }
    Ok(Json(DataResponse::ok(state.storage.list_user_designs(email).await)))
}

pub async fn storage_stats(State(state): State<AppState>) -> Json<DataResponse<StorageStats>> {
    Json(DataResponse::ok(state.storage.stats().await))
}

/// Canned payload for frontend development.
pub async fn sample_design() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "designId": "sample_design_123",
            "mockupUrl": "/static/sample-mockup.jpg",
            "reportUrl": "/static/sample-design.txt",
            "concepts": [
                "Premium Farm Fresh - Nature's Best Quality",
                "Artisan Organic - Traditionally Crafted",
                "Pure Natural - Sustainably Grown"
            ],
            "stylesSuggestions": ["Modern Organic", "Rustic Premium", "Clean Natural"],
            "colorPalette": ["#2E7D32", "#8BC34A", "#FFC107", "#795548"],
            "processingTime": 2.1,
            "aiConfidence": 0.88
        }
    }))
}

pub async fn test_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadCheckResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(ToString::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Image read error: {e}")))?;
        upload = Some(Upload {
            bytes,
            file_name,
            content_type,
        });
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("Image file is required"))?;
    validate_upload(&upload, state.config.max_file_size)?;

    Ok(Json(UploadCheckResponse {
        success: true,
        message: "File upload test successful".to_string(),
        filename: upload.file_name.unwrap_or_default(),
        size: upload.bytes.len(),
        content_type: upload.content_type,
    }))
}

/// Text-only generation headed by Replicate. No upload is involved.
pub async fn generate_replicate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<DataResponse<DesignPayload>>> {
    let started = Instant::now();
    let form = ProductForm::read(multipart).await?;
    let product = form.product(None)?;
    let design_id = short_id("design");
    state
        .storage
        .create_design_directory(&design_id)
        .await
        .map_err(|e| ApiError::internal("Replicate generation failed", e))?;

    let concepts = generate_concepts(
        &product.product_name,
        &product.desired_emotion,
        &product.sales_platform,
    );
    let request = GenerationRequest {
        product,
        concepts,
        instructions: None,
    };
    let generation = state.replicate_cascade.run(&request).await;

    let payload = match &generation {
        Generation::Advice(_) => {
            advisory_payload(design_id, &generation, None, seconds_since(started))
        }
        Generation::Image(image) => {
            let mockup_url = persist_mockup(&state, &design_id, image).await;
            image_payload(design_id, image, mockup_url, None, None, seconds_since(started))
        }
    };
    Ok(Json(DataResponse::ok(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_lists_parse_or_reject() {
        assert_eq!(parse_colors("").unwrap(), Vec::<String>::new());
        assert_eq!(
            parse_colors(r#"["green", " #FFC107 ", ""]"#).unwrap(),
            vec!["green".to_string(), "#FFC107".to_string()]
        );
        assert!(parse_colors("green, yellow").is_err());
        assert!(parse_colors(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn uploads_must_be_real_images() {
        let not_image = Upload {
            bytes: Bytes::from_static(b"hello"),
            file_name: Some("a.txt".to_string()),
            content_type: "text/plain".to_string(),
        };
        assert!(validate_upload(&not_image, 1024).is_err());

        let fake_png = Upload {
            bytes: Bytes::from_static(b"definitely not a png"),
            file_name: Some("a.png".to_string()),
            content_type: "image/png".to_string(),
        };
        assert!(validate_upload(&fake_png, 1024).is_err());

        let mut png = Vec::new();
        image::RgbImage::new(4, 4)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let real = Upload {
            bytes: Bytes::from(png),
            file_name: Some("a.png".to_string()),
            content_type: "image/png".to_string(),
        };
        assert!(validate_upload(&real, 1024 * 1024).is_ok());
        assert!(validate_upload(&real, 8).is_err());
    }

    #[test]
    fn blank_form_fields_keep_defaults() {
        let form = ProductForm {
            product_name: "Rice".to_string(),
            ..ProductForm::default()
        };
        let product = form.product(None).unwrap();
        assert_eq!(product.sales_platform, "local-market");
        assert_eq!(product.desired_emotion, "trust");
        assert_eq!(product.language, "en");

        assert!(ProductForm::default().product(None).is_err());
    }
}
