use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod utils;

/// Product photo as uploaded by the user.
#[derive(Debug, Clone)]
pub struct ProductPhoto {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Normalised product fields shared by every generator.
#[derive(Debug, Clone)]
pub struct ProductData {
    pub product_name: String,
    pub tagline: String,
    pub colors: Vec<String>,
    pub sales_platform: String,
    pub desired_emotion: String,
    pub product_story: String,
    pub language: String,
    pub photo: Option<ProductPhoto>,
}

impl ProductData {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            tagline: String::new(),
            colors: Vec::new(),
            sales_platform: "local-market".to_string(),
            desired_emotion: "trust".to_string(),
            product_story: String::new(),
            language: "en".to_string(),
            photo: None,
        }
    }

    pub fn tagline_or_default(&self) -> &str {
        if self.tagline.trim().is_empty() {
            "Fresh & Natural"
        } else {
            &self.tagline
        }
    }

    pub fn primary_color(&self) -> &str {
        self.colors.first().map_or("green", String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concepts {
    pub concepts: Vec<String>,
    pub styles: Vec<String>,
    pub colors: Vec<String>,
    pub keywords: Vec<String>,
    pub layouts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    pub professional_advice: String,
    pub concept_summary: Vec<String>,
    pub next_steps: Vec<String>,
    pub user_message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customizations {
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default, alias = "textChanges")]
    pub text_changes: BTreeMap<String, String>,
    #[serde(default, alias = "stylePreferences")]
    pub style_preferences: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub design_id: String,
    #[serde(default)]
    pub customizations: Customizations,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDesignRequest {
    pub design_id: String,
    pub user_email: String,
    pub design_name: String,
}

/// Entry of the saved-design metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDesign {
    pub saved_design_id: String,
    pub original_design_id: String,
    pub user_email: String,
    pub design_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Manifest kept next to the artifacts of one design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignRecord {
    pub design_id: String,
    #[serde(default)]
    pub product_name: Option<String>,
    pub original_upload: Option<String>,
    pub mockups: Vec<String>,
    pub report: Option<String>,
    pub generator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub services: HealthServices,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthServices {
    pub ai_service: bool,
    pub storage: bool,
}

/// `data` body of the generate/regenerate responses. Image and advisory
/// modes share it, unused fields are left out of the JSON.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignPayload {
    pub design_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mockup_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_professional_advice: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_advice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_summary: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concepts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles_suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_used: Option<String>,
    pub processing_time: f64,
    pub ai_confidence: f64,
    pub generator: String,
    pub cost: String,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDesignResponse {
    pub success: bool,
    pub saved_design_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCheckResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_uploads: usize,
    pub total_designs: usize,
    pub storage_used_mb: f64,
}
