use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::GenerationLimits,
    error::{Result, StalkgenError},
    models::NftMetadata,
};

/// Body of `POST /api/generate-meme`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `"WxH"`, decomposed when `width`/`height` are not given.
    pub size: Option<String>,
    pub n: Option<u32>,
}

/// A request that has passed [`GenerationRequest::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn validate(&self, limits: &GenerationLimits) -> Result<GenerationParams> {
        let prompt = match self.prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(StalkgenError::Validation("Prompt is required".into())),
        };

        let prompt_length = prompt.chars().count();
        if prompt_length > limits.max_prompt_length {
            return Err(StalkgenError::Validation(format!(
                "Prompt exceeds maximum allowed length of {} characters (got {})",
                limits.max_prompt_length, prompt_length
            )));
        }

        let (size_width, size_height) = match self.size.as_deref() {
            Some(size) => {
                let (w, h) = parse_size(size)?;
                (Some(w), Some(h))
            }
            None => (None, None),
        };
        let width = self
            .width
            .or(size_width)
            .unwrap_or(limits.default_width);
        let height = self
            .height
            .or(size_height)
            .unwrap_or(limits.default_height);

        check_dimension("width", width, limits)?;
        check_dimension("height", height, limits)?;

        let image_count = match self.n {
            Some(0) => {
                return Err(StalkgenError::Validation(
                    "Number of images must be at least 1".into(),
                ))
            }
            Some(n) => n.min(limits.max_images_per_request),
            None => 1,
        };

        Ok(GenerationParams {
            prompt: prompt.to_string(),
            negative_prompt: self.negative_prompt.clone().unwrap_or_default(),
            width,
            height,
            image_count,
        })
    }
}

fn parse_size(size: &str) -> Result<(u32, u32)> {
    let invalid = || {
        StalkgenError::Validation(format!(
            "Invalid size '{}', expected WIDTHxHEIGHT such as 1024x1024",
            size
        ))
    };
    let (w, h) = size
        .trim()
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(invalid)?;
    let w = w.trim().parse::<u32>().map_err(|_| invalid())?;
    let h = h.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((w, h))
}

fn check_dimension(name: &str, value: u32, limits: &GenerationLimits) -> Result<()> {
    if value < limits.min_dimension {
        return Err(StalkgenError::Validation(format!(
            "Image {} {} is below the minimum of {}",
            name, value, limits.min_dimension
        )));
    }
    if value > limits.max_dimension {
        return Err(StalkgenError::Validation(format!(
            "Image {} {} exceeds the maximum of {}",
            name, value, limits.max_dimension
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTask {
    pub task_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Either a remote URL or a `data:` URI.
    pub image_url: String,
    pub raw_provider_payload: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMemeResponse {
    pub success: bool,
    pub image_url: String,
    pub prompt: String,
    pub metadata: NftMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
}
