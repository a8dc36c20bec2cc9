//! Normalizes the successful get-result payload into one image reference.
//!
//! Response shapes differ between provider versions, so the lookup is an
//! ordered list of small pure functions. Supporting a new shape means adding
//! one entry to [`EXTRACTORS`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::{
    error::{Result, StalkgenError},
    models::GenerationResult,
};

pub const INLINE_MIME_TYPE: &str = "image/jpeg";

pub type Extractor = fn(&Value) -> Option<String>;

pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("image_urls", top_level_url as Extractor),
    ("binary_data_base64", top_level_base64 as Extractor),
    ("result.image_urls", nested_url as Extractor),
    ("result.binary_data_base64", nested_base64 as Extractor),
];

fn top_level_url(data: &Value) -> Option<String> {
    first_string(data.get("image_urls")?)
}

fn top_level_base64(data: &Value) -> Option<String> {
    first_string(data.get("binary_data_base64")?).and_then(|b64| data_uri(&b64))
}

fn nested_url(data: &Value) -> Option<String> {
    top_level_url(data.get("result")?)
}

fn nested_base64(data: &Value) -> Option<String> {
    top_level_base64(data.get("result")?)
}

fn first_string(value: &Value) -> Option<String> {
    value
        .as_array()?
        .first()?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn data_uri(b64: &str) -> Option<String> {
    STANDARD.decode(b64).ok()?;
    Some(format!("data:{};base64,{}", INLINE_MIME_TYPE, b64))
}

/// The object the candidate paths are relative to: `data` when the payload
/// is a full envelope, otherwise the payload itself.
fn search_root(payload: &Value) -> &Value {
    match payload.get("data") {
        Some(data) if data.is_object() => data,
        _ => payload,
    }
}

pub fn extract_image_url(payload: &Value) -> Result<String> {
    let root = search_root(payload);
    for (path, extractor) in EXTRACTORS {
        if let Some(url) = extractor(root) {
            log::debug!("Image reference found at {}", path);
            return Ok(url);
        }
    }

    let keys = root
        .as_object()
        .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    Err(StalkgenError::UnrecognizedResponseShape(format!(
        "no image found under any of [{}]; available keys: [{}]",
        EXTRACTORS
            .iter()
            .map(|(path, _)| *path)
            .collect::<Vec<_>>()
            .join(", "),
        keys
    )))
}

pub fn extract_result(payload: Value) -> Result<GenerationResult> {
    let image_url = extract_image_url(&payload)?;
    Ok(GenerationResult {
        image_url,
        raw_provider_payload: payload,
    })
}
