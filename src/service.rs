use chrono::Utc;

use crate::{
    config::{Config, GenerationLimits, NftMetadataConfig},
    error::Result,
    logger::RequestLog,
    models::{GenerationParams, GenerationRequest, NftMetadata},
    volcengine::ImageClient,
};

#[derive(Debug, Clone)]
pub struct GeneratedMeme {
    pub task_id: String,
    pub image_url: String,
    pub prompt: String,
    pub metadata: NftMetadata,
}

/// Validates a request, runs it through the image provider and wraps the
/// result in NFT metadata. Holds no per-request state, so one instance is
/// shared by every handler.
#[derive(Clone)]
pub struct MemeService {
    client: ImageClient,
    limits: GenerationLimits,
    nft: NftMetadataConfig,
}

impl MemeService {
    pub fn new(client: ImageClient, limits: GenerationLimits, nft: NftMetadataConfig) -> Self {
        Self {
            client,
            limits,
            nft,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.volcengine.validate()?;
        let client = ImageClient::from_config(&config.volcengine)?;
        Ok(Self::new(client, config.limits.clone(), config.nft.clone()))
    }

    pub fn validate(&self, request: &GenerationRequest) -> Result<GenerationParams> {
        request.validate(&self.limits)
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        log: &RequestLog,
    ) -> Result<GeneratedMeme> {
        let params = self.validate(request)?;
        log.info(&format!(
            "Generating {}x{} image for prompt: {}",
            params.width,
            params.height,
            preview(&params.prompt)
        ));

        let task = self.client.submit(&params).await?;
        let policy = self.client.policy();
        log.info(&format!(
            "Submitted task {}, polling every {:?} for up to {} attempts",
            task.task_id, policy.interval, policy.max_attempts
        ));

        let result = self.client.wait_for(&task).await?;
        let waited = Utc::now() - task.submitted_at;
        log.info(&format!(
            "Task {} produced image {} after {}ms",
            task.task_id,
            preview(&result.image_url),
            waited.num_milliseconds()
        ));

        let metadata = NftMetadata::build(&self.nft, &result.image_url, &params.prompt, Utc::now());

        Ok(GeneratedMeme {
            task_id: task.task_id,
            image_url: result.image_url,
            prompt: params.prompt,
            metadata,
        })
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StalkgenError;
    use crate::test_utils::ScriptedApi;
    use crate::volcengine::{Action, PollPolicy};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(api: Arc<ScriptedApi>) -> MemeService {
        MemeService::new(
            ImageClient::new(api, PollPolicy::new(Duration::from_secs(2), 5)),
            GenerationLimits::default(),
            NftMetadataConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_builds_metadata() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(json!({"code": 10000, "data": {"task_id": "T1"}})),
            Ok(json!({"code": 10000, "data": {"status": "done", "binary_data_base64": ["AAA="]}})),
        ]));
        let meme = service(api)
            .generate(
                &GenerationRequest::new("a cat wearing sunglasses on a beach").with_size("1024x1024"),
                &RequestLog::new("test"),
            )
            .await
            .unwrap();

        assert_eq!(meme.task_id, "T1");
        assert_eq!(meme.image_url, "data:image/jpeg;base64,AAA=");
        assert_eq!(meme.metadata.image, meme.image_url);
        assert_eq!(meme.prompt, "a cat wearing sunglasses on a beach");
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let api = Arc::new(ScriptedApi::new(vec![]));
        let err = service(api.clone())
            .generate(
                &GenerationRequest::new("cat").with_size("8192x8192"),
                &RequestLog::new("test"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StalkgenError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_shape_surfaces_distinctly() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(json!({"code": 10000, "data": {"task_id": "T1"}})),
            Ok(json!({"code": 10000, "data": {"status": "done", "images": []}})),
        ]));
        let err = service(api.clone())
            .generate(&GenerationRequest::new("cat"), &RequestLog::new("test"))
            .await
            .unwrap_err();

        assert!(matches!(err, StalkgenError::UnrecognizedResponseShape(_)));
        assert_eq!(api.calls(), vec![Action::SubmitTask, Action::GetResult]);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "a".repeat(100);
        assert_eq!(preview(&long).len(), 63);
    }
}
