use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    error::{Result, StalkgenError},
    models::{provider::Envelope, GenerationParams, SubmittedTask},
    volcengine::{
        transport::{Action, TaskApi},
        REQ_KEY,
    },
};

/// Guidance scale recommended for the Jimeng 4.0 model.
const DEFAULT_SCALE: f64 = 0.5;

pub fn submit_body(params: &GenerationParams) -> Value {
    let mut body = json!({
        "req_key": REQ_KEY,
        "prompt": params.prompt,
        "width": params.width,
        "height": params.height,
        "force_single": params.image_count == 1,
        "scale": DEFAULT_SCALE,
    });
    if !params.negative_prompt.is_empty() {
        body["negative_prompt"] = json!(params.negative_prompt);
    }
    body
}

/// Sends one submit call. Every failure, including a network error, is
/// returned immediately: there is no task yet to retry against. An
/// unusable response body is reported as a provider rejection.
pub async fn submit_task<A>(api: &A, params: &GenerationParams) -> Result<SubmittedTask>
where
    A: TaskApi + ?Sized,
{
    let response = api
        .call(Action::SubmitTask, &submit_body(params))
        .await
        .map_err(|e| match e {
            StalkgenError::MalformedResponse(message) => StalkgenError::provider_rejected(message),
            other => other,
        })?;
    let envelope = Envelope(&response);

    if !envelope.is_success() {
        return Err(StalkgenError::ProviderRejected {
            status: None,
            code: envelope.code(),
            message: format!(
                "Failed to submit image generation task: {}",
                envelope.describe()
            ),
        });
    }

    let task_id = envelope.task_id().ok_or_else(|| {
        StalkgenError::provider_rejected(format!(
            "Submit response is missing data.task_id ({})",
            envelope.describe()
        ))
    })?;

    log::info!("Image generation task submitted with id {}", task_id);

    Ok(SubmittedTask {
        task_id: task_id.to_string(),
        submitted_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedApi;

    fn params() -> GenerationParams {
        GenerationParams {
            prompt: "a cat wearing sunglasses on a beach".to_string(),
            negative_prompt: String::new(),
            width: 1024,
            height: 1024,
            image_count: 1,
        }
    }

    #[test]
    fn test_submit_body_shape() {
        let body = submit_body(&params());
        assert_eq!(body["req_key"], "jimeng_t2i_v40");
        assert_eq!(body["width"], 1024);
        assert_eq!(body["force_single"], true);
        assert!(body.get("negative_prompt").is_none());

        let mut with_negative = params();
        with_negative.negative_prompt = "blurry".to_string();
        with_negative.image_count = 4;
        let body = submit_body(&with_negative);
        assert_eq!(body["negative_prompt"], "blurry");
        assert_eq!(body["force_single"], false);
    }

    #[tokio::test]
    async fn test_submit_returns_task_id() {
        let api = ScriptedApi::new(vec![Ok(json!({
            "code": 10000,
            "message": "Success",
            "data": {"task_id": "T1"}
        }))]);

        let task = submit_task(&api, &params()).await.unwrap();
        assert_eq!(task.task_id, "T1");
        assert_eq!(api.calls(), vec![Action::SubmitTask]);
    }

    #[tokio::test]
    async fn test_missing_task_id_is_provider_rejected() {
        let api = ScriptedApi::new(vec![Ok(json!({"code": 10000, "data": {}}))]);
        let err = submit_task(&api, &params()).await.unwrap_err();
        assert!(matches!(err, StalkgenError::ProviderRejected { .. }));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_non_success_code_is_provider_rejected() {
        let api = ScriptedApi::new(vec![Ok(json!({
            "code": 50429,
            "message": "Request Has Reached API Limit"
        }))]);
        match submit_task(&api, &params()).await.unwrap_err() {
            StalkgenError::ProviderRejected { code, message, .. } => {
                assert_eq!(code, Some(50429));
                assert!(message.contains("Request Has Reached API Limit"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_is_not_retried() {
        let api = ScriptedApi::new(vec![
            Err(StalkgenError::Network("connection refused".into())),
            Ok(json!({"code": 10000, "data": {"task_id": "T1"}})),
        ]);
        let err = submit_task(&api, &params()).await.unwrap_err();
        assert!(matches!(err, StalkgenError::Network(_)));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_response_is_provider_rejected() {
        let api = ScriptedApi::new(vec![Err(StalkgenError::MalformedResponse(
            "<html>bad gateway</html>".into(),
        ))]);
        match submit_task(&api, &params()).await.unwrap_err() {
            StalkgenError::ProviderRejected { message, .. } => {
                assert!(message.contains("bad gateway"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(api.call_count(), 1);
    }
}
