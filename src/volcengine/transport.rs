use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode, Url};
use serde_json::Value;

use crate::{
    config::VolcengineConfig,
    error::{Result, StalkgenError},
    models::provider::Envelope,
    volcengine::signer::{Credentials, RequestSigner, SignableRequest},
};

/// API version pinned in every query string.
pub const API_VERSION: &str = "2022-08-31";

const JSON_CONTENT_TYPE: &str = "application/json";
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SubmitTask,
    GetResult,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SubmitTask => "CVSync2AsyncSubmitTask",
            Action::GetResult => "CVSync2AsyncGetResult",
        }
    }
}

/// One signed JSON call against the visual API, returning the decoded body.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn call(&self, action: Action, body: &Value) -> Result<Value>;
}

pub struct HttpTaskApi {
    client: Client,
    endpoint: Url,
    access_key: Option<String>,
    secret_key: Option<String>,
    region: String,
    service: String,
}

impl HttpTaskApi {
    pub fn new(config: &VolcengineConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            StalkgenError::Config(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StalkgenError::RequestSetup(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
            service: config.service.clone(),
        })
    }

    /// Builds the signed request. Credentials are checked here rather than at
    /// construction so the server can boot without them.
    pub fn build_request(
        &self,
        action: Action,
        body: &Value,
        now: DateTime<Utc>,
    ) -> Result<reqwest::Request> {
        let credentials =
            Credentials::new(self.access_key.as_deref(), self.secret_key.as_deref())?;
        let signer = RequestSigner::new(credentials, &self.region, &self.service);

        let query = vec![
            ("Action".to_string(), action.as_str().to_string()),
            ("Version".to_string(), API_VERSION.to_string()),
        ];
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(query.iter());

        let host = url
            .host_str()
            .ok_or_else(|| StalkgenError::RequestSetup("Endpoint has no host".into()))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let payload = serde_json::to_vec(body)?;
        let signed = signer.sign(
            &SignableRequest {
                method: "POST",
                host: &host,
                path: url.path(),
                query: &query,
                content_type: JSON_CONTENT_TYPE,
                body: &payload,
            },
            now,
        )?;

        let mut builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        for (name, value) in signed.pairs() {
            builder = builder.header(name, value);
        }

        builder
            .body(payload)
            .build()
            .map_err(|e| StalkgenError::RequestSetup(e.to_string()))
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn call(&self, action: Action, body: &Value) -> Result<Value> {
        let request = self.build_request(action, body, Utc::now())?;

        log::debug!("Calling Volcengine {}", action.as_str());

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_builder() {
                StalkgenError::RequestSetup(e.to_string())
            } else {
                StalkgenError::Network(format!(
                    "No response received from Volcengine API ({}): {}",
                    action.as_str(),
                    e
                ))
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            StalkgenError::Network(format!("Failed to read Volcengine response body: {}", e))
        })?;
        read_response(action, status, &text)
    }
}

/// Turns an HTTP status and body into the decoded envelope or an error. A
/// non-2xx with a JSON body is a structured rejection; a body that does not
/// parse is malformed whatever the status.
pub(crate) fn read_response(action: Action, status: StatusCode, text: &str) -> Result<Value> {
    let parsed = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => {
            return Err(StalkgenError::MalformedResponse(format!(
                "HTTP {} from {} with unparseable body: {}",
                status.as_u16(),
                action.as_str(),
                truncate(text)
            )))
        }
    };

    if status.is_success() {
        return Ok(parsed);
    }

    let envelope = Envelope(&parsed);
    let message = envelope
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| truncate(text));
    log::warn!(
        "Volcengine {} returned HTTP {}: {}",
        action.as_str(),
        status.as_u16(),
        message
    );
    Err(StalkgenError::ProviderRejected {
        status: Some(status.as_u16()),
        code: envelope.code(),
        message,
    })
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    fn api(config: VolcengineConfig) -> HttpTaskApi {
        HttpTaskApi::new(&config).unwrap()
    }

    #[test]
    fn test_build_request_signs_and_adds_query() {
        let api = api(VolcengineConfig::new().with_credentials("AKLTtest", "secret"));
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let request = api
            .build_request(Action::SubmitTask, &json!({"prompt": "cat"}), now)
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://visual.volcengineapi.com/?Action=CVSync2AsyncSubmitTask&Version=2022-08-31"
        );

        let headers = request.headers();
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["x-date"], "20240506T070809Z");
        let authorization = headers["authorization"].to_str().unwrap();
        assert!(authorization
            .starts_with("HMAC-SHA256 Credential=AKLTtest/20240506/cn-north-1/cv/request"));
        assert!(!authorization.contains("secret"));
    }

    #[test]
    fn test_build_request_requires_credentials() {
        let api = api(VolcengineConfig::new());
        let err = api
            .build_request(Action::GetResult, &json!({}), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StalkgenError::MissingCredentials(_)));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let result = HttpTaskApi::new(&VolcengineConfig::new().with_endpoint("not a url"));
        assert!(matches!(result, Err(StalkgenError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let api = api(
            VolcengineConfig::new()
                .with_credentials("ak", "sk")
                .with_endpoint("http://127.0.0.1:1/")
                .with_timeout(Duration::from_secs(2)),
        );
        let err = api.call(Action::GetResult, &json!({})).await.unwrap_err();
        assert!(matches!(err, StalkgenError::Network(_)), "{:?}", err);
    }

    #[test]
    fn test_error_status_with_envelope_is_rejection() {
        let body = r#"{"code": 50411, "message": "Post Img Risk Not Pass", "request_id": "r1"}"#;
        match read_response(Action::GetResult, StatusCode::BAD_REQUEST, body).unwrap_err() {
            StalkgenError::ProviderRejected {
                status,
                code,
                message,
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(code, Some(50411));
                assert_eq!(message, "Post Img Risk Not Pass");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_body_is_malformed() {
        for status in [StatusCode::OK, StatusCode::BAD_GATEWAY] {
            let err = read_response(Action::GetResult, status, "<html>oops</html>").unwrap_err();
            assert!(matches!(err, StalkgenError::MalformedResponse(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_success_status_returns_body() {
        let value = read_response(Action::SubmitTask, StatusCode::OK, r#"{"code": 10000}"#).unwrap();
        assert_eq!(value["code"], 10000);
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let cut = truncate(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), MAX_ERROR_BODY_CHARS + 3);
    }
}
