use actix_cors::Cors;
use actix_web::{
    error::JsonPayloadError, http::StatusCode, web, HttpRequest, HttpResponse, Responder,
};
use chrono::Utc;

use crate::{
    config::{Config, Environment},
    error::StalkgenError,
    logger::RequestLog,
    models::{ErrorResponse, GenerateMemeResponse, GenerationRequest, HealthResponse},
    service::MemeService,
};

const GENERATION_FAILED: &str = "Failed to generate meme";
const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub service: MemeService,
    pub environment: Environment,
}

impl AppState {
    pub fn new(service: MemeService, environment: Environment) -> Self {
        Self {
            service,
            environment,
        }
    }
}

/// Maps an error onto the status code and envelope the caller sees. The
/// `details` text tells a transient outage apart from misconfiguration.
pub fn error_response(err: &StalkgenError) -> (StatusCode, ErrorResponse) {
    let (status, error, details) = match err {
        StalkgenError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            "Invalid request parameters",
            msg.clone(),
        ),
        StalkgenError::MissingCredentials(_) => (
            StatusCode::UNAUTHORIZED,
            "Image provider is misconfigured",
            "The server is missing its Volcengine access key or secret key".to_string(),
        ),
        StalkgenError::TaskFailed { message, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            message.clone(),
        ),
        StalkgenError::Timeout { attempts, .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            GENERATION_FAILED,
            format!(
                "Image generation timed out after {} status checks, please try again",
                attempts
            ),
        ),
        StalkgenError::Network(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            "Image provider is temporarily unavailable, please try again shortly".to_string(),
        ),
        StalkgenError::ProviderRejected { message, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            format!("Image provider rejected the request: {}", message),
        ),
        StalkgenError::MalformedResponse(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            "Image provider returned an unreadable response".to_string(),
        ),
        StalkgenError::UnrecognizedResponseShape(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            "Image provider returned a response in an unrecognized format".to_string(),
        ),
        StalkgenError::InvalidTaskId(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            "Image provider lost track of the generation task".to_string(),
        ),
        StalkgenError::RequestSetup(_)
        | StalkgenError::Config(_)
        | StalkgenError::Serialization(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERATION_FAILED,
            "Internal error while preparing the provider request".to_string(),
        ),
    };

    (
        status,
        ErrorResponse {
            error: error.to_string(),
            details,
            retryable: err.is_transient(),
        },
    )
}

pub async fn generate_meme(
    state: web::Data<AppState>,
    body: web::Json<GenerationRequest>,
) -> HttpResponse {
    let request_log = RequestLog::new("generate-meme");

    match state.service.generate(&body, &request_log).await {
        Ok(meme) => HttpResponse::Ok().json(GenerateMemeResponse {
            success: true,
            image_url: meme.image_url,
            prompt: meme.prompt,
            metadata: meme.metadata,
        }),
        Err(err) => {
            let (status, envelope) = error_response(&err);
            if status.is_client_error() {
                request_log.warn(&format!("Rejected: {}", err));
            } else {
                request_log.error(&format!("Generation failed: {}", err));
            }
            HttpResponse::build(status).json(envelope)
        }
    }
}

pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        environment: state.environment.as_str().to_string(),
    })
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "Endpoint not found" }))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let envelope = ErrorResponse {
        error: "Invalid request parameters".to_string(),
        details: err.to_string(),
        retryable: false,
    };
    actix_web::error::InternalError::from_response(err, HttpResponse::BadRequest().json(envelope))
        .into()
}

/// Registers every route. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(json_error_handler),
    )
    .route("/api/health", web::get().to(health))
    .route("/api/generate-meme", web::post().to(generate_meme))
    .default_service(web::route().to(not_found));
}

pub fn build_cors(config: &Config) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if config.environment.is_development() {
        return cors.allow_any_origin();
    }

    config
        .allowed_origins
        .iter()
        .fold(cors.supports_credentials(), |cors, origin| {
            cors.allowed_origin(origin)
        })
}
