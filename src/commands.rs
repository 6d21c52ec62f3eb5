//! Caller-facing request surfaces.
//!
//! Each handler takes a raw JSON body and always answers with a status and a
//! JSON body; core errors never escape as anything but a status and a
//! message.

use crate::config::Config;
use crate::engine::{ChatError, ChatOrchestrator, ChatTurn};
use crate::errors::ErrorClass;
use crate::llm::{BackendError, GeminiBackend, GenerativeBackend, ModelGateway};
use crate::preprocessing::{Cleaner, CleanerError, EnvironmentContext};
use crate::protocol::Classification;
use crate::recommendation::{CropRecommendations, RecommendationError, RecommendationPipeline};
use crate::transcript::{decode_history, Entry};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info};

const CHAT_APOLOGY: &str = "Failed to get response from AI service.";
const RECOMMENDATION_APOLOGY: &str = "An unexpected internal server error occurred.";

/// Everything the handlers need, shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatOrchestrator,
    pub recommendations: RecommendationPipeline,
}

impl AppState {
    pub fn new(config: Arc<Config>, backend: Arc<dyn GenerativeBackend>) -> Self {
        let gateway = ModelGateway::new(backend);
        Self {
            recommendations: RecommendationPipeline::from_config(gateway.clone(), &config),
            chat: ChatOrchestrator::new(gateway, config),
        }
    }

    /// State backed by the REST backend described in `config`.
    pub fn from_config(config: Arc<Config>) -> Result<Self, BackendError> {
        let backend = GeminiBackend::new(&config.backend)?;
        Ok(Self::new(config, Arc::new(backend)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    fn ok(body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
            },
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize response.")
            }
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, message)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    history: Option<Value>,
    #[serde(default, alias = "use_pro_model")]
    use_paid_tier: bool,
    #[serde(default)]
    location: Option<Value>,
    #[serde(default)]
    npk: Option<Value>,
    #[serde(default)]
    date: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    response: String,
    history: Vec<Entry>,
    classification: Option<Classification>,
    visuals_data: Option<Map<String, Value>>,
    input_tokens: u64,
    output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    visuals_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visuals_output_tokens: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationRequest {
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationResponse {
    recommendations: CropRecommendations,
    input_tokens: u64,
    output_tokens: u64,
}

/// Text for an optional context field. Falsy values count as absent.
fn render_field(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) => Some(text),
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Renders an NPK reading given as text, a number or a `{N, P, K}` object.
fn render_npk(value: Value) -> Option<String> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            let nutrient = |key: &str| {
                map.iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| match value {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
            };
            match (nutrient("N"), nutrient("P"), nutrient("K")) {
                (Some(n), Some(p), Some(k)) => Some(format!("N:{},P:{},K:{}", n, p, k)),
                _ => Some(Value::Object(map.clone()).to_string()),
            }
        }
        other => render_field(other),
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: Value) -> Result<T, Reply> {
    if !body.is_object() {
        return Err(Reply::bad_request("Invalid request: No JSON body found"));
    }
    serde_json::from_value(body).map_err(|e| Reply::bad_request(format!("Invalid request: {}", e)))
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Configuration => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::Backend | ErrorClass::Format => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/* ---------- CHAT ---------- */

pub async fn handle_chat(state: &AppState, body: Value) -> Reply {
    let request: ChatRequest = match parse_body(body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };

    let message = match Cleaner::clean(request.message.as_deref().unwrap_or_default()) {
        Ok(message) => message,
        Err(CleanerError::EmptyInput) => {
            return Reply::bad_request("Invalid request: 'message' field is required")
        }
        Err(e) => return Reply::bad_request(format!("Invalid request: {}", e)),
    };

    let history = match request.history {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => decode_history(items),
        Some(_) => return Reply::bad_request("Invalid request: 'history' must be a list"),
    };

    let turn = ChatTurn {
        message,
        history,
        use_paid_tier: request.use_paid_tier,
        context: EnvironmentContext::new(
            request.location.and_then(render_field),
            request.npk.and_then(render_npk),
            request.date.and_then(render_field),
        ),
    };

    match state.chat.respond(turn).await {
        Ok(outcome) => Reply::ok(ChatResponse {
            response: outcome.response,
            history: outcome.history,
            classification: outcome.classification,
            visuals_data: outcome.visuals,
            input_tokens: outcome.usage.input_tokens,
            output_tokens: outcome.usage.output_tokens,
            visuals_input_tokens: outcome.visuals_usage.map(|usage| usage.input_tokens),
            visuals_output_tokens: outcome.visuals_usage.map(|usage| usage.output_tokens),
        }),
        Err(e) => chat_failure(e),
    }
}

fn chat_failure(e: ChatError) -> Reply {
    error!(error = %e, "Chat request failed");
    match e.class() {
        ErrorClass::Configuration => Reply::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "AI service not configured for this chat request.",
        ),
        class => Reply::error(status_for(class), CHAT_APOLOGY),
    }
}

/* ---------- RECOMMENDATIONS ---------- */

pub async fn handle_recommendation(state: &AppState, body: Value) -> Reply {
    let request: RecommendationRequest = match parse_body(body) {
        Ok(request) => request,
        Err(reply) => return reply,
    };

    let Some(location) = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|location| !location.is_empty())
    else {
        return Reply::bad_request("Invalid request: 'location' field (string) is required");
    };

    info!(location, "Received crop recommendation request");
    match state.recommendations.recommend(location).await {
        Ok(set) => Reply::ok(RecommendationResponse {
            recommendations: set.crops,
            input_tokens: set.usage.input_tokens,
            output_tokens: set.usage.output_tokens,
        }),
        Err(e) => recommendation_failure(e),
    }
}

fn recommendation_failure(e: RecommendationError) -> Reply {
    error!(error = %e, "Recommendation request failed");
    match e.class() {
        ErrorClass::Configuration => Reply::error(
            StatusCode::SERVICE_UNAVAILABLE,
            "AI recommendations service not configured.",
        ),
        class => Reply::error(status_for(class), RECOMMENDATION_APOLOGY),
    }
}
