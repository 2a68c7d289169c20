//! Chat endpoint
//!
//! POST /chat - relay a user message to the completion API, or to the image
//! pipeline when the message starts with an image trigger phrase.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{error_response, AppState};
use crate::conversation::ChatMessage;

/// Prefixes (case-insensitive) that route a message to image generation
pub const IMAGE_TRIGGERS: [&str; 3] = ["create an image", "imagine", "generate an image"];

const VALIDATION_ERROR: &str = "No user message or user ID provided";
const INTERNAL_ERROR: &str = "Internal server error";

/// Shown instead of an image when generation fails at any stage
const IMAGE_FAILURE_MARKUP: &str = "<div class='error'>Oops! Something went wrong. <br> Please try again, and if the issue persists, feel free to reach out to us for support. Join our Discord community at <a href=\"https://dsc.gg/devevil\">https://dsc.gg/devevil</a> to report the problem, and we'll get it sorted out as soon as possible!</div>";

/// Build chat router
pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

/// Chat request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub user_message: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// User identifiers arrive as JSON strings or numbers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Text(String),
    Number(serde_json::Number),
}

impl ChatRequest {
    /// Both fields present and non-empty, as `(message, user_id)`
    fn validate(self) -> Option<(String, String)> {
        let message = self.user_message.filter(|m| !m.is_empty())?;
        let user_id = match self.user_id? {
            UserId::Text(id) => id,
            UserId::Number(n) => n.to_string(),
        };
        if user_id.is_empty() {
            return None;
        }
        Some((message, user_id))
    }
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub bot_response: String,
}

/// Image prompt carried by `message`, if it starts with a trigger phrase
///
/// The trigger is stripped and the remainder trimmed.
pub fn image_prompt(message: &str) -> Option<&str> {
    IMAGE_TRIGGERS.iter().find_map(|trigger| {
        let head = message.as_bytes().get(..trigger.len())?;
        // An ASCII match guarantees `trigger.len()` is a char boundary
        head.eq_ignore_ascii_case(trigger.as_bytes())
            .then(|| message[trigger.len()..].trim())
    })
}

/// Markup embedding a generated image
pub fn image_markup(url: &str) -> String {
    format!(
        "<img class=\"ai-image\" src=\"{}\" alt=\"Generated Image\" />",
        url
    )
}

/// Handle a chat message
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected chat body: {}", rejection);
            ChatRequest::default()
        }
    };

    let Some((user_message, user_id)) = request.validate() else {
        return error_response(StatusCode::BAD_REQUEST, VALIDATION_ERROR);
    };

    // Held until the assistant reply is stored
    let _guard = state.locks.lock(&user_id).await;

    if state.conversations.ensure(&user_id) {
        info!("Started conversation for user {}", user_id);
    }
    state
        .conversations
        .append(&user_id, ChatMessage::user(&user_message));

    let bot_response = match image_prompt(&user_message) {
        Some(prompt) => {
            info!("Image request from user {}: {:?}", user_id, prompt);
            match state.images.generate_image(prompt, &user_id).await {
                Ok(url) => image_markup(&url),
                Err(_) => IMAGE_FAILURE_MARKUP.to_string(),
            }
        }
        None => {
            let history = state.conversations.history(&user_id);
            match state.completion.complete(&history).await {
                Ok(text) => text,
                Err(e) => {
                    error!("Error communicating with completion API: {}", e);
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
                }
            }
        }
    };

    state
        .conversations
        .append(&user_id, ChatMessage::assistant(&bot_response));

    (StatusCode::OK, Json(ChatResponse { bot_response })).into_response()
}
