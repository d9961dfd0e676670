//! REST client for the Gemini `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use folio_core::config::GenerationConfig;
use folio_core::domain::chat::ProjectedTurn;

use crate::llm::{GenerationClient, GenerationError, GenerationRequest};
use crate::safety::SafetySettings;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the candidate was withheld rather than completed.
const BLOCKING_FINISH_REASONS: &[&str] =
    &["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII", "RECITATION"];

pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl GeminiClient {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_ref().ok_or(GenerationError::MissingCredential)?;
        let body = GenerateContentBody::from_request(&request);

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(GenerationError::Upstream { status: status.as_u16(), message });
        }

        let payload: GenerateContentResponse =
            response.json().await.map_err(|e| GenerationError::Decode(e.to_string()))?;

        interpret(payload)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    safety_settings: &'a SafetySettings,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let mut contents: Vec<Content<'a>> = request.turns.iter().map(Content::from_turn).collect();
        contents.push(Content { role: Some("user"), parts: [Part { text: &request.message }] });

        Self {
            system_instruction: Content {
                role: None,
                parts: [Part { text: &request.system_instruction }],
            },
            contents,
            safety_settings: &request.safety,
        }
    }
}

impl<'a> Content<'a> {
    fn from_turn(turn: &'a ProjectedTurn) -> Self {
        Self { role: Some(turn.role.as_str()), parts: [Part { text: &turn.text }] }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn interpret(payload: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(reason) = payload.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        return Err(GenerationError::Blocked { reason });
    }

    let candidate = payload.candidates.into_iter().next().ok_or(GenerationError::EmptyResponse)?;

    if let Some(reason) = candidate.finish_reason {
        if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
            return Err(GenerationError::Blocked { reason });
        }
    }

    // A candidate without text parts is an empty reply, not a failure.
    Ok(candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default())
}
