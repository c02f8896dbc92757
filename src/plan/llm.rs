//! Generative-AI Boundary
//!
//! One completion client serves both the Study-Plan and Career-Plan flows;
//! each flow supplies its own prompt and decodes the reply into its own
//! shape. The client performs a single bounded request per call and never
//! retries; retry is the caller's decision.
//!
//! Failure handling differs by flow: study-plan generation surfaces AI
//! failures to the caller, career-plan generation absorbs them into the
//! deterministic fallback generator.

use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::plan::context::AssessmentContext;
use crate::plan::fallback;
use crate::plan::prompt::{self, strip_markdown_fence};
use crate::plan::types::{AiCareerPlanResponse, AiStudyPlanResponse};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Fixed sampling temperature for plan generation.
const TEMPERATURE: f32 = 0.4;
const MAX_OUTPUT_TOKENS: u32 = 8192;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const CAREER_SYSTEM_PROMPT: &str = "\
You are a career-plan generator for university students. Respond with a
single JSON object and nothing else, shaped as:
{
  \"title\": string,
  \"summary\": string,
  \"timelineMonths\": number,
  \"steps\": [
    { \"name\": string, \"description\": string, \"skills\": [string] }
  ]
}
Use exactly 4 steps and 12 to 16 skills in total across them.";

// ============================================================
// CONFIG & CLIENT
// ============================================================

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn from_env() -> CoreResult<Self> {
        let api_url = std::env::var("MENTORA_AI_URL").map_err(|_| {
            CoreError::AiUnavailable("MENTORA_AI_URL is not configured".to_string())
        })?;
        let api_key = std::env::var("MENTORA_AI_KEY").map_err(|_| {
            CoreError::AiUnavailable("MENTORA_AI_KEY is not configured".to_string())
        })?;
        Ok(Self { api_url, api_key, timeout_secs: DEFAULT_TIMEOUT_SECS })
    }
}

/// HTTP transport for the generative-AI endpoint.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("api_url", &self.config.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CoreError::AiUnavailable(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    /// Send one completion request and return the first candidate's first
    /// text part.
    pub async fn complete(&self, system: &str, user: &str) -> CoreResult<String> {
        let request = ApiRequest {
            system_instruction: Content::text(system),
            contents: vec![Content::user(user)],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::AiUnavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_error_message(&body)
                .unwrap_or_else(|| format!("provider returned status {}", status.as_u16()));
            return Err(CoreError::AiUnavailable(message));
        }

        let envelope: ApiResponse = serde_json::from_str(&body).map_err(|e| {
            CoreError::AiUnavailable(format!("unreadable provider envelope: {}", e))
        })?;

        envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(CoreError::AiResponseEmpty)
    }
}

// ============================================================
// WIRE TYPES
// ============================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self { role: None, parts: vec![Part { text: text.to_string() }] }
    }

    fn user(text: &str) -> Self {
        Self { role: Some("user".to_string()), parts: vec![Part { text: text.to_string() }] }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok()?;
    parsed
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(ToOwned::to_owned)
}

// ============================================================
// STUDY-PLAN FLOW
// ============================================================

/// Outcome of decoding the model's study-plan reply. Shape violations are
/// carried as warnings, not failures: an incomplete plan is still persisted
/// so the user's wait is never wasted.
#[derive(Debug, Clone)]
pub struct StudyPlanGeneration {
    pub response: AiStudyPlanResponse,
    pub warnings: Vec<String>,
}

/// Generate a study plan. AI failures surface to the caller; the caller
/// decides whether to retry.
pub async fn generate_study_plan(
    client: &LlmClient,
    context: &AssessmentContext,
    additional_instructions: Option<&str>,
) -> CoreResult<StudyPlanGeneration> {
    let user_prompt = prompt::build_prompt(context, additional_instructions);
    let raw = client.complete(prompt::system_prompt(), &user_prompt).await?;

    let mut warnings = Vec::new();
    if let Err(violation) = prompt::validate_response(&raw) {
        warn!("study plan reply failed shape validation: {}", violation);
        warnings.push(violation);
    }

    let response: AiStudyPlanResponse = serde_json::from_str(strip_markdown_fence(&raw))
        .map_err(|e| CoreError::AiResponseMalformed(e.to_string()))?;

    info!(
        "study plan generated: {} steps, {} skills, {} warnings",
        response.steps.len(),
        response.required_skills.len(),
        warnings.len()
    );
    Ok(StudyPlanGeneration { response, warnings })
}

// ============================================================
// CAREER-PLAN FLOW
// ============================================================

/// Generate a career plan, degrading to the deterministic fallback when
/// the AI is unreachable or replies with an unusable shape. Returns the
/// plan document and its source marker ("ai" or "fallback").
pub async fn generate_career_plan(
    client: &LlmClient,
    context: &AssessmentContext,
) -> (AiCareerPlanResponse, &'static str) {
    let user_prompt = prompt::build_prompt(context, None);

    let attempt: CoreResult<AiCareerPlanResponse> = match client
        .complete(CAREER_SYSTEM_PROMPT, &user_prompt)
        .await
    {
        Ok(raw) => serde_json::from_str(strip_markdown_fence(&raw))
            .map_err(|e| CoreError::AiResponseMalformed(e.to_string()))
            .and_then(|plan: AiCareerPlanResponse| {
                if plan.title.trim().is_empty() || plan.steps.is_empty() {
                    Err(CoreError::AiResponseMalformed(
                        "career plan reply missing title or steps".to_string(),
                    ))
                } else {
                    Ok(plan)
                }
            }),
        Err(e) => Err(e),
    };

    match attempt {
        Ok(plan) => (plan, "ai"),
        Err(e) => {
            warn!("career plan AI path failed, using fallback: {}", e);
            (fallback::generate_career_plan(context), "fallback")
        }
    }
}
