use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::banner::codec::{EncodedImage, ANALYSIS_MIME_TYPE};
use crate::banner::VisionBackend;
use crate::config::CONFIG;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiGenerationSettings {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
    pub safety_profile: String,
}

impl GeminiGenerationSettings {
    pub fn from_config() -> Self {
        Self {
            temperature: CONFIG.gemini_temperature,
            top_k: CONFIG.gemini_top_k,
            top_p: CONFIG.gemini_top_p,
            max_output_tokens: CONFIG.gemini_max_output_tokens,
            safety_profile: CONFIG.gemini_safety_settings.clone(),
        }
    }
}

/// Gemini `generateContent` client used for banner analysis.
#[derive(Debug, Clone)]
pub struct GeminiVisionClient {
    api_key: String,
    api_base: String,
    model: String,
    timeout: Duration,
    settings: GeminiGenerationSettings,
}

/// Picks the session key when one was supplied, otherwise the configured key.
pub fn resolve_api_key(session_key: Option<&str>, configured_key: &str) -> Option<String> {
    session_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or_else(|| Some(configured_key.trim()).filter(|key| !key.is_empty()))
        .map(str::to_string)
}

impl GeminiVisionClient {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        timeout: Duration,
        settings: GeminiGenerationSettings,
    ) -> Self {
        Self {
            api_key,
            api_base,
            model,
            timeout,
            settings,
        }
    }

    pub fn from_config(session_key: Option<&str>) -> Result<Self> {
        let api_key = resolve_api_key(session_key, &CONFIG.gemini_api_key).ok_or_else(|| {
            anyhow!("No Gemini API key available. Set GEMINI_API_KEY or send /apikey <key>.")
        })?;
        Ok(Self::new(
            api_key,
            CONFIG.gemini_api_base.clone(),
            CONFIG.gemini_model.clone(),
            Duration::from_secs(CONFIG.gemini_timeout_secs),
            GeminiGenerationSettings::from_config(),
        ))
    }

    fn redact(&self, text: &str) -> String {
        redact_api_key(text, &self.api_key)
    }

    async fn generate_content(&self, payload: Value) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = %self.model, payload = %payload_summary);
        }

        let response = match client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| anyhow!("Failed to read Gemini response: {}", self.redact(&err.to_string())))?;

        if !status.is_success() {
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = self.redact(&message.unwrap_or(body_summary));
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        let value = serde_json::from_str::<GeminiResponse>(&body).map_err(|err| {
            anyhow!(
                "Gemini returned an unreadable response: {} ({})",
                err,
                truncate_for_log(&body, 200)
            )
        })?;
        if let Some(reason) = value
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            warn!(model = %self.model, "Gemini blocked the prompt: {}", reason);
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = %self.model, response = %response_summary);
        }
        Ok(value)
    }
}

impl VisionBackend for GeminiVisionClient {
    fn describe_image(
        &self,
        instruction: &str,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<String>> + Send {
        let payload = build_vision_payload(instruction, image, &self.settings);
        let metadata = json!({ "width": image.width(), "height": image.height() });
        async move {
            log_llm_timing(
                "gemini",
                &self.model,
                "analyze_banner",
                Some(metadata),
                move || async move {
                    let response = self.generate_content(payload).await?;
                    Ok(extract_text_from_response(response))
                },
            )
            .await
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn redact_api_key(text: &str, key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ]
    .into_iter()
    .map(|category| json!({ "category": category, "threshold": threshold }))
    .collect()
}

fn build_vision_payload(
    instruction: &str,
    image: &EncodedImage,
    settings: &GeminiGenerationSettings,
) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": instruction },
                {
                    "inlineData": {
                        "mimeType": ANALYSIS_MIME_TYPE,
                        "data": image.to_base64()
                    }
                }
            ]
        }],
        "generationConfig": {
            "temperature": settings.temperature,
            "topK": settings.top_k,
            "topP": settings.top_p,
            "maxOutputTokens": settings.max_output_tokens,
        },
        "safetySettings": build_safety_settings(&settings.safety_profile),
    })
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(parts) = payload
        .pointer("/contents/0/parts")
        .and_then(|value| value.as_array())
    {
        let summarized: Vec<Value> = parts
            .iter()
            .map(|part| {
                if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                    json!({ "text": truncate_for_log(text, 200) })
                } else if let Some(inline_data) = part.get("inlineData") {
                    let mime_type = inline_data
                        .get("mimeType")
                        .and_then(|value| value.as_str())
                        .unwrap_or("unknown");
                    let data_len = inline_data
                        .get("data")
                        .and_then(|value| value.as_str())
                        .map(|value| value.len())
                        .unwrap_or(0);
                    json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
                } else {
                    json!({ "unknownPart": true })
                }
            })
            .collect();
        summary.insert("parts".to_string(), Value::Array(summarized));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    let finish_reasons: Vec<&str> = candidates
        .iter()
        .filter_map(|candidate| candidate.finish_reason.as_deref())
        .collect();
    let text_preview = candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .filter_map(|content| content.parts.as_ref())
        .flatten()
        .filter_map(|part| part.text.as_deref())
        .find(|text| !text.trim().is_empty())
        .map(|text| truncate_for_log(text, 200));

    json!({
        "candidates": candidates.len(),
        "finishReasons": finish_reasons,
        "textPreview": text_preview
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        let parts = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.text {
                if !text.trim().is_empty() {
                    text_parts.push(text);
                }
            }
        }
    }
    text_parts.join("\n")
}
