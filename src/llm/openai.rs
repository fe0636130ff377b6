use super::{Completion, CompletionRequest, LlmClient, TokenUsage, truncate};
use crate::config::Endpoint;
use crate::error::CommitError;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

/// Substrings the OpenAI-compatible APIs use when a key is rejected.
const INVALID_KEY_MARKERS: &[&str] = &["Incorrect API key", "invalid_api_key"];

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Client for any OpenAI-compatible Chat Completions API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, endpoint: &Endpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .context("failed to build HTTP client")?;

        Ok(OpenAiClient {
            client,
            api_key,
            api_base_url: endpoint.base_url().trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url)
    }
}

impl LlmClient for OpenAiClient {
    fn endpoint(&self) -> &str {
        &self.api_base_url
    }

    fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let url = self.chat_url();

        log::trace!(
            "Chat request to {url}:\n{}",
            truncate(&serde_json::to_string_pretty(req).unwrap_or_default(), 3000)
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .map_err(|e| CommitError::RemoteApi(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        let text = resp.text().context("failed to read API response body")?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text).into());
        }

        parse_completion(&text)
    }
}

/// Map an unsuccessful HTTP response to the error the caller reacts to.
fn classify_failure(status: u16, body: &str) -> CommitError {
    let detail = api_error_message(body).unwrap_or_else(|| body.trim().to_string());

    if status == 401 || INVALID_KEY_MARKERS.iter().any(|m| body.contains(m)) {
        CommitError::InvalidCredential(detail)
    } else {
        CommitError::RemoteApi(format!("HTTP {status} - {detail}"))
    }
}

/// Pull `error.message` out of an OpenAI-style error body, if present.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

fn parse_completion(body: &str) -> Result<Completion> {
    let chat_resp: ChatResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;

    let text = chat_resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    let usage = chat_resp.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(Completion { text, usage })
}
