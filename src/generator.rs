use crate::config::Config;
use crate::error::CommitError;
use crate::llm::prompt_builder::commit_message_prompt;
use crate::llm::{CompletionRequest, LlmClient};
use anyhow::Result;

/// Turns a diff into a commit message with a single chat-completion call.
pub struct MessageGenerator<'a> {
    client: &'a dyn LlmClient,
    config: &'a Config,
}

impl<'a> MessageGenerator<'a> {
    pub fn new(client: &'a dyn LlmClient, config: &'a Config) -> Self {
        MessageGenerator { client, config }
    }

    /// Generate a commit message for `diff`. `delimiter` overrides the configured one.
    ///
    /// Fails with [`CommitError::NoMessageGenerated`] when the endpoint returns no text.
    pub fn generate(&self, diff: &str, delimiter: Option<&str>) -> Result<String> {
        let delimiter = delimiter.unwrap_or(self.config.delimiter.as_str());

        let req = CompletionRequest {
            model: self.config.model.clone(),
            messages: commit_message_prompt(diff, &self.config.language, delimiter),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        log::info!(
            "Requesting commit message: endpoint={}, model={}, language={}",
            self.client.endpoint(),
            req.model,
            self.config.language
        );
        log::debug!("Diff size: {} bytes", diff.len());

        let completion = self.client.complete(&req)?;

        if let Some(usage) = &completion.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        completion
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CommitError::NoMessageGenerated.into())
    }
}
