use crate::config::Config;
use crate::error::CommitError;
use crate::llm::LlmClient;
use crate::llm::openai::OpenAiClient;
use anyhow::Result;
use log::debug;

/// Build the LLM client for the resolved config.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    let key = cfg.api_key.clone().ok_or(CommitError::MissingCredential)?;

    debug!(
        "Using OpenAiClient against {} with model: {}",
        cfg.endpoint.base_url(),
        cfg.model
    );

    Ok(Box::new(OpenAiClient::new(key, &cfg.endpoint)?))
}
