use crate::config::{
    ConfigStore, Endpoint, FileConfig, LANGUAGES, PROVIDERS, canonical_language, validate_api_key,
    validate_model,
};
use crate::error::CommitError;
use crate::interact::Prompter;
use anyhow::Result;

const CUSTOM_ENDPOINT: &str = "Custom URL";

/// Answers collected by a completed setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupAnswers {
    pub endpoint: Endpoint,
    pub model: String,
    pub api_key: String,
    pub language: String,
}

/// Ask for endpoint, model, key and language, then persist all four.
///
/// Invalid answers are asked again until valid. Backing out of any step returns
/// [`CommitError::Cancelled`] and leaves the stored config untouched.
pub fn run_setup(prompter: &mut dyn Prompter, store: &ConfigStore) -> Result<SetupAnswers> {
    let mut file_cfg = store.load()?;
    let answers = ask(prompter, &file_cfg)?;

    file_cfg.endpoint = Some(answers.endpoint.as_setting().to_string());
    file_cfg.model = Some(answers.model.clone());
    file_cfg.api_key = Some(answers.api_key.clone());
    file_cfg.language = Some(answers.language.clone());
    store.save(&file_cfg)?;

    log::info!(
        "Saved endpoint={}, model={}, language={}",
        answers.endpoint.as_setting(),
        answers.model,
        answers.language
    );
    Ok(answers)
}

fn ask(prompter: &mut dyn Prompter, current: &FileConfig) -> Result<SetupAnswers> {
    let endpoint = ask_endpoint(prompter, current)?;

    let model = prompter
        .input("Model name", &validate_model)?
        .ok_or(CommitError::Cancelled)?;

    let key_prompt = format!("API key (starts with \"{}\")", endpoint.key_prefix());
    let api_key = prompter
        .input(&key_prompt, &|key: &str| validate_api_key(&endpoint, key))?
        .ok_or(CommitError::Cancelled)?;

    let default_lang = current
        .language
        .as_deref()
        .and_then(canonical_language)
        .and_then(|l| LANGUAGES.iter().position(|x| *x == l))
        .unwrap_or(0);
    let lang_idx = prompter
        .select("Commit message language", LANGUAGES, default_lang)?
        .ok_or(CommitError::Cancelled)?;

    Ok(SetupAnswers {
        endpoint,
        model,
        api_key,
        language: LANGUAGES[lang_idx].to_string(),
    })
}

fn ask_endpoint(prompter: &mut dyn Prompter, current: &FileConfig) -> Result<Endpoint> {
    let mut items: Vec<&str> = PROVIDERS.iter().map(|p| p.name).collect();
    items.push(CUSTOM_ENDPOINT);

    let default = match current.endpoint.as_deref().map(Endpoint::resolve) {
        Some(Endpoint::Provider(p)) => PROVIDERS.iter().position(|x| x == p).unwrap_or(0),
        Some(Endpoint::Custom(_)) => PROVIDERS.len(),
        None => 0,
    };

    let idx = prompter
        .select("API endpoint", &items, default)?
        .ok_or(CommitError::Cancelled)?;

    if let Some(provider) = PROVIDERS.get(idx) {
        return Ok(Endpoint::Provider(provider));
    }

    let url = prompter
        .input("Endpoint base URL", &|url: &str| {
            if url.starts_with("http") {
                Ok(())
            } else {
                Err("The URL must start with http".to_string())
            }
        })?
        .ok_or(CommitError::Cancelled)?;

    Ok(Endpoint::resolve(&url))
}
