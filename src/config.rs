use crate::Cli;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_DELIMITER: &str = "* ";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// Key prefix required for custom endpoints and any provider without its own.
pub const DEFAULT_KEY_PREFIX: &str = "sk-";

/// Languages offered by the setup wizard.
pub const LANGUAGES: &[&str] = &[
    "English",
    "Simplified Chinese",
    "Traditional Chinese",
    "Japanese",
    "Korean",
    "Czech",
    "German",
    "French",
    "Italian",
    "Dutch",
    "Portuguese",
    "Vietnamese",
    "Spanish",
    "Swedish",
    "Russian",
    "Bahasa",
    "Polish",
    "Turkish",
    "Thai",
];

/// A named chat-completion provider.
#[derive(Debug, PartialEq, Eq)]
pub struct Provider {
    pub name: &'static str,
    pub base_url: &'static str,
    pub key_prefix: &'static str,
}

/// Known providers. The first entry is the default.
pub const PROVIDERS: &[Provider] = &[
    Provider {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        key_prefix: "sk-",
    },
    Provider {
        name: "perplexity",
        base_url: "https://api.perplexity.ai",
        key_prefix: "pplx-",
    },
];

/// Where chat-completion requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Provider(&'static Provider),
    Custom(String),
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Provider(&PROVIDERS[0])
    }
}

impl Endpoint {
    fn lookup(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(p) = PROVIDERS.iter().find(|p| p.name.eq_ignore_ascii_case(value)) {
            return Some(Endpoint::Provider(p));
        }
        if value.starts_with("http") {
            return Some(Endpoint::Custom(value.trim_end_matches('/').to_string()));
        }
        None
    }

    /// Map a stored setting to an endpoint. Unknown values fall back to the default provider.
    pub fn resolve(value: &str) -> Self {
        Self::lookup(value).unwrap_or_else(|| {
            log::warn!("Unknown endpoint {value:?}, using {}", PROVIDERS[0].name);
            Endpoint::default()
        })
    }

    pub fn base_url(&self) -> &str {
        match self {
            Endpoint::Provider(p) => p.base_url,
            Endpoint::Custom(url) => url,
        }
    }

    pub fn key_prefix(&self) -> &'static str {
        match self {
            Endpoint::Provider(p) => p.key_prefix,
            Endpoint::Custom(_) => DEFAULT_KEY_PREFIX,
        }
    }

    /// The value persisted in the config file.
    pub fn as_setting(&self) -> &str {
        match self {
            Endpoint::Provider(p) => p.name,
            Endpoint::Custom(url) => url,
        }
    }
}

pub fn validate_endpoint(value: &str) -> Result<(), String> {
    match Endpoint::lookup(value) {
        Some(_) => Ok(()),
        None => {
            let names: Vec<&str> = PROVIDERS.iter().map(|p| p.name).collect();
            Err(format!(
                "Enter one of {} or a URL starting with http",
                names.join(", ")
            ))
        }
    }
}

pub fn validate_model(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("Model name cannot be empty".to_string());
    }
    Ok(())
}

pub fn validate_api_key(endpoint: &Endpoint, key: &str) -> Result<(), String> {
    let prefix = endpoint.key_prefix();
    if key.trim().starts_with(prefix) && key.trim().len() > prefix.len() {
        Ok(())
    } else {
        Err(format!(
            "API keys for {} start with \"{prefix}\"",
            endpoint.as_setting()
        ))
    }
}

/// Canonical spelling of a supported language, matched case-insensitively.
pub fn canonical_language(value: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .copied()
        .find(|l| l.eq_ignore_ascii_case(value.trim()))
}

/// Final resolved configuration, read once at the start of each command.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub model: String,
    pub api_key: Option<String>,
    pub language: String,
    pub delimiter: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Values given on the command line, highest precedence.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub language: Option<String>,
}

impl From<&Cli> for Overrides {
    fn from(cli: &Cli) -> Self {
        Overrides {
            endpoint: cli.endpoint.clone(),
            model: cli.model.clone(),
            api_key: cli.api_key.clone(),
            language: cli.language.clone(),
        }
    }
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--endpoint`, `--language`, `--api-key`/`OPENAI_API_KEY`)
    ///   2. Env vars `AICOMMIT_MODEL`, `AICOMMIT_ENDPOINT`, `AICOMMIT_LANGUAGE`
    ///   3. TOML `~/.config/aicommit.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(overrides: Overrides, store: &ConfigStore) -> Result<Self> {
        let file_cfg = store.load()?;
        Ok(Self::layered(overrides, |name| env::var(name).ok(), file_cfg))
    }

    pub fn layered<F>(overrides: Overrides, env_var: F, file_cfg: FileConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = overrides
            .endpoint
            .or_else(|| env_var("AICOMMIT_ENDPOINT"))
            .or(file_cfg.endpoint)
            .map(|e| Endpoint::resolve(&e))
            .unwrap_or_default();

        let model = overrides
            .model
            .or_else(|| env_var("AICOMMIT_MODEL"))
            .or(file_cfg.model)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let language = overrides
            .language
            .or_else(|| env_var("AICOMMIT_LANGUAGE"))
            .or(file_cfg.language)
            .map(|l| match canonical_language(&l) {
                Some(lang) => lang,
                None => {
                    log::warn!("Unsupported language {l:?}; falling back to {DEFAULT_LANGUAGE}");
                    DEFAULT_LANGUAGE
                }
            })
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();

        let api_key = overrides
            .api_key
            .or(file_cfg.api_key)
            .filter(|k| !k.trim().is_empty());

        Config {
            endpoint,
            model,
            api_key,
            language,
            delimiter: file_cfg
                .delimiter
                .unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
            temperature: file_cfg.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: file_cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    /// Human-readable listing for `aicommit config show`.
    pub fn describe(&self) -> String {
        let key = self
            .api_key
            .as_deref()
            .map(mask_key)
            .unwrap_or_else(|| "(not set)".to_string());

        format!(
            "endpoint    = {} ({})\n\
             model       = {}\n\
             api-key     = {}\n\
             language    = {}\n\
             delimiter   = {:?}\n\
             temperature = {}\n\
             max-tokens  = {}",
            self.endpoint.as_setting(),
            self.endpoint.base_url(),
            self.model,
            key,
            self.language,
            self.delimiter,
            self.temperature,
            self.max_tokens
        )
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Persisted settings; every field is optional and independently settable.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub delimiter: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl FileConfig {
    /// Validate and store one setting, as named on the command line.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoint" => {
                validate_endpoint(value).map_err(|e| anyhow!(e))?;
                self.endpoint = Some(Endpoint::resolve(value).as_setting().to_string());
            }
            "model" => {
                validate_model(value).map_err(|e| anyhow!(e))?;
                self.model = Some(value.trim().to_string());
            }
            "api-key" => {
                let endpoint = self
                    .endpoint
                    .as_deref()
                    .map(Endpoint::resolve)
                    .unwrap_or_default();
                validate_api_key(&endpoint, value).map_err(|e| anyhow!(e))?;
                self.api_key = Some(value.trim().to_string());
            }
            "language" => {
                let lang = canonical_language(value).ok_or_else(|| {
                    anyhow!("Unsupported language {value:?}. Choose one of: {}", LANGUAGES.join(", "))
                })?;
                self.language = Some(lang.to_string());
            }
            "delimiter" => {
                if value.is_empty() {
                    bail!("Delimiter cannot be empty");
                }
                self.delimiter = Some(value.to_string());
            }
            "temperature" => {
                let t: f32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid temperature {value:?}"))?;
                if !(0.0..=2.0).contains(&t) {
                    bail!("Temperature must be between 0 and 2");
                }
                self.temperature = Some(t);
            }
            "max-tokens" => {
                let n: u32 = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid max-tokens {value:?}"))?;
                if n == 0 {
                    bail!("max-tokens must be greater than zero");
                }
                self.max_tokens = Some(n);
            }
            other => bail!(
                "Unknown setting {other:?}. Use one of: endpoint, model, api-key, language, delimiter, temperature, max-tokens"
            ),
        }
        Ok(())
    }
}

/// The TOML file backing `FileConfig`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// `$AICOMMIT_CONFIG`, else `~/.config/aicommit.toml`.
    pub fn locate() -> Result<Self> {
        if let Some(path) = env::var_os("AICOMMIT_CONFIG") {
            return Ok(Self::at(PathBuf::from(path)));
        }
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
        Ok(Self::at(home.join(".config").join("aicommit.toml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<FileConfig> {
        if !self.path.exists() {
            return Ok(FileConfig::default());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        toml::from_str::<FileConfig>(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    /// Replace the file contents in one step so readers never see a partial write.
    pub fn save(&self, cfg: &FileConfig) -> Result<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let body = toml::to_string_pretty(cfg).context("failed to serialize config")?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(body.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        log::debug!("Saved config to {}", self.path.display());
        Ok(())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cfg = self.load()?;
        cfg.set(key, value)?;
        self.save(&cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn endpoint_lookup_is_a_closed_table() {
        assert_eq!(Endpoint::resolve("perplexity").base_url(), "https://api.perplexity.ai");
        assert_eq!(Endpoint::resolve("OpenAI").base_url(), "https://api.openai.com/v1");
        assert_eq!(
            Endpoint::resolve("http://localhost:8080/v1/"),
            Endpoint::Custom("http://localhost:8080/v1".into())
        );
        assert_eq!(Endpoint::resolve("something-else"), Endpoint::default());
    }

    #[test]
    fn key_prefix_depends_on_endpoint() {
        let pplx = Endpoint::resolve("perplexity");
        assert!(validate_api_key(&pplx, "sk-abc").is_err());
        assert!(validate_api_key(&pplx, "pplx-abc").is_ok());

        let custom = Endpoint::resolve("https://llm.internal");
        assert!(validate_api_key(&custom, "sk-abc").is_ok());
        assert!(validate_api_key(&custom, "pplx-abc").is_err());
        assert!(validate_api_key(&Endpoint::default(), "sk-").is_err());
    }

    #[test]
    fn endpoint_validation_requires_name_or_http() {
        assert!(validate_endpoint("perplexity").is_ok());
        assert!(validate_endpoint("https://example.com").is_ok());
        assert!(validate_endpoint("ftp://example.com").is_err());
        assert!(validate_model("  ").is_err());
    }

    #[test]
    fn precedence_cli_then_env_then_file() {
        let file = FileConfig {
            model: Some("file-model".into()),
            language: Some("German".into()),
            endpoint: Some("perplexity".into()),
            api_key: Some("pplx-file".into()),
            ..Default::default()
        };
        let env = |name: &str| match name {
            "AICOMMIT_MODEL" => Some("env-model".to_string()),
            _ => None,
        };
        let overrides = Overrides {
            language: Some("French".into()),
            ..Default::default()
        };

        let cfg = Config::layered(overrides, env, file);
        assert_eq!(cfg.model, "env-model");
        assert_eq!(cfg.language, "French");
        assert_eq!(cfg.endpoint.as_setting(), "perplexity");
        assert_eq!(cfg.api_key.as_deref(), Some("pplx-file"));
    }

    #[test]
    fn language_is_canonicalized_or_falls_back() {
        let file = FileConfig {
            language: Some("klingon".into()),
            ..Default::default()
        };
        let cfg = Config::layered(Overrides::default(), no_env, file);
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);

        let env = |name: &str| (name == "AICOMMIT_LANGUAGE").then(|| " german ".to_string());
        let cfg = Config::layered(Overrides::default(), env, FileConfig::default());
        assert_eq!(cfg.language, "German");

        let overrides = Overrides {
            language: Some("Klingon".into()),
            ..Default::default()
        };
        let cfg = Config::layered(overrides, env, FileConfig::default());
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::layered(Overrides::default(), no_env, FileConfig::default());
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);
        assert_eq!(cfg.delimiter, "* ");
        assert_eq!(cfg.endpoint, Endpoint::default());
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn describe_masks_the_key() {
        let file = FileConfig {
            api_key: Some("sk-1234567890abcdef".into()),
            ..Default::default()
        };
        let cfg = Config::layered(Overrides::default(), no_env, file);
        let text = cfg.describe();
        assert!(text.contains("sk-1...cdef"));
        assert!(!text.contains("1234567890"));
    }

    #[test]
    fn set_validates_each_key() {
        let mut cfg = FileConfig::default();
        cfg.set("endpoint", "perplexity").unwrap();
        assert!(cfg.set("api-key", "sk-abc").is_err());
        cfg.set("api-key", "pplx-abc").unwrap();
        cfg.set("language", "german").unwrap();
        assert_eq!(cfg.language.as_deref(), Some("German"));
        assert!(cfg.set("language", "Klingon").is_err());
        assert!(cfg.set("temperature", "3.5").is_err());
        assert!(cfg.set("max-tokens", "0").is_err());
        assert!(cfg.set("colour", "blue").is_err());
    }

    #[test]
    fn store_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("nested").join("aicommit.toml"));

        assert_eq!(store.load().unwrap(), FileConfig::default());

        store.set("model", "gpt-4o").unwrap();
        store.set("delimiter", "- ").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.model.as_deref(), Some("gpt-4o"));
        assert_eq!(loaded.delimiter.as_deref(), Some("- "));
        assert!(loaded.api_key.is_none());
    }
}
