use clap::{ArgAction, Parser, Subcommand};

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "aicommit",
    version,
    about = "LLM-assisted Git commit message generator"
)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Model name to use (e.g. gpt-4o-mini)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Endpoint: a provider name (openai, perplexity) or an http(s) base URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Language the commit message is written in (e.g. English, German)
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// API key (otherwise uses OPENAI_API_KEY env var or the config file)
    #[arg(long, env = "OPENAI_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Subcommand; defaults to `generate`
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `aicommit setup`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a commit message from the current diff and review it in your editor
    Generate {
        /// Prefix for each detail line of the message (default "* ")
        #[arg(long)]
        delimiter: Option<String>,

        /// Keep the accepted message in .git/AICOMMIT_EDITMSG instead of committing it
        #[arg(long)]
        no_commit: bool,
    },

    /// Interactively choose endpoint, model, API key and language
    #[command(alias = "set-api-key")]
    Setup,

    /// Show or change individual settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (API key masked)
    Show,

    /// Persist a single setting
    Set {
        /// endpoint, model, api-key, language, delimiter, temperature or max-tokens
        key: String,
        value: String,
    },
}
