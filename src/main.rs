mod app;
mod approval;
mod cli_args;
mod config;
mod error;
mod generator;
mod git;
mod interact;
mod llm;
mod logging;
mod progress;
mod setup;
mod wizard;

use crate::app::{is_cancelled, Session};
use crate::approval::EditorViewer;
use crate::config::{Config, ConfigStore, Overrides};
pub use crate::cli_args::{Cli, Command, ConfigAction};
use crate::error::CommitError;
use crate::git::GitCli;
use crate::interact::{Prompter, TerminalPrompter};
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use crossterm::tty::IsTty;
use std::io;
use std::process::ExitCode;

fn attach_terminal() -> Result<Box<dyn Prompter>> {
    Ok(Box::new(TerminalPrompter::attach()?))
}

/// Generate mode: diff → message → editor review → `git commit`.
fn run_generate(cli: &Cli, store: &ConfigStore, delimiter: Option<&str>, commit: bool) -> Result<()> {
    let vcs = GitCli::new().committing(commit);
    let viewer = EditorViewer::from_env();
    let mut prompter = attach_terminal;

    let mut session = Session {
        vcs: &vcs,
        viewer: &viewer,
        store,
        prompter: &mut prompter,
        connect: &setup::build_llm_client,
        overrides: Overrides::from(cli),
        show_progress: io::stderr().is_tty(),
    };

    let outcome = session.generate(delimiter)?;
    if !outcome.is_accepted() {
        println!("Commit message discarded.");
        return Ok(());
    }

    let what = if outcome.is_edited() { "Edited commit message" } else { "Commit message" };
    if commit {
        println!("{} {what} committed.", "✓".green());
    } else {
        let path = vcs.message_file()?;
        println!("{} {what} saved to {}.", "✓".green(), path.display());
        println!("  Commit with: git commit -e -F {}", path.display());
    }
    Ok(())
}

/// Setup mode: the interactive wizard.
fn run_setup(store: &ConfigStore) -> Result<()> {
    let mut prompter = TerminalPrompter::attach()?;
    let answers = wizard::run_setup(&mut prompter, store)?;
    println!(
        "{} Using {} with model {}, messages in {}. Saved to {}",
        "✓".green(),
        answers.endpoint.as_setting(),
        answers.model,
        answers.language,
        store.path().display()
    );
    Ok(())
}

fn run_config(cli: &Cli, store: &ConfigStore, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let cfg = Config::from_sources(Overrides::from(cli), store)?;
            println!("# {}", store.path().display());
            println!("{}", cfg.describe());
        }
        ConfigAction::Set { key, value } => {
            store.set(key, value)?;
            println!("{} {key} saved to {}", "✓".green(), store.path().display());
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let store = ConfigStore::locate()?;
    log::debug!("Config file: {}", store.path().display());

    match &cli.command {
        Some(Command::Generate { delimiter, no_commit }) => {
            run_generate(cli, &store, delimiter.as_deref(), !*no_commit)
        }
        Some(Command::Setup) => run_setup(&store),
        Some(Command::Config { action }) => run_config(cli, &store, action),
        None => run_generate(cli, &store, None, true),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cancelled(&e) => {
            println!("Cancelled; nothing was changed.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::debug!("{e:?}");
            let hint = match e.downcast_ref::<CommitError>() {
                Some(CommitError::InvalidCredential(_)) => {
                    Some("Run `aicommit setup` to enter a new key.")
                }
                Some(CommitError::NoChanges) => Some("Stage some changes with `git add` first."),
                _ => None,
            };
            eprintln!("{} {e:#}", "✗".red());
            if let Some(hint) = hint {
                eprintln!("  {}", hint.bright_black());
            }
            ExitCode::FAILURE
        }
    }
}
