use anyhow::{bail, Result};
use crossterm::tty::IsTty;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::io;

/// Validation hook for free-text answers: `Err` carries the message shown before re-asking.
pub type Validator<'a> = &'a dyn Fn(&str) -> Result<(), String>;

/// Questions asked of the user. `Ok(None)` means the user backed out.
pub trait Prompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<Option<usize>>;

    /// Ask until the answer passes `validate`. An empty answer cancels.
    fn input(&mut self, prompt: &str, validate: Validator<'_>) -> Result<Option<String>>;

    fn confirm(&mut self, prompt: &str) -> Result<Option<bool>>;
}

/// Prompts on the controlling terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Fails when stdin is not a terminal, since nothing could answer.
    pub fn attach() -> Result<Self> {
        if !io::stdin().is_tty() {
            bail!("interactive setup needs a terminal; use `aicommit config set <key> <value>` instead");
        }
        Ok(TerminalPrompter { theme: ColorfulTheme::default() })
    }
}

impl Prompter for TerminalPrompter {
    fn select(&mut self, prompt: &str, items: &[&str], default: usize) -> Result<Option<usize>> {
        let choice = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()?;
        Ok(choice)
    }

    fn input(&mut self, prompt: &str, validate: Validator<'_>) -> Result<Option<String>> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(format!("{prompt} (empty to cancel)"))
            .allow_empty(true)
            .validate_with(|s: &String| -> Result<(), String> {
                if s.trim().is_empty() {
                    Ok(())
                } else {
                    validate(s.trim())
                }
            })
            .interact_text()?;

        let answer = answer.trim().to_string();
        Ok(if answer.is_empty() { None } else { Some(answer) })
    }

    fn confirm(&mut self, prompt: &str) -> Result<Option<bool>> {
        let answer = Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(true)
            .interact_opt()?;
        Ok(answer)
    }
}
