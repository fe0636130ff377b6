use crate::approval::{approve, ApprovalOutcome, ScratchViewer};
use crate::config::{Config, ConfigStore, Overrides};
use crate::error::CommitError;
use crate::generator::MessageGenerator;
use crate::git::VcsProvider;
use crate::interact::Prompter;
use crate::llm::LlmClient;
use crate::progress::Ticker;
use crate::wizard::run_setup;
use anyhow::{Context, Result};

/// Lazily attaches a prompter; only the setup paths need one.
pub type PrompterSource = dyn FnMut() -> Result<Box<dyn Prompter>>;

/// Builds the LLM client once the config is known.
pub type ClientFactory = dyn Fn(&Config) -> Result<Box<dyn LlmClient>>;

/// Everything one `generate` invocation talks to.
pub struct Session<'a> {
    pub vcs: &'a dyn VcsProvider,
    pub viewer: &'a dyn ScratchViewer,
    pub store: &'a ConfigStore,
    pub prompter: &'a mut PrompterSource,
    pub connect: &'a ClientFactory,
    pub overrides: Overrides,
    pub show_progress: bool,
}

impl Session<'_> {
    /// Diff → LLM → review → commit message field.
    pub fn generate(&mut self, delimiter: Option<&str>) -> Result<ApprovalOutcome> {
        self.vcs.ensure_available()?;

        let config = self.config_with_key()?;

        let diff = self.vcs.diff()?;
        if diff.trim().is_empty() {
            return Err(CommitError::NoChanges.into());
        }

        let client = (self.connect)(&config)?;
        let message = match self.generate_message(client.as_ref(), &config, &diff, delimiter) {
            Ok(m) => m,
            Err(e) => {
                if let Some(CommitError::InvalidCredential(_)) = e.downcast_ref::<CommitError>() {
                    self.offer_key_reentry()?;
                }
                return Err(e);
            }
        };

        let outcome = approve(&message, self.viewer)?;
        if let Some(text) = outcome.final_text() {
            self.vcs.write_commit_message(text)?;
        }
        Ok(outcome)
    }

    fn config_with_key(&mut self) -> Result<Config> {
        let config = Config::from_sources(self.overrides.clone(), self.store)?;
        if config.api_key.is_some() {
            return Ok(config);
        }

        log::warn!("{}", CommitError::MissingCredential);
        let mut prompter = (self.prompter)().context(CommitError::MissingCredential)?;
        run_setup(prompter.as_mut(), self.store)?;

        let config = Config::from_sources(self.overrides.clone(), self.store)?;
        if config.api_key.is_none() {
            return Err(CommitError::MissingCredential.into());
        }
        Ok(config)
    }

    fn generate_message(
        &self,
        client: &dyn LlmClient,
        config: &Config,
        diff: &str,
        delimiter: Option<&str>,
    ) -> Result<String> {
        let ticker = if self.show_progress {
            Ticker::start("Generating commit message")
        } else {
            Ticker::hidden("Generating commit message")
        };

        let result = MessageGenerator::new(client, config).generate(diff, delimiter);
        ticker.finish();
        result
    }

    /// Ask whether to run setup again after the endpoint rejected the key.
    fn offer_key_reentry(&mut self) -> Result<()> {
        let mut prompter = match (self.prompter)() {
            Ok(p) => p,
            Err(e) => {
                log::debug!("Cannot prompt for a new key: {e:#}");
                return Ok(());
            }
        };

        if prompter.confirm("The API key was rejected. Enter a new one?")? == Some(true) {
            match run_setup(prompter.as_mut(), self.store) {
                Ok(_) => {}
                Err(e) if is_cancelled(&e) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CommitError>()
        .is_some_and(CommitError::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::tests::{close_only, save_unchanged, ScriptedViewer};
    use crate::approval::ScratchEvent;
    use crate::generator::tests::FakeClient;
    use crate::interact::tests::{Answer, ScriptedPrompter};
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc::Sender;
    use std::sync::Arc;

    struct FakeVcs {
        available: bool,
        diff: String,
        written: RefCell<Vec<String>>,
    }

    impl FakeVcs {
        fn with_diff(diff: &str) -> Self {
            FakeVcs { available: true, diff: diff.to_string(), written: RefCell::new(Vec::new()) }
        }
    }

    impl VcsProvider for FakeVcs {
        fn ensure_available(&self) -> Result<()> {
            if self.available {
                Ok(())
            } else {
                Err(CommitError::MissingDependency("git missing".into()).into())
            }
        }

        fn diff(&self) -> Result<String> {
            Ok(self.diff.clone())
        }

        fn write_commit_message(&self, message: &str) -> Result<()> {
            self.written.borrow_mut().push(message.to_string());
            Ok(())
        }
    }

    /// Hands out the same LLM client to every caller.
    struct SharedClient(Arc<FakeClient>);

    impl LlmClient for SharedClient {
        fn endpoint(&self) -> &str {
            self.0.endpoint()
        }

        fn complete(&self, req: &crate::llm::CompletionRequest) -> Result<crate::llm::Completion> {
            self.0.complete(req)
        }
    }

    /// Always rejects the key.
    struct RejectingClient;

    impl LlmClient for RejectingClient {
        fn endpoint(&self) -> &str {
            "https://fake.test"
        }

        fn complete(&self, _: &crate::llm::CompletionRequest) -> Result<crate::llm::Completion> {
            Err(CommitError::InvalidCredential("Incorrect API key provided".into()).into())
        }
    }

    fn keyed_store() -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("aicommit.toml"));
        store.set("api-key", "sk-test").unwrap();
        (dir, store)
    }

    fn no_prompter() -> Result<Box<dyn Prompter>> {
        Err(anyhow!("no terminal"))
    }

    fn run(
        vcs: &FakeVcs,
        viewer: &dyn ScratchViewer,
        store: &ConfigStore,
        client: Arc<FakeClient>,
        prompter: &mut PrompterSource,
    ) -> Result<ApprovalOutcome> {
        let connect = move |_: &Config| -> Result<Box<dyn LlmClient>> {
            Ok(Box::new(SharedClient(client.clone())))
        };
        let mut session = Session {
            vcs,
            viewer,
            store,
            prompter,
            connect: &connect,
            overrides: Overrides::default(),
            show_progress: false,
        };
        session.generate(None)
    }

    #[test]
    fn accepted_message_reaches_the_commit_field() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("+fn main() {}");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("Add entry point\n\n* main")));

        let outcome = run(&vcs, &viewer, &store, client.clone(), &mut no_prompter).unwrap();

        assert_eq!(outcome, ApprovalOutcome::Accepted("Add entry point\n\n* main".into()));
        assert_eq!(*vcs.written.borrow(), vec!["Add entry point\n\n* main".to_string()]);
        assert_eq!(client.seen.lock().unwrap()[0].messages[2].content, "+fn main() {}");
        assert!(!viewer.path().exists());
    }

    #[test]
    fn edited_message_is_what_gets_written() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(|path: &Path, tx: &Sender<ScratchEvent>| {
            fs::write(path, "Better subject\n")?;
            tx.send(ScratchEvent::Saved).unwrap();
            Ok(())
        });
        let client = Arc::new(FakeClient::replying(Some("Subject")));

        let outcome = run(&vcs, &viewer, &store, client, &mut no_prompter).unwrap();
        assert_eq!(outcome, ApprovalOutcome::AcceptedEdited("Better subject".into()));
        assert_eq!(*vcs.written.borrow(), vec!["Better subject".to_string()]);
    }

    #[test]
    fn cancelled_review_writes_nothing() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(close_only);
        let client = Arc::new(FakeClient::replying(Some("Subject")));

        let outcome = run(&vcs, &viewer, &store, client, &mut no_prompter).unwrap();
        assert_eq!(outcome, ApprovalOutcome::Cancelled);
        assert!(vcs.written.borrow().is_empty());
        assert!(!viewer.path().exists());
    }

    #[test]
    fn empty_completion_fails_before_review() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("")));

        let err = run(&vcs, &viewer, &store, client, &mut no_prompter).unwrap_err();
        assert_eq!(err.to_string(), "no commit message generated");
        assert!(vcs.written.borrow().is_empty());
        assert!(viewer.seen.lock().unwrap().is_none());
    }

    #[test]
    fn missing_git_stops_early() {
        let (_dir, store) = keyed_store();
        let mut vcs = FakeVcs::with_diff("+x");
        vcs.available = false;
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("x")));

        let err = run(&vcs, &viewer, &store, client.clone(), &mut no_prompter).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommitError>(),
            Some(CommitError::MissingDependency(_))
        ));
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_diff_is_reported_without_calling_the_api() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("  \n");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("x")));

        let err = run(&vcs, &viewer, &store, client.clone(), &mut no_prompter).unwrap_err();
        assert!(matches!(err.downcast_ref::<CommitError>(), Some(CommitError::NoChanges)));
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_key_runs_setup_then_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("aicommit.toml"));
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("Subject")));

        let mut prompter = || -> Result<Box<dyn Prompter>> {
            Ok(Box::new(ScriptedPrompter::new([
                Answer::Pick(Some(0)),
                Answer::Text(Some("gpt-4o")),
                Answer::Text(Some("sk-new")),
                Answer::Pick(Some(0)),
            ])))
        };

        let outcome = run(&vcs, &viewer, &store, client.clone(), &mut prompter).unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(store.load().unwrap().api_key.as_deref(), Some("sk-new"));
        assert_eq!(client.seen.lock().unwrap()[0].model, "gpt-4o");
    }

    #[test]
    fn missing_key_and_cancelled_setup_is_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("aicommit.toml"));
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("Subject")));

        let mut prompter = || -> Result<Box<dyn Prompter>> {
            Ok(Box::new(ScriptedPrompter::new([Answer::Pick(None)])))
        };

        let err = run(&vcs, &viewer, &store, client.clone(), &mut prompter).unwrap_err();
        assert!(is_cancelled(&err));
        assert!(client.seen.lock().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn missing_key_without_a_terminal_reports_the_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path().join("aicommit.toml"));
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(save_unchanged);
        let client = Arc::new(FakeClient::replying(Some("Subject")));

        let err = run(&vcs, &viewer, &store, client.clone(), &mut no_prompter).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CommitError>(),
            Some(CommitError::MissingCredential)
        ));
        let shown = format!("{err:#}");
        assert!(shown.contains("no API key configured"), "{shown}");
        assert!(shown.contains("no terminal"), "{shown}");
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn rejected_key_offers_setup_and_still_fails() {
        let (_dir, store) = keyed_store();
        let vcs = FakeVcs::with_diff("+x");
        let viewer = ScriptedViewer::new(save_unchanged);

        let mut prompter = || -> Result<Box<dyn Prompter>> {
            Ok(Box::new(ScriptedPrompter::new([
                Answer::Yes(Some(true)),
                Answer::Pick(Some(0)),
                Answer::Text(Some("gpt-4o")),
                Answer::Text(Some("sk-replacement")),
                Answer::Pick(Some(0)),
            ])))
        };
        let connect = |_: &Config| -> Result<Box<dyn LlmClient>> { Ok(Box::new(RejectingClient)) };

        let mut session = Session {
            vcs: &vcs,
            viewer: &viewer,
            store: &store,
            prompter: &mut prompter,
            connect: &connect,
            overrides: Overrides::default(),
            show_progress: false,
        };
        let err = session.generate(None).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CommitError>(),
            Some(CommitError::InvalidCredential(_))
        ));
        assert_eq!(store.load().unwrap().api_key.as_deref(), Some("sk-replacement"));
        assert!(vcs.written.borrow().is_empty());
    }
}
