//! User-facing collaborators: prompt answers and browser launching.

use crate::types::Node;
use log::{info, warn};
use std::{
    collections::{BTreeMap, HashMap},
    process::{Command, Stdio},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read from terminal")]
    Terminal(#[from] dialoguer::Error),

    #[error("no answer supplied for prompt '{0}'")]
    Missing(String),
}

/// Supplies answers for a node's `userPrompts` (name to prompt text).
pub trait InputCollector {
    fn collect(
        &mut self,
        node: &Node,
        prompts: &BTreeMap<String, String>,
    ) -> Result<HashMap<String, String>, InputError>;
}

/// Asks on the terminal.
#[derive(Debug, Default)]
pub struct TerminalInput;

impl InputCollector for TerminalInput {
    fn collect(
        &mut self,
        node: &Node,
        prompts: &BTreeMap<String, String>,
    ) -> Result<HashMap<String, String>, InputError> {
        println!("\x1b[34mInput for\x1b[m: \x1b[35m{}\x1b[m", node.name);
        let mut answers = HashMap::new();
        for (name, text) in prompts {
            let value = dialoguer::Input::<String>::new()
                .with_prompt(text.trim_end_matches(':'))
                .allow_empty(true)
                .interact_text()?;
            answers.insert(name.clone(), value);
        }
        Ok(answers)
    }
}

/// Answers fixed ahead of time, looked up by prompt name.
#[derive(Debug, Default, Clone)]
pub struct PresetInput {
    answers: HashMap<String, String>,
}

impl PresetInput {
    pub fn new(answers: HashMap<String, String>) -> Self {
        Self { answers }
    }
}

impl InputCollector for PresetInput {
    fn collect(
        &mut self,
        _node: &Node,
        prompts: &BTreeMap<String, String>,
    ) -> Result<HashMap<String, String>, InputError> {
        prompts
            .keys()
            .map(|name| match self.answers.get(name) {
                Some(v) => Ok((name.clone(), v.clone())),
                None => Err(InputError::Missing(name.clone())),
            })
            .collect()
    }
}

/// Collects nothing. Prompted placeholders stay unresolved.
#[derive(Debug, Default)]
pub struct NoInput;

impl InputCollector for NoInput {
    fn collect(
        &mut self,
        _node: &Node,
        _prompts: &BTreeMap<String, String>,
    ) -> Result<HashMap<String, String>, InputError> {
        Ok(HashMap::new())
    }
}

/// Opens a URL for the user. Failures are logged, never returned.
pub trait BrowserLauncher {
    fn launch(&mut self, url: &str);
}

/// Opens URLs with the platform's default handler.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&mut self, url: &str) {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };
        run_opener(&mut cmd, url);
    }
}

/// Run an opener to completion. `open`, `xdg-open` and `start` hand the URL
/// to the browser and exit, so waiting here reaps them without blocking the
/// run on the browser itself.
fn run_opener(cmd: &mut Command, url: &str) -> bool {
    match cmd.stdout(Stdio::null()).stderr(Stdio::null()).status() {
        Ok(status) if status.success() => {
            info!("Opened browser at {}", url);
            true
        }
        Ok(status) => {
            warn!("Browser opener for {} exited with {}", url, status);
            false
        }
        Err(e) => {
            warn!("Failed to open browser at {}: {}", url, e);
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn launch(&mut self, url: &str) {
        info!("Browser launch disabled, URL: {}", url);
    }
}
