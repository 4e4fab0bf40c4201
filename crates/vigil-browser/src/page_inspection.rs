use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::{parse_command_line, run_captured, CommandLine};

/// Exit code the inspection helper uses when the page never settles.
pub const PAGE_LOAD_TIMEOUT_EXIT_CODE: i32 = 2;
const BROWSER_STARTUP_GRACE_MS: u64 = 30_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputElement {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub placeholder: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ButtonElement {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkElement {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
}

/// Interactive surface of a loaded page, as handed to scenario generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSnapshot {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub inputs: Vec<InputElement>,
    #[serde(default)]
    pub buttons: Vec<ButtonElement>,
    #[serde(default)]
    pub links: Vec<LinkElement>,
}

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("page inspector unavailable: {0}")]
    Unavailable(String),
    #[error("page failed to load: {url} ({reason})")]
    PageLoadTimeout { url: String, reason: String },
    #[error("page inspector returned an invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Trait contract for the page-inspection collaborator.
pub trait PageInspector {
    fn inspect(&self, url: &str) -> Result<PageSnapshot, InspectError>;
}

/// Runs an external helper as `<command> <url> <timeout_ms>` and reads the
/// snapshot JSON it prints on stdout.
#[derive(Debug, Clone)]
pub struct CommandPageInspector {
    command: CommandLine,
    page_load_timeout_ms: u64,
}

impl CommandPageInspector {
    pub fn new(command: &str, page_load_timeout_ms: u64) -> Result<Self, InspectError> {
        let command = parse_command_line(command).map_err(InspectError::Unavailable)?;
        Ok(Self {
            command,
            page_load_timeout_ms: page_load_timeout_ms.max(1),
        })
    }
}

impl PageInspector for CommandPageInspector {
    fn inspect(&self, url: &str) -> Result<PageSnapshot, InspectError> {
        let wall_clock = Duration::from_millis(
            self.page_load_timeout_ms
                .saturating_add(BROWSER_STARTUP_GRACE_MS),
        );
        let extra_args = [url.to_string(), self.page_load_timeout_ms.to_string()];
        tracing::debug!(command = %self.command.render(), url, "inspecting page");

        let output = run_captured(&self.command, &extra_args, None, &[], wall_clock).map_err(
            |error| {
                InspectError::Unavailable(format!(
                    "failed to launch '{}': {error}",
                    self.command.render()
                ))
            },
        )?;

        if output.timed_out {
            return Err(InspectError::PageLoadTimeout {
                url: url.to_string(),
                reason: format!("inspector exceeded {} ms", wall_clock.as_millis()),
            });
        }
        if output.exit_code() == Some(PAGE_LOAD_TIMEOUT_EXIT_CODE) {
            return Err(InspectError::PageLoadTimeout {
                url: url.to_string(),
                reason: first_non_empty_line(&output.stderr)
                    .unwrap_or("page did not reach a loaded state")
                    .to_string(),
            });
        }
        if !output.succeeded() {
            let detail = first_non_empty_line(&output.stderr)
                .or_else(|| first_non_empty_line(&output.stdout))
                .unwrap_or("no output");
            return Err(InspectError::Unavailable(format!(
                "'{}' failed: {detail}",
                self.command.render()
            )));
        }

        parse_page_snapshot(&output.stdout)
    }
}

/// Parses inspector stdout; an empty title is kept and handled by the caller.
pub fn parse_page_snapshot(raw: &str) -> Result<PageSnapshot, InspectError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InspectError::InvalidSnapshot("empty output".to_string()));
    }
    serde_json::from_str(trimmed).map_err(|error| InspectError::InvalidSnapshot(error.to_string()))
}

fn first_non_empty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}
