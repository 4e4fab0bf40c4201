use std::ffi::OsString;

use clap::{CommandFactory, FromArgMatches, Parser};

/// The pipeline phase a binary drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generate,
    Execute,
    Run,
}

impl Phase {
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Generate => "vigil-generate",
            Self::Execute => "vigil-execute",
            Self::Run => "vigil-run",
        }
    }

    pub fn about(self) -> &'static str {
        match self {
            Self::Generate => "Inspect a page and append new test scenarios to its document",
            Self::Execute => {
                "Run the latest scenario document's Playwright script and remediate failures"
            }
            Self::Run => "Generate scenarios for a page, then execute them",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(version)]
pub struct TargetArgs {
    /// Page under test; exported to the test run as TEST_URL.
    #[arg(value_name = "URL", value_parser = parse_target_url)]
    pub url: String,
}

fn parse_target_url(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| "URL must start with http:// or https://".to_string())?;
    if rest.is_empty() {
        return Err("URL must include a host".to_string());
    }
    Ok(trimmed.to_string())
}

pub fn try_parse_target_args_from<I, T>(phase: Phase, args: I) -> Result<TargetArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = TargetArgs::command()
        .name(phase.binary_name())
        .about(phase.about())
        .try_get_matches_from(args)?;
    TargetArgs::from_arg_matches(&matches)
}

/// Parses the process arguments, printing usage and exiting on error.
pub fn parse_target_args(phase: Phase) -> TargetArgs {
    match try_parse_target_args_from(phase, std::env::args_os()) {
        Ok(args) => args,
        Err(error) => error.exit(),
    }
}
