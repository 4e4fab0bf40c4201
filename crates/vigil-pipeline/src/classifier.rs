use std::fmt;

use serde::Serialize;

use crate::error::PipelineError;
use crate::prompts::classification_prompt;
use crate::text_generation::TextGenerator;

const FAILURE_TYPE_LABEL: &str = "failure type:";
const REASON_LABEL: &str = "reason:";
const RETRY_LABEL: &str = "retry:";
const FIX_LABEL: &str = "fixtest:";
const MALFORMED_REASON: &str = "unparseable classifier response";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    LocatorIssue,
    AssertionFailure,
    ApplicationBug,
    TestDataIssue,
    EnvironmentTiming,
}

impl FailureCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.to_ascii_lowercase();
        if lowered.contains("locator") {
            Some(Self::LocatorIssue)
        } else if lowered.contains("assertion") {
            Some(Self::AssertionFailure)
        } else if lowered.contains("application") || lowered.contains("bug") {
            Some(Self::ApplicationBug)
        } else if lowered.contains("data") {
            Some(Self::TestDataIssue)
        } else if lowered.contains("environment")
            || lowered.contains("timing")
            || lowered.contains("timeout")
        {
            Some(Self::EnvironmentTiming)
        } else {
            None
        }
    }

    /// Defects in the script itself, which a rewrite can plausibly fix.
    pub fn is_script_defect(self) -> bool {
        matches!(self, Self::AssertionFailure | Self::LocatorIssue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocatorIssue => "Locator Issue",
            Self::AssertionFailure => "Assertion Failure",
            Self::ApplicationBug => "Application Bug",
            Self::TestDataIssue => "Test Data Issue",
            Self::EnvironmentTiming => "Environment / Timing Issue",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fix was or was not requested.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixSource {
    /// The classifier answered `FixTest: YES`.
    Explicit,
    /// The category is a script defect although `FixTest` was not YES.
    CategoryPolicy,
    NotRecommended,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureVerdict {
    pub category: Option<FailureCategory>,
    pub reason: String,
    pub retry_recommended: bool,
    pub fix_recommended: bool,
    pub fix_source: FixSource,
}

impl FailureVerdict {
    pub fn malformed() -> Self {
        Self {
            category: None,
            reason: MALFORMED_REASON.to_string(),
            retry_recommended: false,
            fix_recommended: false,
            fix_source: FixSource::NotRecommended,
        }
    }

    fn from_labels(
        category: Option<FailureCategory>,
        reason: Option<String>,
        retry: bool,
        explicit_fix: bool,
    ) -> Self {
        let fix_source = if explicit_fix {
            FixSource::Explicit
        } else if category.is_some_and(FailureCategory::is_script_defect) {
            FixSource::CategoryPolicy
        } else {
            FixSource::NotRecommended
        };
        Self {
            category,
            reason: reason.unwrap_or_default(),
            retry_recommended: retry,
            fix_recommended: fix_source != FixSource::NotRecommended,
            fix_source,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "category={} retry={} fix={} ({:?}) reason={}",
            self.category.map_or("unknown", FailureCategory::as_str),
            yes_no(self.retry_recommended),
            yes_no(self.fix_recommended),
            self.fix_source,
            self.reason
        )
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerdictParse {
    Parsed,
    /// None of the four labels appeared; the conservative verdict was used.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: FailureVerdict,
    /// Raw classifier text, kept for the decision log and the summary.
    pub analysis: String,
    pub parse: VerdictParse,
}

/// Machine-readable line of a decision-log entry.
#[derive(Debug, Serialize)]
struct DecisionRecord<'a> {
    parse: VerdictParse,
    #[serde(flatten)]
    verdict: &'a FailureVerdict,
}

impl Classification {
    /// JSON form of the parsed verdict, one object per classification.
    pub fn verdict_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&DecisionRecord {
            parse: self.parse,
            verdict: &self.verdict,
        })
    }

    pub fn decision_log_entry(&self, timestamp: &str) -> String {
        let mut entry = format!(
            "\n--- FAILURE ANALYSIS ---\nTimestamp: {timestamp}\n{}\nParsed: {}\n",
            self.analysis.trim(),
            self.verdict.describe()
        );
        match self.verdict_json() {
            Ok(json) => entry.push_str(&format!("Verdict: {json}\n")),
            Err(error) => tracing::warn!(%error, "failed to encode verdict for decision log"),
        }
        entry
    }
}

/// Parses a classifier response. Never fails: missing labels produce a
/// [`VerdictParse::Malformed`] verdict that neither retries nor fixes.
pub fn parse_verdict(text: &str) -> (FailureVerdict, VerdictParse) {
    let mut category = None;
    let mut reason = None;
    let mut retry = false;
    let mut fix = false;
    let mut saw_label = false;

    for line in text.lines() {
        let Some((label, value)) = find_label(line) else {
            continue;
        };
        saw_label = true;
        match label {
            FAILURE_TYPE_LABEL => category = FailureCategory::parse(value),
            REASON_LABEL => reason = Some(value.to_string()),
            RETRY_LABEL => retry = is_yes(value),
            FIX_LABEL => fix = is_yes(value),
            _ => {}
        }
    }

    if !saw_label {
        return (FailureVerdict::malformed(), VerdictParse::Malformed);
    }
    (
        FailureVerdict::from_labels(category, reason, retry, fix),
        VerdictParse::Parsed,
    )
}

/// Earliest label on the line, matched case-insensitively, with its value.
fn find_label(line: &str) -> Option<(&'static str, &str)> {
    let lowered = line.to_ascii_lowercase();
    [FAILURE_TYPE_LABEL, REASON_LABEL, RETRY_LABEL, FIX_LABEL]
        .into_iter()
        .filter_map(|label| lowered.find(label).map(|position| (position, label)))
        .min_by_key(|(position, _)| *position)
        .and_then(|(position, label)| {
            line.get(position + label.len()..).map(|value| {
                (
                    label,
                    value.trim_matches(|ch: char| ch.is_whitespace() || ch == '*'),
                )
            })
        })
}

fn is_yes(value: &str) -> bool {
    value
        .trim_start_matches(|ch: char| !ch.is_ascii_alphanumeric())
        .to_ascii_lowercase()
        .starts_with("yes")
}

pub struct FailureClassifier<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> FailureClassifier<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    pub fn classify(&self, raw_log: &str) -> Result<Classification, PipelineError> {
        let analysis = self.generator.generate(&classification_prompt(raw_log))?;
        let (verdict, parse) = parse_verdict(&analysis);
        if parse == VerdictParse::Malformed {
            tracing::warn!("classifier response had no recognizable labels");
        }
        tracing::info!(
            category = ?verdict.category,
            retry = verdict.retry_recommended,
            fix = verdict.fix_recommended,
            "failure classified"
        );
        Ok(Classification {
            verdict,
            analysis,
            parse,
        })
    }
}
