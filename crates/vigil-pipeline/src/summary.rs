#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Passed,
    PassedAfterRetry,
    Failed,
}

impl FinalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::PassedAfterRetry => "PASSED_AFTER_RETRY",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record of a run; the one log artifact cleanup keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub retry_attempts_used: u32,
    pub final_status: FinalStatus,
    pub analysis: String,
    pub retry_output: Option<String>,
}

impl ExecutionSummary {
    pub fn passed() -> Self {
        Self {
            retry_attempts_used: 0,
            final_status: FinalStatus::Passed,
            analysis: "No failures detected.".to_string(),
            retry_output: None,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Execution Summary\n-----------------\nRetry Attempts Used: {}\nFinal Status: {}\n\nFailure Analysis:\n{}\n",
            self.retry_attempts_used,
            self.final_status,
            self.analysis.trim_end()
        );
        if let Some(retry_output) = &self.retry_output {
            out.push_str("\nRetry Output:\n");
            out.push_str(retry_output.trim_end());
            out.push('\n');
        }
        out
    }
}
