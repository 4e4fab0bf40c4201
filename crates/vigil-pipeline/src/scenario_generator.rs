use std::path::PathBuf;

use anyhow::Context;
use vigil_browser::PageInspector;

use crate::artifact_store::ArtifactStore;
use crate::dedup::{filter_new_scenarios, load_existing};
use crate::error::PipelineError;
use crate::generated_text::strip_code_fences;
use crate::prompts::scenario_prompt;
use crate::scenario::{append_to_document, document_key, parse_scenario_document};
use crate::text_generation::TextGenerator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub key: String,
    pub document_path: PathBuf,
    pub new_count: usize,
    pub total_count: usize,
    pub dropped_duplicates: usize,
    pub dropped_malformed: usize,
}

/// Inspects a page and appends newly generated, de-duplicated scenarios to
/// the document keyed by the page title.
pub struct ScenarioGenerator<'a> {
    store: &'a ArtifactStore,
    inspector: &'a dyn PageInspector,
    generator: &'a dyn TextGenerator,
}

impl<'a> ScenarioGenerator<'a> {
    pub fn new(
        store: &'a ArtifactStore,
        inspector: &'a dyn PageInspector,
        generator: &'a dyn TextGenerator,
    ) -> Self {
        Self {
            store,
            inspector,
            generator,
        }
    }

    pub fn generate(&self, url: &str) -> Result<GenerationReport, PipelineError> {
        let snapshot = self.inspector.inspect(url)?;
        let key = document_key(&snapshot.title);
        tracing::info!(url, title = %snapshot.title, %key, "page inspected");

        let existing = load_existing(self.store, &key)?;
        let positive_data = self.positive_test_data()?;
        let snapshot_json =
            serde_json::to_string_pretty(&snapshot).context("failed to encode page snapshot")?;
        let prompt = scenario_prompt(&snapshot_json, positive_data.as_deref(), &existing);

        let generated = strip_code_fences(&self.generator.generate(&prompt)?);
        if generated.is_empty() {
            return Err(PipelineError::NoValidScenarios(
                "text generation returned no scenarios".to_string(),
            ));
        }

        let batch = filter_new_scenarios(&existing, parse_scenario_document(&generated));
        if batch.accepted.is_empty() {
            return Err(PipelineError::NoValidScenarios(format!(
                "no new scenarios for '{key}' ({} duplicate, {} malformed)",
                batch.duplicates, batch.malformed
            )));
        }

        let current = self.store.read_scenario_document(&key)?;
        let merged = append_to_document(current.as_deref(), &batch.accepted);
        let document_path = self.store.write_scenario_document(&key, &merged)?;
        let report = GenerationReport {
            key,
            document_path,
            new_count: batch.accepted.len(),
            total_count: existing.record_count + batch.accepted.len(),
            dropped_duplicates: batch.duplicates,
            dropped_malformed: batch.malformed,
        };
        tracing::info!(
            key = %report.key,
            new = report.new_count,
            total = report.total_count,
            "scenario document updated"
        );
        Ok(report)
    }

    fn positive_test_data(&self) -> Result<Option<String>, PipelineError> {
        let path = self.store.layout().test_data_path();
        let data = self.store.read_optional(&path)?;
        if data.is_none() {
            tracing::warn!(
                path = %path.display(),
                "positive test data not found, generating without reference data"
            );
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use vigil_browser::{InspectError, PageInspector, PageSnapshot};

    use super::ScenarioGenerator;
    use crate::artifact_store::ArtifactStore;
    use crate::error::PipelineError;
    use crate::layout::ArtifactLayout;
    use crate::text_generation::{TextGenerationError, TextGenerator};

    struct TitledPage(&'static str);

    impl PageInspector for TitledPage {
        fn inspect(&self, url: &str) -> Result<PageSnapshot, InspectError> {
            Ok(PageSnapshot {
                title: self.0.to_string(),
                url: url.to_string(),
                ..PageSnapshot::default()
            })
        }
    }

    struct SlowPage;

    impl PageInspector for SlowPage {
        fn inspect(&self, url: &str) -> Result<PageSnapshot, InspectError> {
            Err(InspectError::PageLoadTimeout {
                url: url.to_string(),
                reason: "load event never fired".to_string(),
            })
        }
    }

    struct Canned {
        reply: &'static str,
        prompts: RefCell<Vec<String>>,
    }

    impl TextGenerator for Canned {
        fn generate(&self, prompt: &str) -> Result<String, TextGenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.reply.to_string())
        }
    }

    fn canned(reply: &'static str) -> Canned {
        Canned {
            reply,
            prompts: RefCell::new(Vec::new()),
        }
    }

    const TWO_NEW: &str = "```\nTestCase ID: TC001\nScenario: Valid login\nType: Positive\n\nSteps:\n1. Log in\n\nExpected Result: Welcome\n\n---\n\nTestCase ID: TC002\nScenario: Empty password\nType: Negative\n\nSteps:\n1. Submit\n\nExpected Result: Error\n```";

    #[test]
    fn functional_first_generation_creates_document_under_title_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(ArtifactLayout::new(temp.path()));
        store
            .write(&store.layout().test_data_path(), "username: student")
            .expect("data");
        let generator = canned(TWO_NEW);

        let report = ScenarioGenerator::new(&store, &TitledPage("Login | Demo"), &generator)
            .generate("https://example.test/login")
            .expect("report");
        assert_eq!(report.key, "Login_Demo");
        assert_eq!((report.new_count, report.total_count), (2, 2));
        let document = store.read(&report.document_path).expect("document");
        assert!(document.starts_with("TestCase ID: TC001\nScenario: Valid login"));
        assert!(document.contains("TestCase ID: TC002"));
        assert!(!document.contains("```"));
        assert!(generator.prompts.borrow()[0].contains("username: student"));
    }

    #[test]
    fn regression_all_duplicates_is_no_valid_scenarios_and_leaves_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(ArtifactLayout::new(temp.path()));
        let generator = canned(TWO_NEW);
        let page = TitledPage("Login");
        ScenarioGenerator::new(&store, &page, &generator)
            .generate("https://example.test/")
            .expect("first");
        let before = store.read_scenario_document("Login").expect("read");

        let second =
            ScenarioGenerator::new(&store, &page, &generator).generate("https://example.test/");
        assert!(matches!(second, Err(PipelineError::NoValidScenarios(_))));
        assert_eq!(store.read_scenario_document("Login").expect("read"), before);
        assert!(generator.prompts.borrow()[1].contains("1. valid login\n2. empty password"));
    }

    #[test]
    fn unit_page_load_timeout_is_reported_with_url() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(ArtifactLayout::new(temp.path()));
        let generator = canned(TWO_NEW);
        match ScenarioGenerator::new(&store, &SlowPage, &generator).generate("https://slow.test/") {
            Err(PipelineError::PageLoadTimeout { url, .. }) => {
                assert_eq!(url, "https://slow.test/")
            }
            other => panic!("expected PageLoadTimeout, got {other:?}"),
        }
        assert!(generator.prompts.borrow().is_empty());
    }
}
