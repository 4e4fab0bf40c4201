//! Scenario document to Playwright script.
//!
//! The model is asked for bare `test(...)` calls in one batched request. Its
//! answer is scanned for balanced `test(...)` blocks (the primary strategy);
//! when nothing balanced is found, the text is split at every `test(` marker
//! instead (the fallback). Extracted blocks are wrapped in a fixed suite
//! template that logs each result and screenshots unexpected outcomes.


use crate::error::PipelineError;
use crate::generated_text::{has_test_marker, strip_code_fences};
use crate::prompts::script_prompt;
use crate::scenario::split_scenario_blocks;
use crate::text_generation::TextGenerator;

const TEST_CALL: &[u8] = b"test(";

const SUITE_TEMPLATE: &str = r#"import { test, expect } from '@playwright/test';

test.describe('__SUITE__', () => {

  test.beforeAll(async () => {
    console.log('\n Suite Setup: __SUITE__\n');
  });

  test.afterAll(async () => {
    console.log('\n Suite Teardown: __SUITE__\n');
  });

  test.afterEach(async ({ page }, testInfo) => {
    const mark = testInfo.status === 'passed' ? 'PASS' : 'FAIL';
    console.log(`${mark} ${testInfo.title} - ${testInfo.status}`);

    if (testInfo.status !== testInfo.expectedStatus) {
      const cleanTitle = testInfo.title.replace(/[^a-zA-Z0-9]/g, '_');
      await page.screenshot({ path: `screenshots/${cleanTitle}.png` });
    }
  });

__TESTS__

});
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptArtifact {
    pub key: String,
    pub content: String,
    pub test_count: usize,
    pub strategy: ExtractionStrategy,
}

pub struct ScriptSynthesizer<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> ScriptSynthesizer<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    pub fn synthesize(&self, key: &str, document: &str) -> Result<ScriptArtifact, PipelineError> {
        let blocks = split_scenario_blocks(document);
        if blocks.is_empty() {
            return Err(PipelineError::NoValidScenarios(format!(
                "scenario document '{key}' has no TestCase ID blocks"
            )));
        }
        tracing::info!(key, scenarios = blocks.len(), "synthesizing script");

        let raw = self.generator.generate(&script_prompt(&blocks))?;
        let code = strip_code_fences(&raw);
        if !has_test_marker(&code) {
            return Err(PipelineError::NoValidScript(format!(
                "response has no test( marker: {}",
                preview(&code)
            )));
        }

        let (tests, strategy) = extract_tests(&code);
        if tests.is_empty() {
            return Err(PipelineError::NoValidScript(
                "no test blocks could be extracted".to_string(),
            ));
        }
        tracing::info!(key, tests = tests.len(), ?strategy, "extracted test blocks");

        Ok(ScriptArtifact {
            key: key.to_string(),
            content: render_suite(key, &tests),
            test_count: tests.len(),
            strategy,
        })
    }
}

/// Primary balanced scan, then the split fallback when it finds nothing.
pub fn extract_tests(code: &str) -> (Vec<String>, ExtractionStrategy) {
    let primary = scan_test_blocks(code);
    if !primary.is_empty() {
        return (primary, ExtractionStrategy::Primary);
    }
    tracing::warn!("no balanced test blocks found, splitting at test( markers");
    (split_at_test_markers(code), ExtractionStrategy::Fallback)
}

pub fn render_suite(key: &str, tests: &[String]) -> String {
    let suite = escape_single_quoted(&key.replace('_', " "));
    SUITE_TEMPLATE
        .replace("__SUITE__", &suite)
        .replace("__TESTS__", &tests.join("\n\n"))
}

fn escape_single_quoted(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

fn preview(text: &str) -> String {
    let head = text.chars().take(200).collect::<String>();
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head
    }
}

/// Finds every complete `test(<args>, <fn> { <body> })` call.
pub fn scan_test_blocks(code: &str) -> Vec<String> {
    let bytes = code.as_bytes();
    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(start) = find_test_call(bytes, cursor) {
        match match_test_call(bytes, start) {
            Some(end) => {
                blocks.push(code[start..end].trim().to_string());
                cursor = end;
            }
            None => cursor = start + TEST_CALL.len(),
        }
    }
    blocks
}

fn split_at_test_markers(code: &str) -> Vec<String> {
    let bytes = code.as_bytes();
    let mut starts = Vec::new();
    let mut cursor = 0;
    while let Some(start) = find_subslice(bytes, TEST_CALL, cursor) {
        starts.push(start);
        cursor = start + TEST_CALL.len();
    }
    starts
        .iter()
        .enumerate()
        .map(|(index, start)| {
            let end = starts.get(index + 1).copied().unwrap_or(code.len());
            code[*start..end].trim().to_string()
        })
        .filter(|fragment| fragment.starts_with("test("))
        .collect()
}

fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_test_call(bytes: &[u8], from: usize) -> Option<usize> {
    let mut cursor = from;
    while let Some(found) = find_subslice(bytes, TEST_CALL, cursor) {
        let at_boundary = found == 0 || !is_identifier_byte(bytes[found - 1]);
        if at_boundary {
            return Some(found);
        }
        cursor = found + TEST_CALL.len();
    }
    None
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'.')
}

/// Returns the end offset of the call starting at `start`, `;` included.
fn match_test_call(bytes: &[u8], start: usize) -> Option<usize> {
    let mut index = start + TEST_CALL.len();
    let mut paren_depth = 1_usize;
    let mut last = b'(';
    let mut before_last = b't';

    while index < bytes.len() {
        let byte = bytes[index];
        match byte {
            b'\'' | b'"' | b'`' => {
                index = skip_string(bytes, index)?;
                before_last = last;
                last = byte;
                continue;
            }
            b'/' if bytes.get(index + 1) == Some(&b'/') || bytes.get(index + 1) == Some(&b'*') => {
                index = skip_comment(bytes, index);
                continue;
            }
            b'(' => paren_depth += 1,
            b')' => {
                paren_depth -= 1;
                if paren_depth == 0 {
                    // Argument list closed without a function body.
                    return None;
                }
            }
            b'{' => {
                let close = skip_braces(bytes, index)?;
                let is_body =
                    paren_depth == 1 && (last == b')' || (last == b'>' && before_last == b'='));
                if is_body {
                    return close_call(bytes, close);
                }
                index = close;
                before_last = last;
                last = b'}';
                continue;
            }
            _ => {}
        }
        if !byte.is_ascii_whitespace() {
            before_last = last;
            last = byte;
        }
        index += 1;
    }
    None
}

/// After the body: whitespace, `)`, then an optional `;`.
fn close_call(bytes: &[u8], after_body: usize) -> Option<usize> {
    let mut index = skip_whitespace(bytes, after_body);
    if bytes.get(index) != Some(&b')') {
        return None;
    }
    index += 1;
    let after_space = skip_whitespace(bytes, index);
    if bytes.get(after_space) == Some(&b';') {
        return Some(after_space + 1);
    }
    Some(index)
}

fn skip_whitespace(bytes: &[u8], mut index: usize) -> usize {
    while bytes.get(index).is_some_and(|byte| byte.is_ascii_whitespace()) {
        index += 1;
    }
    index
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    if bytes.get(start + 1) == Some(&b'/') {
        return find_subslice(bytes, b"\n", start).unwrap_or(bytes.len());
    }
    find_subslice(bytes, b"*/", start + 2)
        .map(|end| end + 2)
        .unwrap_or(bytes.len())
}

/// Index just past the closing quote; `None` when unterminated.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut index = start + 1;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            b'$' if quote == b'`' && bytes.get(index + 1) == Some(&b'{') => {
                index = skip_braces(bytes, index + 1)?;
            }
            byte if byte == quote => return Some(index + 1),
            _ => index += 1,
        }
    }
    None
}

/// Index just past the `}` matching the `{` at `open`.
fn skip_braces(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut index = open;
    while index < bytes.len() {
        match bytes[index] {
            b'\'' | b'"' | b'`' => {
                index = skip_string(bytes, index)?;
                continue;
            }
            b'/' if bytes.get(index + 1) == Some(&b'/') || bytes.get(index + 1) == Some(&b'*') => {
                index = skip_comment(bytes, index);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index + 1);
                }
            }
            _ => {}
        }
        index += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::{
        extract_tests, render_suite, scan_test_blocks, ExtractionStrategy, ScriptSynthesizer,
    };
    use crate::error::PipelineError;
    use crate::text_generation::{TextGenerationError, TextGenerator};

    struct CannedGenerator {
        reply: String,
        prompts: RefCell<Vec<String>>,
    }

    impl CannedGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for CannedGenerator {
        fn generate(&self, prompt: &str) -> Result<String, TextGenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    const TWO_CASES: &str = "TestCase ID: TC001\nScenario: A\nType: Positive\n\n---\n\nTestCase ID: TC002\nScenario: B\nType: Negative\n";

    #[test]
    fn unit_scanner_extracts_balanced_calls_with_tricky_strings() {
        let code = r#"test('TC001: braces } in ) strings', async ({ page }) => {
  await page.goto(process.env.TEST_URL);
  // a comment with test( and }
  await expect(page.locator(`#${'id'}`)).toHaveText("{x}");
});

const helper = latest.test('not a test');

test("TC002: plain function", async function ({ page }) {
  if (true) { await page.click('#a'); }
})"#;
        let blocks = scan_test_blocks(code);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("test('TC001"));
        assert!(blocks[0].ends_with("});"));
        assert!(blocks[1].starts_with("test(\"TC002"));
        assert!(blocks[1].ends_with("})"));
    }

    #[test]
    fn unit_scanner_finds_tests_nested_in_describe() {
        let code = "test.describe('suite', () => {\n  test('inner', async () => {\n    expect(1).toBe(1);\n  });\n});";
        let blocks = scan_test_blocks(code);
        assert_eq!(blocks, vec!["test('inner', async () => {\n    expect(1).toBe(1);\n  });"]);
    }

    #[test]
    fn regression_truncated_response_uses_fallback_split() {
        let code = "test('a', async ({ page }) => {\n  await page.goto(x);\n\ntest('b', async ({ page }) => {\n  await page.click('#b');";
        let (tests, strategy) = extract_tests(code);
        assert_eq!(strategy, ExtractionStrategy::Fallback);
        assert_eq!(tests.len(), 2);
        assert!(tests[1].starts_with("test('b'"));
    }

    #[test]
    fn unit_render_suite_names_describe_after_key() {
        let content = render_suite("Test_Login_Page", &["test('a', () => {});".to_string()]);
        assert!(content.starts_with("import { test, expect } from '@playwright/test';"));
        assert!(content.contains("test.describe('Test Login Page', () => {"));
        assert!(content.contains("screenshots/${cleanTitle}.png"));
        assert!(content.contains("test('a', () => {});"));
        assert!(!content.contains("__TESTS__"));
    }

    #[test]
    fn functional_synthesize_batches_once_and_strips_fences() {
        let generator = CannedGenerator::new(
            "```javascript\ntest('TC001: A', async ({ page }) => {\n  await page.goto(process.env.TEST_URL);\n});\n\ntest('TC002: B', async ({ page }) => {\n  await page.goto(process.env.TEST_URL);\n});\n```",
        );
        let artifact = ScriptSynthesizer::new(&generator)
            .synthesize("Login", TWO_CASES)
            .expect("artifact");
        assert_eq!(artifact.test_count, 2);
        assert_eq!(artifact.strategy, ExtractionStrategy::Primary);
        assert!(!artifact.content.contains("```"));
        let prompts = generator.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("TestCase ID: TC002"));
    }

    #[test]
    fn functional_synthesize_reports_missing_blocks_and_markers() {
        let generator = CannedGenerator::new("I cannot help with that.");
        let synthesizer = ScriptSynthesizer::new(&generator);
        assert!(matches!(
            synthesizer.synthesize("Login", "no blocks here"),
            Err(PipelineError::NoValidScenarios(_))
        ));
        assert!(generator.prompts.borrow().is_empty());
        assert!(matches!(
            synthesizer.synthesize("Login", TWO_CASES),
            Err(PipelineError::NoValidScript(_))
        ));
    }
}
