//! Helpers for free-form model output.

use std::sync::OnceLock;

use regex::Regex;

const TEST_MARKER: &str = "test(";
const IMPORT_MARKER: &str = "import";

fn fence_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"```[A-Za-z0-9_+\-]*[ \t]*\r?\n?").ok())
        .as_ref()
}

/// Removes every markdown code fence, with or without a language tag.
pub fn strip_code_fences(raw: &str) -> String {
    match fence_pattern() {
        Some(pattern) => pattern.replace_all(raw, "").trim().to_string(),
        None => raw.replace("```", "").trim().to_string(),
    }
}

pub fn has_test_marker(text: &str) -> bool {
    text.contains(TEST_MARKER)
}

pub fn has_import_marker(text: &str) -> bool {
    text.contains(IMPORT_MARKER)
}

/// Minimum shape of a script returned as a fix.
pub fn looks_like_script(text: &str) -> bool {
    has_test_marker(text) && has_import_marker(text)
}

#[cfg(test)]
mod tests {
    use super::{looks_like_script, strip_code_fences};

    #[test]
    fn unit_strip_code_fences_handles_any_language_tag() {
        for raw in [
            "```js\ntest('a', () => {});\n```",
            "```javascript\ntest('a', () => {});\n```\n",
            "```\ntest('a', () => {});\n```",
            "test('a', () => {});",
        ] {
            assert_eq!(strip_code_fences(raw), "test('a', () => {});");
        }
    }

    #[test]
    fn unit_strip_code_fences_removes_inner_fences_between_sections() {
        let raw = "Here you go:\n```typescript\nconst a = 1;\n```\nand\n```js\nconst b = 2;\n```";
        assert_eq!(
            strip_code_fences(raw),
            "Here you go:\nconst a = 1;\nand\nconst b = 2;"
        );
    }

    #[test]
    fn unit_looks_like_script_requires_both_markers() {
        assert!(looks_like_script(
            "import { test } from '@playwright/test';\ntest('x', async () => {});"
        ));
        assert!(!looks_like_script("test('x', async () => {});"));
        assert!(!looks_like_script("import x from 'y';"));
    }
}
