//! Prompt builders for the three text-generation calls.

use crate::dedup::ExistingScenarios;
use crate::scenario::format_scenario_id;

const SCENARIO_FORMAT_EXAMPLE: &str = "TestCase ID: TC001
Scenario: <unique description of the behavior under test>
Type: Positive
Test Data: <field>: <value>, <field>: <value>

Steps:
1. <action with the data embedded>
2. <action>

Expected Result: <observable outcome>

---

TestCase ID: TC002
Scenario: <unique description of an invalid-input case>
Type: Negative
Test Data: <field>: <invalid value>

Steps:
1. <action with the invalid data>

Expected Result: <error or validation message>

---

TestCase ID: TC003
Scenario: <unique description of a boundary case>
Type: Edge
Test Data: <field>: <boundary value>

Steps:
1. <action with the boundary data>

Expected Result: <behavior at the boundary>";

const SCRIPT_FORMAT_EXAMPLE: &str = "test('TC001: Login with valid credentials', async ({ page }) => {
  await page.goto(process.env.TEST_URL);
  await page.fill('#username', 'student');
  await page.click('#submit');
  await expect(page).toHaveURL(/logged-in/);
});";

pub(crate) fn scenario_prompt(
    snapshot_json: &str,
    positive_data: Option<&str>,
    existing: &ExistingScenarios,
) -> String {
    let mut prompt = String::from(
        "You are a senior QA engineer signing off a page for production.\n\n\
         Analyze the UI snapshot below and write functional test cases.\n\n\
         Rules:\n\
         1. Write at least 5 test cases, each one unique.\n\
         2. Order them: all Positive cases, then all Negative, then all Edge.\n\
         3. Start every case with \"TestCase ID: TC\" and a 3-digit number.\n\
         4. Plain text only. No JSON, no markdown, no code fences.\n\
         5. Embed the test data directly in the steps.\n\
         6. Map data fields to the inputs present in the snapshot.\n\n",
    );

    match positive_data.map(str::trim).filter(|data| !data.is_empty()) {
        Some(data) => {
            prompt.push_str("Positive test data (use exactly as given for Positive cases):\n");
            prompt.push_str(data);
            prompt.push_str(
                "\n\nDerive Negative and Edge data from it: empty values, wrong formats, \
                 special characters, length limits, whitespace-only input.\n\n",
            );
        }
        None => prompt.push_str(
            "No reference data is available; choose realistic values for Positive cases.\n\n",
        ),
    }

    prompt.push_str("Mandatory format, blocks separated by ---:\n\n");
    prompt.push_str(SCENARIO_FORMAT_EXAMPLE);
    prompt.push_str("\n\n");

    if !existing.titles.is_empty() {
        prompt.push_str("Existing test scenarios (do not duplicate these):\n");
        for (index, title) in existing.titles.iter().enumerate() {
            prompt.push_str(&format!("{}. {title}\n", index + 1));
        }
        prompt.push_str(&format!(
            "Write only new cases, numbered from {}.\n\n",
            format_scenario_id(existing.next_id())
        ));
    }

    prompt.push_str("UI snapshot:\n");
    prompt.push_str(snapshot_json);
    prompt.push('\n');
    prompt
}

pub(crate) fn script_prompt(blocks: &[String]) -> String {
    format!(
        "Convert every test case below into Playwright JavaScript.\n\n\
         Requirements:\n\
         1. Use the page fixture and expect for assertions.\n\
         2. Return only test() calls, one per test case.\n\
         3. No markdown, no explanations.\n\
         4. Start each test with await page.goto(process.env.TEST_URL);\n\
         5. End every statement with a semicolon.\n\n\
         Test cases:\n{}\n\n\
         Use this shape for each test case:\n\n{SCRIPT_FORMAT_EXAMPLE}\n\n\
         Output all test functions:\n",
        blocks.join("\n---\n")
    )
}

pub(crate) fn classification_prompt(raw_log: &str) -> String {
    format!(
        "You are a senior QA automation engineer.\n\n\
         Analyze this Playwright failure log and answer in exactly this format:\n\n\
         Failure Type: <Locator Issue | Assertion Failure | Application Bug | Test Data Issue | Environment / Timing Issue>\n\
         Reason: <one line>\n\
         Retry: <YES or NO>\n\
         FixTest: <YES or NO>\n\n\
         Retry means rerun without changes. FixTest means rewrite the test code.\n\
         Plain text only.\n\n\
         Failure log:\n{raw_log}\n"
    )
}

pub(crate) fn fix_prompt(raw_log: &str, current_script: &str) -> String {
    format!(
        "You are a Playwright JavaScript automation expert.\n\n\
         Fix the failing test file below using the failure log.\n\n\
         Failure log:\n{raw_log}\n\n\
         Current test code:\n{current_script}\n\n\
         Return only the complete corrected JavaScript file. No markdown, no explanation.\n\
         Keep the imports, the describe block and the hooks.\n\
         Change only the failing assertion or locator.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::{classification_prompt, fix_prompt, scenario_prompt, script_prompt};
    use crate::dedup::ExistingScenarios;

    #[test]
    fn unit_scenario_prompt_lists_existing_titles_and_next_id() {
        let existing = ExistingScenarios {
            titles: vec!["login ok".to_string(), "login wrong password".to_string()],
            record_count: 2,
        };
        let prompt = scenario_prompt("{\"title\":\"Login\"}", Some("username: student"), &existing);
        assert!(prompt.contains("do not duplicate"));
        assert!(prompt.contains("1. login ok\n2. login wrong password"));
        assert!(prompt.contains("numbered from TC003"));
        assert!(prompt.contains("username: student"));
        assert!(prompt.trim_end().ends_with("{\"title\":\"Login\"}"));
    }

    #[test]
    fn unit_scenario_prompt_without_history_or_data() {
        let prompt = scenario_prompt("{}", None, &ExistingScenarios::default());
        assert!(!prompt.contains("do not duplicate"));
        assert!(prompt.contains("No reference data"));
    }

    #[test]
    fn unit_script_prompt_batches_all_blocks() {
        let prompt = script_prompt(&[
            "TestCase ID: TC001".to_string(),
            "TestCase ID: TC002".to_string(),
        ]);
        assert!(prompt.contains("TestCase ID: TC001\n---\nTestCase ID: TC002"));
        assert!(prompt.contains("process.env.TEST_URL"));
    }

    #[test]
    fn unit_classification_and_fix_prompts_embed_inputs() {
        let prompt = classification_prompt("boom at tests/a.spec.js");
        assert!(prompt.contains("boom at tests/a.spec.js"));
        assert!(classification_prompt("x").contains("FixTest: <YES or NO>"));
        let fix = fix_prompt("the log", "the script");
        assert!(fix.contains("Failure log:\nthe log"));
        assert!(fix.contains("Current test code:\nthe script"));
    }
}
