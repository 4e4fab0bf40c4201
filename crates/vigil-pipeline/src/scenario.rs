//! Scenario records and the plain-text document grammar they persist in.
//!
//! A document is a sequence of blocks, each opened by a `TestCase ID:` line.
//! Parsing is per block and never fails as a whole: blocks that lack a title
//! or a recognizable category come back as [`ScenarioBlock::Malformed`].

use std::fmt;

const ID_LABEL: &str = "testcase id:";
const TITLE_LABEL: &str = "scenario:";
const CATEGORY_LABEL: &str = "type:";
const DATA_LABEL: &str = "test data:";
const STEPS_LABEL: &str = "steps:";
const EXPECTED_LABEL: &str = "expected result:";
const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioCategory {
    Positive,
    Negative,
    Edge,
}

impl ScenarioCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.contains("positive") {
            Some(Self::Positive)
        } else if lowered.contains("negative") {
            Some(Self::Negative)
        } else if lowered.contains("edge") || lowered.contains("boundary") {
            Some(Self::Edge)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Edge => "Edge",
        }
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRecord {
    pub id: u32,
    pub title: String,
    pub category: ScenarioCategory,
    pub data: Vec<(String, String)>,
    pub steps: Vec<String>,
    pub expected: String,
}

impl ScenarioRecord {
    /// Identity used for duplicate detection.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("TestCase ID: {}\n", format_scenario_id(self.id)));
        out.push_str(&format!("Scenario: {}\n", self.title));
        out.push_str(&format!("Type: {}\n", self.category));
        if !self.data.is_empty() {
            let data = self
                .data
                .iter()
                .map(|(key, value)| {
                    if value.is_empty() {
                        key.clone()
                    } else {
                        format!("{key}: {value}")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("Test Data: {data}\n"));
        }
        out.push_str("\nSteps:\n");
        for (index, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("{}. {step}\n", index + 1));
        }
        out.push_str(&format!("\nExpected Result: {}", self.expected));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioBlock {
    Parsed(ScenarioRecord),
    Malformed { reason: String, text: String },
}

pub fn format_scenario_id(id: u32) -> String {
    format!("TC{id:03}")
}

/// Trims, collapses internal whitespace, and case-folds a scenario title.
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derives the artifact key from a page title: punctuation dropped,
/// whitespace runs joined with `_`.
pub fn document_key(page_title: &str) -> String {
    let cleaned = page_title
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || ch.is_whitespace())
        .collect::<String>();
    let key = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    if key.is_empty() {
        "untitled".to_string()
    } else {
        key
    }
}

/// Splits text into blocks at lines starting with `TestCase ID:`; anything
/// before the first such line is dropped.
pub fn split_scenario_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in text.lines() {
        if strip_label(line.trim_start(), ID_LABEL).is_some() {
            if let Some(lines) = current.take() {
                blocks.push(finish_block(&lines));
            }
            current = Some(vec![line]);
        } else if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        blocks.push(finish_block(&lines));
    }
    blocks.retain(|block| !block.is_empty());
    blocks
}

fn finish_block(lines: &[&str]) -> String {
    let joined = lines.join("\n");
    let mut block = joined.trim();
    while let Some(stripped) = block.strip_suffix("---") {
        block = stripped.trim_end();
    }
    block.to_string()
}

pub fn parse_scenario_document(text: &str) -> Vec<ScenarioBlock> {
    split_scenario_blocks(text)
        .into_iter()
        .map(|block| parse_scenario_block(&block))
        .collect()
}

pub fn render_scenario_document(records: &[ScenarioRecord]) -> String {
    records
        .iter()
        .map(ScenarioRecord::render)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Appends rendered records to an existing document body.
pub fn append_to_document(existing: Option<&str>, records: &[ScenarioRecord]) -> String {
    let rendered = render_scenario_document(records);
    match existing.map(str::trim_end).filter(|body| !body.is_empty()) {
        Some(body) => format!("{body}{BLOCK_SEPARATOR}{rendered}\n"),
        None => format!("{rendered}\n"),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Steps,
    Expected,
}

pub fn parse_scenario_block(block: &str) -> ScenarioBlock {
    let mut id = 0_u32;
    let mut title = None;
    let mut category_raw = None;
    let mut data = Vec::new();
    let mut steps = Vec::new();
    let mut expected = String::new();
    let mut section = Section::Header;

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line == "---" {
            continue;
        }
        if let Some(value) = strip_label(line, ID_LABEL) {
            id = parse_id_number(value).unwrap_or(0);
            section = Section::Header;
        } else if let Some(value) = strip_label(line, TITLE_LABEL) {
            title = Some(value.to_string());
            section = Section::Header;
        } else if let Some(value) = strip_label(line, CATEGORY_LABEL) {
            category_raw = Some(value.to_string());
            section = Section::Header;
        } else if let Some(value) = strip_label(line, DATA_LABEL) {
            data = parse_test_data(value);
            section = Section::Header;
        } else if let Some(value) = strip_label(line, STEPS_LABEL) {
            section = Section::Steps;
            if !value.is_empty() {
                steps.push(strip_step_marker(value).to_string());
            }
        } else if let Some(value) = strip_label(line, EXPECTED_LABEL) {
            expected = value.to_string();
            section = Section::Expected;
        } else {
            match section {
                Section::Steps => steps.push(strip_step_marker(line).to_string()),
                Section::Expected => {
                    if !expected.is_empty() {
                        expected.push(' ');
                    }
                    expected.push_str(line);
                }
                Section::Header => {}
            }
        }
    }

    let Some(title) = title.filter(|title| !title.trim().is_empty()) else {
        return ScenarioBlock::Malformed {
            reason: "missing Scenario title".to_string(),
            text: block.to_string(),
        };
    };
    let Some(category) = category_raw.as_deref().and_then(ScenarioCategory::parse) else {
        return ScenarioBlock::Malformed {
            reason: format!(
                "missing or unknown Type '{}'",
                category_raw.unwrap_or_default()
            ),
            text: block.to_string(),
        };
    };

    ScenarioBlock::Parsed(ScenarioRecord {
        id,
        title: title.trim().to_string(),
        category,
        data,
        steps,
        expected,
    })
}

/// Case-insensitive label prefix match returning the trimmed remainder.
pub(crate) fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        line.get(label.len()..).map(str::trim)
    } else {
        None
    }
}

fn parse_id_number(raw: &str) -> Option<u32> {
    let digits = raw
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse().ok()
}

fn parse_test_data(raw: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once(':') {
            Some((key, value)) => pairs.push((key.trim().to_string(), value.trim().to_string())),
            // A comma inside a value: glue it back onto the previous pair.
            None => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push_str(", ");
                    value.push_str(segment);
                }
                None => pairs.push((segment.to_string(), String::new())),
            },
        }
    }
    pairs
}

fn strip_step_marker(line: &str) -> &str {
    let without_digits = line.trim_start_matches(|ch: char| ch.is_ascii_digit());
    if without_digits.len() != line.len() {
        if let Some(rest) = without_digits
            .strip_prefix('.')
            .or_else(|| without_digits.strip_prefix(')'))
        {
            return rest.trim();
        }
    }
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::{
        append_to_document, document_key, normalize_title, parse_scenario_block,
        parse_scenario_document, split_scenario_blocks, ScenarioBlock, ScenarioCategory,
        ScenarioRecord,
    };

    const LOGIN_BLOCK: &str = "TestCase ID: TC001
Scenario: Login with valid credentials
Type: Positive
Test Data: username: student, password: Password123

Steps:
1. Enter username student
2. Enter password Password123
3. Click Submit

Expected Result: User lands on the
logged-in page";

    fn parsed(block: &str) -> ScenarioRecord {
        match parse_scenario_block(block) {
            ScenarioBlock::Parsed(record) => record,
            other => panic!("expected parsed block, got {other:?}"),
        }
    }

    #[test]
    fn unit_document_key_drops_punctuation_and_joins_words() {
        assert_eq!(
            document_key("Test Login | Practice Test Automation"),
            "Test_Login_Practice_Test_Automation"
        );
        assert_eq!(document_key("  Cart (3)  "), "Cart_3");
        assert_eq!(document_key("!!!"), "untitled");
    }

    #[test]
    fn unit_normalize_title_case_folds_and_collapses_whitespace() {
        assert_eq!(
            normalize_title("  Login   With VALID\tcredentials "),
            "login with valid credentials"
        );
    }

    #[test]
    fn functional_block_parser_reads_every_field() {
        let record = parsed(LOGIN_BLOCK);
        assert_eq!(record.id, 1);
        assert_eq!(record.title, "Login with valid credentials");
        assert_eq!(record.category, ScenarioCategory::Positive);
        assert_eq!(
            record.data,
            vec![
                ("username".to_string(), "student".to_string()),
                ("password".to_string(), "Password123".to_string()),
            ]
        );
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.steps[2], "Click Submit");
        assert_eq!(record.expected, "User lands on the logged-in page");
    }

    #[test]
    fn functional_render_then_parse_preserves_record() {
        let record = parsed(LOGIN_BLOCK);
        assert_eq!(parsed(&record.render()), record);
    }

    #[test]
    fn unit_block_without_category_is_malformed() {
        let block = "TestCase ID: TC002\nScenario: Something\nType: Exploratory\n";
        match parse_scenario_block(block) {
            ScenarioBlock::Malformed { reason, .. } => assert!(reason.contains("Exploratory")),
            other => panic!("expected malformed block, got {other:?}"),
        }
    }

    #[test]
    fn unit_split_drops_preamble_and_separators() {
        let text = format!("Here are your cases:\n\n{LOGIN_BLOCK}\n\n---\n\ntestcase id: TC002\nScenario: Two\nType: Edge\n---\n");
        let blocks = split_scenario_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("TestCase ID: TC001"));
        assert!(blocks[1].ends_with("Type: Edge"));
    }

    #[test]
    fn unit_test_data_keeps_commas_inside_values() {
        let record = parsed(
            "TestCase ID: TC009\nScenario: Long address\nType: Edge\nTest Data: address: 1 Main St, Springfield, zip: 00001\n",
        );
        assert_eq!(
            record.data,
            vec![
                ("address".to_string(), "1 Main St, Springfield".to_string()),
                ("zip".to_string(), "00001".to_string()),
            ]
        );
    }

    #[test]
    fn functional_append_to_document_keeps_existing_body() {
        let record = parsed(LOGIN_BLOCK);
        let created = append_to_document(None, std::slice::from_ref(&record));
        let extended = append_to_document(Some(&created), &[record]);
        assert_eq!(parse_scenario_document(&extended).len(), 2);
        assert!(extended.starts_with(created.trim_end()));
    }
}
