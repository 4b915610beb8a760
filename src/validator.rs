//! Chapter content validation
//!
//! [`ContentValidator::validate`] is pure and never fails: every rule runs and
//! appends to the verdict, so a rejected chapter reports all of its problems at
//! once. Rules, in order:
//!
//! 1. length bounds (too short is an error, too long a warning)
//! 2. error-page phrases, one error per distinct phrase found
//! 3. structure: a heading (`h1`-`h3`) and at least one non-empty `p`
//! 4. quality heuristics, warnings only
//!
//! Validation inspects normalized chapter markup as produced by
//! [`ContentExtractor::extract_chapter`](crate::extract::ContentExtractor::extract_chapter).

use crate::config::ValidationConfig;
use crate::types::ValidationVerdict;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static HEADING_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").ok());
static PARAGRAPH_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("p").ok());

const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', '…', '。', '！', '？', '"', '”', '\''];

/// Validates chapter content against configurable thresholds
#[derive(Clone, Debug, Default)]
pub struct ContentValidator {
    config: ValidationConfig,
}

impl ContentValidator {
    /// Create a validator with the given thresholds
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate one chapter's content
    pub fn validate(&self, content: &str, chapter_number: u32) -> ValidationVerdict {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_length(content, &mut errors, &mut warnings);
        self.check_error_indicators(content, &mut errors);

        match inspect_markup(content) {
            Ok(markup) => {
                if markup.heading.is_none() {
                    errors.push("missing chapter heading".to_string());
                }
                if markup.paragraphs.is_empty() {
                    errors.push("missing paragraph text".to_string());
                }
                self.check_quality(&markup.paragraphs, &mut warnings);
                if let Some(heading) = &markup.heading {
                    check_chapter_number(heading, chapter_number, &mut warnings);
                }
            }
            Err(reason) => errors.push(format!("validation error: {reason}")),
        }

        let verdict = ValidationVerdict::from_findings(errors, warnings);
        if !verdict.is_valid {
            tracing::debug!(
                chapter = chapter_number,
                errors = ?verdict.errors,
                "Chapter content rejected"
            );
        }
        verdict
    }

    fn check_length(&self, content: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let length = content.chars().count();
        if length < self.config.min_length {
            errors.push(format!(
                "content too short ({length} chars, minimum {})",
                self.config.min_length
            ));
        } else if length > self.config.max_length {
            warnings.push(format!(
                "content unusually long ({length} chars, maximum {})",
                self.config.max_length
            ));
        }
    }

    fn check_error_indicators(&self, content: &str, errors: &mut Vec<String>) {
        let lowered = content.to_lowercase();
        let mut seen = HashSet::new();
        for indicator in &self.config.error_indicators {
            let needle = indicator.to_lowercase();
            if needle.is_empty() || !seen.insert(needle.clone()) {
                continue;
            }
            if lowered.contains(&needle) {
                errors.push(format!("suspicious pattern found: {needle}"));
            }
        }
    }

    fn check_quality(&self, paragraphs: &[String], warnings: &mut Vec<String>) {
        if paragraphs.is_empty() {
            return;
        }

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for paragraph in paragraphs {
            if paragraph.chars().count() >= self.config.repeated_segment_min_len {
                *occurrences.entry(paragraph.as_str()).or_default() += 1;
            }
        }
        let repeated = occurrences.values().filter(|&&count| count > 1).count();
        if repeated > 0 {
            warnings.push(format!("repeated paragraphs detected ({repeated} distinct)"));
        }

        if !paragraphs
            .iter()
            .any(|p| p.contains(TERMINAL_PUNCTUATION))
        {
            warnings.push("no sentence-ending punctuation found".to_string());
        }

        let short = paragraphs
            .iter()
            .filter(|p| p.chars().count() < self.config.short_segment_len)
            .count();
        if short * 2 > paragraphs.len() {
            warnings.push(format!(
                "most paragraphs are very short ({short} of {})",
                paragraphs.len()
            ));
        }
    }
}

/// Heading and paragraph texts found in chapter markup
struct Markup {
    heading: Option<String>,
    paragraphs: Vec<String>,
}

fn inspect_markup(content: &str) -> Result<Markup, &'static str> {
    let heading_selector = HEADING_SELECTOR
        .as_ref()
        .ok_or("heading selector unavailable")?;
    let paragraph_selector = PARAGRAPH_SELECTOR
        .as_ref()
        .ok_or("paragraph selector unavailable")?;

    let fragment = Html::parse_fragment(content);

    let heading = fragment
        .select(heading_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty());

    let paragraphs = fragment
        .select(paragraph_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    Ok(Markup {
        heading,
        paragraphs,
    })
}

fn check_chapter_number(heading: &str, chapter_number: u32, warnings: &mut Vec<String>) {
    let numbers: Vec<&str> = heading
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .collect();
    if numbers.is_empty() {
        return;
    }
    let expected = chapter_number.to_string();
    if !numbers
        .iter()
        .any(|n| n.trim_start_matches('0') == expected.trim_start_matches('0'))
    {
        warnings.push("chapter number mismatch in title".to_string());
    }
}
