//! URL templates for chapter, search and listing pages
//!
//! Templates use `{name}` placeholders. [`UrlTemplates`] resolves the named
//! site templates from [`SiteConfig`]; [`ChapterUrlTemplate`] is a template
//! already bound to one book, leaving only `{chapter_number}` for the worker.

use crate::config::SiteConfig;
use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

const CHAPTER_NUMBER: &str = "chapter_number";

/// Named URL templates for the configured source sites
#[derive(Clone, Debug)]
pub struct UrlTemplates {
    templates: BTreeMap<String, String>,
    default_site: String,
}

impl UrlTemplates {
    /// Templates from site configuration
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            templates: config.templates.clone(),
            default_site: config.default_site.clone(),
        }
    }

    /// Merge templates from a JSON object of `name -> template`, overriding existing names
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let custom: BTreeMap<String, String> = serde_json::from_str(json)?;
        self.templates.extend(custom);
        Ok(())
    }

    /// Raw template by name
    pub fn template(&self, name: &str) -> Result<&str> {
        self.templates.get(name).map(String::as_str).ok_or_else(|| {
            Error::config(
                format!("no URL template found for site: {name}"),
                format!("sites.templates.{name}"),
            )
        })
    }

    /// Chapter template for `book_name`, with `{chapter_number}` left unresolved
    pub fn chapter_template(&self, book_name: &str, site: Option<&str>) -> Result<ChapterUrlTemplate> {
        let site = site.unwrap_or(&self.default_site);
        let partial = render(self.template(site)?, &[("book_name", book_name)], &[CHAPTER_NUMBER])?;
        ChapterUrlTemplate::new(partial)
    }

    /// URL of one chapter of `book_name`
    pub fn chapter_url(&self, book_name: &str, chapter_number: u32, site: Option<&str>) -> Result<String> {
        Ok(self.chapter_template(book_name, site)?.render(chapter_number))
    }

    /// Search page URL, with the term percent-encoded
    pub fn search_url(&self, search_term: &str) -> Result<String> {
        let encoded = urlencoding::encode(search_term);
        finish(render(self.template("search")?, &[("search_term", encoded.as_ref())], &[])?)
    }

    /// One page of the trending listing
    pub fn hot_novels_url(&self, page: u32) -> Result<String> {
        let page = page.to_string();
        finish(render(self.template("hot_novels")?, &[("page", page.as_str())], &[])?)
    }
}

/// A chapter URL template bound to one book
///
/// Contains `{chapter_number}` and no other placeholder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterUrlTemplate(String);

impl ChapterUrlTemplate {
    /// Validate a template such as `https://site/book/chapter-{chapter_number}.html`
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let names = placeholders(&template)?;
        if let Some(other) = names.iter().find(|n| n.as_str() != CHAPTER_NUMBER) {
            return Err(Error::InvalidTemplate(format!(
                "unresolved placeholder {{{other}}} in {template}"
            )));
        }
        if names.is_empty() {
            return Err(Error::InvalidTemplate(format!(
                "missing {{{CHAPTER_NUMBER}}} in {template}"
            )));
        }
        url::Url::parse(&template.replace("{chapter_number}", "1"))
            .map_err(|e| Error::InvalidTemplate(format!("{template}: {e}")))?;
        Ok(Self(template))
    }

    /// URL of one chapter
    pub fn render(&self, chapter_number: u32) -> String {
        self.0.replace("{chapter_number}", &chapter_number.to_string())
    }

    /// The template text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChapterUrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ChapterUrlTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

fn placeholder_pattern() -> Result<&'static Regex> {
    PLACEHOLDER
        .as_ref()
        .ok_or_else(|| Error::InvalidTemplate("placeholder pattern unavailable".to_string()))
}

fn placeholders(template: &str) -> Result<Vec<String>> {
    Ok(placeholder_pattern()?
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect())
}

/// Substitute `values`, leaving names in `keep` untouched; any other placeholder is an error
fn render(template: &str, values: &[(&str, &str)], keep: &[&str]) -> Result<String> {
    let mut unknown = None;
    let rendered = placeholder_pattern()?.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        if let Some((_, value)) = values.iter().find(|(k, _)| *k == name) {
            (*value).to_string()
        } else {
            if !keep.contains(&name) && unknown.is_none() {
                unknown = Some(name.to_string());
            }
            caps[0].to_string()
        }
    });

    match unknown {
        Some(name) => Err(Error::InvalidTemplate(format!(
            "unresolved placeholder {{{name}}} in {template}"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

fn finish(url: String) -> Result<String> {
    url::Url::parse(&url).map_err(|e| Error::InvalidTemplate(format!("{url}: {e}")))?;
    Ok(url)
}
