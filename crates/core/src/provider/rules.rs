//! Declarative HTML extraction rules.
//!
//! Each field of an HTML provider is described by a small rule: pick an
//! element with a CSS selector, read its text or an attribute, optionally
//! narrow it with a regex and a fixed set of transforms. Rules compile to
//! `scraper` selectors and `regex_lite` patterns; nothing is executed.

use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use super::error::RuleError;

/// Rules for a provider answering with HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlParserRules {
    /// CSS selector matching one element per result.
    pub row: String,
    pub title: FieldRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds: Option<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FieldRule>,
    #[serde(
        default,
        rename = "isPackage",
        alias = "is_package",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_package: Option<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<FieldRule>,
}

/// A bare selector (text of the first match) or a full rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldRule {
    Selector(String),
    Rule(ExtractionRule),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Element to read; the context element itself when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub scope: RuleScope,
    /// Read this attribute instead of the text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
    /// Read the inner HTML instead of the text.
    #[serde(default)]
    pub html: bool,
    /// Which match of `selector` to use.
    #[serde(default)]
    pub index: usize,
    /// Keep capture group 1 (or the whole match).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    #[default]
    Row,
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    Replace { from: String, to: String },
    Prefix { value: String },
    Suffix { value: String },
    /// Keep ASCII digits only.
    Digits,
}

impl Transform {
    fn apply(&self, value: String) -> String {
        match self {
            Transform::Trim => value.trim().to_string(),
            Transform::Lowercase => value.to_lowercase(),
            Transform::Uppercase => value.to_uppercase(),
            Transform::Replace { from, to } => value.replace(from.as_str(), to),
            Transform::Prefix { value: prefix } => format!("{}{}", prefix, value),
            Transform::Suffix { value: suffix } => format!("{}{}", value, suffix),
            Transform::Digits => value.chars().filter(|c| c.is_ascii_digit()).collect(),
        }
    }
}

fn parse_selector(field: &str, selector: &str) -> Result<Selector, RuleError> {
    Selector::parse(selector).map_err(|e| RuleError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// A rule ready for evaluation.
#[derive(Debug)]
pub struct CompiledRule {
    selector: Option<Selector>,
    scope: RuleScope,
    attr: Option<String>,
    html: bool,
    index: usize,
    regex: Option<Regex>,
    transforms: Vec<Transform>,
}

impl CompiledRule {
    pub fn compile(field: &str, rule: &FieldRule) -> Result<Self, RuleError> {
        let rule = match rule {
            FieldRule::Selector(selector) => ExtractionRule {
                selector: Some(selector.clone()),
                ..Default::default()
            },
            FieldRule::Rule(rule) => rule.clone(),
        };

        let selector = rule
            .selector
            .as_deref()
            .map(|s| parse_selector(field, s))
            .transpose()?;

        let regex = rule
            .regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| RuleError::InvalidRegex {
                    field: field.to_string(),
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            selector,
            scope: rule.scope,
            attr: rule.attr,
            html: rule.html,
            index: rule.index,
            regex,
            transforms: rule.transforms,
        })
    }

    /// Evaluate against a row. Missing elements, attributes or regex
    /// matches, and empty results, all yield `None`.
    pub fn evaluate(&self, row: ElementRef<'_>, document: &Html) -> Option<String> {
        let context = match self.scope {
            RuleScope::Row => row,
            RuleScope::Document => document.root_element(),
        };

        let element = match &self.selector {
            Some(selector) => context.select(selector).nth(self.index)?,
            None => context,
        };

        let mut value = if let Some(attr) = &self.attr {
            element.value().attr(attr)?.to_string()
        } else if self.html {
            element.inner_html()
        } else {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        };

        if let Some(regex) = &self.regex {
            let captures = regex.captures(&value)?;
            value = captures
                .get(1)
                .or_else(|| captures.get(0))
                .map(|m| m.as_str().to_string())?;
        }

        let value = self
            .transforms
            .iter()
            .fold(value, |acc, transform| transform.apply(acc));

        (!value.is_empty()).then_some(value)
    }
}

/// All rules of one provider, compiled.
#[derive(Debug)]
pub struct CompiledHtmlParser {
    pub row: Selector,
    pub title: CompiledRule,
    pub url: Option<CompiledRule>,
    pub seeds: Option<CompiledRule>,
    pub peers: Option<CompiledRule>,
    pub size: Option<CompiledRule>,
    pub is_package: Option<CompiledRule>,
    pub hash: Option<CompiledRule>,
}

impl HtmlParserRules {
    pub fn compile(&self) -> Result<CompiledHtmlParser, RuleError> {
        let optional = |field: &str, rule: &Option<FieldRule>| {
            rule.as_ref()
                .map(|r| CompiledRule::compile(field, r))
                .transpose()
        };

        Ok(CompiledHtmlParser {
            row: parse_selector("row", &self.row)?,
            title: CompiledRule::compile("title", &self.title)?,
            url: optional("url", &self.url)?,
            seeds: optional("seeds", &self.seeds)?,
            peers: optional("peers", &self.peers)?,
            size: optional("size", &self.size)?,
            is_package: optional("isPackage", &self.is_package)?,
            hash: optional("hash", &self.hash)?,
        })
    }
}
