//! URI templates
//!
//! Simple level-1 templates: literal text with `{name}` variables. A variable
//! stands for exactly one path segment when matching.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{Result, WrmlError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Variable(String),
}

/// Parsed URI template with a compiled matcher
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    parts: Vec<Part>,
    matcher: Regex,
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.template == other.template
    }
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| WrmlError::InvalidUriTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut variable: Option<String> = None;
        let mut seen = HashSet::new();

        for c in template.chars() {
            match (c, variable.is_some()) {
                ('{', true) => return Err(invalid("nested '{'")),
                ('{', false) => {
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    variable = Some(String::new());
                }
                ('}', true) => {
                    let name = variable.take().unwrap_or_default();
                    if name.is_empty() {
                        return Err(invalid("empty variable name"));
                    }
                    if !seen.insert(name.clone()) {
                        return Err(invalid(&format!("variable '{}' appears more than once", name)));
                    }
                    parts.push(Part::Variable(name));
                }
                ('}', false) => return Err(invalid("unbalanced '}'")),
                (c, true) => {
                    if !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-') {
                        return Err(invalid(&format!("invalid character '{}' in variable name", c)));
                    }
                    if let Some(name) = variable.as_mut() {
                        name.push(c);
                    }
                }
                (c, false) => literal.push(c),
            }
        }
        if variable.is_some() {
            return Err(invalid("unclosed '{'"));
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        let mut pattern = String::from("^");
        for part in &parts {
            match part {
                Part::Literal(text) => pattern.push_str(&regex::escape(text)),
                Part::Variable(_) => pattern.push_str("([^/?#]+)"),
            }
        }
        pattern.push('$');
        let matcher = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            parts,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Variable names in order of appearance
    pub fn variable_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Variable(name) => Some(name.as_str()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    /// Expand the template; every variable must have a value
    pub fn evaluate(&self, params: &BTreeMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Variable(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| WrmlError::MissingTemplateVariable(name.clone()))?;
                    out.push_str(&percent_encode(value));
                }
            }
        }
        Ok(out)
    }

    /// Variable values if `uri` matches the template
    pub fn matches(&self, uri: &str) -> Option<BTreeMap<String, String>> {
        let captures = self.matcher.captures(uri)?;
        let values = self
            .variable_names()
            .into_iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.to_string(), percent_decode(m.as_str())))
            })
            .collect();
        Some(values)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Everything outside the RFC 3986 unreserved set
const VARIABLE_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, VARIABLE_VALUE).to_string()
}

pub(crate) fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
