//! Slot value descriptors
//!
//! A [`Value`] describes what a slot may hold. Model values themselves are
//! plain `serde_json::Value`s; [`Value::check`] is the single place where a
//! JSON value is matched against its descriptor.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use super::SchemaUri;
use crate::checksum::canonical_json;

/// Lexical syntax constraint for text slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Syntax {
    Uri,
    Uuid,
    Email,
}

impl Syntax {
    /// JSON-Schema `format` name for this syntax
    pub fn format_name(&self) -> &'static str {
        match self {
            Syntax::Uri => "uri",
            Syntax::Uuid => "uuid",
            Syntax::Email => "email",
        }
    }

    /// Syntax for a JSON-Schema `format`, if WRML has one
    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            "uri" | "url" => Some(Syntax::Uri),
            "uuid" => Some(Syntax::Uuid),
            "email" => Some(Syntax::Email),
            _ => None,
        }
    }

    fn accepts(&self, text: &str) -> bool {
        static URI: OnceLock<Regex> = OnceLock::new();
        static EMAIL: OnceLock<Regex> = OnceLock::new();

        match self {
            Syntax::Uri => URI
                .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S*$").unwrap())
                .is_match(text),
            Syntax::Email => EMAIL
                .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
                .is_match(text),
            Syntax::Uuid => uuid::Uuid::parse_str(text).is_ok(),
        }
    }
}

/// Type descriptor of a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Value {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        syntax: Option<Syntax>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Long {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Double {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Boolean,
    Date,
    Model {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema_uri: Option<SchemaUri>,
    },
    List {
        element: Box<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_size: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_size: Option<usize>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        unique: bool,
    },
    SingleSelect {
        choices: Vec<String>,
    },
    MultiSelect {
        choices: Vec<String>,
    },
    Link {
        link_relation_uri: String,
    },
}

impl Value {
    /// Plain text with no constraints
    pub fn text() -> Self {
        Value::Text {
            syntax: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Text restricted to a syntax
    pub fn text_with_syntax(syntax: Syntax) -> Self {
        Value::Text {
            syntax: Some(syntax),
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Name of the value kind, as it appears in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text { .. } => "Text",
            Value::Integer { .. } => "Integer",
            Value::Long { .. } => "Long",
            Value::Double { .. } => "Double",
            Value::Boolean => "Boolean",
            Value::Date => "Date",
            Value::Model { .. } => "Model",
            Value::List { .. } => "List",
            Value::SingleSelect { .. } => "SingleSelect",
            Value::MultiSelect { .. } => "MultiSelect",
            Value::Link { .. } => "Link",
        }
    }

    /// Schema URI of a list of models, if this is one
    pub fn collection_schema_uri(&self) -> Option<&str> {
        match self {
            Value::List { element, .. } => match element.as_ref() {
                Value::Model { schema_uri } => schema_uri.as_deref(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Check a JSON value against this descriptor. Null always passes;
    /// presence is the concern of the `required` flag.
    pub fn check(&self, json: &JsonValue) -> Result<(), String> {
        self.check_with(json, &Patterns::default())
    }

    /// [`Value::check`] using regexes compiled ahead of time. Patterns
    /// missing from `patterns` are compiled on the spot.
    pub fn check_with(&self, json: &JsonValue, patterns: &Patterns) -> Result<(), String> {
        if json.is_null() {
            return Ok(());
        }

        match self {
            Value::Text {
                syntax,
                min_length,
                max_length,
                pattern,
            } => {
                let text = json
                    .as_str()
                    .ok_or_else(|| format!("expected text, got {}", json_kind(json)))?;
                let len = text.chars().count();
                if let Some(min) = min_length {
                    if len < *min {
                        return Err(format!("text shorter than {} characters", min));
                    }
                }
                if let Some(max) = max_length {
                    if len > *max {
                        return Err(format!("text longer than {} characters", max));
                    }
                }
                if let Some(pattern) = pattern {
                    let compiled;
                    let re = match patterns.get(pattern) {
                        Some(re) => re,
                        None => {
                            compiled = compile_pattern(pattern)?;
                            &compiled
                        }
                    };
                    if !re.is_match(text) {
                        return Err(format!("'{}' does not match pattern '{}'", text, pattern));
                    }
                }
                if let Some(syntax) = syntax {
                    if !syntax.accepts(text) {
                        return Err(format!("'{}' is not a valid {:?}", text, syntax));
                    }
                }
                Ok(())
            }
            Value::Integer { minimum, maximum } => {
                let n = json
                    .as_i64()
                    .ok_or_else(|| format!("expected integer, got {}", json_kind(json)))?;
                if i32::try_from(n).is_err() {
                    return Err(format!("{} does not fit a 32-bit integer", n));
                }
                check_range(n, *minimum, *maximum)
            }
            Value::Long { minimum, maximum } => {
                let n = json
                    .as_i64()
                    .ok_or_else(|| format!("expected long, got {}", json_kind(json)))?;
                check_range(n, *minimum, *maximum)
            }
            Value::Double { minimum, maximum } => {
                let n = json
                    .as_f64()
                    .ok_or_else(|| format!("expected number, got {}", json_kind(json)))?;
                check_range(n, *minimum, *maximum)
            }
            Value::Boolean => match json {
                JsonValue::Bool(_) => Ok(()),
                other => Err(format!("expected boolean, got {}", json_kind(other))),
            },
            Value::Date => {
                let text = json
                    .as_str()
                    .ok_or_else(|| format!("expected date text, got {}", json_kind(json)))?;
                if parse_date(text).is_some() {
                    Ok(())
                } else {
                    Err(format!("'{}' is not an RFC 3339 date", text))
                }
            }
            Value::Model { .. } => match json {
                JsonValue::Object(_) => Ok(()),
                other => Err(format!("expected model object, got {}", json_kind(other))),
            },
            Value::List {
                element,
                min_size,
                max_size,
                unique,
            } => {
                let items = json
                    .as_array()
                    .ok_or_else(|| format!("expected list, got {}", json_kind(json)))?;
                if let Some(min) = min_size {
                    if items.len() < *min {
                        return Err(format!("list has fewer than {} elements", min));
                    }
                }
                if let Some(max) = max_size {
                    if items.len() > *max {
                        return Err(format!("list has more than {} elements", max));
                    }
                }
                for (i, item) in items.iter().enumerate() {
                    element
                        .check_with(item, patterns)
                        .map_err(|e| format!("element {}: {}", i, e))?;
                }
                if *unique && !all_unique(items) {
                    return Err("list elements are not unique".to_string());
                }
                Ok(())
            }
            Value::SingleSelect { choices } => {
                let text = json
                    .as_str()
                    .ok_or_else(|| format!("expected choice text, got {}", json_kind(json)))?;
                if choices.iter().any(|c| c == text) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of {:?}", text, choices))
                }
            }
            Value::MultiSelect { choices } => {
                let items = json
                    .as_array()
                    .ok_or_else(|| format!("expected list of choices, got {}", json_kind(json)))?;
                for item in items {
                    let text = item
                        .as_str()
                        .ok_or_else(|| format!("expected choice text, got {}", json_kind(item)))?;
                    if !choices.iter().any(|c| c == text) {
                        return Err(format!("'{}' is not one of {:?}", text, choices));
                    }
                }
                if !all_unique(items) {
                    return Err("selected choices are not unique".to_string());
                }
                Ok(())
            }
            Value::Link { .. } => match json {
                JsonValue::String(_) => Ok(()),
                JsonValue::Object(obj) if obj.get("href").map_or(false, |h| h.is_string()) => Ok(()),
                other => Err(format!("expected link with href, got {}", json_kind(other))),
            },
        }
    }
}

/// `pattern` constraints of a value, compiled once
#[derive(Debug, Clone, Default)]
pub struct Patterns(HashMap<String, Regex>);

impl Patterns {
    /// Compile the patterns of `value` and of its list elements
    pub fn compile(value: &Value) -> Result<Self, String> {
        let mut compiled = HashMap::new();
        let mut current = value;
        loop {
            match current {
                Value::Text { pattern: Some(pattern), .. } => {
                    compiled.insert(pattern.clone(), compile_pattern(pattern)?);
                    break;
                }
                Value::List { element, .. } => current = &**element,
                _ => break,
            }
        }
        Ok(Self(compiled))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, pattern: &str) -> Option<&Regex> {
        self.0.get(pattern)
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date as UTC
pub fn parse_date(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    n: T,
    minimum: Option<T>,
    maximum: Option<T>,
) -> Result<(), String> {
    if let Some(min) = minimum {
        if n < min {
            return Err(format!("{} is below the minimum {}", n, min));
        }
    }
    if let Some(max) = maximum {
        if n > max {
            return Err(format!("{} is above the maximum {}", n, max));
        }
    }
    Ok(())
}

/// Elements compare in canonical form: field order and `1` vs `1.0` do not
/// make two elements distinct
fn all_unique(items: &[JsonValue]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().all(|item| seen.insert(canonical_json(item)))
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "text",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_deserializes_from_type_tag() {
        let value: Value = serde_json::from_value(json!({
            "type": "List",
            "element": { "type": "Model", "schemaUri": "http://schema.example.com/Person" },
            "maxSize": 10
        }))
        .unwrap();

        assert_eq!(value.kind(), "List");
        assert_eq!(value.collection_schema_uri(), Some("http://schema.example.com/Person"));
    }

    #[test]
    fn test_text_constraints() {
        let value = Value::Text {
            syntax: None,
            min_length: Some(2),
            max_length: Some(4),
            pattern: Some("^[a-z]+$".to_string()),
        };
        assert!(value.check(&json!("abc")).is_ok());
        assert!(value.check(&json!("a")).is_err());
        assert!(value.check(&json!("abcde")).is_err());
        assert!(value.check(&json!("AB")).is_err());
        assert!(value.check(&json!(12)).is_err());
        assert!(value.check(&JsonValue::Null).is_ok());
    }

    #[test]
    fn test_syntax_checks() {
        let uri = Value::text_with_syntax(Syntax::Uri);
        assert!(uri.check(&json!("http://api.example.com/people/1")).is_ok());
        assert!(uri.check(&json!("not a uri")).is_err());

        let id = Value::text_with_syntax(Syntax::Uuid);
        assert!(id.check(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")).is_ok());
        assert!(id.check(&json!("67e55044")).is_err());
    }

    #[test]
    fn test_integer_is_32_bit() {
        let int = Value::Integer { minimum: Some(0), maximum: None };
        assert!(int.check(&json!(42)).is_ok());
        assert!(int.check(&json!(-1)).is_err());
        assert!(int.check(&json!(5_000_000_000i64)).is_err());

        let long = Value::Long { minimum: None, maximum: None };
        assert!(long.check(&json!(5_000_000_000i64)).is_ok());
        assert!(long.check(&json!(1.5)).is_err());
    }

    #[test]
    fn test_dates() {
        assert!(Value::Date.check(&json!("2024-02-29T10:00:00Z")).is_ok());
        assert!(Value::Date.check(&json!("2024-02-29")).is_ok());
        assert!(Value::Date.check(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_selects() {
        let single = Value::SingleSelect { choices: vec!["red".into(), "blue".into()] };
        assert!(single.check(&json!("red")).is_ok());
        assert!(single.check(&json!("green")).is_err());

        let multi = Value::MultiSelect { choices: vec!["a".into(), "b".into()] };
        assert!(multi.check(&json!(["a", "b"])).is_ok());
        assert!(multi.check(&json!(["a", "a"])).is_err());
        assert!(multi.check(&json!(["c"])).is_err());
    }

    #[test]
    fn test_compiled_patterns() {
        let tags = Value::List {
            element: Box::new(Value::Text {
                syntax: None,
                min_length: None,
                max_length: None,
                pattern: Some("^#[a-z]+$".to_string()),
            }),
            min_size: None,
            max_size: None,
            unique: false,
        };
        let patterns = Patterns::compile(&tags).unwrap();
        assert!(!patterns.is_empty());
        assert!(tags.check_with(&json!(["#rust", "#wrml"]), &patterns).is_ok());
        assert!(tags.check_with(&json!(["rust"]), &patterns).is_err());

        let broken = Value::Text {
            syntax: None,
            min_length: None,
            max_length: None,
            pattern: Some("([a-z".to_string()),
        };
        assert!(Patterns::compile(&broken).unwrap_err().contains("invalid pattern"));
        assert!(Patterns::compile(&Value::Boolean).unwrap().is_empty());
    }

    #[test]
    fn test_uniqueness_uses_canonical_values() {
        let list = Value::List {
            element: Box::new(Value::Model { schema_uri: None }),
            min_size: None,
            max_size: None,
            unique: true,
        };
        let a: JsonValue = serde_json::from_str(r#"[{"x": 1, "y": 2}, {"y": 2, "x": 1}]"#).unwrap();
        assert!(list.check(&a).is_err());

        let numbers = Value::List {
            element: Box::new(Value::Double { minimum: None, maximum: None }),
            min_size: None,
            max_size: None,
            unique: true,
        };
        assert!(numbers.check(&json!([1, 1.0])).is_err());
        assert!(numbers.check(&json!([1, 1.5])).is_ok());
    }

    #[test]
    fn test_list_elements_are_checked() {
        let list = Value::List {
            element: Box::new(Value::Boolean),
            min_size: None,
            max_size: Some(2),
            unique: true,
        };
        assert!(list.check(&json!([true, false])).is_ok());
        assert!(list.check(&json!([true, true])).is_err());
        assert!(list.check(&json!([true, "x"])).is_err());
        assert!(list.check(&json!([true, false, true])).is_err());
    }

    #[test]
    fn test_links_need_href() {
        let link = Value::Link { link_relation_uri: "http://relation.example.com/self".into() };
        assert!(link.check(&json!({"href": "http://api.example.com/a"})).is_ok());
        assert!(link.check(&json!("http://api.example.com/a")).is_ok());
        assert!(link.check(&json!({"rel": "self"})).is_err());
    }
}
