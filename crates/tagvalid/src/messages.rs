//! Default message templates.
//!
//! Templates use `{}` placeholders filled positionally from
//! [`Validator::message_args`](crate::rules::Validator::message_args).
//! Each [`Registry`](crate::Registry) owns a table, so services can swap in
//! their own wording without touching process-wide state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("Required", "is required"),
    ("Min", "cannot be less than {}"),
    ("Max", "must be less than {}"),
    ("Range", "range is between {} to {}"),
    ("MinSize", "minimum size is {}"),
    ("MaxSize", "maximum size is {}"),
    ("Length", "required length is {}"),
    ("Alpha", "must be valid alpha characters"),
    ("Numeric", "must be valid numeric characters"),
    ("AlphaNumeric", "must be valid alpha or numeric characters"),
    ("Match", "must match {}"),
    ("NoMatch", "must not match {}"),
    ("AlphaDash", "must be valid alpha or numeric or dash(-_) characters"),
    ("Base64", "must be valid base64 characters"),
    ("IsDate", "must be valid date format. eg: '{}'"),
    ("DateBefore", "must be set after or equal to {}"),
    ("SliceMatch", "only valid for ({})"),
    ("Float", "must be valid decimal/integer value"),
    ("Duplicate", "duplicate value detected"),
    ("Incremental", "must be in incremental value, start from 1"),
    ("Phone", "must be valid phone number"),
    ("Email", "must be valid email address"),
    ("PositiveFloat", "must be positive decimal number (> 0.00)"),
    ("Name", "must be valid name."),
];

static BUILTIN: OnceLock<Messages> = OnceLock::new();

/// Table of message templates keyed by rule name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Messages {
    templates: HashMap<String, String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Messages {
    /// The built-in table, shared.
    pub fn builtin() -> &'static Messages {
        BUILTIN.get_or_init(Messages::default)
    }

    /// Built-in table with `json` (an object of name → template) applied on top.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let overrides: HashMap<String, String> = serde_json::from_str(json)?;
        let mut messages = Self::default();
        messages.extend(overrides);
        Ok(messages)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Override several templates at once.
    pub fn extend<I, K, V>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, template) in overrides {
            self.set(name, template);
        }
    }

    /// Fill the template for `name` with `args`.
    pub fn render(&self, name: &str, args: &[String]) -> Option<String> {
        self.get(name).map(|template| fill(template, args))
    }
}

fn fill(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        if let Some(arg) = args.next() {
            out.push_str(arg);
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_positionally() {
        let messages = Messages::default();
        assert_eq!(
            messages.render("Range", &["1".into(), "140".into()]).unwrap(),
            "range is between 1 to 140"
        );
        assert_eq!(messages.render("Required", &[]).unwrap(), "is required");
    }

    #[test]
    fn render_unknown_rule_is_none() {
        assert!(Messages::default().render("Nope", &[]).is_none());
    }

    #[test]
    fn missing_args_leave_blank() {
        assert_eq!(fill("a {} b {}", &["x".into()]), "a x b ");
    }

    #[test]
    fn from_json_overrides_only_named_templates() {
        let messages = Messages::from_json(r#"{"Required": "can not be empty"}"#).unwrap();
        assert_eq!(messages.get("Required"), Some("can not be empty"));
        assert_eq!(messages.get("Alpha"), Some("must be valid alpha characters"));
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(Messages::from_json("[1]").is_err());
    }
}
