//! Field validation: rule checks that accumulate per-field messages.
//!
//! Every failing rule of a field is reported, not just the first, so a
//! caller can render all problems next to the input at once.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Field name → list of messages for that field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Message for a field that is absent or null.
pub const REQUIRED: &str = "Required";
/// Message for a field whose JSON value is not a string.
pub const EXPECTED_STRING: &str = "Expected string";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid phone regex"));

/// Whether `s` looks like an email address (`local@domain.tld`).
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// Whether `s` is an optionally `+`-prefixed run of up to 16 digits not
/// starting with zero.
pub fn is_valid_phone(s: &str) -> bool {
    PHONE_RE.is_match(s)
}

/// A single check applied to a text value.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// At least N characters.
    MinLen(usize, &'static str),
    /// At most N characters.
    MaxLen(usize, &'static str),
    Email(&'static str),
    Phone(&'static str),
    /// Value must be one of the listed literals.
    OneOf(&'static [&'static str], &'static str),
}

impl Rule {
    /// Return the failure message, or `None` when the value passes.
    fn check(&self, value: &str) -> Option<&'static str> {
        let ok = match self {
            Rule::MinLen(min, _) => value.chars().count() >= *min,
            Rule::MaxLen(max, _) => value.chars().count() <= *max,
            Rule::Email(_) => is_valid_email(value),
            Rule::Phone(_) => is_valid_phone(value),
            Rule::OneOf(allowed, _) => allowed.contains(&value),
        };
        if ok { None } else { Some(self.message()) }
    }

    fn message(&self) -> &'static str {
        match self {
            Rule::MinLen(_, m)
            | Rule::MaxLen(_, m)
            | Rule::Email(m)
            | Rule::Phone(m)
            | Rule::OneOf(_, m) => m,
        }
    }
}

/// Accumulates field errors across several checks.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Run `rules` against `value`, recording every failure.
    pub fn check(&mut self, field: &str, value: &str, rules: &[Rule]) {
        for rule in rules {
            if let Some(message) = rule.check(value) {
                self.add(field, message);
            }
        }
    }

    /// Check a required string member of a JSON object.
    ///
    /// Returns the string when present so callers can build typed data from
    /// it; rule failures are recorded but do not suppress the value.
    pub fn json_text<'a>(
        &mut self,
        data: &'a Map<String, Value>,
        field: &str,
        rules: &[Rule],
    ) -> Option<&'a str> {
        match data.get(field) {
            None | Some(Value::Null) => {
                self.add(field, REQUIRED);
                None
            }
            Some(Value::String(s)) => {
                self.check(field, s, rules);
                Some(s.as_str())
            }
            Some(_) => {
                self.add(field, EXPECTED_STRING);
                None
            }
        }
    }

    /// Check an optional string member of a JSON object. Empty strings count
    /// as absent.
    pub fn json_optional_text<'a>(
        &mut self,
        data: &'a Map<String, Value>,
        field: &str,
        rules: &[Rule],
    ) -> Option<&'a str> {
        match data.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => {
                self.check(field, s, rules);
                Some(s.as_str())
            }
            Some(_) => {
                self.add(field, EXPECTED_STRING);
                None
            }
        }
    }

    /// Check a required text field from a submitted form. Missing or blank
    /// input records `required_message`; otherwise `rules` run on the trimmed
    /// value.
    pub fn form_text(
        &mut self,
        field: &str,
        value: Option<&str>,
        required_message: &str,
        rules: &[Rule],
    ) -> Option<String> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                self.check(field, v, rules);
                Some(v.to_string())
            }
            None => {
                self.add(field, required_message);
                None
            }
        }
    }

    /// Messages recorded so far for `field`.
    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when nothing failed, otherwise a `ValidationError` carrying
    /// `message` and the accumulated field map.
    pub fn finish(self, message: &str) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(message, self.errors))
        }
    }
}
