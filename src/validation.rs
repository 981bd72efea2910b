use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::error::AppError;

/// A single validation constraint applied to one input field.
///
/// `Sometimes` limits the remaining rules to requests where the key is present,
/// which is how partial updates are validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Sometimes,
    Required,
    Nullable,
    String,
    Max(usize),
    Date,
    Email,
}

/// Field name paired with the rules that apply to it, checked in order.
pub type FieldRules = (&'static str, &'static [Rule]);

/// ValidationErrors
///
/// Per-field error messages, kept in the order the fields were declared so the
/// summary message names the first failing field.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", summary(.fields))]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

/// Body of a 422 response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    #[schema(example = "The title field is required. (and 1 more error)")]
    pub message: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message.into()),
            None => self.fields.push((field.to_string(), vec![message.into()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn into_response_body(self) -> ValidationErrorResponse {
        ValidationErrorResponse {
            message: self.to_string(),
            errors: self.fields.into_iter().collect(),
        }
    }
}

fn summary(fields: &[(String, Vec<String>)]) -> String {
    let Some(first) = fields.first().and_then(|(_, messages)| messages.first()) else {
        return "The given data was invalid.".to_string();
    };
    let remaining = fields.iter().map(|(_, m)| m.len()).sum::<usize>() - 1;
    match remaining {
        0 => first.clone(),
        1 => format!("{first} (and 1 more error)"),
        n => format!("{first} (and {n} more errors)"),
    }
}

/// Input
///
/// A normalized JSON object body. Strings are trimmed and empty strings become
/// `null` before any rule runs. Empty bodies, `{}` and `[]` all produce an empty
/// input so that required-field errors are reported rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input(Map<String, Value>);

/// Typed request payloads built from an `Input` once it passes validation.
pub trait FromInput: Sized {
    const RULES: &'static [FieldRules];

    /// Only called after `RULES` passed, so typed getters can be trusted.
    fn from_input(input: &Input) -> Self;
}

impl Input {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationErrors> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|_| ValidationErrors::single("body", "The request body must be valid JSON."))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationErrors> {
        match normalize(value) {
            Value::Object(map) => Ok(Self(map)),
            Value::Array(items) if items.is_empty() => Ok(Self::default()),
            Value::Null => Ok(Self::default()),
            _ => Err(ValidationErrors::single(
                "body",
                "The request body must be a JSON object.",
            )),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        self.str(key).and_then(parse_date)
    }

    /// Checks every field against its rules, collecting all failures.
    pub fn validate(&self, rules: &[FieldRules]) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (field, field_rules) in rules {
            self.check_field(field, field_rules, &mut errors);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn validated<T: FromInput>(&self) -> Result<T, ValidationErrors> {
        self.validate(T::RULES)?;
        Ok(T::from_input(self))
    }

    fn check_field(&self, field: &str, rules: &[Rule], errors: &mut ValidationErrors) {
        let attribute = field.replace('_', " ");
        let value = self.0.get(field);

        if rules.contains(&Rule::Sometimes) && value.is_none() {
            return;
        }
        if rules.contains(&Rule::Required) && value.is_none_or(is_blank) {
            errors.add(field, format!("The {attribute} field is required."));
            return;
        }
        let Some(value) = value else {
            return;
        };
        if value.is_null() && rules.contains(&Rule::Nullable) {
            return;
        }

        for rule in rules {
            match rule {
                Rule::String if !value.is_string() => {
                    errors.add(field, format!("The {attribute} field must be a string."));
                }
                Rule::Max(max) => {
                    if value.as_str().is_some_and(|s| s.chars().count() > *max) {
                        errors.add(
                            field,
                            format!("The {attribute} field must not be greater than {max} characters."),
                        );
                    }
                }
                Rule::Date if value.as_str().and_then(parse_date).is_none() => {
                    errors.add(field, format!("The {attribute} field must be a valid date."));
                }
                Rule::Email if !value.as_str().is_some_and(is_email) => {
                    errors.add(
                        field,
                        format!("The {attribute} field must be a valid email address."),
                    );
                }
                _ => {}
            }
        }
    }
}

impl<S> FromRequest<S> for Input
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(%rejection, "failed to read request body");
            ValidationErrors::single("body", "The request body could not be read.")
        })?;
        Ok(Input::from_slice(&bytes)?)
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` and RFC 3339 timestamps.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn normalize(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else if trimmed.len() == s.len() {
                Value::String(s)
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
        other => other,
    }
}
