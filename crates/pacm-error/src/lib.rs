use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The ten tagged error kinds the core can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ENOTFOUND")]
    NotFound,
    #[serde(rename = "EFETCH")]
    Fetch,
    #[serde(rename = "EINSTALL")]
    Install,
    #[serde(rename = "EEXEC")]
    Exec,
    #[serde(rename = "ESECURITY")]
    Security,
    #[serde(rename = "EVALIDATION")]
    Validation,
    #[serde(rename = "ETIMEOUT")]
    Timeout,
    #[serde(rename = "ERESOLUTION")]
    Resolution,
    #[serde(rename = "ETARBALL")]
    Tarball,
    #[serde(rename = "EPARSE")]
    Parse,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "ENOTFOUND",
            Self::Fetch => "EFETCH",
            Self::Install => "EINSTALL",
            Self::Exec => "EEXEC",
            Self::Security => "ESECURITY",
            Self::Validation => "EVALIDATION",
            Self::Timeout => "ETIMEOUT",
            Self::Resolution => "ERESOLUTION",
            Self::Tarball => "ETARBALL",
            Self::Parse => "EPARSE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured context value. Kept as a small closed set rather
/// than an open property bag so the taxonomy stays inspectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

/// A tagged error with a structured, JSON round-trippable context map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmError {
    pub name: String,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, ContextValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl NpmError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            name: "NpmError".to_string(),
            code,
            message: message.into(),
            context: BTreeMap::new(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn not_found(package: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("package '{package}' not found"))
            .with_context("package", package)
    }

    pub fn resolution(package: &str, range: &str) -> Self {
        Self::new(
            ErrorCode::Resolution,
            format!("no version of '{package}' satisfies '{range}'"),
        )
        .with_context("package", package)
        .with_context("range", range)
    }

    pub fn security(message: impl Into<String>, path: &str) -> Self {
        Self::new(ErrorCode::Security, message)
            .with_context("path", path)
            .with_context("severity", "critical")
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Parse, message)
    }

    pub fn tarball(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Tarball, message)
    }

    /// JSON round-trip: `from_json(to_json(e)) == e` for any `e`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

impl fmt::Display for NpmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for NpmError {}

impl From<anyhow::Error> for NpmError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorCode::Validation, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NpmError>;

/// Type guard: is this dynamic error (or its source chain) an `NpmError`?
#[must_use]
pub fn is_npm_error(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cursor: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cursor {
        if e.downcast_ref::<NpmError>().is_some() {
            return true;
        }
        cursor = e.source();
    }
    false
}

/// Wrap an arbitrary error, preserving it if already an `NpmError`,
/// otherwise tagging it with `default_code`.
pub fn wrap(err: anyhow::Error, default_code: ErrorCode) -> NpmError {
    match err.downcast::<NpmError>() {
        Ok(npm_err) => npm_err,
        Err(err) => NpmError::new(default_code, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let err = NpmError::new(ErrorCode::Resolution, "no match")
            .with_context("package", "lodash")
            .with_context("attempts", 3i64)
            .with_stack("at resolve()");
        let json = err.to_json().expect("serializes");
        let back = NpmError::from_json(&json).expect("deserializes");
        assert_eq!(back.code, ErrorCode::Resolution);
        assert_eq!(back.message, "no match");
        assert_eq!(back.context.get("package"), Some(&ContextValue::Str("lodash".into())));
        assert_eq!(back.stack.as_deref(), Some("at resolve()"));
    }

    #[test]
    fn code_display_matches_tag() {
        assert_eq!(ErrorCode::NotFound.to_string(), "ENOTFOUND");
        assert_eq!(ErrorCode::Tarball.to_string(), "ETARBALL");
    }

    #[test]
    fn is_npm_error_detects_wrapped() {
        let err = NpmError::new(ErrorCode::Fetch, "boom");
        assert!(is_npm_error(&err));
    }

    #[test]
    fn wrap_preserves_existing_npm_error() {
        let inner = NpmError::new(ErrorCode::Security, "escape detected");
        let wrapped = wrap(anyhow::Error::new(inner), ErrorCode::Validation);
        assert_eq!(wrapped.code, ErrorCode::Security);
    }

    #[test]
    fn wrap_tags_generic_error() {
        let wrapped = wrap(anyhow::anyhow!("plain failure"), ErrorCode::Validation);
        assert_eq!(wrapped.code, ErrorCode::Validation);
        assert_eq!(wrapped.message, "plain failure");
    }
}
