use std::fmt;

use thiserror::Error;

/// Coarse classification of a failure.
///
/// Network errors never come with partial data; application errors may;
/// validation errors are raised locally before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Application,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => f.write_str("network"),
            ErrorKind::Application => f.write_str("application"),
            ErrorKind::Validation => f.write_str("validation"),
        }
    }
}

/// A single failure observed by the tracker client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("{message}")]
    Application {
        message: String,
        code: Option<String>,
        path: Vec<String>,
    },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl TrackerError {
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            code: None,
            path: Vec::new(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::Unreachable(_)
            | TrackerError::Timeout { .. }
            | TrackerError::MalformedResponse(_) => ErrorKind::Network,
            TrackerError::Application { .. } => ErrorKind::Application,
            TrackerError::Validation { .. } => ErrorKind::Validation,
        }
    }
}

/// The error channel of every transport, query, and mutation result.
///
/// Kinds are preserved per entry so callers can tell a timeout from a
/// server-reported failure even when both travel together.
#[derive(Error, Debug, Clone, Default, PartialEq)]
#[error("{}", join_messages(.0))]
pub struct ErrorList(pub Vec<TrackerError>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(error: TrackerError) -> Self {
        Self(vec![error])
    }

    pub fn push(&mut self, error: TrackerError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrackerError> {
        self.0.iter()
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind() == kind)
    }

    pub fn is_network(&self) -> bool {
        self.has_kind(ErrorKind::Network)
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.to_string()).collect()
    }
}

impl From<TrackerError> for ErrorList {
    fn from(error: TrackerError) -> Self {
        Self::single(error)
    }
}

impl IntoIterator for ErrorList {
    type Item = TrackerError;
    type IntoIter = std::vec::IntoIter<TrackerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a TrackerError;
    type IntoIter = std::slice::Iter<'a, TrackerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn join_messages(errors: &[TrackerError]) -> String {
    if errors.is_empty() {
        return "no errors".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
