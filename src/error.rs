//! Error types for the Hemmer provider generator.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while generating provider code for an entity.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The schema IR failed structural validation.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// An attribute kind or nesting combination has no code mapping.
    #[error("Unsupported attribute kind at '{path}': {detail}")]
    UnsupportedKind {
        /// Dotted path of the offending attribute.
        path: String,
        /// What was unsupported.
        detail: String,
    },

    /// A template could not be parsed.
    #[error("Template parse error in '{template}': {message}")]
    TemplateParse {
        /// Name of the template that failed.
        template: String,
        /// Parser message.
        message: String,
    },

    /// A template parsed but failed while rendering.
    #[error("Template render error in '{template}': {message}")]
    TemplateRender {
        /// Name of the template that failed.
        template: String,
        /// Renderer message.
        message: String,
    },

    /// A primary artifact had no template anywhere in the resolution chain.
    #[error("No template for {kind} of entity '{entity}'")]
    MissingTemplate {
        /// Entity being generated.
        entity: String,
        /// Artifact kind that had no template.
        kind: String,
    },

    /// The concatenated fragments of an entity could not be merged.
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred in a template source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generation task panicked or was cancelled.
    #[error("Task error: {0}")]
    Join(String),
}

impl GeneratorError {
    /// Create an unsupported-kind error for the attribute at `path`.
    pub fn unsupported(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedKind {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Get the error message as a string.
    ///
    /// Returns the variant payload without the category prefix where one exists.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidSchema(msg) => msg.clone(),
            Self::UnsupportedKind { detail, .. } => detail.clone(),
            Self::TemplateParse { message, .. } => message.clone(),
            Self::TemplateRender { message, .. } => message.clone(),
            Self::MissingTemplate { kind, .. } => format!("missing {} template", kind),
            Self::Merge(err) => err.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
            Self::Join(msg) => msg.clone(),
        }
    }
}

/// Errors produced while parsing concatenated Go source for merging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// A string, rune or comment was still open at end of input.
    #[error("unterminated {what} starting on line {line}")]
    Unterminated {
        /// The construct that was left open.
        what: &'static str,
        /// 1-based line where it started.
        line: usize,
    },

    /// Brackets do not balance.
    #[error("unbalanced brackets on line {line}")]
    Unbalanced {
        /// 1-based line of the offending bracket (or last line).
        line: usize,
    },

    /// No package clause precedes the first declaration.
    #[error("missing package clause")]
    MissingPackage,

    /// Two fragments declare different packages.
    #[error("package mismatch: expected '{expected}', found '{found}'")]
    PackageMismatch {
        /// Package name from the first fragment.
        expected: String,
        /// Package name that disagreed.
        found: String,
    },

    /// A top-level item could not be parsed.
    #[error("malformed source on line {line}: {detail}")]
    Malformed {
        /// 1-based line of the item.
        line: usize,
        /// What was wrong.
        detail: String,
    },
}

/// Errors returned when waiting for a remote object to converge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvergenceError {
    /// The refresh probe failed.
    #[error("probe error: {message}")]
    Probe {
        /// Message reported by the probe.
        message: String,
    },

    /// The deadline passed while the object was still pending.
    #[error("timeout after {timeout:?} waiting for state (last state: {last_state:?})")]
    Timeout {
        /// Configured overall timeout.
        timeout: Duration,
        /// Last state observed before the deadline, if any.
        last_state: Option<String>,
    },

    /// The object reached a declared failure state.
    #[error("object entered failure state '{state}'")]
    FailedState {
        /// The failure state reported.
        state: String,
    },

    /// The object reported a state outside pending, target and failure.
    #[error("unexpected state '{state}', wanted one of {expected:?}")]
    UnexpectedState {
        /// The unrecognised state.
        state: String,
        /// Every declared state, sorted.
        expected: Vec<String>,
    },

    /// The caller cancelled the wait.
    #[error("wait cancelled")]
    Cancelled,

    /// The convergence spec itself is unusable.
    #[error("invalid convergence spec: {0}")]
    InvalidSpec(String),
}

impl ConvergenceError {
    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
