use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes shared by every layer. The boundary matches on these.
pub mod codes {
    pub const UNREADABLE_PDF: &str = "UNREADABLE_PDF";
    pub const PDF_RENDER_FAILED: &str = "PDF_RENDER_FAILED";
    pub const EMPTY_DOCUMENT: &str = "EMPTY_DOCUMENT";
    pub const EMPTY_INDEX: &str = "EMPTY_INDEX";
    pub const EMBEDDINGS_FAILED: &str = "EMBEDDINGS_FAILED";
    pub const RETRIEVAL_FAILED: &str = "RETRIEVAL_FAILED";
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
    pub const MALFORMED_EXAM_OUTPUT: &str = "MALFORMED_EXAM_OUTPUT";
    pub const EXAM_GENERATION_FAILED: &str = "EXAM_GENERATION_FAILED";
    pub const REPORT_RENDER_FAILED: &str = "REPORT_RENDER_FAILED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const CREDENTIAL_MISSING: &str = "CREDENTIAL_MISSING";
    pub const REMOTE_NOT_ALLOWED: &str = "REMOTE_NOT_ALLOWED";
}

/// Single structured error shape used across the pipeline and shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Marks a failure the user may re-trigger manually. Nothing retries automatically.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = self.details.as_deref() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
