use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{codes, AppError};

/// API credential for the hosted language model. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Process-wide settings. Built once at startup, then only borrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamForgeConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub exam_batch_size: usize,
    pub administrative_keyword_denylist: Vec<String>,
    pub request_timeout_seconds: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<ApiKey>,

    pub llm_base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    pub render_dpi: u32,
    pub include_page_text: bool,
    pub page_text_char_limit: usize,
    pub max_parallel_batches: usize,
    pub max_mcq_per_batch: usize,
    pub max_short_answer_per_batch: usize,
    pub max_essay_per_batch: usize,
}

impl Default for ExamForgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            retrieval_k: 4,
            exam_batch_size: 4,
            administrative_keyword_denylist: default_denylist(),
            request_timeout_seconds: 60,
            api_key: None,
            llm_base_url: "https://api.groq.com/openai/v1".to_string(),
            text_model: "llama-3.3-70b-versatile".to_string(),
            vision_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            embedding_base_url: "http://127.0.0.1:11434".to_string(),
            embedding_model: "all-minilm".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            render_dpi: 72,
            include_page_text: true,
            page_text_char_limit: 1500,
            max_parallel_batches: 1,
            max_mcq_per_batch: 5,
            max_short_answer_per_batch: 3,
            max_essay_per_batch: 2,
        }
    }
}

fn default_denylist() -> Vec<String> {
    [
        "syllabus",
        "grading policy",
        "attendance policy",
        "course logistics",
        "table of contents",
        "office hours",
        "late submission",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ExamForgeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let cfg: ExamForgeConfig = toml::from_str(raw).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to parse configuration")
                .with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an optional TOML file; a missing path means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            None => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
            Some(p) => {
                let raw = fs::read_to_string(p).map_err(|e| {
                    AppError::new(codes::CONFIG_INVALID, "Failed to read configuration file")
                        .with_details(format!("path={}; err={}", p.display(), e))
                })?;
                Self::from_toml_str(&raw)
            }
        }
    }

    /// Fill the credential from the environment when the file did not set one.
    pub fn with_api_key_fallback(mut self, key: Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = key.filter(|k| !k.trim().is_empty()).map(ApiKey::new);
        }
        self
    }

    pub fn require_api_key(&self) -> Result<&ApiKey, AppError> {
        self.api_key.as_ref().ok_or_else(|| {
            AppError::new(
                codes::CREDENTIAL_MISSING,
                "Language model API key not configured",
            )
            .with_details("set api_key in the config file or GROQ_API_KEY in the environment")
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |msg: &str, details: String| -> Result<(), AppError> {
            Err(AppError::new(codes::CONFIG_INVALID, msg.to_string()).with_details(details))
        };
        if self.chunk_size == 0 {
            return invalid("chunk_size must be positive", "chunk_size=0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return invalid(
                "chunk_overlap must be smaller than chunk_size",
                format!(
                    "chunk_size={}; chunk_overlap={}",
                    self.chunk_size, self.chunk_overlap
                ),
            );
        }
        if self.retrieval_k == 0 {
            return invalid("retrieval_k must be positive", "retrieval_k=0".to_string());
        }
        if self.exam_batch_size == 0 {
            return invalid(
                "exam_batch_size must be positive",
                "exam_batch_size=0".to_string(),
            );
        }
        if self.request_timeout_seconds == 0 {
            return invalid(
                "request_timeout_seconds must be positive",
                "request_timeout_seconds=0".to_string(),
            );
        }
        if self.max_parallel_batches == 0 {
            return invalid(
                "max_parallel_batches must be positive",
                "max_parallel_batches=0".to_string(),
            );
        }
        if self.render_dpi == 0 {
            return invalid("render_dpi must be positive", "render_dpi=0".to_string());
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_seconds)
    }
}
