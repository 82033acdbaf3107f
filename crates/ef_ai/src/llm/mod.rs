use ef_core::domain::PageImage;
use ef_core::error::AppError;

/// One multimodal call: a text prompt plus page images.
#[derive(Debug, Clone)]
pub struct MultimodalRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub images: Vec<&'a PageImage>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_output: bool,
}

/// Language-model provider. Implementations enforce their own per-call timeout
/// and report every failure as `GENERATION_FAILED`.
pub trait Llm: Send + Sync {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;

    fn generate_multimodal(&self, req: &MultimodalRequest<'_>) -> Result<String, AppError>;
}

pub mod chat_completions;
