use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ef_ai::embeddings::ollama_embed::OllamaEmbedder;
use ef_ai::llm::chat_completions::ChatCompletionsLlm;
use ef_ai::ollama::OllamaClient;
use ef_ai::session::ChatSession;
use ef_core::config::ExamForgeConfig;
use ef_core::extract::pdfium::PdfiumRasterizer;
use log::{info, warn};

/// Configuration and external collaborators, built once at startup and only borrowed after.
pub struct App {
    pub config: ExamForgeConfig,
    pub embedder: OllamaEmbedder,
    pub llm: ChatCompletionsLlm,
    rasterizer: PdfiumRasterizer,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = ExamForgeConfig::load(config_path)
            .context("Failed to load configuration")?
            .with_api_key_fallback(dotenv::var("GROQ_API_KEY").ok());

        let ollama = OllamaClient::new(&config.embedding_base_url, config.request_timeout())?;
        if let Err(e) = ollama.health_check() {
            warn!("embedding server not reachable yet: {e}");
        }
        let embedder = OllamaEmbedder::new(ollama);
        let llm = ChatCompletionsLlm::from_config(&config)?;
        let rasterizer = PdfiumRasterizer::from_system_library(config.render_dpi)
            .context("Failed to load the pdfium library")?;

        Ok(Self {
            config,
            embedder,
            llm,
            rasterizer,
        })
    }

    /// Read and ingest a PDF into a fresh session.
    pub fn open(&self, pdf: &Path) -> Result<ChatSession> {
        let bytes =
            fs::read(pdf).with_context(|| format!("Failed to read {}", pdf.display()))?;
        info!("ingesting {} ({} bytes)", pdf.display(), bytes.len());
        let session = ChatSession::open(&bytes, &self.config, &self.rasterizer, &self.embedder)?;
        Ok(session)
    }
}
