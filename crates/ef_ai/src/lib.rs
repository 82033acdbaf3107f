pub mod embeddings;
pub mod exam;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod prompts;
pub mod retrieve;
pub mod session;
