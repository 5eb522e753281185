//! Structured-output LLM client.
//!
//! A model is anything implementing [`StructuredModel`]: it receives a system
//! instruction, a user message and a strict JSON Schema, and answers with a
//! JSON value conforming to that schema. [`OpenAi`] talks to any
//! OpenAI-compatible chat completions endpoint (OpenAI itself, or Gemini via
//! its OpenAI compatibility layer).

pub mod openai;
pub mod schema;
pub mod traits;
pub mod util;

pub use openai::OpenAi;
pub use schema::StructuredOutput;
pub use traits::{Message, MessageRole, StructuredModel, StructuredPrompt};
