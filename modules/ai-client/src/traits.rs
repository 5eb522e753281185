use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::schema::StructuredOutput;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// =============================================================================
// Structured prompt
// =============================================================================

/// One structured-output request: instruction, conversation, and the schema
/// the answer must satisfy.
#[derive(Debug, Clone)]
pub struct StructuredPrompt {
    pub system: String,
    pub messages: Vec<Message>,
    pub schema_name: String,
    pub schema: Value,
}

impl StructuredPrompt {
    /// Build a prompt whose answer must deserialize into `T`.
    pub fn for_type<T: StructuredOutput>(
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(user)],
            schema_name: schema_name_for(&T::type_name()),
            schema: T::strict_schema(),
        }
    }
}

/// Provider schema names must match `^[a-zA-Z0-9_-]{1,64}$`.
fn schema_name_for(type_name: &str) -> String {
    let name: String = type_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    if name.is_empty() {
        "structured_response".to_string()
    } else {
        name
    }
}

// =============================================================================
// StructuredModel Trait
// =============================================================================

#[async_trait]
pub trait StructuredModel: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Send the prompt and return the JSON answer. Implementations must ask the
    /// provider to enforce `prompt.schema`.
    async fn structured(&self, prompt: StructuredPrompt) -> Result<Value>;
}
