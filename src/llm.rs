//! LLM client trait (spec §6 "LLM (consumed, optional)"): the retrieval
//! core assembles a system message containing the context block and the
//! user's original query, then hands it to whatever implements this trait.
//!
//! LLM orchestration itself is out of scope here — this module exists only
//! so a caller can plug one in; the only implementation shipped is
//! `NullLlm`, which always reports itself unavailable.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm backend not configured")]
    Unavailable,
    #[error("llm request failed: {0}")]
    RequestFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Chat completion backend. Implementations stream response tokens rather
/// than return a single string, mirroring the teacher's ensemble-result
/// shape for downstream consumers that want to render partial output.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;
}

/// Placeholder backend: always unavailable. A deployment without an LLM
/// configured uses this so the core still runs search/ingest without a
/// chat layer rather than requiring one to be wired up.
pub struct NullLlm;

#[async_trait]
impl Llm for NullLlm {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::Unavailable)
    }
}

/// Build the system message the core hands an `Llm`: the assembled context
/// block followed by the user's original query (spec §6).
pub fn system_message(context: &str, raw_query: &str) -> Vec<Message> {
    vec![
        Message {
            role: Role::System,
            content: context.to_string(),
        },
        Message {
            role: Role::User,
            content: raw_query.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_llm_is_always_unavailable() {
        let llm = NullLlm;
        let err = llm.complete(&[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable));
    }

    #[test]
    fn system_message_puts_context_before_query() {
        let messages = system_message("ctx block", "what happened");
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "what happened");
    }
}
