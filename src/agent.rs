//! Boundary trait for the upstream conversational engine.
//!
//! The engine itself (prompting, tool dispatch decisions, natural
//! language) is an external collaborator; this module only fixes the
//! handshake the session router depends on.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Opaque handle returned by the upstream engine that lets a later call
/// resume the same logical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationId(String);

impl ContinuationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One completed engine turn.
#[derive(Debug, Clone)]
pub struct EngineTurn {
    /// Natural-language reply for the end user.
    pub reply: String,
    /// Handle for resuming this conversation on the next turn.
    pub continuation: ContinuationId,
}

/// Hand-off point to the hosted agent framework.
#[async_trait]
pub trait ConversationEngine: Send + Sync {
    /// Runs one turn, resuming from `continuation` when present.
    async fn continue_conversation(
        &self,
        continuation: Option<&ContinuationId>,
        message: &str,
    ) -> Result<EngineTurn>;
}
