//! Session routing: opaque per-conversation tokens mapped to upstream
//! continuation identifiers.
//!
//! A pure association table. Entries are written on every turn and never
//! evicted; the map grows for the lifetime of the process.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::agent::{ContinuationId, ConversationEngine};

/// Opaque token identifying one conversation at the caller-facing
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Fresh token for a conversation that arrived without one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// In-memory token → continuation association.
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<SessionToken, ContinuationId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continuation recorded for `token`, if any turn has completed.
    pub fn resolve(&self, token: &SessionToken) -> Option<ContinuationId> {
        self.entries.read().get(token).cloned()
    }

    /// Records (or replaces) the continuation for `token`.
    pub fn record(&self, token: SessionToken, continuation: ContinuationId) {
        self.entries.write().insert(token, continuation);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Reply returned to the caller-facing boundary.
#[derive(Debug, Clone)]
pub struct RoutedReply {
    /// Token the caller must present on the next turn.
    pub token: SessionToken,
    /// Engine reply for the end user.
    pub reply: String,
}

/// Maps boundary tokens to engine continuations around each turn.
pub struct SessionRouter<E> {
    store: SessionStore,
    engine: E,
}

impl<E: ConversationEngine> SessionRouter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            store: SessionStore::new(),
            engine,
        }
    }

    /// Runs one turn: resolves the prior continuation (none for a new
    /// conversation), hands off to the engine, and records the new
    /// continuation under the same token before returning.
    pub async fn route(
        &self,
        token: Option<SessionToken>,
        message: &str,
    ) -> Result<RoutedReply> {
        let token = token.unwrap_or_else(SessionToken::generate);
        let continuation = self.store.resolve(&token);
        let turn = self
            .engine
            .continue_conversation(continuation.as_ref(), message)
            .await?;
        self.store.record(token.clone(), turn.continuation);
        Ok(RoutedReply {
            token,
            reply: turn.reply,
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::EngineTurn;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Engine double that records the continuations it was handed and
    /// returns a numbered continuation per call.
    #[derive(Default)]
    struct RecordingEngine {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ConversationEngine for RecordingEngine {
        async fn continue_conversation(
            &self,
            continuation: Option<&ContinuationId>,
            message: &str,
        ) -> Result<EngineTurn> {
            let mut seen = self.seen.lock();
            seen.push(continuation.map(|c| c.as_str().to_string()));
            let turn_index = seen.len();
            Ok(EngineTurn {
                reply: format!("reply to: {message}"),
                continuation: ContinuationId::new(format!("cont-{turn_index}")),
            })
        }
    }

    #[tokio::test]
    async fn first_turn_generates_a_token_and_records_a_continuation() {
        let router = SessionRouter::new(RecordingEngine::default());

        let routed = router.route(None, "hello").await.expect("route");
        assert_eq!(routed.reply, "reply to: hello");
        assert!(!routed.token.as_str().is_empty());
        assert_eq!(router.store().len(), 1);
        assert_eq!(
            router.store().resolve(&routed.token),
            Some(ContinuationId::new("cont-1"))
        );
    }

    #[tokio::test]
    async fn second_turn_resumes_from_the_recorded_continuation() {
        let router = SessionRouter::new(RecordingEngine::default());

        let first = router.route(None, "one").await.expect("route");
        let _second = router
            .route(Some(first.token.clone()), "two")
            .await
            .expect("route");

        let seen = router.engine.seen.lock();
        assert_eq!(*seen, vec![None, Some("cont-1".to_string())]);
        drop(seen);

        // Still one entry; the continuation was replaced, not appended.
        assert_eq!(router.store().len(), 1);
        assert_eq!(
            router.store().resolve(&first.token),
            Some(ContinuationId::new("cont-2"))
        );
    }

    #[tokio::test]
    async fn distinct_tokens_are_isolated() {
        let router = SessionRouter::new(RecordingEngine::default());

        let a = router.route(None, "a").await.expect("route");
        let b = router.route(None, "b").await.expect("route");
        assert_ne!(a.token, b.token);
        assert_eq!(router.store().len(), 2);
    }
}
