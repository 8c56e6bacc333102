use super::ResumableContext;
use std::collections::HashMap;

/// RunKey identifies a logical run of a node instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunKey {
    pub node: String,
    pub run: u64,
}

impl RunKey {
    pub fn new(node: impl Into<String>, run: u64) -> Self {
        Self {
            node: node.into(),
            run,
        }
    }
}

/// ContextRegistry owns the ResumableContexts of a host, keyed by node instance and run.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: HashMap<RunKey, ResumableContext>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the context of `key`, creating a fresh one if this is a new run.
    pub fn context(&mut self, key: &RunKey) -> &mut ResumableContext {
        self.contexts.entry(key.clone()).or_default()
    }

    pub fn get(&self, key: &RunKey) -> Option<&ResumableContext> {
        self.contexts.get(key)
    }

    /// Close and discard the context of `key`. A subsequent `context()` of
    /// the same key begins a new logical run.
    pub async fn close(&mut self, key: &RunKey) {
        if let Some(mut ctx) = self.contexts.remove(key) {
            ctx.close().await;
        }
    }

    /// Close and discard every context.
    pub async fn close_all(&mut self) {
        let mut keys: Vec<_> = self.contexts.keys().cloned().collect();
        keys.sort();

        for key in keys {
            tracing::debug!(node = %key.node, run = key.run, "closing run context");
            self.close(&key).await;
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
