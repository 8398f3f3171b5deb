//! Method registry mapping names to async handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::RpcContext;
use crate::error::RpcError;

/// Trait implemented by every RPC method handler.
///
/// Handlers are opaque units of work to the gateway: one call, one
/// success-or-failure outcome.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler with the given params and shared context.
    async fn handle(
        &self,
        params: Map<String, Value>,
        ctx: Arc<RpcContext>,
    ) -> Result<Value, RpcError>;
}

/// Registry mapping method names to handlers.
///
/// Populated at startup and immutable afterwards; shared by all
/// connections behind an `Arc`.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a method name.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// Look up the handler for a method.
    pub fn get(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(method).cloned()
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
