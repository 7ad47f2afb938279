//! Named callbacks
//!
//! UI declarations refer to callbacks by id (`onload: "loadUsers"`). The host
//! registers a function under each id at setup; ids nobody registered are a
//! configuration error.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ClientError, Result};

/// A registered callback
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `id`, replacing any earlier registration
    pub fn register<F>(&mut self, id: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = id.into();
        if self.handlers.insert(id.clone(), Arc::new(f)).is_some() {
            tracing::warn!("Handler {} registered again, the earlier one is replaced", id);
        }
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<Handler> {
        self.handlers
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::UnregisteredHandler(id.to_string()))
    }

    /// Call the handler registered under `id`
    pub fn call(&self, id: &str, arg: &Value) -> Result<()> {
        let handler = self.get(id)?;
        handler(arg);
        Ok(())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("HandlerRegistry").field("ids", &ids).finish()
    }
}
