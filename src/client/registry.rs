//! Subscriber registry: message type to ordered handler list
//!
//! Handlers are compared by identity (the pointer inside the `Arc`), so the
//! same closure registered twice is two entries and removing it takes out one.

use crate::error::HandlerError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a handler reports back after seeing one message
pub type HandlerResult = Result<(), HandlerError>;

/// A subscriber callback; receives the `data` field of a message
pub type Handler = Arc<dyn Fn(&Value) -> HandlerResult + Send + Sync>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_handler(a: &Handler, b: &Handler) -> bool {
    // Compare data pointers only; vtable pointers are not stable across codegen units
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

#[derive(Default)]
pub struct SubscriberRegistry {
    handlers: HashMap<String, Vec<Handler>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `message_type`
    pub fn add(&mut self, message_type: &str, handler: Handler) {
        self.handlers
            .entry(message_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove the first registration of `handler` under `message_type`.
    ///
    /// Returns false when nothing matched. A type whose list becomes empty is
    /// dropped from the map.
    pub fn remove(&mut self, message_type: &str, handler: &Handler) -> bool {
        let Some(list) = self.handlers.get_mut(message_type) else {
            return false;
        };

        let Some(index) = list.iter().position(|h| same_handler(h, handler)) else {
            return false;
        };

        list.remove(index);
        if list.is_empty() {
            self.handlers.remove(message_type);
        }
        true
    }

    /// Snapshot of the handlers for `message_type`, in registration order
    pub fn handlers_for(&self, message_type: &str) -> Vec<Handler> {
        self.handlers
            .get(message_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn handler_count(&self, message_type: &str) -> usize {
        self.handlers.get(message_type).map_or(0, Vec::len)
    }

    pub fn total_handlers(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(message_type, list)| (message_type.as_str(), list.len()))
            .collect();
        f.debug_struct("SubscriberRegistry")
            .field("handlers", &counts)
            .finish()
    }
}
