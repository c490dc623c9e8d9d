//! Inbound routing and handler dispatch
//!
//! `route` is a pure decision on one transport event. `dispatch` calls every
//! handler registered for an envelope's type, isolating each one so a
//! failing or panicking handler never stops the others or the read loop.

use super::registry::{Handler, SubscriberRegistry};
use crate::error::HandlerError;
use crate::protocol::Envelope;
use crate::transport::TransportEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, warn};

/// Routing decisions for transport events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Well-formed message to hand to subscribers
    Message(Envelope),
    /// Frame that is not a valid envelope; dropped
    Malformed(String),
    /// Link is gone, with reason
    Closed(String),
}

pub struct MessageHandler;

impl MessageHandler {
    /// Route a transport event (pure function). `None` means the link dropped.
    pub fn route(event: Option<TransportEvent>) -> EventRoute {
        match event {
            Some(TransportEvent::Text(text)) => match Envelope::parse(&text) {
                Ok(envelope) => EventRoute::Message(envelope),
                Err(e) => EventRoute::Malformed(e.to_string()),
            },
            Some(TransportEvent::Closed(Some(info))) if info.reason.is_empty() => {
                EventRoute::Closed(format!("closed by server (code {})", info.code))
            }
            Some(TransportEvent::Closed(Some(info))) => EventRoute::Closed(format!(
                "closed by server (code {}): {}",
                info.code, info.reason
            )),
            Some(TransportEvent::Closed(None)) => EventRoute::Closed("closed by server".to_string()),
            Some(TransportEvent::Error(e)) => EventRoute::Closed(format!("transport error: {e}")),
            None => EventRoute::Closed("transport dropped".to_string()),
        }
    }

    /// Call one handler, turning a panic into an error
    pub fn invoke_isolated(handler: &Handler, envelope: &Envelope) -> Result<(), HandlerError> {
        match catch_unwind(AssertUnwindSafe(|| handler(&envelope.data))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(HandlerError::Panicked(message))
            }
        }
    }

    /// Deliver `envelope` to every handler registered for its type
    ///
    /// The handler list is snapshotted before any handler runs, so handlers
    /// may register or remove subscriptions without deadlocking.
    pub fn dispatch(registry: &Mutex<SubscriberRegistry>, envelope: &Envelope) -> DispatchReport {
        let handlers = registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers_for(&envelope.message_type);

        if handlers.is_empty() {
            debug!(
                message_type = %envelope.message_type,
                "No handlers registered; message dropped"
            );
            return DispatchReport::default();
        }

        let mut report = DispatchReport::default();
        for handler in &handlers {
            match Self::invoke_isolated(handler, envelope) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        message_type = %envelope.message_type,
                        error = %e,
                        "Message handler failed"
                    );
                }
            }
        }
        report
    }

    pub fn log_malformed(reason: &str) {
        warn!("Dropping malformed message: {}", reason);
    }
}

/// Outcome of delivering one message
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::registry::handler;
    use crate::transport::CloseInfo;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_route_text() {
        let route = MessageHandler::route(Some(TransportEvent::Text(
            r#"{"type":"chat","data":{"content":"hi"}}"#.to_string(),
        )));
        assert_eq!(
            route,
            EventRoute::Message(Envelope::raw("chat", json!({"content": "hi"})))
        );
    }

    #[test]
    fn test_route_malformed() {
        assert!(matches!(
            MessageHandler::route(Some(TransportEvent::Text("not json".to_string()))),
            EventRoute::Malformed(_)
        ));
        assert!(matches!(
            MessageHandler::route(Some(TransportEvent::Text(r#"{"data":1}"#.to_string()))),
            EventRoute::Malformed(_)
        ));
    }

    #[test]
    fn test_route_close_variants() {
        let route = MessageHandler::route(Some(TransportEvent::Closed(Some(CloseInfo {
            code: 1001,
            reason: "going away".to_string(),
        }))));
        assert_eq!(
            route,
            EventRoute::Closed("closed by server (code 1001): going away".to_string())
        );

        let route = MessageHandler::route(Some(TransportEvent::Closed(Some(CloseInfo {
            code: 1000,
            reason: String::new(),
        }))));
        assert_eq!(route, EventRoute::Closed("closed by server (code 1000)".to_string()));

        assert!(matches!(
            MessageHandler::route(Some(TransportEvent::Error("reset".to_string()))),
            EventRoute::Closed(reason) if reason.contains("reset")
        ));
        assert!(matches!(MessageHandler::route(None), EventRoute::Closed(_)));
    }

    #[test]
    fn test_dispatch_isolates_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Mutex::new(SubscriberRegistry::new());
        {
            let mut guard = registry.lock().unwrap();
            guard.add("chat", handler(|_| Err(HandlerError::failed("boom"))));
            guard.add("chat", handler(|_| panic!("handler exploded")));
            guard.add("chat", counting(&counter));
        }

        let report = MessageHandler::dispatch(&registry, &Envelope::raw("chat", json!({})));
        assert_eq!(report, DispatchReport { delivered: 1, failed: 2 });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_only_matching_type() {
        let chat = Arc::new(AtomicUsize::new(0));
        let status = Arc::new(AtomicUsize::new(0));
        let registry = Mutex::new(SubscriberRegistry::new());
        {
            let mut guard = registry.lock().unwrap();
            guard.add("chat", counting(&chat));
            guard.add("gameStatusUpdate", counting(&status));
        }

        MessageHandler::dispatch(&registry, &Envelope::raw("chat", json!({})));
        assert_eq!(chat.load(Ordering::SeqCst), 1);
        assert_eq!(status.load(Ordering::SeqCst), 0);

        let report = MessageHandler::dispatch(&registry, &Envelope::raw("unknown", json!({})));
        assert_eq!(report, DispatchReport::default());
    }

    #[test]
    fn test_handler_may_touch_registry_during_dispatch() {
        let registry = Arc::new(Mutex::new(SubscriberRegistry::new()));
        let inner = Arc::clone(&registry);
        registry.lock().unwrap().add(
            "chat",
            handler(move |_| {
                inner.lock().unwrap().clear();
                Ok(())
            }),
        );

        let report = MessageHandler::dispatch(&registry, &Envelope::raw("chat", json!({})));
        assert_eq!(report.delivered, 1);
        assert!(registry.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invoke_isolated_reports_panic_message() {
        let h = handler(|_| panic!("bad data"));
        let result = MessageHandler::invoke_isolated(&h, &Envelope::raw("chat", json!(null)));
        assert!(matches!(result, Err(HandlerError::Panicked(m)) if m == "bad data"));
    }
}
