//! Mock transport for testing
//!
//! `MockConnector` is a scripted [`Connector`]: each connect either fails or
//! hands the test a [`MockPeer`] standing in for the server end of the link.

use crate::protocol::Envelope;
use crate::transport::{
    CloseInfo, Connector, OutboundFrame, TransportError, TransportEvent, TransportLink,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted result of one connect call
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Accept,
    Refuse(String),
}

/// A connect call seen by the mock
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub address: String,
    pub at: Instant,
}

#[derive(Debug)]
struct Script {
    queued: VecDeque<MockOutcome>,
    fallback: MockOutcome,
}

/// Scripted connector; accepts every connect unless told otherwise
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Arc<Mutex<Script>>,
    attempts: Arc<Mutex<Vec<ConnectAttempt>>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
}

/// Receives the server end of every accepted link
#[derive(Debug)]
pub struct MockPeers {
    peers_rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    /// Next accepted link, in connect order
    pub async fn next(&mut self) -> Option<MockPeer> {
        self.peers_rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<MockPeer> {
        self.peers_rx.try_recv().ok()
    }
}

impl MockConnector {
    pub fn new() -> (Self, MockPeers) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        (
            Self {
                script: Arc::new(Mutex::new(Script {
                    queued: VecDeque::new(),
                    fallback: MockOutcome::Accept,
                })),
                attempts: Arc::new(Mutex::new(Vec::new())),
                peers_tx,
            },
            MockPeers { peers_rx },
        )
    }

    /// Queue one outcome, used before falling back to the default
    pub fn push_outcome(&self, outcome: MockOutcome) {
        lock(&self.script).queued.push_back(outcome);
    }

    pub fn refuse_next(&self, reason: &str) {
        self.push_outcome(MockOutcome::Refuse(reason.to_string()));
    }

    /// Refuse every connect once the queue is empty
    pub fn refuse_all(&self, reason: &str) {
        lock(&self.script).fallback = MockOutcome::Refuse(reason.to_string());
    }

    /// Accept every connect once the queue is empty
    pub fn accept_all(&self) {
        lock(&self.script).fallback = MockOutcome::Accept;
    }

    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        lock(&self.attempts).clone()
    }

    pub fn attempt_count(&self) -> usize {
        lock(&self.attempts).len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str) -> Result<TransportLink, TransportError> {
        lock(&self.attempts).push(ConnectAttempt {
            address: address.to_string(),
            at: Instant::now(),
        });

        let outcome = {
            let mut script = lock(&self.script);
            script
                .queued
                .pop_front()
                .unwrap_or_else(|| script.fallback.clone())
        };

        match outcome {
            MockOutcome::Refuse(reason) => Err(TransportError::Connect(reason)),
            MockOutcome::Accept => {
                let (link, outbound_rx, inbound_tx) = TransportLink::pair();
                let _ = self.peers_tx.send(MockPeer {
                    address: address.to_string(),
                    outbound_rx,
                    inbound_tx,
                });
                Ok(link)
            }
        }
    }
}

/// Server end of one mock link
#[derive(Debug)]
pub struct MockPeer {
    pub address: String,
    outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl MockPeer {
    /// Deliver a raw text frame to the client
    pub fn push_text(&self, text: &str) {
        let _ = self.inbound_tx.send(TransportEvent::Text(text.to_string()));
    }

    pub fn push_envelope(&self, envelope: &Envelope) {
        if let Ok(text) = envelope.to_json() {
            self.push_text(&text);
        }
    }

    /// Close the link from the server side
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.inbound_tx.send(TransportEvent::Closed(Some(CloseInfo {
            code,
            reason: reason.to_string(),
        })));
    }

    /// Fail the link with a read error
    pub fn fail(&self, error: &str) {
        let _ = self.inbound_tx.send(TransportEvent::Error(error.to_string()));
    }

    /// Next text frame the client sent; None once the client closed the link
    pub async fn next_sent(&mut self) -> Option<String> {
        match self.outbound_rx.recv().await? {
            OutboundFrame::Text(text) => Some(text),
            OutboundFrame::Close => None,
        }
    }

    /// Every frame the client has sent so far
    pub fn drain_sent(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// True once the client asked to close the link or dropped it
    pub async fn wait_closed(&mut self) -> bool {
        loop {
            match self.outbound_rx.recv().await {
                Some(OutboundFrame::Close) | None => return true,
                Some(OutboundFrame::Text(_)) => continue,
            }
        }
    }
}
