//! In-memory transport used by the integration tests and for bench-top
//! development without a radio attached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{IncomingMessage, MessageTransport, NodeContext};

/// Transport backed by in-memory queues. Cloning yields a handle to the same
/// underlying queues, so a test can hand one clone to the server and keep the
/// other for injecting messages and inspecting sends.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
    connected: AtomicBool,
    closed: AtomicBool,
    inbound: Mutex<VecDeque<IncomingMessage>>,
    outbound: Mutex<Vec<(String, String)>>,
    notify: Notify,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound message as if a node had sent it.
    pub fn inject_message(&self, text: &str, node_id: &str) {
        self.inject(IncomingMessage {
            text: text.to_string(),
            context: NodeContext::new(node_id),
        });
    }

    /// Queue an inbound message with a full node context.
    pub fn inject(&self, message: IncomingMessage) {
        self.inner.inbound.lock().unwrap().push_back(message);
        self.inner.notify.notify_one();
    }

    /// Everything the gateway has sent, as (node_id, text) pairs in order.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.inner.outbound.lock().unwrap().clone()
    }

    /// Close the inbound side; `recv` drains what is queued then returns `None`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn connect(&self) -> anyhow::Result<()> {
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.close();
    }

    async fn send_message(&self, node_id: &str, text: &str) -> bool {
        self.inner
            .outbound
            .lock()
            .unwrap()
            .push((node_id.to_string(), text.to_string()));
        true
    }

    async fn recv(&self) -> Option<IncomingMessage> {
        loop {
            if let Some(msg) = self.inner.inbound.lock().unwrap().pop_front() {
                return Some(msg);
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.inner.notify.notified().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}
