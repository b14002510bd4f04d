//! In-memory transport
//!
//! Records everything a session posts and resolves awaited replies when
//! messages are delivered with [`InMemoryTransport::deliver`]. Used by the
//! test suites and by the console binary.

use crate::error::{Result, SetupError};
use crate::transport::{MessageFilter, MessageTransport};
use crate::types::{InboundMessage, MessageId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Something the transport did on behalf of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Published { id: MessageId, text: String },
    Edited { id: MessageId, text: String },
    Deleted { id: MessageId },
}

struct Waiter {
    filter: MessageFilter,
    reply: oneshot::Sender<InboundMessage>,
}

/// Transport backed by process memory
#[derive(Default)]
pub struct InMemoryTransport {
    next_id: AtomicU64,
    messages: Mutex<BTreeMap<MessageId, String>>,
    events: Mutex<Vec<OutboundEvent>>,
    waiters: Mutex<Vec<Waiter>>,
    fail_writes: AtomicBool,
    output: Option<mpsc::UnboundedSender<OutboundEvent>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every outbound event to `output`
    pub fn with_output(output: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self {
            output: Some(output),
            ..Self::default()
        }
    }

    /// Make publish/edit/delete fail until switched back (for testing)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Hand an inbound message to every waiting listener it matches
    ///
    /// Returns the number of listeners that received the message.
    pub fn deliver(&self, message: InboundMessage) -> usize {
        let Ok(mut waiters) = self.waiters.lock() else {
            return 0;
        };

        let mut delivered = 0;
        let mut remaining = Vec::with_capacity(waiters.len());
        for waiter in waiters.drain(..) {
            if waiter.reply.is_closed() {
                continue;
            }
            if waiter.filter.matches(&message) {
                if waiter.reply.send(message.clone()).is_ok() {
                    delivered += 1;
                }
            } else {
                remaining.push(waiter);
            }
        }
        *waiters = remaining;

        debug!(
            "Delivered message from '{}' to {} listener(s)",
            message.author.id, delivered
        );
        delivered
    }

    /// Number of listeners still waiting for a reply
    pub fn listener_count(&self) -> usize {
        self.waiters
            .lock()
            .map(|waiters| {
                waiters
                    .iter()
                    .filter(|waiter| !waiter.reply.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Yield until at least `count` listeners are registered
    ///
    /// Listener tasks register on their first poll; tests call this before
    /// delivering replies. Returns `false` if the listeners never show up.
    pub async fn listeners_ready(&self, count: usize) -> bool {
        for _ in 0..1000 {
            if self.listener_count() >= count {
                return true;
            }
            tokio::task::yield_now().await;
        }
        debug!(
            expected = count,
            found = self.listener_count(),
            "listeners did not register"
        );
        false
    }

    /// All outbound events so far
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Texts of every published message, in order
    pub fn published_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::Published { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Whether any published message contains `needle`
    pub fn published_contains(&self, needle: &str) -> bool {
        self.published_texts()
            .iter()
            .any(|text| text.contains(needle))
    }

    /// Current text of a message that has not been deleted
    pub fn message(&self, id: MessageId) -> Option<String> {
        self.messages
            .lock()
            .ok()
            .and_then(|messages| messages.get(&id).cloned())
    }

    /// Messages that have not been deleted
    pub fn live_messages(&self) -> Vec<(MessageId, String)> {
        self.messages
            .lock()
            .map(|messages| {
                messages
                    .iter()
                    .map(|(id, text)| (*id, text.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SetupError::Transport {
                message: "channel is not writable".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, event: OutboundEvent) -> Result<()> {
        if let Some(output) = &self.output {
            let _ = output.send(event.clone());
        }
        self.events
            .lock()
            .map_err(|_| SetupError::Internal {
                message: "Failed to acquire transport events lock".to_string(),
            })?
            .push(event);
        Ok(())
    }

    fn messages_lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<MessageId, String>>> {
        self.messages.lock().map_err(|_| SetupError::Internal {
            message: "Failed to acquire transport messages lock".to_string(),
        })
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(&self, text: &str) -> Result<MessageId> {
        self.check_writable()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.messages_lock()?.insert(id, text.to_string());
        self.record(OutboundEvent::Published {
            id,
            text: text.to_string(),
        })?;
        Ok(id)
    }

    async fn edit(&self, message: MessageId, text: &str) -> Result<()> {
        self.check_writable()?;
        {
            let mut messages = self.messages_lock()?;
            let slot = messages
                .get_mut(&message)
                .ok_or_else(|| SetupError::Transport {
                    message: format!("message {} does not exist", message),
                })?;
            *slot = text.to_string();
        }
        self.record(OutboundEvent::Edited {
            id: message,
            text: text.to_string(),
        })
    }

    async fn delete(&self, message: MessageId) -> Result<()> {
        self.check_writable()?;
        if self.messages_lock()?.remove(&message).is_none() {
            return Err(SetupError::Transport {
                message: format!("message {} does not exist", message),
            });
        }
        self.record(OutboundEvent::Deleted { id: message })
    }

    async fn await_matching_message(
        &self,
        filter: MessageFilter,
        timeout: Duration,
    ) -> Result<InboundMessage> {
        let (reply, receiver) = oneshot::channel();
        self.waiters
            .lock()
            .map_err(|_| SetupError::Internal {
                message: "Failed to acquire transport waiters lock".to_string(),
            })?
            .push(Waiter { filter, reply });

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(SetupError::Transport {
                message: "listener dropped".to_string(),
            }),
            Err(_) => Err(SetupError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_publish_edit_delete() {
        let transport = InMemoryTransport::new();

        let id = transport.publish("hello").await.unwrap();
        assert_eq!(transport.message(id).as_deref(), Some("hello"));

        transport.edit(id, "hello again").await.unwrap();
        assert_eq!(transport.message(id).as_deref(), Some("hello again"));

        transport.delete(id).await.unwrap();
        assert!(transport.message(id).is_none());
        assert!(transport.delete(id).await.is_err());

        assert_eq!(transport.events().len(), 3);
        assert_eq!(transport.published_texts(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let transport = InMemoryTransport::new();
        transport.set_fail_writes(true);
        assert!(transport.publish("lost").await.is_err());
        transport.set_fail_writes(false);
        assert!(transport.publish("kept").await.is_ok());
    }

    #[tokio::test]
    async fn test_await_matching_message_delivery() {
        let transport = Arc::new(InMemoryTransport::new());
        let bob = User::new("bob", "Bob#0002");

        let waiting = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .await_matching_message(
                        MessageFilter::new("bob", ["accept"]),
                        Duration::from_secs(30),
                    )
                    .await
            })
        };

        assert!(transport.listeners_ready(1).await);
        assert_eq!(
            transport.deliver(InboundMessage::new(User::new("eve", "Eve"), "accept")),
            0
        );
        assert_eq!(transport.deliver(InboundMessage::new(bob.clone(), "Accept")), 1);

        let message = waiting.await.unwrap().unwrap();
        assert_eq!(message.author, bob);
        assert_eq!(transport.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_matching_message_timeout() {
        let transport = InMemoryTransport::new();
        let result = transport
            .await_matching_message(MessageFilter::new("bob", ["accept"]), Duration::from_secs(30))
            .await;
        assert_eq!(result.unwrap_err(), SetupError::Timeout);
        assert_eq!(transport.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_output_channel_mirrors_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = InMemoryTransport::with_output(tx);
        let id = transport.publish("status").await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(OutboundEvent::Published {
                id,
                text: "status".to_string()
            })
        );
    }
}
