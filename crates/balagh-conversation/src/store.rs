use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use balagh_types::conversation::{Role, Turn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store unavailable: {0}")]
    Unavailable(String),
}

/// Session id → ordered turn history.
///
/// All reads and writes go through a [`ConversationLease`], which is exclusive
/// per session id. Leases on different ids never wait on each other.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Wait for exclusive access to one session's history.
    async fn lease(&self, session_id: &str) -> Result<Box<dyn ConversationLease>, StoreError>;

    /// Whether a live conversation exists for this id.
    async fn contains(&self, session_id: &str) -> bool;

    /// Drop conversations nobody holds that have been idle for at least
    /// `max_idle`. Returns how many were dropped.
    async fn evict_idle(&self, max_idle: Duration) -> usize;
}

/// Exclusive handle on one session. Dropping it releases the session.
#[async_trait]
pub trait ConversationLease: Send {
    fn session_id(&self) -> &str;

    /// Existing history, or a new one seeded with the system preamble.
    async fn get_or_create(&mut self) -> Result<Vec<Turn>, StoreError>;

    async fn append(&mut self, turn: Turn) -> Result<(), StoreError>;

    async fn delete(&mut self) -> Result<(), StoreError>;
}

struct Slot {
    turns: Option<Vec<Turn>>,
    touched: Instant,
}

/// Single-process backend: one async mutex per session id in a sharded map.
pub struct MemoryConversationStore {
    slots: DashMap<String, Arc<Mutex<Slot>>>,
    preamble: Arc<str>,
}

impl MemoryConversationStore {
    pub fn new(preamble: impl Into<Arc<str>>) -> Self {
        Self {
            slots: DashMap::new(),
            preamble: preamble.into(),
        }
    }

    fn slot(&self, session_id: &str) -> Arc<Mutex<Slot>> {
        // The shard guard is released at the end of this statement, before any await
        self.slots
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Slot {
                    turns: None,
                    touched: Instant::now(),
                }))
            })
            .clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn lease(&self, session_id: &str) -> Result<Box<dyn ConversationLease>, StoreError> {
        let guard = self.slot(session_id).lock_owned().await;
        Ok(Box::new(MemoryLease {
            session_id: session_id.to_string(),
            guard,
            preamble: self.preamble.clone(),
        }))
    }

    async fn contains(&self, session_id: &str) -> bool {
        let slot = match self.slots.get(session_id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        let present = slot.lock().await.turns.is_some();
        present
    }

    async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut evicted = 0;

        // Holding the shard lock, a strong count of 1 means no lease exists and
        // none can be taken until retain moves on.
        self.slots.retain(|session_id, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let Ok(guard) = slot.try_lock() else {
                return true;
            };
            match guard.turns {
                None => false,
                Some(_) if guard.touched.elapsed() >= max_idle => {
                    debug!(session_id = %session_id, "Evicting idle conversation");
                    evicted += 1;
                    false
                }
                Some(_) => true,
            }
        });

        evicted
    }
}

struct MemoryLease {
    session_id: String,
    guard: OwnedMutexGuard<Slot>,
    preamble: Arc<str>,
}

impl MemoryLease {
    fn turns_mut(&mut self) -> &mut Vec<Turn> {
        self.guard.touched = Instant::now();
        let preamble = &self.preamble;
        self.guard
            .turns
            .get_or_insert_with(|| vec![Turn::text(Role::System, preamble.as_ref())])
    }
}

#[async_trait]
impl ConversationLease for MemoryLease {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_or_create(&mut self) -> Result<Vec<Turn>, StoreError> {
        Ok(self.turns_mut().clone())
    }

    async fn append(&mut self, turn: Turn) -> Result<(), StoreError> {
        self.turns_mut().push(turn);
        Ok(())
    }

    async fn delete(&mut self) -> Result<(), StoreError> {
        self.guard.turns = None;
        debug!(session_id = %self.session_id, "Conversation deleted");
        Ok(())
    }
}
