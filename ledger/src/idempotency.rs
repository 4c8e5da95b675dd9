//! Idempotency window for ledger operations.
//!
//! One slot per `(operation, key)`. A caller claims the slot (an async mutex)
//! before running the operation, so two concurrent requests with the same key
//! run one after the other and the second sees the first's result. Only
//! successful results are remembered.
//!
//! The map holds at most `max_entries` keys. When a new key arrives at a full
//! map, expired results go first, then the oldest idle results. If every slot
//! is in flight the new key is refused with `Busy`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use borderless_common::{IdempotencyKey, LedgerError, Result};

use crate::config::IdempotencyConfig;

#[derive(Debug, Clone)]
struct Recorded<T> {
    result: T,
    recorded_at: Instant,
}

impl<T> Recorded<T> {
    fn is_valid(&self, window: Duration) -> bool {
        self.recorded_at.elapsed() < window
    }
}

type Slot<T> = Arc<Mutex<Option<Recorded<T>>>>;

/// Remembers successful results by idempotency key.
pub struct IdempotencyCache<T> {
    slots: DashMap<IdempotencyKey, Slot<T>>,
    config: IdempotencyConfig,
}

impl<T: Clone> IdempotencyCache<T> {
    /// Create an empty cache.
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            slots: DashMap::new(),
            config,
        }
    }

    /// Claim the slot for `key`, waiting at most `timeout` for a concurrent
    /// request with the same key to finish.
    pub async fn claim(&self, key: IdempotencyKey, timeout: Duration) -> Result<ClaimedSlot<T>> {
        if !self.slots.contains_key(&key) && self.slots.len() >= self.config.max_entries {
            self.make_room();
            if self.slots.len() >= self.config.max_entries {
                warn!(key = %key, entries = self.slots.len(), "Idempotency cache full");
                return Err(LedgerError::Busy {
                    resource: "idempotency cache".to_string(),
                    retry_after_ms: timeout.as_millis() as u64,
                });
            }
        }

        let slot = self.slots.entry(key.clone()).or_default().clone();
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(ClaimedSlot {
                key,
                guard,
                window: self.config.window,
            }),
            Err(_) => {
                warn!(key = %key, "Idempotency slot busy");
                Err(LedgerError::Busy {
                    resource: format!("idempotency key {key}"),
                    retry_after_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Drop results older than the window. Slots that are claimed or about to
    /// be claimed are kept.
    pub fn evict_expired(&self) {
        let window = self.config.window;
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => (*entry).as_ref().map_or(false, |r| r.is_valid(window)),
                Err(_) => true,
            }
        });
        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            debug!(evicted, "Evicted idempotency entries");
        }
    }

    /// Free space for one new key: drop expired results, then the oldest
    /// idle results down to nine tenths of capacity.
    fn make_room(&self) {
        self.evict_expired();
        let max = self.config.max_entries;
        if self.slots.len() < max {
            return;
        }

        let target = max - max / 10;
        let mut idle: Vec<(IdempotencyKey, Instant)> = self
            .slots
            .iter()
            .filter(|entry| Arc::strong_count(entry.value()) == 1)
            .filter_map(|entry| {
                let guard = entry.value().try_lock().ok()?;
                let recorded_at = (*guard).as_ref()?.recorded_at;
                Some((entry.key().clone(), recorded_at))
            })
            .collect();
        idle.sort_by_key(|(_, recorded_at)| *recorded_at);

        let excess = (self.slots.len() + 1).saturating_sub(target);
        let mut evicted = 0usize;
        for (key, _) in idle.into_iter().take(excess) {
            if self
                .slots
                .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1)
                .is_some()
            {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "Evicted oldest idempotency entries");
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Exclusive hold on one idempotency slot.
pub struct ClaimedSlot<T> {
    key: IdempotencyKey,
    guard: OwnedMutexGuard<Option<Recorded<T>>>,
    window: Duration,
}

impl<T: Clone> ClaimedSlot<T> {
    /// The key this slot belongs to.
    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// The remembered result, if one was recorded within the window.
    pub fn replay(&self) -> Option<T> {
        (*self.guard)
            .as_ref()
            .filter(|r| r.is_valid(self.window))
            .map(|r| r.result.clone())
    }

    /// Remember a successful result and release the slot.
    pub fn record(mut self, result: T) {
        *self.guard = Some(Recorded {
            result,
            recorded_at: Instant::now(),
        });
    }
}
