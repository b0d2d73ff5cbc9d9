//! In-memory fallback store for single-process operation.
//!
//! Takes over when the database store fails, trading cross-process
//! consistency for availability. The map is bounded: insertion past the cap
//! evicts an expired or oldest entry, and the periodic sweep caps its own
//! work per invocation so it never stalls the executor. Keys are kept in a
//! rotation queue so successive bounded sweeps walk the whole map instead of
//! re-inspecting the same slice.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{LimitKind, RateLimitStore, StoreResult};
use crate::config::{FallbackConfig, LimitPolicy};
use crate::window::{self, LimitDecision, WindowState};

type Key = (String, LimitKind);

/// Map plus a rotation queue over its keys. Every key in `map` appears in
/// `order` exactly once; sweeps pop from the front and push survivors to the
/// back, so the front is always the least recently inspected entry.
#[derive(Default)]
struct Inner {
    map: HashMap<Key, WindowState>,
    order: VecDeque<Key>,
}

/// Bounded in-memory rate limit store.
#[derive(Clone)]
pub struct InMemoryRateLimitStore {
    entries: Arc<RwLock<Inner>>,
    config: FallbackConfig,
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRateLimitStore {
    /// Create a store with default bounds.
    pub fn new() -> Self {
        Self::with_config(FallbackConfig::default())
    }

    /// Create a store with custom bounds.
    pub fn with_config(config: FallbackConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Inner::default())),
            config,
        }
    }

    /// Number of tracked (identifier, endpoint) pairs.
    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.map.is_empty()
    }

    /// Look up the current state for a client without counting an attempt.
    pub async fn get(&self, identifier: &str, kind: LimitKind) -> Option<WindowState> {
        let inner = self.entries.read().await;
        inner.map.get(&(identifier.to_string(), kind)).cloned()
    }

    /// Make room for one new entry in a full map: drop an expired entry if
    /// one turns up, otherwise evict the least recently inspected entry at
    /// the front of the rotation queue.
    fn evict_one(inner: &mut Inner, now_ms: i64) {
        if let Some(pos) = inner
            .order
            .iter()
            .position(|key| inner.map.get(key).map_or(false, |s| s.is_expired(now_ms)))
        {
            if let Some(key) = inner.order.remove(pos) {
                inner.map.remove(&key);
            }
            return;
        }

        if let Some(key) = inner.order.pop_front() {
            debug!(identifier = %key.0, endpoint = %key.1, "fallback store full, evicting oldest entry");
            inner.map.remove(&key);
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn record_attempt(
        &self,
        identifier: &str,
        kind: LimitKind,
        policy: &LimitPolicy,
        now_ms: i64,
    ) -> StoreResult<LimitDecision> {
        let key = (identifier.to_string(), kind);
        let mut inner = self.entries.write().await;

        let prev = inner.map.get(&key).cloned();
        let (next, decision) = window::record_attempt(prev.as_ref(), policy, now_ms);

        if prev.is_none() {
            if inner.map.len() >= self.config.max_entries {
                Self::evict_one(&mut inner, now_ms);
            }
            inner.order.push_back(key.clone());
        }
        inner.map.insert(key, next);

        Ok(decision)
    }

    async fn reset(&self, identifier: &str, kind: LimitKind) -> StoreResult<bool> {
        let key = (identifier.to_string(), kind);
        let mut inner = self.entries.write().await;
        let existed = inner.map.remove(&key).is_some();
        if existed {
            inner.order.retain(|k| k != &key);
        }
        Ok(existed)
    }

    async fn cleanup_expired(&self, now_ms: i64, kind: Option<LimitKind>) -> StoreResult<u64> {
        let mut inner = self.entries.write().await;

        // Bounded rotation: cap inspected and deleted entries per invocation
        // so a large map never turns one sweep into a long stall. Survivors
        // go to the back of the queue, so the next sweep picks up where this
        // one left off and every entry is eventually inspected.
        let scan = inner.order.len().min(self.config.sweep_scan_limit);
        let mut removed = 0usize;
        for _ in 0..scan {
            let key = match inner.order.pop_front() {
                Some(key) => key,
                None => break,
            };
            let expired = inner.map.get(&key).map_or(false, |s| s.is_expired(now_ms));
            let in_scope = kind.map_or(true, |k| k == key.1);
            if expired && in_scope && removed < self.config.sweep_delete_limit {
                inner.map.remove(&key);
                removed += 1;
            } else {
                inner.order.push_back(key);
            }
        }

        Ok(removed as u64)
    }
}
