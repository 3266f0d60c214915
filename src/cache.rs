//! Content-addressed cache of prior specialist responses.
//!
//! Entries are keyed by a hash of (agent, model, content hash, objective
//! hash), so identical inputs collide to the same key regardless of call
//! order. One async mutex guards a single entry map plus an ordered
//! recency queue; per-key reads and hit-count writes are linearizable.

use crate::models::{SourceFileMeta, Specialty, SpecialistAnalysisResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

/// Cache behavior knobs, loaded from the `[cache]` config section.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false, `get` always misses and `put` is a no-op.
    pub enabled: bool,
    /// Time-to-live for entries, in minutes.
    pub ttl_minutes: i64,
    /// When true, a hit pushes `expires_at` forward by the TTL.
    pub sliding_expiration: bool,
    /// Upper bound on stored entries; oldest recency evicted first.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: 60,
            sliding_expiration: false,
            max_entries: 500,
        }
    }
}

/// One cached analysis response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub agent_name: String,
    pub specialty: Specialty,
    pub result: SpecialistAnalysisResult,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Total uses of this entry; 1 at creation, +1 per hit.
    pub hit_count: u64,
    pub token_count: u64,
    /// Unit cost of producing the cached result.
    pub cost: f64,
    pub file_meta: SourceFileMeta,
}

/// Per-agent cache counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub cost_saved: f64,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hits / (hits + misses), 0 - 100.
    pub hit_rate: f64,
    /// Σ (hit_count − 1) × unit cost; the first compute is never counted.
    pub cost_saved: f64,
    pub tokens_saved: u64,
    pub entries: usize,
    pub per_agent: HashMap<String, AgentCacheStats>,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys ordered oldest-recency first; refreshed on hit and on put.
    recency: VecDeque<String>,
    hits: u64,
    misses: u64,
    cost_saved: f64,
    tokens_saved: u64,
    per_agent: HashMap<String, AgentCacheStats>,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
    }
}

/// Content-addressed, TTL-bound store of prior analysis responses.
pub struct ContentCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl ContentCache {
    /// Create a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                recency: VecDeque::new(),
                hits: 0,
                misses: 0,
                cost_saved: 0.0,
                tokens_saved: 0,
                per_agent: HashMap::new(),
            }),
        }
    }

    /// Whether caching is active.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Deterministic key for (agent, model, content, objective).
    pub fn cache_key(agent_name: &str, model: &str, content: &str, objective: &str) -> String {
        let content_hash = hex_sha256(content.as_bytes());
        let objective_hash = hex_sha256(objective.as_bytes());

        let mut hasher = Sha256::new();
        hasher.update(agent_name.as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        hasher.update(b"|");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"|");
        hasher.update(objective_hash.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a cached result; a hit increments the entry's hit count and
    /// refreshes its eviction position. Expired entries miss and are
    /// evicted lazily.
    pub async fn get(
        &self,
        agent_name: &str,
        content: &str,
        objective: &str,
        model: &str,
    ) -> Option<SpecialistAnalysisResult> {
        if !self.config.enabled {
            return None;
        }

        let key = Self::cache_key(agent_name, model, content, objective);
        let mut state = self.state.lock().await;

        let expired = match state.entries.get(&key) {
            Some(entry) => Utc::now() >= entry.expires_at,
            None => {
                state.misses += 1;
                state
                    .per_agent
                    .entry(agent_name.to_string())
                    .or_default()
                    .misses += 1;
                return None;
            }
        };

        if expired {
            debug!("Cache entry expired for agent {}", agent_name);
            state.remove(&key);
            state.misses += 1;
            state
                .per_agent
                .entry(agent_name.to_string())
                .or_default()
                .misses += 1;
            return None;
        }

        let sliding = self.config.sliding_expiration;
        let ttl = Duration::minutes(self.config.ttl_minutes.max(1));
        let (result, cost, tokens) = {
            let entry = state
                .entries
                .get_mut(&key)
                .expect("entry checked above; lock held throughout");
            entry.hit_count += 1;
            if sliding {
                entry.expires_at = Utc::now() + ttl;
            }
            (entry.result.clone(), entry.cost, entry.token_count)
        };

        state.touch(&key);
        state.hits += 1;
        state.cost_saved += cost;
        state.tokens_saved += tokens;
        let agent_stats = state.per_agent.entry(agent_name.to_string()).or_default();
        agent_stats.hits += 1;
        agent_stats.cost_saved += cost;

        Some(result)
    }

    /// Store a result, replacing any existing entry under the same key.
    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self,
        agent_name: &str,
        specialty: Specialty,
        content: &str,
        objective: &str,
        model: &str,
        result: SpecialistAnalysisResult,
        token_count: u64,
        cost: f64,
        file_meta: SourceFileMeta,
    ) {
        if !self.config.enabled {
            return;
        }

        let key = Self::cache_key(agent_name, model, content, objective);
        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            agent_name: agent_name.to_string(),
            specialty,
            result,
            created_at: now,
            expires_at: now + Duration::minutes(self.config.ttl_minutes.max(1)),
            hit_count: 1,
            token_count,
            cost,
            file_meta,
        };

        let mut state = self.state.lock().await;
        state.entries.insert(key.clone(), entry);
        state.touch(&key);

        while state.entries.len() > self.config.max_entries {
            let Some(oldest) = state.recency.pop_front() else {
                break;
            };
            debug!("Evicting oldest cache entry {}", &oldest[..12.min(oldest.len())]);
            state.entries.remove(&oldest);
        }
    }

    /// Remove all expired entries; returns how many were evicted.
    pub async fn clear_expired(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| now >= e.expires_at)
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    /// Drop every entry. Hit/miss counters are preserved.
    pub async fn clear_all(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.recency.clear();
    }

    /// Aggregate statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let lookups = state.hits + state.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            state.hits as f64 / lookups as f64 * 100.0
        };

        CacheStats {
            hits: state.hits,
            misses: state.misses,
            hit_rate,
            cost_saved: state.cost_saved,
            tokens_saved: state.tokens_saved,
            entries: state.entries.len(),
            per_agent: state.per_agent.clone(),
        }
    }

    /// Current hit count of the entry for these inputs, if present.
    #[cfg(test)]
    async fn hit_count(
        &self,
        agent_name: &str,
        content: &str,
        objective: &str,
        model: &str,
    ) -> Option<u64> {
        let key = Self::cache_key(agent_name, model, content, objective);
        let state = self.state.lock().await;
        state.entries.get(&key).map(|e| e.hit_count)
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
