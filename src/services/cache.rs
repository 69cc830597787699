use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::services::clock::{to_chrono, Clock};

/// Default lifetime of a cached icon set (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    images: Vec<String>,
    expires_at: DateTime<Utc>,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub valid: usize,
}

/// In-memory TTL cache of completed icon sets, keyed by request fingerprint.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_default_ttl(clock, DEFAULT_TTL)
    }

    pub fn with_default_ttl(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            clock,
        }
    }

    /// Look up a cached icon set. Absent and expired entries count as misses;
    /// expired ones are removed.
    pub fn get(&self, prompt: &str, style_id: u8, colors: Option<&[String]>) -> Option<Vec<String>> {
        let key = fingerprint(prompt, style_id, colors);
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.get(&key) {
            None => {
                metrics::counter!("icon_cache_misses_total").increment(1);
                return None;
            }
            Some(entry) => now > entry.expires_at,
        };

        if expired {
            entries.remove(&key);
            tracing::debug!(key = %key, "Cache entry expired on read");
            metrics::counter!("icon_cache_misses_total").increment(1);
            return None;
        }

        tracing::info!(key = %key, "Cache hit");
        metrics::counter!("icon_cache_hits_total").increment(1);
        entries.get(&key).map(|entry| entry.images.clone())
    }

    /// Store an icon set, replacing any previous entry for the same fingerprint.
    ///
    /// A missing or zero `ttl` falls back to the default TTL.
    pub fn set(
        &self,
        prompt: &str,
        style_id: u8,
        images: Vec<String>,
        colors: Option<&[String]>,
        ttl: Option<Duration>,
    ) {
        let key = fingerprint(prompt, style_id, colors);
        let expires_at = self.clock.now() + to_chrono(
            ttl.filter(|t| !t.is_zero())
                .unwrap_or(self.default_ttl),
        );

        tracing::info!(key = %key, expires_at = %expires_at, "Cache set");
        self.entries
            .lock()
            .insert(key, CacheEntry { images, expires_at });
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        let removed = before - entries.len();

        if removed > 0 {
            tracing::info!(removed, "Cache sweep removed expired entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let expired = entries.values().filter(|e| now > e.expires_at).count();
        CacheStats {
            total: entries.len(),
            expired,
            valid: entries.len() - expired,
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        tracing::info!("Cache cleared");
    }
}

/// Deterministic cache key for a request.
///
/// Prompt and colors are lower-cased and colors sorted, so any ordering of the
/// same palette maps to the same key. The parts are JSON-encoded to keep
/// distinct inputs from colliding on separator characters.
pub fn fingerprint(prompt: &str, style_id: u8, colors: Option<&[String]>) -> String {
    let mut palette: Vec<String> = colors
        .unwrap_or_default()
        .iter()
        .map(|c| c.to_lowercase())
        .collect();
    palette.sort();

    serde_json::json!([prompt.to_lowercase(), style_id, palette]).to_string()
}
