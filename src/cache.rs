//! Winning-endpoint cache with TTL expiry.
//!
//! Maps a destination `(host, port)` to the address that last won a race, so
//! the next call to the same destination leads with the known-good path
//! (RFC 6555 §4.2). Entries are evicted lazily on lookup.
//!
//! The default [`AddressCache`] performs no internal locking. The process-wide
//! handle is replaceable: callers wanting thread-safe caching install their own
//! [`EndpointCache`] that locks internally, and [`set_cache`]`(None)` disables
//! caching entirely.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::config::env_u64;

/// Default entry lifetime, overridable once via `RFC6555_CACHE_SECS`.
const DEFAULT_VALIDITY_SECS: u64 = 60;

/// Contract for a pluggable endpoint cache.
///
/// Implementations own their entries and decide their own synchronization;
/// the library calls these three operations and nothing else.
pub trait EndpointCache: Send {
    /// Cached winning address for the destination, if present and unexpired.
    /// Looking up an expired entry removes it as a side effect.
    fn get(&mut self, host: &str, port: u16) -> Option<SocketAddr>;
    /// Record `addr` as the winner for the destination.
    fn put(&mut self, host: &str, port: u16, addr: SocketAddr);
    /// Drop all entries.
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    addr: SocketAddr,
    expires_at: Instant,
}

/// In-memory TTL cache used by default. Not thread-safe on its own.
#[derive(Debug)]
pub struct AddressCache {
    /// Lifetime stamped on entries at [`put`](EndpointCache::put) time.
    pub validity_duration: Duration,
    entries: HashMap<(String, u16), CacheEntry>,
}

impl AddressCache {
    pub fn new(validity_duration: Duration) -> Self {
        Self {
            validity_duration,
            entries: HashMap::new(),
        }
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(env_u64(
            "RFC6555_CACHE_SECS",
            DEFAULT_VALIDITY_SECS,
        )))
    }
}

impl EndpointCache for AddressCache {
    fn get(&mut self, host: &str, port: u16) -> Option<SocketAddr> {
        let key = (host.to_string(), port);
        match self.entries.get(&key) {
            Some(e) if Instant::now() < e.expires_at => Some(e.addr),
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    fn put(&mut self, host: &str, port: u16, addr: SocketAddr) {
        let entry = CacheEntry {
            addr,
            expires_at: Instant::now() + self.validity_duration,
        };
        self.entries.insert((host.to_string(), port), entry);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Process-wide cache handle. The mutex only makes the handle itself
/// replaceable from safe Rust; the caching semantics stay unsynchronized.
static CACHE: Lazy<Mutex<Option<Box<dyn EndpointCache>>>> =
    Lazy::new(|| Mutex::new(Some(Box::<AddressCache>::default())));

/// Replace the process-wide cache. `None` disables caching: no `get` or `put`
/// is performed until a cache is installed again.
pub fn set_cache(cache: Option<Box<dyn EndpointCache>>) {
    *CACHE.lock().unwrap_or_else(|e| e.into_inner()) = cache;
}

/// Query the installed cache. `None` when caching is disabled, the entry is
/// missing, or it expired.
pub fn lookup(host: &str, port: u16) -> Option<SocketAddr> {
    CACHE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .as_mut()?
        .get(host, port)
}

/// Record a winner in the installed cache; no-op while caching is disabled.
pub fn record(host: &str, port: u16, addr: SocketAddr) {
    if let Some(cache) = CACHE.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
        cache.put(host, port, addr);
    }
}

/// Drop all entries from the installed cache, if any.
pub fn clear_cache() {
    if let Some(cache) = CACHE.lock().unwrap_or_else(|e| e.into_inner()).as_mut() {
        cache.clear();
    }
}
