//! Process-wide switches and environment helpers.
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;

/// Happy Eyeballs master switch. Seeded once from `RFC6555_DISABLE`,
/// mutable afterwards through [`set_enabled`]. Reads are unsynchronized
/// by design; a flip is picked up by the next call, not by calls in flight.
static ENABLED: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(!env_bool("RFC6555_DISABLE")));

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn set_enabled(on: bool) {
    ENABLED.store(on, Ordering::Relaxed);
}

/// Boolean env var: set and not "0" / "false" / "off" / "no" means true
/// (case-insensitive). Unset means false.
pub(crate) fn env_bool(key: &str) -> bool {
    match std::env::var(key) {
        Ok(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "0" || s == "false" || s == "off" || s == "no")
        }
        Err(_) => false,
    }
}

/// Unsigned integer env var; unparsable or unset falls back to `default`.
pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
