//! Synchronous Happy Eyeballs (RFC 6555) connection establishment.
//!
//! Given a dual-stack destination, [`create_connection`] races nonblocking
//! connect attempts across the resolved addresses — staggered by
//! [`CONNECTION_ATTEMPT_DELAY`], multiplexed by one selector — so the
//! user-visible latency tracks the fastest responsive path instead of a
//! broken one. The winning address family is cached per destination and
//! leads the next call.
//!
//! The API is deliberately blocking: no tasks, no callbacks, no background
//! threads. The only suspension points are name resolution and the selector
//! wait. When Happy Eyeballs cannot help (flag off, no IPv6 on the host,
//! single-family destination) the call degrades to a plain sequential
//! connect.
//!
//! Process-wide state — the feature flag and the endpoint cache — is
//! intentionally unsynchronized; callers wanting a thread-safe cache install
//! their own [`EndpointCache`] via [`set_cache`].
//!
//! ```no_run
//! let _stream = rfc6555::create_connection("example.com", 80)?;
//! # Ok::<(), rfc6555::ConnectError>(())
//! ```

pub mod cache;
pub mod config;
pub mod dial;
pub mod error;
pub mod probe;

mod race;
#[cfg(test)]
mod testutil;

pub use cache::{clear_cache, set_cache, AddressCache, EndpointCache};
pub use config::{enabled, set_enabled};
pub use dial::{create_connection, create_connection_to, create_connection_with, ConnectOpts};
pub use error::{ConnectError, Result};
pub use probe::ipv6_supported;
pub use race::CONNECTION_ATTEMPT_DELAY;
