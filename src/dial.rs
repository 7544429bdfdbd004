//! Entry point: DNS → `SocketAddr` list → raced or sequential connect.
//!
//! [`create_connection`] mirrors the shape of a plain blocking TCP connect
//! helper so it can replace one directly. Happy Eyeballs kicks in only when
//! it can help: the feature flag is on, the host stack speaks IPv6, and the
//! destination resolved to more than one address family.
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use crate::cache;
use crate::config;
use crate::error::{ConnectError, Result};
use crate::probe;
use crate::race;

/// Connection options for [`create_connection_with`].
#[derive(Clone, Debug, Default)]
pub struct ConnectOpts {
    /// Overall deadline for the whole call, resolution included. `None`
    /// lets the race run until every attempt resolves.
    pub timeout: Option<Duration>,
    /// Local address bound on every attempt socket.
    pub source_addr: Option<SocketAddr>,
}

impl ConnectOpts {
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }
    pub fn source_addr(mut self, addr: SocketAddr) -> Self {
        self.source_addr = Some(addr);
        self
    }
}

/// Connect to `host:port`, racing address families when that can lower the
/// worst-case latency. Drop-in analogue of a blocking connect helper.
pub fn create_connection(host: &str, port: u16) -> Result<TcpStream> {
    create_connection_with(host, port, &ConnectOpts::default())
}

/// [`create_connection`] with an explicit deadline and/or source address.
pub fn create_connection_with(host: &str, port: u16, opts: &ConnectOpts) -> Result<TcpStream> {
    create_connection_to(&[(host, port)], opts)
}

/// Race several destination tuples at once; the first responsive endpoint
/// across all of them wins, and the winner is cached for every tuple asked
/// for.
pub fn create_connection_to(addrs: &[(&str, u16)], opts: &ConnectOpts) -> Result<TcpStream> {
    let start = Instant::now();
    let Some(&(first_host, first_port)) = addrs.first() else {
        return Err(ConnectError::Resolve(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no address to dial",
        )));
    };

    if !config::enabled() || !probe::ipv6_supported() {
        debug!(host = first_host, port = first_port, "happy eyeballs off, sequential dial");
        let endpoints = resolve_endpoints(&[(first_host, first_port)])?;
        return dial_sequential(&endpoints, opts).map_err(ConnectError::Connect);
    }

    let endpoints = resolve_endpoints(addrs)?;
    let endpoints = reorder_for_cached(addrs, endpoints);

    // A single endpoint or a single family leaves nothing to race.
    if endpoints.len() == 1 || single_family(&endpoints) {
        debug!(host = first_host, port = first_port, "single family, sequential dial");
        return dial_sequential(&endpoints, opts).map_err(ConnectError::Connect);
    }

    let remaining = opts.timeout.map(|t| t.saturating_sub(start.elapsed()));
    let stream = race::race(&endpoints, remaining, opts.source_addr)?;
    if let Ok(winner) = stream.peer_addr() {
        trace!(%winner, "caching winning endpoint");
        for &(host, port) in addrs {
            cache::record(host, port, winner);
        }
    }
    Ok(stream)
}

/// Resolve every destination tuple, preserving resolver order across tuples.
/// Individual failures are tolerated as long as something resolves.
fn resolve_endpoints(addrs: &[(&str, u16)]) -> Result<Vec<SocketAddr>> {
    let mut endpoints = Vec::new();
    let mut first_err: Option<io::Error> = None;
    for &(host, port) in addrs {
        match (host, port).to_socket_addrs() {
            Ok(resolved) => endpoints.extend(resolved),
            Err(e) => first_err = first_err.or(Some(e)),
        }
    }
    if endpoints.is_empty() {
        return Err(ConnectError::Resolve(first_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "getaddrinfo returns an empty list")
        })));
    }
    Ok(endpoints)
}

/// Lead with the remembered winner: exact address first, then the rest of its
/// family, then everything else. Resolver order is kept inside each group.
fn reorder_for_cached(addrs: &[(&str, u16)], endpoints: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let Some(hit) = addrs.iter().find_map(|&(h, p)| cache::lookup(h, p)) else {
        return endpoints;
    };
    debug!(cached = %hit, "cached endpoint leads");
    reorder(endpoints, hit)
}

fn reorder(endpoints: Vec<SocketAddr>, hit: SocketAddr) -> Vec<SocketAddr> {
    let mut head = Vec::with_capacity(endpoints.len());
    let mut same_family = Vec::new();
    let mut rest = Vec::new();
    for sa in endpoints {
        if sa == hit {
            head.push(sa);
        } else if sa.is_ipv4() == hit.is_ipv4() {
            same_family.push(sa);
        } else {
            rest.push(sa);
        }
    }
    head.extend(same_family);
    head.extend(rest);
    head
}

fn single_family(endpoints: &[SocketAddr]) -> bool {
    endpoints.iter().all(|sa| sa.is_ipv4()) || endpoints.iter().all(|sa| sa.is_ipv6())
}

/// Plain blocking fallback: try each address in turn, each with the full
/// timeout, and surface the last failure when none connects.
fn dial_sequential(endpoints: &[SocketAddr], opts: &ConnectOpts) -> io::Result<TcpStream> {
    let mut last_err: Option<io::Error> = None;
    for &sa in endpoints {
        match dial_one(sa, opts) {
            Ok(stream) => {
                trace!(remote = %sa, "tcp connected");
                return Ok(stream);
            }
            Err(e) => {
                last_err = Some(io::Error::new(e.kind(), format!("connect {sa} failed: {e}")));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address to dial")))
}

fn dial_one(addr: SocketAddr, opts: &ConnectOpts) -> io::Result<TcpStream> {
    if opts.source_addr.is_none() {
        return match opts.timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
    }
    let sock = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if let Some(src) = opts.source_addr {
        sock.bind(&src.into())?;
    }
    match opts.timeout {
        Some(t) => sock.connect_timeout(&addr.into(), t)?,
        None => sock.connect(&addr.into())?,
    }
    Ok(sock.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }
    fn v6(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn reorder_leads_with_hit_then_family() {
        let list = vec![
            v6("[2001:db8::1]:80"),
            v4("192.0.2.1:80"),
            v4("192.0.2.2:80"),
            v6("[2001:db8::2]:80"),
        ];
        let got = reorder(list, v4("192.0.2.2:80"));
        assert_eq!(
            got,
            vec![
                v4("192.0.2.2:80"),
                v4("192.0.2.1:80"),
                v6("[2001:db8::1]:80"),
                v6("[2001:db8::2]:80"),
            ]
        );
    }

    #[test]
    fn reorder_without_exact_match_prefers_family() {
        let list = vec![v6("[2001:db8::1]:80"), v4("192.0.2.1:80")];
        let got = reorder(list, v4("198.51.100.7:80"));
        assert_eq!(got, vec![v4("192.0.2.1:80"), v6("[2001:db8::1]:80")]);
    }

    #[test]
    fn single_family_detection() {
        assert!(single_family(&[v4("192.0.2.1:80"), v4("192.0.2.2:80")]));
        assert!(single_family(&[v6("[::1]:80")]));
        assert!(!single_family(&[v4("192.0.2.1:80"), v6("[::1]:80")]));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = create_connection_to(&[], &ConnectOpts::default()).unwrap_err();
        assert!(matches!(err, ConnectError::Resolve(_)));
    }

    #[test]
    fn unresolvable_host_surfaces_resolve_error() {
        let err = create_connection("host.invalid.", 80).unwrap_err();
        assert!(matches!(err, ConnectError::Resolve(_)), "got {err:?}");
    }
}
