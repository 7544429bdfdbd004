//! One-shot IPv6 capability probe.
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::OnceLock;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

static HAS_IPV6: OnceLock<bool> = OnceLock::new();

/// Whether this host can open an IPv6 stream socket with a usable source
/// address. Evaluated at most once per process; every failure path maps to
/// `false`. The probe never issues a connect and never blocks on the network.
pub fn ipv6_supported() -> bool {
    *HAS_IPV6.get_or_init(|| {
        let supported = detect_ipv6();
        debug!(supported, "ipv6 probe");
        supported
    })
}

fn detect_ipv6() -> bool {
    // Socket creation alone proves the stack compiled in AF_INET6; binding
    // the loopback proves an IPv6 source address actually exists. The socket
    // closes on drop on every path.
    let Ok(sock) = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP)) else {
        return false;
    };
    let loopback = SocketAddr::from((Ipv6Addr::LOCALHOST, 0));
    sock.bind(&loopback.into()).is_ok()
}
