//! Connection race engine: staggered nonblocking connects multiplexed by one
//! selector.
//!
//! Attempts start in resolver order, spaced by [`CONNECTION_ATTEMPT_DELAY`];
//! the first socket to finish its handshake cleanly wins and every other
//! socket is closed before returning. Per-attempt failures are recorded and
//! absorbed; the caller sees either the winning stream, the last connect
//! error, or a timeout.
use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use polling::{Event, Poller};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use crate::error::ConnectError;

/// Delay between successive attempt starts. RFC 6555 §5.5 recommends
/// 150–250 ms; the upper bound keeps losing-path load lowest.
pub const CONNECTION_ATTEMPT_DELAY: Duration = Duration::from_millis(250);

/// One in-flight nonblocking connect. Lives in `Race::live` from start until
/// it wins, fails, or the race ends; the socket closes when the slot drops.
struct Attempt {
    key: usize,
    sock: Socket,
    addr: SocketAddr,
}

/// Drive nonblocking connects against `addrs` until one completes, the
/// deadline fires, or every endpoint is exhausted. The returned stream is
/// restored to blocking mode. No `timeout` means the race runs until all
/// attempts resolve.
pub(crate) fn race(
    addrs: &[SocketAddr],
    timeout: Option<Duration>,
    source_addr: Option<SocketAddr>,
) -> Result<TcpStream, ConnectError> {
    let mut engine = Race {
        poller: Poller::new()?,
        pending: addrs.iter().copied().collect(),
        live: Vec::new(),
        next_stagger: Instant::now(),
        deadline: timeout.map(|t| Instant::now() + t),
        timeout,
        source_addr,
        last_err: None,
        next_key: 0,
    };
    let out = engine.drive();
    engine.close_all();
    out
}

struct Race {
    poller: Poller,
    pending: VecDeque<SocketAddr>,
    live: Vec<Attempt>,
    next_stagger: Instant,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    source_addr: Option<SocketAddr>,
    last_err: Option<io::Error>,
    next_key: usize,
}

impl Race {
    fn drive(&mut self) -> Result<TcpStream, ConnectError> {
        let mut events: Vec<Event> = Vec::new();
        loop {
            // Keep at least one attempt in flight; immediate failures fall
            // straight through to the next endpoint without waiting out the
            // stagger.
            while self.live.is_empty() {
                let Some(addr) = self.pending.pop_front() else {
                    return Err(self.failure());
                };
                if let Some(stream) = self.start_attempt(addr) {
                    return Ok(stream);
                }
                self.next_stagger = Instant::now() + CONNECTION_ATTEMPT_DELAY;
            }

            let budget = self.wait_budget();
            events.clear();
            self.poller.wait(&mut events, budget)?;

            if let Some(stream) = self.reap(&events)? {
                return Ok(stream);
            }

            let now = Instant::now();
            if self.deadline.is_some_and(|d| now >= d) {
                return Err(self.failure());
            }
            if !self.pending.is_empty() && now >= self.next_stagger {
                if let Some(addr) = self.pending.pop_front() {
                    if let Some(stream) = self.start_attempt(addr) {
                        return Ok(stream);
                    }
                    self.next_stagger = now + CONNECTION_ATTEMPT_DELAY;
                }
            }
            if self.live.is_empty() && self.pending.is_empty() {
                return Err(self.failure());
            }
        }
    }

    /// Create, bind, and connect one nonblocking socket. Returns the stream
    /// only on an immediately completed connect; an in-flight attempt joins
    /// `live`, anything else is recorded and dropped.
    fn start_attempt(&mut self, addr: SocketAddr) -> Option<TcpStream> {
        let sock = match open_nonblocking(addr, self.source_addr) {
            Ok(s) => s,
            Err(e) => {
                self.record(addr, e);
                return None;
            }
        };
        match sock.connect(&addr.into()) {
            Ok(()) => match into_stream(sock) {
                Ok(stream) => {
                    trace!(remote = %addr, "connected without waiting");
                    Some(stream)
                }
                Err(e) => {
                    self.record(addr, e);
                    None
                }
            },
            Err(e) if connect_in_progress(&e) => {
                let key = self.next_key;
                self.next_key += 1;
                // SAFETY: the `Attempt` owning `sock` outlives the
                // registration; every exit path calls `delete` before the
                // slot (and its fd) drops.
                let registered = unsafe { self.poller.add(&sock, Event::writable(key)) };
                if let Err(e) = registered {
                    self.record(addr, e);
                    return None;
                }
                trace!(remote = %addr, key, "connect in flight");
                self.live.push(Attempt { key, sock, addr });
                None
            }
            Err(e) => {
                self.record(addr, e);
                None
            }
        }
    }

    /// Resolve every slot whose socket woke the selector. Slots are visited
    /// in insertion order, so the earliest-started ready socket wins a
    /// multi-event wakeup.
    fn reap(&mut self, events: &[Event]) -> Result<Option<TcpStream>, ConnectError> {
        let mut i = 0;
        while i < self.live.len() {
            if !events.iter().any(|e| e.key == self.live[i].key) {
                i += 1;
                continue;
            }
            let attempt = self.live.remove(i);
            // registration must be revoked before the socket can close
            self.poller.delete(&attempt.sock)?;
            match attempt.sock.take_error() {
                Ok(None) => match into_stream(attempt.sock) {
                    Ok(stream) => {
                        trace!(remote = %attempt.addr, "race won");
                        return Ok(Some(stream));
                    }
                    Err(e) => self.record(attempt.addr, e),
                },
                Ok(Some(e)) | Err(e) => self.record(attempt.addr, e),
            }
        }
        Ok(None)
    }

    /// Selector wait bounded by the stagger tick (while endpoints remain
    /// pending) and the overall deadline. `None` blocks until an event.
    fn wait_budget(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut budget = self.deadline.map(|d| d.saturating_duration_since(now));
        if !self.pending.is_empty() {
            let stagger = self.next_stagger.saturating_duration_since(now);
            budget = Some(budget.map_or(stagger, |b| b.min(stagger)));
        }
        budget
    }

    fn record(&mut self, addr: SocketAddr, e: io::Error) {
        trace!(remote = %addr, error = %e, "connect attempt failed");
        self.last_err = Some(io::Error::new(e.kind(), format!("connect {addr} failed: {e}")));
    }

    fn failure(&mut self) -> ConnectError {
        debug!(pending = self.pending.len(), live = self.live.len(), "race failed");
        match self.last_err.take() {
            Some(e) => ConnectError::Connect(e),
            None => ConnectError::Timeout(self.timeout.unwrap_or_default()),
        }
    }

    fn close_all(&mut self) {
        for attempt in self.live.drain(..) {
            let _ = self.poller.delete(&attempt.sock);
            trace!(remote = %attempt.addr, "closing losing attempt");
        }
    }
}

fn open_nonblocking(addr: SocketAddr, source_addr: Option<SocketAddr>) -> io::Result<Socket> {
    let sock = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    sock.set_nonblocking(true)?;
    if let Some(src) = source_addr {
        sock.bind(&src.into())?;
    }
    Ok(sock)
}

/// Hand a finished socket back as a plain blocking stream.
fn into_stream(sock: Socket) -> io::Result<TcpStream> {
    sock.set_nonblocking(false)?;
    Ok(sock.into())
}

#[cfg(unix)]
fn connect_in_progress(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(libc::EINPROGRESS)
}

#[cfg(not(unix))]
fn connect_in_progress(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}
