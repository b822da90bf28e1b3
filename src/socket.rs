//! Non-blocking TCP client sink.
//!
//! The engine is the client; the host is fixed to loopback. Connect and
//! send both run in non-blocking mode so a poll completes in bounded time
//! regardless of network state, and a would-block condition is a normal
//! outcome that defers work to the next poll. There is no reconnect
//! backoff: the host cadence already throttles attempts.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use crate::sink::{Delivery, Sink};
use crate::wire::OutputRecord;

/// Connection phase. Owned exclusively by the sink; transitions only
/// through [`Sink::begin`] and send failures in [`Sink::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reconnecting loopback TCP client. Exactly one socket is open at a time;
/// reconnecting always creates a fresh descriptor rather than reusing the
/// old one.
pub struct SocketSink {
    addr: SocketAddr,
    state: SocketState,
    sock: Option<Socket>,
}

fn connect_in_progress(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || matches!(err.raw_os_error(), Some(code) if code == libc::EINPROGRESS || code == libc::EALREADY)
}

fn already_connected(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EISCONN)
}

impl SocketSink {
    pub fn new(port: u16) -> Self {
        Self {
            addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)),
            state: SocketState::Disconnected,
            sock: None,
        }
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    fn open_socket(&mut self) {
        let sock = match Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)) {
            Ok(sock) => sock,
            Err(e) => {
                warn!(error = %e, "tick socket creation failed");
                return;
            }
        };
        if let Err(e) = sock.set_nonblocking(true) {
            warn!(error = %e, "tick socket non-blocking mode failed");
            return;
        }
        match sock.connect(&self.addr.into()) {
            Ok(()) => {
                self.state = SocketState::Connected;
                info!(addr = %self.addr, "tick socket connected");
            }
            Err(ref e) if connect_in_progress(e) => self.state = SocketState::Connecting,
            Err(_) => {
                // refused outright; the next poll opens a fresh socket
                self.state = SocketState::Disconnected;
                return;
            }
        }
        self.sock = Some(sock);
    }

    /// Probe an in-progress connect by issuing `connect` again: the OS
    /// answers already-connected once the handshake finished, in-progress
    /// while it is still pending, and a hard error if it failed.
    fn probe_connect(&mut self) {
        let Some(sock) = self.sock.as_ref() else {
            self.state = SocketState::Disconnected;
            return;
        };
        match sock.connect(&self.addr.into()) {
            Ok(()) => {
                self.state = SocketState::Connected;
                info!(addr = %self.addr, "tick socket connected");
            }
            Err(ref e) if already_connected(e) => {
                self.state = SocketState::Connected;
                info!(addr = %self.addr, "tick socket connected");
            }
            Err(ref e) if connect_in_progress(e) => {}
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "tick socket connect failed");
                self.teardown();
            }
        }
    }

    fn teardown(&mut self) {
        self.sock = None;
        self.state = SocketState::Disconnected;
    }
}

impl Sink for SocketSink {
    fn begin(&mut self) -> bool {
        match self.state {
            SocketState::Disconnected => self.open_socket(),
            SocketState::Connecting => self.probe_connect(),
            SocketState::Connected => {}
        }
        self.state == SocketState::Connected
    }

    fn deliver(&mut self, record: &OutputRecord) -> Delivery {
        let Some(sock) = self.sock.as_ref() else {
            return Delivery::Down;
        };
        let mut line = record.encode();
        line.push('\n');
        match sock.send(line.as_bytes()) {
            Ok(n) if n == line.len() => Delivery::Sent,
            Ok(n) => {
                // short write truncates the line; the record is lost
                warn!(seq = record.seq, sent = n, len = line.len(), "partial tick send");
                Delivery::Skipped
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Delivery::Skipped,
            Err(e) => {
                warn!(error = %e, "tick socket connection lost");
                self.teardown();
                Delivery::Down
            }
        }
    }

    fn end(&mut self) {}
}
