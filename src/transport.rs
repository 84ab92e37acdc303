#![warn(missing_docs)]

//! The blocking TCP transport: a listening socket with
//! `SO_REUSEADDR` set before bind, and the per-client [`Connection`]
//! handle workers own for the lifetime of one request.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpStream};
use thiserror::Error;

/// Listen backlog handed to the OS. The kernel clamps this to its own
/// maximum (`somaxconn`).
const DEFAULT_BACKLOG: i32 = 128;

/// Transport-level failures, surfaced with peer-friendly messages so a
/// bind error names the address and the usual suspects.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Another socket is already bound to the address.
    #[error("cannot bind {addr}: address already in use (is another server instance running on this port?)")]
    AddrInUse {
        /// The address that was attempted.
        addr: String,
    },

    /// The OS refused the bind for privilege reasons.
    #[error("cannot bind {addr}: permission denied (ports below 1024 require elevated privileges)")]
    PermissionDenied {
        /// The address that was attempted.
        addr: String,
    },

    /// The address does not exist on this host.
    #[error("cannot bind {addr}: address not available on this host")]
    AddrNotAvailable {
        /// The address that was attempted.
        addr: String,
    },

    /// Anything else the socket layer reported.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// An IPv4 listening socket with blocking accept.
///
/// `SO_REUSEADDR` is set **before** bind so restarts don't trip over
/// sockets lingering in `TIME_WAIT`.
#[derive(Debug)]
pub struct Listener {
    socket: Socket,
    local: SocketAddr,
}

impl Listener {
    /// Creates, configures, binds, and starts listening in one step.
    pub fn bind(addr: SocketAddrV4) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;

        socket
            .bind(&SocketAddr::V4(addr).into())
            .map_err(|err| match err.kind() {
                io::ErrorKind::AddrInUse => TransportError::AddrInUse {
                    addr: addr.to_string(),
                },
                io::ErrorKind::PermissionDenied => TransportError::PermissionDenied {
                    addr: addr.to_string(),
                },
                io::ErrorKind::AddrNotAvailable => TransportError::AddrNotAvailable {
                    addr: addr.to_string(),
                },
                _ => TransportError::Io(err),
            })?;

        socket.listen(DEFAULT_BACKLOG)?;

        let local = socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::other("listener has no inet address"))?;

        Ok(Listener { socket, local })
    }

    /// The actual bound address - useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Accepts one client. `Interrupted` is retried here; any other
    /// error is the caller's to classify.
    pub fn accept(&self) -> io::Result<(Connection, SocketAddr)> {
        loop {
            match self.socket.accept() {
                Ok((socket, peer)) => {
                    let stream: TcpStream = socket.into();
                    let peer = peer
                        .as_socket()
                        .unwrap_or_else(|| SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)));
                    return Ok((Connection::new(stream, peer), peer));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Shuts the listening socket down, waking a thread blocked in
    /// [`accept`](Listener::accept). Called from `Server::stop`.
    pub fn unblock(&self) {
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

/// One accepted client socket with blocking I/O.
///
/// The worker that accepted a connection owns it; ownership moves into a
/// stream continuation when a handler takes the socket over. Closing is
/// idempotent, and `Drop` closes on every exit path - success, panic, or
/// early return - so accepted and closed sockets always balance.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    closed: bool,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Connection {
            stream,
            peer,
            closed: false,
        }
    }

    /// Wraps an already-connected stream. Used by tests and by embedders
    /// that accept sockets themselves.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Connection::new(stream, peer))
    }

    /// The remote end's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads into `buf`, returning the byte count. Zero means the peer
    /// closed its half in an orderly fashion.
    pub fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    /// Writes from `bytes`, returning the count actually sent.
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.stream.write(bytes)
    }

    /// Writes all of `bytes` or fails.
    pub fn send_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    /// Half-closes the socket.
    pub fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }

    /// Fully closes the socket. Safe to call more than once.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
