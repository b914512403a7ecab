//! Datagram sources the packet pump can read from.
//!
//! The pump only needs two things from a socket: receive one datagram
//! into a caller-owned buffer, and report the bound address. Putting
//! that behind a trait keeps the pump testable with scripted reads.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// One-directional datagram source.
#[async_trait::async_trait]
pub(crate) trait DatagramTransport: Send + Sync {
    /// Receives one datagram into `buf`, returning its length in bytes.
    ///
    /// Datagrams longer than `buf` are truncated to fit.
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// The locally bound address.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A bound UDP socket.
#[derive(Debug)]
pub(crate) struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a UDP socket on `addr` without blocking.
    ///
    /// Must be called from within a Tokio runtime; the socket registers
    /// with the runtime's I/O driver.
    pub(crate) fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = std::net::UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket)?;
        Ok(Self { socket })
    }
}

#[async_trait::async_trait]
impl DatagramTransport for UdpTransport {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        // The sender address is dropped: this transport never replies.
        let (len, _peer) = self.socket.recv_from(buf).await?;
        Ok(len)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
