//! Datagram transport used by the runner.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

/// Largest datagram the runner will receive.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Sends and receives whole datagrams to and from one peer.
///
/// One call to `send` is one datagram on the wire; `recv` yields exactly one
/// received datagram.
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> io::Result<()>;

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// UDP transport bound to an ephemeral local port and connected to the server.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    pub async fn connect(peer: SocketAddr) -> io::Result<Self> {
        let bind_address = match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(bind_address).await?;
        socket.connect(peer).await?;
        debug!(local = ?socket.local_addr().ok(), peer = %peer, "Broadcasting UDP socket connected");

        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send(&self, datagram: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(datagram).await?;
        if sent != datagram.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {sent} of {} bytes", datagram.len()),
            ));
        }
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }
}
