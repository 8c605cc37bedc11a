//! Transport layer for the sinkhole.
//!
//! Receives DNS queries from clients and writes replies back. Resolution
//! itself lives in [`crate::resolver`].

pub mod udp;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Weak;
use tokio::net::UdpSocket;

pub use udp::{ShutdownHandle, UdpListener};

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

/// Where replies for a client go.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    async fn send(&self, bytes: &[u8], to: SocketAddr) -> io::Result<()>;
}

/// Replies from dispatched queries hold the listener socket weakly, so a
/// stopped listener closes it even with queries still in flight. A reply
/// after that fails with `NotConnected`.
#[async_trait]
impl ResponseWriter for Weak<UdpSocket> {
    async fn send(&self, bytes: &[u8], to: SocketAddr) -> io::Result<()> {
        let socket = self
            .upgrade()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "listener stopped"))?;
        socket.send_to(bytes, to).await.map(|_| ())
    }
}
