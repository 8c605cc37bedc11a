//! Forwarding to the upstream resolver.

use async_trait::async_trait;
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

use crate::error::UpstreamError;
use crate::transport::MAX_DNS_PACKET_SIZE;

/// Default read timeout of an upstream exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Send `request` upstream and return the reply.
    async fn exchange(&self, request: &Message) -> Result<Message, UpstreamError>;
}

/// Plain DNS-over-UDP upstream.
///
/// Every exchange uses its own ephemeral socket, so concurrent queries never
/// see each other's replies.
pub struct UdpUpstream {
    addr: SocketAddr,
    timeout: Duration,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_timeout(addr, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    fn bind_addr(&self) -> SocketAddr {
        if self.addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        }
    }

    /// Read until a reply carrying `id` arrives. Stray or undecodable
    /// datagrams are skipped.
    async fn recv_reply(&self, socket: &UdpSocket, id: u16) -> Result<Message, UpstreamError> {
        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        loop {
            let len = socket.recv(&mut buf).await?;
            let reply = match Message::from_vec(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(upstream = %self.addr, error = %e, "discarding undecodable upstream datagram");
                    continue;
                }
            };
            if reply.id() == id {
                return Ok(reply);
            }
            debug!(upstream = %self.addr, expected = id, got = reply.id(), "discarding mismatched upstream reply");
        }
    }
}

#[async_trait]
impl Upstream for UdpUpstream {
    async fn exchange(&self, request: &Message) -> Result<Message, UpstreamError> {
        let socket = UdpSocket::bind(self.bind_addr()).await?;
        socket.connect(self.addr).await?;
        socket.send(&request.to_vec()?).await?;

        timeout(self.timeout, self.recv_reply(&socket, request.id()))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?
    }
}
