//! UDP listener.
//!
//! Receives datagrams on one socket and resolves each query in its own task.
//! Replies go back out through the same socket.

use futures::FutureExt;
use hickory_proto::op::{Message, MessageType};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::MAX_DNS_PACKET_SIZE;
use crate::dns::HEADER_LEN;
use crate::error::ServerError;
use crate::resolver::Resolver;

/// Stops a running [`UdpListener`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    closed: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Stop the listener and wait until its socket is closed. Queries already
    /// dispatched keep running, but their replies are dropped.
    pub async fn stop(&self) {
        self.tx.send_replace(true);
        let mut closed = self.closed.clone();
        // Err means the listener was dropped, which closes the socket too.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

/// UDP transport for the sinkhole.
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl UdpListener {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let (tx, rx) = watch::channel(false);
        let (closed_tx, closed_rx) = watch::channel(false);

        Ok(Self {
            socket: Arc::new(socket),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
            closed_tx,
            closed_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
            closed: self.closed_rx.clone(),
        }
    }

    /// Receive and dispatch queries until stopped.
    ///
    /// Returns once the receive loop has exited and the socket is closed.
    /// In-flight tasks only hold the socket weakly.
    pub async fn serve(mut self, resolver: Arc<Resolver>) -> Result<(), ServerError> {
        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        info!(addr = %self.local_addr()?, "UDP listener started");

        loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                result = self.socket.recv_from(&mut buf) => {
                    let (len, src) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(error = %e, "UDP recv error");
                            continue;
                        }
                    };
                    if let Some(request) = decode(&buf[..len], src) {
                        dispatch(request, src, Arc::downgrade(&self.socket), resolver.clone());
                    }
                }
            }
        }

        drop(self.socket);
        self.closed_tx.send_replace(true);
        info!("UDP listener stopped");
        Ok(())
    }
}

fn decode(datagram: &[u8], src: SocketAddr) -> Option<Message> {
    if datagram.len() < HEADER_LEN {
        debug!(%src, len = datagram.len(), "dropping short datagram");
        return None;
    }
    let message = match Message::from_vec(datagram) {
        Ok(m) => m,
        Err(e) => {
            debug!(%src, error = %e, "dropping undecodable datagram");
            return None;
        }
    };
    if message.message_type() != MessageType::Query {
        debug!(%src, id = message.id(), "dropping non-query message");
        return None;
    }

    Some(message)
}

/// Run one query in its own task. A panic while handling it is caught and
/// logged so neither the listener nor other queries are affected.
fn dispatch(request: Message, src: SocketAddr, socket: Weak<UdpSocket>, resolver: Arc<Resolver>) {
    let id = request.id();
    tokio::spawn(async move {
        let handled = AssertUnwindSafe(resolver.handle(request, src, &socket))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(id, %src, panic = %message, "query handler panicked");
        }
    });
}
