//! Best-effort exit notification
//!
//! When a client's process is torn down it cannot rely on a live connection
//! or a runtime, so the seat-release request goes out as a single UDP
//! datagram over a blocking std socket: no acknowledgment, no retry, errors
//! swallowed after a log line. Correctness never depends on delivery; the
//! abandonment sweeper is the authoritative backstop.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::store::SharedStore;

/// Datagram size cap; an `ExitSignal` is far smaller
const MAX_DATAGRAM: usize = 512;

/// Payload of the exit datagram
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExitSignal {
    pub room_id: Uuid,
    pub user_id: Uuid,
}

/// Connectionless sender side, usable during process teardown
pub struct ExitBeacon;

impl ExitBeacon {
    /// Fire one release datagram and forget it.
    ///
    /// Uses a throwaway blocking socket so it works outside any runtime,
    /// including from atexit-style teardown paths.
    pub fn send(addr: SocketAddr, room_id: Uuid, user_id: Uuid) {
        let signal = ExitSignal { room_id, user_id };
        let payload = match serde_json::to_vec(&signal) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Exit signal serialization failed");
                return;
            }
        };

        let socket = match std::net::UdpSocket::bind(("0.0.0.0", 0)) {
            Ok(socket) => socket,
            Err(e) => {
                debug!(error = %e, "Exit beacon socket unavailable");
                return;
            }
        };

        if let Err(e) = socket.send_to(&payload, addr) {
            debug!(addr = %addr, error = %e, "Exit signal not delivered");
        }
    }
}

/// Receiver side: releases seats named by incoming exit datagrams
pub struct ExitListener {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ExitListener {
    /// Bind and start listening
    pub async fn start(store: Arc<SharedStore>, bind: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        let addr = socket.local_addr()?;
        info!(addr = %addr, "Exit listener started");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(listen_loop(socket, store, shutdown_rx));

        Ok(Self {
            addr,
            shutdown_tx,
            task,
        })
    }

    /// The bound address (useful with port 0)
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop listening
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

async fn listen_loop(
    socket: UdpSocket,
    store: Arc<SharedStore>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, from)) => {
                        match serde_json::from_slice::<ExitSignal>(&buf[..len]) {
                            Ok(signal) => {
                                debug!(
                                    from = %from,
                                    room_id = %signal.room_id,
                                    user_id = %signal.user_id,
                                    "Exit signal received"
                                );
                                match store.release_seats_for_user(signal.room_id, signal.user_id) {
                                    Ok(released) if released > 0 => {
                                        info!(user_id = %signal.user_id, "Seat released via exit signal");
                                    }
                                    Ok(_) => {}
                                    Err(e) => {
                                        // The sweeper will reclaim eventually
                                        warn!(error = %e, "Exit release failed");
                                    }
                                }
                            }
                            Err(e) => {
                                debug!(from = %from, error = %e, "Ignoring malformed exit datagram");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Exit listener receive error");
                        break;
                    }
                }
            }
            _ = &mut shutdown_rx => {
                debug!("Exit listener shutting down");
                break;
            }
        }
    }
}
