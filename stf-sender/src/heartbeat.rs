//! Receives aggregator heartbeats (spec.md §4.5): each aggregator connects
//! and periodically sends its `AggregatorId` as a 4-byte little-endian
//! value. Every receipt refreshes that aggregator's liveness in the
//! [`Router`](crate::router::Router), which routing consults before handing
//! it a new STF.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};
use dd_utils::ShutdownFlag;

use crate::router::Router;

pub fn run(listener: TcpListener, router: Arc<Router>, shutdown: ShutdownFlag) {
    listener.set_nonblocking(true).expect("listener supports nonblocking mode");

    while shutdown.is_running() {
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "aggregator heartbeat connection");
                let router = router.clone();
                let shutdown = shutdown.clone();
                if let Err(e) = std::thread::Builder::new()
                    .name(format!("heartbeat-{peer}"))
                    .spawn(move || handle_peer(stream, router, shutdown))
                {
                    tracing::error!(error = %e, "failed to spawn heartbeat reader thread");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                tracing::error!(error = %e, "heartbeat listener accept failed");
                break;
            }
        }
    }
}

fn handle_peer(mut stream: TcpStream, router: Arc<Router>, shutdown: ShutdownFlag) {
    while shutdown.is_running() {
        match stream.read_u32::<LittleEndian>() {
            Ok(aggregator_id) => router.record_heartbeat(aggregator_id),
            Err(_) => return,
        }
    }
}
