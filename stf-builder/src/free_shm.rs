//! Free-shm back-channel server (spec.md §9's design note): readout
//! producers that received sub-buffer references post `(addr, size)` back
//! here once they're done with them, so the arena can reclaim the
//! superpage. In this single-process rewrite the only producer of arena
//! references is [`crate::readout`], so this channel mostly demonstrates the
//! contract for an external readout process that would otherwise hold the
//! other end of `--free-shm-channel-name`.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};
use dd_arena::Arena;
use dd_utils::ShutdownFlag;

pub fn run(listener: TcpListener, arena: Arc<Arena>, shutdown: ShutdownFlag) {
    listener
        .set_nonblocking(true)
        .expect("listener supports nonblocking mode");

    while shutdown.is_running() {
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "free-shm client connected");
                let arena = arena.clone();
                let shutdown = shutdown.clone();
                let name = format!("free-shm-{peer}");
                if let Err(e) = std::thread::Builder::new()
                    .name(name)
                    .spawn(move || handle_client(stream, arena, shutdown))
                {
                    tracing::error!(error = %e, "failed to spawn free-shm client thread");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                tracing::error!(error = %e, "free-shm listener accept failed");
                break;
            }
        }
    }
}

fn handle_client(mut stream: TcpStream, arena: Arc<Arena>, shutdown: ShutdownFlag) {
    while shutdown.is_running() {
        let addr = match stream.read_u64::<LittleEndian>() {
            Ok(v) => v as usize,
            Err(_) => return,
        };
        let size = match stream.read_u64::<LittleEndian>() {
            Ok(v) => v as usize,
            Err(_) => return,
        };
        if let Err(e) = arena.release_addr(addr, size) {
            tracing::warn!(error = %e, addr, size, "free-shm release rejected");
        }
    }
}
