//! Broadcasts this aggregator's liveness to every producer it receives from.
//!
//! The aggregator is the connecting side here (mirroring
//! `stf-sender::heartbeat`, where the aggregator connects out and the
//! sender listens): one thread per FLP address, each holding its own TCP
//! connection and writing `aggregator_id` as a little-endian u32 on every
//! tick.

use std::net::TcpStream;
use std::time::Duration;

use byteorder::{LittleEndian, WriteBytesExt};
use dd_utils::ShutdownFlag;

pub fn run(address: String, aggregator_id: u32, interval: Duration, shutdown: ShutdownFlag) {
    loop {
        if !shutdown.is_running() {
            return;
        }
        let mut stream = match TcpStream::connect(&address) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, %address, "heartbeat connect failed, retrying");
                std::thread::sleep(interval);
                continue;
            }
        };

        while shutdown.is_running() {
            if let Err(e) = stream.write_u32::<LittleEndian>(aggregator_id) {
                tracing::warn!(error = %e, %address, "heartbeat write failed, reconnecting");
                break;
            }
            std::thread::sleep(interval);
        }
    }
}
