mod config;
mod heartbeat;
mod pending;

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use dd_stf::TimeFrame;
use dd_utils::ShutdownFlag;

use config::Config;
use pending::{MergeStep, PendingTfs};

fn main() -> Result<()> {
    dd_utils::logging::init("info");
    let config = Config::parse();
    config.validate_or_exit();

    if config.gui {
        tracing::warn!("--gui was requested but no GUI is built into this binary; ignoring");
    }

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler();

    let pending = Arc::new(PendingTfs::new(config.flp_count as usize, config.buffer_timeout()));

    let heartbeat_handle = {
        let address = config.heartbeat_listen.clone();
        let aggregator_id = config.aggregator_id;
        let interval = config.heartbeat_interval();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("heartbeat".into())
            .spawn(move || heartbeat::run(address, aggregator_id, interval, shutdown))
            .context("spawning heartbeat thread")?
    };

    let mut receiver_handles = Vec::new();
    for flp_idx in 0..config.flp_count {
        let address = config.input_address(flp_idx);
        let listener = TcpListener::bind(&address).with_context(|| format!("binding input channel {address}"))?;
        let pending = pending.clone();
        let shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name(format!("receiver-{flp_idx}"))
            .spawn(move || run_receiver(flp_idx, listener, pending, shutdown))
            .context("spawning receiver thread")?;
        receiver_handles.push(handle);
    }

    let sweep_handle = {
        let pending = pending.clone();
        let interval = config.sweep_interval();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("sweep".into())
            .spawn(move || run_sweep(pending, interval, shutdown))
            .context("spawning sweep thread")?
    };

    run_merger(pending, config.sweep_interval(), shutdown.clone());

    shutdown.request_shutdown();
    for handle in receiver_handles {
        let _ = handle.join();
    }
    let _ = sweep_handle.join();
    let _ = heartbeat_handle.join();

    Ok(())
}

/// Accepts one connection per FLP and deserializes its STF stream, handing
/// each finished STF to the shared [`PendingTfs`] merge buffer.
fn run_receiver(flp_idx: u32, listener: TcpListener, pending: Arc<PendingTfs>, shutdown: ShutdownFlag) {
    listener.set_nonblocking(true).expect("listener supports nonblocking mode");

    let mut stream: TcpStream = loop {
        if !shutdown.is_running() {
            return;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!(flp_idx, %peer, "FLP connected");
                break stream;
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => {
                tracing::error!(error = %e, flp_idx, "accept failed");
                return;
            }
        }
    };
    stream.set_nonblocking(false).expect("stream supports blocking mode");

    while shutdown.is_running() {
        match dd_stf::wire::interleaved::deserialize(&mut stream) {
            Ok(stf) => pending.insert(stf),
            Err(e) => {
                tracing::warn!(error = %e, flp_idx, "STF deserialize failed, closing receiver");
                return;
            }
        }
    }
}

/// Periodically evicts timed-out pending TFs so a stalled FLP cannot hold
/// the merge buffer open forever (spec.md §4.5 timeout determinism).
fn run_sweep(pending: Arc<PendingTfs>, interval: std::time::Duration, shutdown: ShutdownFlag) {
    while shutdown.is_running() {
        std::thread::sleep(interval);
        pending.sweep_timeouts();
        tracing::debug!(
            discarded = pending.discarded_count.get(),
            rejected_late = pending.rejected_late_count.get(),
            "merge buffer metrics"
        );
    }
}

/// Drains ready merges and logs the resulting TF. No downstream sink is
/// specified (histogram/GUI consumers are out of scope) — this is the one
/// place a future storage hook would attach.
fn run_merger(pending: Arc<PendingTfs>, wait_timeout: std::time::Duration, shutdown: ShutdownFlag) {
    while shutdown.is_running() {
        match pending.merge_step(wait_timeout) {
            MergeStep::Merged { tf, complete } => emit(tf, complete),
            MergeStep::Idle => {}
        }
    }
}

fn emit(tf: TimeFrame, complete: bool) {
    tracing::info!(
        tf_id = tf.tf_id(),
        eq_count = tf.eq_count(),
        data_size = tf.data_size(),
        complete,
        "TF merged"
    );
}
