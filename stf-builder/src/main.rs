mod arena_writer;
mod channel;
mod config;
mod free_shm;

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use clap::Parser;
use dd_arena::Arena;
use dd_stf::wire::headers::read_readout_header;
use dd_stf::SubTimeFrame;
use dd_utils::{BoundedQueue, ShutdownFlag};

use arena_writer::ArenaWriter;
use channel::InputChannel;
use config::Config;

const OUTPUT_QUEUE_CAPACITY: usize = 64;

fn main() -> Result<()> {
    dd_utils::logging::init("info");
    let config = Config::parse();
    config.validate_or_exit();

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler();

    let arena = Arc::new(Arena::new(config.arena_config()).unwrap_or_else(|e| dd_utils::config::fatal(e)));

    let out_queue = Arc::new(BoundedQueue::<SubTimeFrame>::new(OUTPUT_QUEUE_CAPACITY));

    let free_shm_listener = TcpListener::bind(&config.free_shm_channel_name)
        .with_context(|| format!("binding free-shm channel {}", config.free_shm_channel_name))?;
    let free_shm_handle = {
        let arena = arena.clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("free-shm".into())
            .spawn(move || free_shm::run(free_shm_listener, arena, shutdown))
            .context("spawning free-shm thread")?
    };

    let serializer_handle = {
        let out_queue = out_queue.clone();
        let shutdown = shutdown.clone();
        let output_channel_name = config.output_channel_name.clone();
        thread::Builder::new()
            .name("serializer".into())
            .spawn(move || run_serializer(output_channel_name, out_queue, shutdown))
            .context("spawning serializer thread")?
    };

    let input_listener = TcpListener::bind(&config.input_channel_name)
        .with_context(|| format!("binding input channel {}", config.input_channel_name))?;
    input_listener.set_nonblocking(true)?;

    let mut receiver_handles = Vec::new();
    let mut accepted = 0u32;
    while accepted < config.cru_count && shutdown.is_running() {
        match input_listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "CRU connected");
                let arena = arena.clone();
                let out_queue = out_queue.clone();
                let shutdown = shutdown.clone();
                let superpage_size = config.cru_superpage_size as usize;
                let subbuffer_size = config.subbuffer_size as usize;
                let handle = thread::Builder::new()
                    .name(format!("receiver-{accepted}"))
                    .spawn(move || {
                        run_receiver(stream, arena, out_queue, shutdown, superpage_size, subbuffer_size)
                    })
                    .context("spawning receiver thread")?;
                receiver_handles.push(handle);
                accepted += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(e) => return Err(e).context("accepting CRU connection"),
        }
    }

    for handle in receiver_handles {
        let _ = handle.join();
    }
    out_queue.stop();
    let _ = serializer_handle.join();
    let _ = free_shm_handle.join();

    Ok(())
}

/// One CRU link's receiver loop: read a readout header, then its HBF
/// payloads, feed the per-channel state machine, and enqueue any STF it
/// finalizes. Exits on any receive error (spec.md §4.3's "abort the channel
/// thread and request global shutdown").
fn run_receiver(
    mut stream: TcpStream,
    arena: Arc<Arena>,
    out_queue: Arc<BoundedQueue<SubTimeFrame>>,
    shutdown: ShutdownFlag,
    superpage_size: usize,
    subbuffer_size: usize,
) {
    let mut channel = InputChannel::new(*b"RAW\0\0\0\0\0\0\0\0\0\0\0\0\0", *b"TPC\0");
    let mut writer = ArenaWriter::new(arena, superpage_size, subbuffer_size);

    while shutdown.is_running() {
        let header = match read_readout_header(&mut stream) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "receive failed, stopping channel");
                shutdown.request_shutdown();
                return;
            }
        };

        let mut payloads = Vec::with_capacity(header.hbframe_count as usize);
        let mut receive_failed = false;
        for _ in 0..header.hbframe_count {
            match read_length_prefixed(&mut stream) {
                Ok(bytes) => match writer.store(&bytes) {
                    Ok(handle) => payloads.push(handle),
                    Err(e) => {
                        tracing::warn!(error = %e, "arena bookkeeping error, dropping payload");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "payload receive failed");
                    receive_failed = true;
                    break;
                }
            }
        }
        if receive_failed {
            shutdown.request_shutdown();
            return;
        }

        if let Some(finalized) = channel.ingest(header, payloads) {
            if out_queue.push(finalized).is_err() {
                return;
            }
        }
    }

    if let Some(remaining) = channel.finish() {
        let _ = out_queue.push(remaining);
    }
}

fn read_length_prefixed(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let len = stream.read_u64::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn run_serializer(output_channel_name: String, out_queue: Arc<BoundedQueue<SubTimeFrame>>, shutdown: ShutdownFlag) {
    let mut stream = match TcpStream::connect(&output_channel_name) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect output channel");
            shutdown.request_shutdown();
            return;
        }
    };

    while let Some(stf) = out_queue.pop() {
        tracing::debug!(queue_depth = out_queue.len(), "serializer queue depth");
        if let Err(e) = dd_stf::wire::interleaved::serialize(&stf, &mut stream) {
            tracing::warn!(error = %e, "failed to send STF, stopping serializer");
            shutdown.request_shutdown();
            return;
        }
    }
}
