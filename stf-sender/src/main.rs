mod config;
mod heartbeat;
mod router;

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dd_scheduler_api::{HttpSchedulerClient, ProducerStats, SchedulerClient};
use dd_stf::SubTimeFrame;
use dd_utils::{BoundedQueue, ShutdownFlag};

use config::Config;
use router::{RouteOutcome, Router};

const PER_AGGREGATOR_QUEUE_CAPACITY: usize = 64;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    dd_utils::logging::init("info");
    let config = Config::parse();
    config.validate_or_exit();

    let shutdown = ShutdownFlag::new();
    shutdown.install_signal_handler();

    let scheduler: Option<Arc<dyn SchedulerClient>> = config
        .scheduler_url
        .as_ref()
        .map(|url| Arc::new(HttpSchedulerClient::new(url.clone())) as Arc<dyn SchedulerClient>);

    if let Some(scheduler) = &scheduler {
        scheduler
            .register_producer(config.producer_id)
            .context("registering with scheduler")?;
    }

    let router = Arc::new(Router::new(scheduler.clone(), config.epn_count));

    let heartbeat_listener = TcpListener::bind(&config.heartbeat_channel_name)
        .with_context(|| format!("binding heartbeat channel {}", config.heartbeat_channel_name))?;
    let heartbeat_handle = {
        let router = router.clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("heartbeat".into())
            .spawn(move || heartbeat::run(heartbeat_listener, router, shutdown))
            .context("spawning heartbeat thread")?
    };

    let mut queues = Vec::new();
    let mut sender_handles = Vec::new();
    for idx in 0..config.epn_count {
        let queue = Arc::new(BoundedQueue::<SubTimeFrame>::new(PER_AGGREGATOR_QUEUE_CAPACITY));
        let address = config.output_address(idx);
        let shutdown = shutdown.clone();
        let queue_clone = queue.clone();
        let handle = thread::Builder::new()
            .name(format!("sender-{idx}"))
            .spawn(move || run_sender(idx, address, queue_clone, shutdown))
            .context("spawning sender thread")?;
        queues.push(queue);
        sender_handles.push(handle);
    }

    let max_observed_tf = Arc::new(AtomicU64::new(0));
    let tf_count = Arc::new(AtomicU64::new(0));

    let input_stream = TcpStream::connect(&config.input_channel_name)
        .with_context(|| format!("connecting input channel {}", config.input_channel_name))?;
    run_deserializer(
        input_stream,
        router,
        queues.clone(),
        scheduler,
        config.producer_id,
        config.stats_period_tf,
        max_observed_tf,
        tf_count,
        shutdown.clone(),
    );

    for queue in &queues {
        queue.stop();
    }
    for handle in sender_handles {
        let _ = handle.join();
    }
    let _ = heartbeat_handle.join();

    Ok(())
}

/// Deserializes STFs from the producer-facing input channel and dispatches
/// each to its routed aggregator's queue (spec.md §4.4).
#[allow(clippy::too_many_arguments)]
fn run_deserializer(
    mut stream: TcpStream,
    router: Arc<Router>,
    queues: Vec<Arc<BoundedQueue<SubTimeFrame>>>,
    scheduler: Option<Arc<dyn SchedulerClient>>,
    producer_id: u32,
    stats_period_tf: u64,
    max_observed_tf: Arc<AtomicU64>,
    tf_count: Arc<AtomicU64>,
    shutdown: ShutdownFlag,
) {
    while shutdown.is_running() {
        let stf = match dd_stf::wire::interleaved::deserialize(&mut stream) {
            Ok(stf) => stf,
            Err(e) => {
                tracing::warn!(error = %e, "STF deserialize failed, stopping");
                shutdown.request_shutdown();
                return;
            }
        };

        let tf_id = stf.tf_id();
        max_observed_tf.fetch_max(tf_id, Ordering::Relaxed);
        let count = tf_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % stats_period_tf.max(1) == 0 {
            if let Some(scheduler) = &scheduler {
                publish_stats(scheduler.as_ref(), producer_id, max_observed_tf.load(Ordering::Relaxed));
            }
            tracing::info!(
                dropped_ahead = router.dropped_ahead.get(),
                dropped_dead_peer = router.dropped_dead_peer.get(),
                "routing metrics"
            );
        }

        dispatch(&router, &queues, &scheduler, producer_id, stf, &shutdown);
    }
}

fn dispatch(
    router: &Router,
    queues: &[Arc<BoundedQueue<SubTimeFrame>>],
    scheduler: &Option<Arc<dyn SchedulerClient>>,
    producer_id: u32,
    stf: SubTimeFrame,
    shutdown: &ShutdownFlag,
) {
    loop {
        match router.route(stf.tf_id()) {
            RouteOutcome::Send(id) => {
                if let Some(queue) = queues.get(id as usize) {
                    if queue.push(stf).is_err() {
                        tracing::warn!(aggregator_id = id, "dropping STF: sender queue is stopped");
                    }
                } else {
                    tracing::warn!(aggregator_id = id, "no local queue for aggregator index");
                }
                return;
            }
            RouteOutcome::Ahead => {
                tracing::warn!(tf_id = stf.tf_id(), "dropping STF: schedule is ahead of this tf-id");
                return;
            }
            RouteOutcome::DeadPeer(id) => {
                tracing::warn!(tf_id = stf.tf_id(), aggregator_id = id, "dropping STF: aggregator heartbeat is stale");
                return;
            }
            RouteOutcome::Retry => {
                if let Some(scheduler) = scheduler {
                    publish_stats(scheduler.as_ref(), producer_id, stf.tf_id());
                }
                if !shutdown.is_running() {
                    return;
                }
                std::thread::sleep(RETRY_BACKOFF);
            }
        }
    }
}

fn publish_stats(scheduler: &dyn SchedulerClient, producer_id: u32, max_tf: u64) {
    let stats = ProducerStats {
        id: producer_id,
        timestamp: 0,
        max_tf,
        rate: 0.0,
    };
    if let Err(e) = scheduler.publish_stats(stats) {
        tracing::warn!(error = %e, "failed to publish stats to scheduler");
    }
}

fn run_sender(idx: u32, address: String, queue: Arc<BoundedQueue<SubTimeFrame>>, shutdown: ShutdownFlag) {
    let mut stream = match TcpStream::connect(&address) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, aggregator_idx = idx, "failed to connect to aggregator");
            shutdown.request_shutdown();
            return;
        }
    };

    while let Some(stf) = queue.pop() {
        if let Err(e) = dd_stf::wire::interleaved::serialize(&stf, &mut stream) {
            tracing::warn!(error = %e, aggregator_idx = idx, "send failed, stopping sender thread");
            return;
        }
    }
}
