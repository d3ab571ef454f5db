use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_poller::{
    AsyncManager, CheckResult, InterfaceStatus, PollerArgs, PollerItem,
    checks::tcp::TcpServiceCheck,
    config::{PollerConfig, read_config_file},
    labels::{ProcessType, ResultCode},
    poller::sources::{LoggingAvailability, StaticItemSource},
    util::{clock, get_workers_override},
};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often the driver syncs the queue and flushes its buffers
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Number of workers (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("async_poller", LevelFilter::DEBUG),
        ("async_poller::poller::worker", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;
    let workers = args
        .workers
        .or_else(get_workers_override)
        .unwrap_or(config.workers);

    info!(
        "starting {} ({}) with {workers} workers",
        ProcessType::Poller,
        config.program_type
    );

    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let finished_cb = Arc::new(move |result: CheckResult| {
        let _ = result_tx.send(result);
    });

    let poller_args = build_args(config);
    let manager = tokio::task::block_in_place(|| {
        AsyncManager::create(workers, finished_cb, poller_args)
    })
    .context("failed to start poller workers")?;

    drive(&manager, result_rx).await;

    tokio::task::block_in_place(|| manager.free());
    info!("poller stopped");

    Ok(())
}

fn build_args(config: PollerConfig) -> PollerArgs {
    let checker = Arc::new(TcpServiceCheck::new(&config.items));
    let source = Arc::new(StaticItemSource::new(&config.items, clock()));

    PollerArgs::new(config, checker)
        .with_source(source)
        .with_availability(Arc::new(LoggingAvailability))
}

#[instrument(skip_all)]
async fn drive(manager: &AsyncManager, mut result_rx: mpsc::UnboundedReceiver<CheckResult>) {
    let mut ticker = tokio::time::interval(SYNC_INTERVAL);
    let mut interfaces: HashMap<u64, InterfaceStatus> = HashMap::new();
    let mut collected: Vec<PollerItem> = Vec::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                manager.requeue_flush();
                manager.interfaces_flush(&mut interfaces);
                manager.queue_sync();

                manager.queue_get(&mut collected);
                if !collected.is_empty() {
                    debug!("collected {} checked items", collected.len());
                    collected.clear();
                }
            }

            Some(result) = result_rx.recv() => {
                let item = result.as_item();

                if let Some(interface) = result.interface {
                    interfaces.insert(interface.interfaceid, interface);
                }

                // Failed items go back to the source, which reschedules them by delay
                if item.errcode != ResultCode::Succeed.code() {
                    trace!("requeueing item {} ({})", item.itemid, ResultCode::label(item.errcode));
                    manager.requeue(item.itemid, item.errcode, item.lastclock);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                warn!("received interrupt, shutting down");
                break;
            }
        }
    }
}
