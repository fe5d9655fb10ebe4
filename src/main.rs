//! ChronoKV - Demo Workload
//!
//! Drives a shared store from many threads at once: some insert and update,
//! some read by key, by order and by time range, some erase. The reclaimer
//! runs in the background and its per-tick structure sizes are logged.

use bytes::Bytes;
use chronokv::storage::{ReclaimPass, Store, TickReport};
use chronokv::{StoreConfig, TtlMap, Ttl, TtlPolicy};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Demo configuration
struct DemoConfig {
    /// Worker threads per role (writers, readers, erasers)
    threads: usize,
    /// Operations per worker thread
    ops: u64,
    /// Size of the key space
    keys: u64,
    /// Reclaimer tick interval in milliseconds
    interval_ms: u64,
    /// Ticks between full sweeps
    sweep_every: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            threads: 10,
            ops: 10_000,
            keys: 1_000,
            interval_ms: 5,
            sweep_every: 100,
        }
    }
}

impl DemoConfig {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = DemoConfig::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--threads" | "-t" => config.threads = parse_value(&args, i, "--threads"),
                "--ops" | "-n" => config.ops = parse_value(&args, i, "--ops"),
                "--keys" | "-k" => config.keys = parse_value(&args, i, "--keys"),
                "--interval-ms" => config.interval_ms = parse_value(&args, i, "--interval-ms"),
                "--sweep-every" => config.sweep_every = parse_value(&args, i, "--sweep-every"),
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("ChronoKV version {}", chronokv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 2;
        }

        config.keys = config.keys.max(1);
        config
    }

    fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_reclaim_interval(Duration::from_millis(self.interval_ms))
            .with_full_sweep_every(self.sweep_every)
    }
}

/// Parses the value following the flag at `args[i]`, exiting on error.
fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for {}: {}", flag, raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
ChronoKV - Concurrent TTL Store Demo

USAGE:
    chronokv [OPTIONS]

OPTIONS:
    -t, --threads <N>         Worker threads per role (default: 10)
    -n, --ops <N>             Operations per worker (default: 10000)
    -k, --keys <N>            Size of the key space (default: 1000)
        --interval-ms <MS>    Reclaimer tick interval (default: 5)
        --sweep-every <N>     Ticks between full sweeps (default: 100)
    -v, --version             Print version information
        --help                Print this help message

Set RUST_LOG=debug to see every reclaimer pass.
"#
    );
}

/// Cheap deterministic key scrambler so workers touch keys in different orders.
#[inline]
fn scramble(worker: u64, i: u64, keys: u64) -> u64 {
    (i.wrapping_mul(2_654_435_761).wrapping_add(worker * 7_919)) % keys
}

/// Inserts and updates keys with assorted TTLs.
fn fill(store: &Store<u64, Bytes>, worker: u64, config: &DemoConfig) {
    for i in 0..config.ops {
        let key = scramble(worker, i, config.keys);
        let value = Bytes::from(format!("w{}-{}", worker, i));
        store.insert(key, value.clone(), Ttl::millis(i % 1_000));

        let other = scramble(worker + 1, i, config.keys);
        store.update(&other, value, TtlPolicy::Explicit(Ttl::Never));
    }
}

/// Reads by key, by order, and by time range.
fn read(store: &Store<u64, Bytes>, worker: u64, config: &DemoConfig) {
    let mut seen = 0usize;
    for i in 0..config.ops / 100 {
        if store.get(&scramble(worker, i, config.keys)).is_some() {
            seen += 1;
        }
        seen += store.get_by_order(10, i % 2 == 0).len();

        let now = SystemTime::now();
        let back = Duration::from_millis(i % 1_000);
        seen += store.get_by_time_range(now - back, now, true).len();
    }
    debug!(worker, seen, "Reader finished");
}

/// Erases by key, by order, and by time range.
fn clear(store: &Store<u64, Bytes>, worker: u64, config: &DemoConfig) {
    let mut erased = 0usize;
    for i in 0..config.ops / 100 {
        if store.erase_by_key(&scramble(worker, i, config.keys)) {
            erased += 1;
        }
        erased += store.erase_by_order(10, i % 2 == 1);

        let now = SystemTime::now();
        erased += store.erase_by_time_range(now - Duration::from_millis(i % 50), now);
    }
    debug!(worker, erased, "Eraser finished");
}

fn log_report(report: &TickReport) {
    match report.pass {
        ReclaimPass::FullSweep => info!(
            tick = report.tick,
            reclaimed = report.reclaimed,
            lookup = report.sizes.lookup,
            expiry = report.sizes.expiry,
            order = report.sizes.order,
            "Full sweep"
        ),
        ReclaimPass::Trim => debug!(
            tick = report.tick,
            reclaimed = report.reclaimed,
            lookup = report.sizes.lookup,
            expiry = report.sizes.expiry,
            order = report.sizes.order,
            "Trim"
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = DemoConfig::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let map = TtlMap::<u64, Bytes>::start(config.store_config())?;
    info!(
        threads = config.threads,
        ops = config.ops,
        keys = config.keys,
        "Store started"
    );

    // Log every reclaimer tick until the store shuts down
    let mut reports = map.subscribe();
    let reporter = tokio::spawn(async move {
        while reports.changed().await.is_ok() {
            let report = *reports.borrow_and_update();
            log_report(&report);
        }
    });

    let store = Arc::clone(map.store());
    let config = Arc::new(config);
    let workload = tokio::task::spawn_blocking(move || {
        std::thread::scope(|s| {
            for worker in 0..config.threads as u64 {
                let (store, config) = (&store, &config);
                s.spawn(move || fill(store, worker, config));
                s.spawn(move || read(store, worker, config));
                s.spawn(move || clear(store, worker, config));
            }
        });
    });
    workload.await?;

    let sizes = map.sizes();
    let stats = map.stats();
    info!(
        lookup = sizes.lookup,
        expiry = sizes.expiry,
        order = sizes.order,
        tombstoned = sizes.tombstoned,
        inserts = stats.inserts,
        updates = stats.updates,
        erased = stats.erased,
        expired = stats.expired,
        "Workload finished"
    );

    // Let the reclaimer catch up before shutting down
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!(sizes = ?map.sizes(), "After reclamation");

    let dropped = map.shutdown().await?;
    reporter.await?;
    info!(dropped, "Shutdown complete");
    Ok(())
}
