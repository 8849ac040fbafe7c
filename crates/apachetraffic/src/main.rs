use std::path::Path;
use std::sync::Arc;
use std::thread;

use apachetraffic::configuration::Config;
use apachetraffic::flusher::Flusher;
use apachetraffic::hostname;
use apachetraffic::ingest;
use apachetraffic::server::{Server, ensure_foreground};
use apachetraffic::sink::GraphiteSink;
use clap::Parser;
use pingora::server::configuration::Opt;
use traffic_stats::{BucketStore, MetricNames};

fn main() {
    // Enable basic logging; set RUST_LOG=info for visibility.
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // `-c/--conf` is shared with pingora: one YAML file carries both its
    // server settings and ours.
    let opt = Opt::parse();
    ensure_foreground(&opt)?;
    let config = Config::discover(opt.conf.as_deref().map(Path::new))?;

    let hostname = hostname::resolve(config.hostname.as_deref());
    log::info!(
        "Configured graphite address: {} prefix {} server prefix {} host {}",
        config.graphite_addr(),
        config.graphite_prefix,
        config.server_prefix,
        hostname
    );

    let store = Arc::new(BucketStore::new(config.bucket_granularity()));
    let sink = Arc::new(GraphiteSink::new(
        config.graphite_addr(),
        config.connect_timeout(),
    ));
    let flusher = Arc::new(Flusher::new(
        Arc::clone(&store),
        sink,
        MetricNames::new(&config.graphite_prefix, &config.server_prefix, &hostname),
        config.flush_interval(),
    ));

    let mut server = Server::new(Some(opt))?;
    server.bootstrap(Arc::clone(&flusher));

    thread::Builder::new()
        .name("ingest".to_string())
        .spawn(move || ingest_stdin(&store, &flusher))?;

    server.run_forever();
    Ok(())
}

/// Read stdin until it closes, send everything still buffered, then exit.
/// Apache restarts the piped logger when it goes away.
fn ingest_stdin(store: &BucketStore, flusher: &Flusher) {
    log::info!("Ready to process traffic information.");

    let code = match ingest::ingest(std::io::stdin().lock(), store) {
        Ok(stats) => {
            log::info!(
                "Input closed after {} lines ({} recorded, {} skipped)",
                stats.lines,
                stats.recorded,
                stats.skipped
            );
            0
        }
        Err(e) => {
            log::error!("Error reading from stdin: {}", e);
            1
        }
    };

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => {
            let _ = runtime.block_on(flusher.flush_all());
        }
        Err(e) => log::error!("Cannot start runtime for final flush: {}", e),
    }

    std::process::exit(code);
}
