use clap::{Parser, Subcommand};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use pw_config::Config;
use pw_core::telemetry;
use pw_stream::{
    backfill, HttpSeedSource, ScopedClientOptions, ScopedStreamClient, StreamManager,
    StreamMetrics, WsConnector,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

mod view;

#[derive(Debug, Parser)]
#[command(name = "poolwatch", about = "Live I/O telemetry for storage pools")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream telemetry for one or more pools
    Watch {
        /// Pools to watch; the first one is streamed immediately
        #[arg(required = true)]
        pools: Vec<String>,

        /// Skip the history backfill on first attach
        #[arg(long)]
        no_seed: bool,

        /// Use a private client for the first pool instead of the shared manager
        #[arg(long)]
        scoped: bool,

        /// Rotate through the pools every SECS seconds
        #[arg(long, value_name = "SECS")]
        switch_every: Option<u64>,
    },
    /// Print the stream URL for a pool
    Url { pool: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    telemetry::init_tracing(&config.telemetry.environment, &config.telemetry.service);
    tracing::debug!(?config, "Configuration loaded successfully");

    match cli.command {
        Command::Url { pool } => match config.stream.stream_url(&pool) {
            Ok(url) => println!("{}", url),
            Err(e) => {
                tracing::error!("Failed to build stream URL: {}", e);
                process::exit(1);
            }
        },
        Command::Watch {
            pools,
            no_seed,
            scoped,
            switch_every,
        } => {
            if scoped {
                watch_scoped(config, &pools[0]).await;
            } else {
                let switch_every = switch_every.map(Duration::from_secs);
                watch_shared(config, pools, !no_seed, switch_every).await;
            }
        }
    }
}

async fn watch_shared(config: Config, pools: Vec<String>, seed: bool, switch_every: Option<Duration>) {
    let stream_config = config.stream;
    let max_reconnects = stream_config.max_reconnects;

    let mut registry = Registry::default();
    let metrics = StreamMetrics::new();
    metrics.register(&mut registry);

    let seed_source = match HttpSeedSource::new(stream_config.clone()) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to create seed client: {}", e);
            process::exit(1);
        }
    };

    let manager =
        StreamManager::with_metrics(stream_config, Arc::new(WsConnector::new()), metrics);

    let observer = manager.clone();
    let token = manager.subscribe(move || {
        let state = observer.state();
        if let Some(key) = state.active_key.as_deref() {
            let latest = observer.latest(key);
            let points = observer.read(key).len();
            println!(
                "{}",
                view::render_line(key, &state, latest.as_ref(), points, max_reconnects)
            );
        }
    });

    tracing::info!(pools = ?pools, "Watching pools");

    let mut seeded = HashSet::new();
    let mut current = 0;
    attach(&manager, &pools[current], seed, &seed_source, &mut seeded).await;

    let rotate = async {
        let Some(period) = switch_every.filter(|_| pools.len() > 1) else {
            return std::future::pending::<()>().await;
        };
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            current = (current + 1) % pools.len();
            tracing::info!(pool = %pools[current], "Switching pool");
            attach(&manager, &pools[current], seed, &seed_source, &mut seeded).await;
        }
    };

    tokio::select! {
        _ = rotate => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        }
    }

    tracing::info!("Shutting down");
    manager.unsubscribe(token);
    manager.disconnect();
    manager.shutdown().await;

    let mut encoded = String::new();
    match encode(&mut encoded, &registry) {
        Ok(()) => tracing::debug!(metrics = %encoded, "Final stream metrics"),
        Err(e) => tracing::warn!("Failed to encode metrics: {}", e),
    }
}

/// Connect to `pool`, backfilling history the first time it is shown
async fn attach(
    manager: &StreamManager,
    pool: &str,
    seed: bool,
    seed_source: &HttpSeedSource,
    seeded: &mut HashSet<String>,
) {
    manager.connect(pool);
    if !seed || !seeded.insert(pool.to_string()) {
        return;
    }
    if let Ok(count) = backfill(manager, pool, seed_source).await {
        tracing::info!(pool = %pool, count, "Seed history fetched");
    }
}

async fn watch_scoped(config: Config, pool: &str) {
    let max_reconnects = config.stream.max_reconnects;
    let client = Arc::new(ScopedStreamClient::new(
        config.stream,
        Arc::new(WsConnector::new()),
        pool,
        ScopedClientOptions::default(),
    ));

    let observer = Arc::downgrade(&client);
    client.subscribe(move || {
        let Some(client) = observer.upgrade() else {
            return;
        };
        let state = client.state();
        let latest = client.latest();
        let points = client.samples().len();
        println!(
            "{}",
            view::render_line(client.key(), &state, latest.as_ref(), points, max_reconnects)
        );
    });

    tracing::info!(pool = %pool, "Watching pool with a private client");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    match Arc::try_unwrap(client) {
        Ok(client) => client.close().await,
        Err(client) => client.disconnect(),
    }
}
