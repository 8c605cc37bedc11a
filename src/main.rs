use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sinkhole::filter::{Strategy, blocklist};
use sinkhole::proxy::{Proxy, ProxyConfig};
use sinkhole::querylog::MemoryQueryLog;

#[derive(Parser)]
#[command(name = "sinkhole")]
#[command(about = "DNS sinkhole with allow/block lists and response caching", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "5353")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Upstream DNS server (host:port)
    #[arg(short, long, default_value = "8.8.8.8:53")]
    upstream: SocketAddr,

    /// Upstream read timeout in milliseconds
    #[arg(long, default_value = "2000")]
    upstream_timeout_ms: u64,

    /// Enable the response cache
    #[arg(long)]
    cache: bool,

    /// Domain matcher implementation
    #[arg(long, value_enum, default_value_t = Strategy::Trie)]
    strategy: Strategy,

    /// File with domains to block (repeatable)
    #[arg(long = "blocklist", value_name = "FILE")]
    blocklists: Vec<PathBuf>,

    /// File with domains that are never blocked (repeatable)
    #[arg(long = "allowlist", value_name = "FILE")]
    allowlists: Vec<PathBuf>,

    /// Number of query records kept in memory
    #[arg(long, default_value = "10000")]
    query_log_capacity: usize,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("invalid bind address")?;

    let block = blocklist::load_files(&args.blocklists).context("reading block lists")?;
    let allow = blocklist::load_files(&args.allowlists).context("reading allow lists")?;
    if block.is_empty() {
        warn!("no block list entries loaded, every query will be forwarded");
    }

    let config = ProxyConfig {
        bind_addr,
        upstream: args.upstream,
        upstream_timeout: Duration::from_millis(args.upstream_timeout_ms),
        cache_enabled: args.cache,
        strategy: args.strategy,
        stats_interval: Duration::from_secs(60),
    };
    let query_log = Arc::new(MemoryQueryLog::new(args.query_log_capacity));

    let proxy = Proxy::bind(&config, allow, block, query_log).await?;
    let shutdown = proxy.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.stop().await;
        }
    });

    proxy.run().await?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(args))
}
