// SPDX-License-Identifier: Apache-2.0 OR MIT

//! kvcached - cuckoo-hash cache server.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use log::info;

use kvcache::{CacheConfig, Worker};

/// In-memory cuckoo-hash cache server.
#[derive(Parser, Debug)]
#[command(name = "kvcached")]
#[command(version)]
#[command(about = "Textual memcache-protocol cache server backed by a cuckoo hash table")]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:11311")]
    listen: SocketAddr,

    /// TCP listen backlog.
    #[arg(long, default_value_t = 1024)]
    backlog: u32,

    /// Number of item slots (rounded up to the next power of two).
    #[arg(short, long, default_value_t = 1 << 20)]
    slots: usize,

    /// Number of candidate positions per key.
    #[arg(short, long, default_value_t = 4)]
    ways: usize,

    /// Maximum displacement hops before a forced eviction.
    #[arg(long, default_value_t = 64)]
    max_hops: usize,

    /// Maximum key length in bytes.
    #[arg(long, default_value_t = 250)]
    key_max: usize,

    /// Maximum value length in bytes.
    #[arg(long, default_value_t = 1024)]
    val_max: usize,

    /// Worker tick interval, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

impl From<Args> for CacheConfig {
    fn from(args: Args) -> Self {
        CacheConfig {
            listen_addr: args.listen,
            listen_backlog: args.backlog,
            slot_count: args.slots,
            ways: args.ways,
            max_hops: args.max_hops,
            key_max: args.key_max,
            val_max: args.val_max,
            tick_interval: Duration::from_millis(args.tick_ms),
            ..CacheConfig::default()
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config: CacheConfig = args.into();

    if let Err(e) = run(config) {
        eprintln!("kvcached: {e}");
        std::process::exit(1);
    }
}

fn run(config: CacheConfig) -> std::io::Result<()> {
    let mut worker = Worker::bind(config)?;
    info!("kvcached listening on {}", worker.local_addr()?);
    worker.run()
}
