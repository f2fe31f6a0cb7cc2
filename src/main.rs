//! mcdcache - command-line front end for the pooled memcached client
//!
//! Runs one cache operation the way the host would, then prints the value
//! (if any) and the resulting `MCDRESULT` code.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use mcdcache::client::CacheClient;
use mcdcache::config::Config;
use mcdcache::protocol::StoreMode;
use mcdcache::result::{OpResult, ResultCode};
use mcdcache::ttl::Ttl;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// mcdcache CLI
#[derive(Parser, Debug)]
#[command(name = "mcdcache")]
#[command(about = "Run cache operations against a memcached cluster")]
struct Args {
    /// TOML configuration file (MCDCACHE_* environment variables otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get { key: String },

    /// Store a value unconditionally
    Set {
        key: String,
        value: String,
        /// Time-to-live in seconds
        #[arg(long)]
        ttl: Option<u32>,
    },

    /// Store a value only if the key is absent
    Add {
        key: String,
        value: String,
        #[arg(long)]
        ttl: Option<u32>,
    },

    /// Store a value only if the key exists
    Replace {
        key: String,
        value: String,
        #[arg(long)]
        ttl: Option<u32>,
    },

    /// Append to an existing value
    Append {
        key: String,
        value: String,
        #[arg(long)]
        ttl: Option<u32>,
    },

    /// Delete a key
    Delete { key: String },

    /// Create a counter (keeps an existing one)
    CounterInit {
        key: String,
        initial: u64,
        #[arg(long)]
        ttl: Option<u32>,
    },

    /// Adjust a counter by delta (0 reads it)
    Counter {
        key: String,
        #[arg(allow_negative_numbers = true, default_value_t = 0)]
        delta: i64,
    },

    /// Print the client's metrics exposition
    Metrics,
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = if let Some(path) = &args.config {
        info!("Loading configuration from {}", path.display());
        Config::from_file(path)?
    } else {
        info!("Using default configuration (set MCDCACHE_* env vars to customize)");
        Config::from_env()
    };

    let client = CacheClient::connect(&config);

    let code = match args.command {
        Commands::Get { key } => report(
            client
                .get(&key)
                .map(|v| String::from_utf8_lossy(&v).into_owned()),
        ),
        Commands::Set { key, value, ttl } => {
            report(store(&client, StoreMode::Set, &key, &value, ttl))
        }
        Commands::Add { key, value, ttl } => {
            report(store(&client, StoreMode::Add, &key, &value, ttl))
        }
        Commands::Replace { key, value, ttl } => {
            report(store(&client, StoreMode::Replace, &key, &value, ttl))
        }
        Commands::Append { key, value, ttl } => {
            report(store(&client, StoreMode::Append, &key, &value, ttl))
        }
        Commands::Delete { key } => report(client.delete(&key).map(|()| String::new())),
        Commands::CounterInit { key, initial, ttl } => report(
            client
                .counter_initialize(&key, initial, explicit(ttl))
                .map(|n| n.to_string()),
        ),
        Commands::Counter { key, delta } => {
            report(client.counter_read_or_adjust(&key, delta).map(|n| n.to_string()))
        }
        Commands::Metrics => {
            print!("{}", client.metrics().gather());
            ResultCode::Success
        }
    };

    Ok(if code.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn store(
    client: &CacheClient,
    mode: StoreMode,
    key: &str,
    value: &str,
    ttl: Option<u32>,
) -> OpResult<String> {
    client
        .store(mode, key, value.as_bytes(), explicit(ttl))
        .map(|()| String::new())
}

fn explicit(ttl: Option<u32>) -> Ttl<'static> {
    Ttl {
        explicit: ttl,
        scoped: None,
    }
}

/// Print the value and the result code, returning the code
fn report(result: OpResult<String>) -> ResultCode {
    let code = ResultCode::of(&result);
    if let Ok(value) = &result
        && !value.is_empty()
    {
        println!("{value}");
    }
    println!("MCDRESULT={code}");
    code
}
