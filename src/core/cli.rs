use clap::Parser;

use super::constants::{
    ENV_HOST, ENV_LOG, ENV_MAX_MESSAGES_PER_STREAM, ENV_MAX_MESSAGE_BYTES, ENV_MAX_STREAMS,
    ENV_PORT, ENV_REAPER_INTERVAL_SECS, ENV_STREAM_TTL_SECS,
};

#[derive(Parser)]
#[command(name = "malten")]
#[command(version, about = "Ephemeral in-memory message bus", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Log level/filter (passed to tracing's EnvFilter)
    #[arg(long, env = ENV_LOG)]
    pub log: Option<String>,

    /// Maximum number of concurrent streams
    #[arg(long, env = ENV_MAX_STREAMS)]
    pub max_streams: Option<usize>,

    /// Maximum messages retained per stream
    #[arg(long, env = ENV_MAX_MESSAGES_PER_STREAM)]
    pub max_messages_per_stream: Option<usize>,

    /// Maximum message size in bytes
    #[arg(long, env = ENV_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: Option<usize>,

    /// Default stream idle TTL, in seconds
    #[arg(long, env = ENV_STREAM_TTL_SECS)]
    pub stream_ttl_secs: Option<u64>,

    /// Reaper tick interval, in seconds
    #[arg(long, env = ENV_REAPER_INTERVAL_SECS)]
    pub reaper_interval_secs: Option<u64>,
}

/// Configuration derived from CLI arguments, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log: Option<String>,
    pub max_streams: Option<usize>,
    pub max_messages_per_stream: Option<usize>,
    pub max_message_bytes: Option<usize>,
    pub stream_ttl_secs: Option<u64>,
    pub reaper_interval_secs: Option<u64>,
}

/// Parse CLI arguments (with env fallback already applied by clap) into a [`CliConfig`].
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        port: cli.port,
        log: cli.log,
        max_streams: cli.max_streams,
        max_messages_per_stream: cli.max_messages_per_stream,
        max_message_bytes: cli.max_message_bytes,
        stream_ttl_secs: cli.stream_ttl_secs,
        reaper_interval_secs: cli.reaper_interval_secs,
    }
}
