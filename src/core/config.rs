use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_HOST, DEFAULT_PORT, MAX_MESSAGE_BYTES, MAX_MESSAGES_PER_STREAM, MAX_STREAMS,
    REAPER_INTERVAL_SECS, STREAM_TTL_DEFAULT_SECS,
};

/// Fully resolved server configuration: CLI flags override environment
/// variables (already folded in by clap's `env = ...` attributes on
/// [`super::cli::Cli`]), which override the built-in defaults below.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_filter: String,
    pub max_streams: usize,
    pub max_messages_per_stream: usize,
    pub max_message_bytes: usize,
    pub stream_ttl: Duration,
    pub reaper_interval: Duration,
}

impl ServerConfig {
    pub fn from_cli(cli: CliConfig) -> Self {
        Self {
            host: cli.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.unwrap_or(DEFAULT_PORT),
            log_filter: cli.log.unwrap_or_else(|| "info".to_string()),
            max_streams: cli.max_streams.unwrap_or(MAX_STREAMS),
            max_messages_per_stream: cli
                .max_messages_per_stream
                .unwrap_or(MAX_MESSAGES_PER_STREAM),
            max_message_bytes: cli.max_message_bytes.unwrap_or(MAX_MESSAGE_BYTES),
            stream_ttl: Duration::from_secs(
                cli.stream_ttl_secs.unwrap_or(STREAM_TTL_DEFAULT_SECS),
            ),
            reaper_interval: Duration::from_secs(
                cli.reaper_interval_secs.unwrap_or(REAPER_INTERVAL_SECS),
            ),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid host '{}': {e}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_cli_empty() {
        let cfg = ServerConfig::from_cli(CliConfig::default());
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_streams, MAX_STREAMS);
        assert_eq!(cfg.stream_ttl, Duration::from_secs(STREAM_TTL_DEFAULT_SECS));
    }

    #[test]
    fn cli_overrides_defaults() {
        let cli = CliConfig {
            port: Some(4000),
            max_streams: Some(5),
            ..Default::default()
        };
        let cfg = ServerConfig::from_cli(cli);
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.max_streams, 5);
        assert_eq!(cfg.max_messages_per_stream, MAX_MESSAGES_PER_STREAM);
    }

    #[test]
    fn socket_addr_parses_host() {
        let mut cli = CliConfig::default();
        cli.host = Some("0.0.0.0".to_string());
        cli.port = Some(9090);
        let cfg = ServerConfig::from_cli(cli);
        assert_eq!(cfg.socket_addr().unwrap().to_string(), "0.0.0.0:9090");
    }
}
