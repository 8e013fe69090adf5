use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroUsize,
    process::ExitCode,
    time::Duration,
};

use carbon_http_proxy::{HttpProxy, ProxyConfig};
use clap::Parser;

/// A concurrent HTTP/1.0 forwarding proxy
#[derive(Debug, Parser)]
#[command(name = "carbon-http-proxy", version, about)]
struct Args {
    /// Port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Connections served at once
    #[arg(long)]
    max_connections: Option<NonZeroUsize>,

    /// Seconds a single read or write may take
    #[arg(long)]
    io_timeout: Option<u64>,

    /// Seconds to wait for an origin to accept
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Longest request or response line accepted, in bytes
    #[arg(long)]
    max_line_bytes: Option<NonZeroUsize>,

    /// Most header lines accepted in a request
    #[arg(long)]
    max_header_lines: Option<usize>,

    /// User-Agent sent to origin servers
    #[arg(long)]
    user_agent: Option<String>,
}

impl Args {
    fn config(&self) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        if let Some(max) = self.max_connections {
            config.max_connections = max.get();
        }
        if let Some(secs) = self.io_timeout {
            config.io_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_line_bytes {
            config.max_line_bytes = max.get();
        }
        if let Some(max) = self.max_header_lines {
            config.max_header_lines = max;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args
        .user_agent
        .as_deref()
        .is_some_and(|ua| ua.contains(['\r', '\n']))
    {
        log::error!("--user-agent must be a single line");
        return ExitCode::FAILURE;
    }

    let addr = SocketAddr::new(args.bind, args.port);
    let proxy = match HttpProxy::bind(addr, args.config()).await {
        Ok(proxy) => proxy,
        Err(err) => {
            log::error!("failed to listen on {}: {}", addr, err);
            return ExitCode::FAILURE;
        }
    };
    match proxy.local_addr() {
        Ok(local) => log::info!("proxy listening on {}", local),
        Err(_) => log::info!("proxy listening on {}", addr),
    }

    if let Err(err) = proxy.serve().await {
        log::error!("proxy stopped: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_required() {
        assert!(Args::try_parse_from(["carbon-http-proxy"]).is_err());
    }

    #[test]
    fn malformed_ports_are_rejected() {
        for port in ["0", "65536", "http", "-1"] {
            assert!(
                Args::try_parse_from(["carbon-http-proxy", port]).is_err(),
                "{port}"
            );
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "carbon-http-proxy",
            "15213",
            "--max-connections",
            "8",
            "--io-timeout",
            "3",
            "--user-agent",
            "test-agent",
        ])
        .unwrap();
        assert_eq!(args.port, 15213);

        let config = args.config();
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.io_timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_line_bytes, ProxyConfig::default().max_line_bytes);
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
