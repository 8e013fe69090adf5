use std::time::Duration;

/// The identity the proxy presents to every origin, replacing the client's own
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Connections handled at once, further clients wait in the listen backlog
    pub max_connections: usize,
    /// Deadline for every single read or write on either side of a relay
    pub io_timeout: Duration,
    pub connect_timeout: Duration,
    /// Longest line accepted from either peer, line terminator included
    pub max_line_bytes: usize,
    pub max_header_lines: usize,
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            io_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_line_bytes: 8192,
            max_header_lines: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
