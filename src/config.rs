use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Args;

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "commissions.db";

/// HTTP server settings. Each flag falls back to an environment variable,
/// which may come from a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds before an in-flight request is aborted
    #[arg(long = "request-timeout", env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

/// Load variables from `.env` if present. Missing files are not an error.
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}
