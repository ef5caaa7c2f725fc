use log::warn;
use std::net::SocketAddr;

/// Default address the server listens on
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Server settings
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_upload_bytes: 10 * 1024 * 1024,
            chart_width: 800,
            chart_height: 600,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl Config {
    /// Builds the configuration from command-line arguments
    ///
    /// The only recognised argument is an optional bind address in first
    /// position (`kpi-web 0.0.0.0:8080`). An address that does not parse is
    /// reported and replaced by the default.
    ///
    /// # Arguments
    /// * `args` - Full argument list, program name included
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();

        if let Some(addr) = args.get(1) {
            match addr.parse() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => warn!(
                    "invalid bind address '{}', falling back to {}",
                    addr, DEFAULT_BIND_ADDR
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        let config = Config::from_args(&args(&["kpi-web"]));
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn bind_address_from_first_argument() {
        let config = Config::from_args(&args(&["kpi-web", "0.0.0.0:8080"]));
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn bad_address_falls_back() {
        let config = Config::from_args(&args(&["kpi-web", "not-an-address"]));
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }
}
