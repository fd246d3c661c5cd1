use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::error::{PartyError, Result};

pub struct Config {
    pub server: ServerConfig,
    pub party: PartyConfig,
    pub log: LogConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct PartyConfig {
    /// Directory with the browser client, served under `/peerstream`
    pub public_dir: PathBuf,
    /// Largest inbound WebSocket frame; subtitle files travel in one message
    pub max_message_bytes: usize,
}

pub struct LogConfig {
    pub json: bool,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("./public"),
            max_message_bytes: 10_000_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = PartyConfig::default();

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 4000)?,
            },
            party: PartyConfig {
                public_dir: env::var("PUBLIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.public_dir),
                max_message_bytes: parse_var("MAX_MESSAGE_BYTES", defaults.max_message_bytes)?,
            },
            log: LogConfig {
                json: env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
        })
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PartyError::config(format!("{name} has an unparseable value {raw:?}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_host(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            party: PartyConfig::default(),
            log: LogConfig { json: false },
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = config_with_host("localhost", 4000);
        assert_eq!(config.bind_address(), ([127, 0, 0, 1], 4000));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = config_with_host("192.168.1.1", 3000);
        assert_eq!(config.bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_empty_host() {
        let config = config_with_host("", 4000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 4000));
    }

    #[test]
    fn test_parse_ipv6_falls_back_to_all() {
        let config = config_with_host("::1", 4000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 4000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = config_with_host("invalid-hostname", 9000);
        assert_eq!(config.bind_address(), ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_party_defaults() {
        let party = PartyConfig::default();
        assert_eq!(party.max_message_bytes, 10_000_000);
        assert_eq!(party.public_dir, PathBuf::from("./public"));
    }

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: u16 = parse_var("PEERSTREAM_TEST_UNSET_VARIABLE", 1234).unwrap();
        assert_eq!(value, 1234);
    }
}
