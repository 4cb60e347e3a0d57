use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 4000;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3002";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_DETACH_GRACE_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub backend_url: String,
    pub request_timeout: Duration,
    pub transport: TransportConfig,
}

/// Options consumed by the streaming transport: stream liveness, per-session
/// buffering, and the garbage-collection policy for abandoned sessions.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    pub ping_interval: Duration,
    pub queue_capacity: usize,
    pub detach_grace: Duration,
    pub idle_timeout: Duration,
    pub reap_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            detach_grace: Duration::from_secs(DEFAULT_DETACH_GRACE_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            reap_interval: Duration::from_secs(DEFAULT_REAP_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("BACKEND_URL must be a non-empty http(s) URL")]
    InvalidBackendUrl,
    #[error("{0} must be a positive integer number of seconds")]
    InvalidDuration(&'static str),
    #[error("OUTBOUND_QUEUE_CAPACITY must be a positive integer")]
    InvalidCapacity,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_BIND_PORT);

        let backend_url = env::var("BACKEND_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::InvalidBackendUrl);
        }

        let request_timeout = duration_from_env("HTTP_TIMEOUT_SECONDS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let queue_capacity = env::var("OUTBOUND_QUEUE_CAPACITY")
            .ok()
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|capacity| *capacity > 0)
                    .ok_or(ConfigError::InvalidCapacity)
            })
            .transpose()?
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let transport = TransportConfig {
            ping_interval: duration_from_env("PING_INTERVAL_SECONDS", DEFAULT_PING_INTERVAL_SECS)?,
            queue_capacity,
            detach_grace: duration_from_env(
                "SESSION_DETACH_GRACE_SECONDS",
                DEFAULT_DETACH_GRACE_SECS,
            )?,
            idle_timeout: duration_from_env(
                "SESSION_IDLE_TIMEOUT_SECONDS",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )?,
            reap_interval: duration_from_env(
                "SESSION_REAP_INTERVAL_SECONDS",
                DEFAULT_REAP_INTERVAL_SECS,
            )?,
        };

        let config = Self {
            bind_addr,
            bind_port,
            backend_url,
            request_timeout,
            transport,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn duration_from_env(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    env::var(name)
        .ok()
        .map(|value| {
            value
                .parse::<u64>()
                .ok()
                .filter(|seconds| *seconds > 0)
                .ok_or(ConfigError::InvalidDuration(name))
        })
        .transpose()
        .map(|seconds| Duration::from_secs(seconds.unwrap_or(default_secs)))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // from_env reads process-wide state; serialize the tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 9] = [
        "BIND_ADDR",
        "BIND_PORT",
        "BACKEND_URL",
        "HTTP_TIMEOUT_SECONDS",
        "PING_INTERVAL_SECONDS",
        "OUTBOUND_QUEUE_CAPACITY",
        "SESSION_DETACH_GRACE_SECONDS",
        "SESSION_IDLE_TIMEOUT_SECONDS",
        "SESSION_REAP_INTERVAL_SECONDS",
    ];

    fn clear_env() {
        for name in ALL_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn parse_defaults() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.bind_port, DEFAULT_BIND_PORT);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(
            config.request_timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
        assert_eq!(
            config.transport.ping_interval,
            Duration::from_secs(DEFAULT_PING_INTERVAL_SECS)
        );
        assert_eq!(config.transport.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn backend_url_trailing_slash_is_trimmed() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();
        env::set_var("BACKEND_URL", "http://backend.internal:3002/");

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.backend_url, "http://backend.internal:3002");
        clear_env();
    }

    #[test]
    fn non_http_backend_url_fails() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();
        env::set_var("BACKEND_URL", "ftp://backend.internal");

        let err = Config::from_env().expect_err("expected invalid backend url");
        assert!(matches!(err, ConfigError::InvalidBackendUrl));
        clear_env();
    }

    #[test]
    fn invalid_port_fails() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();
        env::set_var("BIND_PORT", "not-a-port");

        let err = Config::from_env().expect_err("expected invalid port error");
        assert!(matches!(err, ConfigError::InvalidPort));
        clear_env();
    }

    #[test]
    fn zero_ping_interval_fails() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();
        env::set_var("PING_INTERVAL_SECONDS", "0");

        let err = Config::from_env().expect_err("expected invalid duration error");
        assert!(matches!(
            err,
            ConfigError::InvalidDuration("PING_INTERVAL_SECONDS")
        ));
        clear_env();
    }

    #[test]
    fn zero_queue_capacity_fails() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        clear_env();
        env::set_var("OUTBOUND_QUEUE_CAPACITY", "0");

        let err = Config::from_env().expect_err("expected invalid capacity error");
        assert!(matches!(err, ConfigError::InvalidCapacity));
        clear_env();
    }
}
