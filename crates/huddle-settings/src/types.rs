//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file only needs the keys it overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "auth": { "jwtSecret": "change-me" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Token verification settings.
    pub auth: AuthSettings,
    /// `SQLite` store settings.
    pub database: DatabaseSettings,
    /// Fan-out tuning.
    pub broker: BrokerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl HuddleSettings {
    /// Correct values that would make the server unusable.
    ///
    /// Zero-sized buffers and pools are raised to 1 with a warning.
    pub fn validate(&mut self) {
        fn at_least_one(val: &mut usize, name: &str) {
            if *val == 0 {
                tracing::warn!("{name} must be positive, using 1");
                *val = 1;
            }
        }

        at_least_one(&mut self.server.max_frame_bytes, "server.maxFrameBytes");
        at_least_one(&mut self.broker.outbound_buffer, "broker.outboundBuffer");
        if self.database.pool_size == 0 {
            tracing::warn!("database.poolSize must be positive, using 1");
            self.database.pool_size = 1;
        }
        if self.auth.jwt_secret.is_empty() {
            tracing::warn!("auth.jwtSecret is empty; `serve` will refuse to start");
        }
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// Token verification settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret shared with whatever issues access tokens.
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

/// `SQLite` store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. `~` expands to the home directory.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `busy_timeout` applied to each connection, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "~/.huddle/huddle.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseSettings {
    /// The database path with a leading `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        crate::loader::expand_home(&self.path)
    }
}

/// Fan-out tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Outbound frames queued per connection before sends start dropping.
    pub outbound_buffer: usize,
    /// Dropped frames after which a slow connection is evicted.
    pub max_drops: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
            max_drops: 100,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = HuddleSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.server.max_frame_bytes, 65_536);
        assert_eq!(s.database.pool_size, 8);
        assert_eq!(s.broker.outbound_buffer, 64);
        assert_eq!(s.broker.max_drops, 100);
        assert_eq!(s.logging.level, "info");
        assert!(s.auth.jwt_secret.is_empty());
        assert_eq!(s.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: HuddleSettings =
            serde_json::from_str(r#"{"server":{"port":9100},"auth":{"jwtSecret":"s3"}}"#).unwrap();
        assert_eq!(s.server.port, 9100);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.auth.jwt_secret, "s3");
        assert_eq!(s.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn validate_raises_zero_sizes() {
        let mut s = HuddleSettings::default();
        s.server.max_frame_bytes = 0;
        s.broker.outbound_buffer = 0;
        s.database.pool_size = 0;
        s.validate();
        assert_eq!(s.server.max_frame_bytes, 1);
        assert_eq!(s.broker.outbound_buffer, 1);
        assert_eq!(s.database.pool_size, 1);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(HuddleSettings::default()).unwrap();
        assert!(value["server"]["maxFrameBytes"].is_number());
        assert!(value["database"]["busyTimeoutMs"].is_number());
        assert!(value["broker"]["outboundBuffer"].is_number());
    }
}
