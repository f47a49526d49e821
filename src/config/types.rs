// Configuration types module
// Defines all configuration-related data structures and their defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::http::BodyLimits;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_HTTPS_PORT: u16 = 3001;
pub const DEFAULT_TLS_KEY: &str = "./tls/key.pem";
pub const DEFAULT_TLS_CERT: &str = "./tls/cert.pem";
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1_048_576; // 1MB
pub const DEFAULT_BODY_READ_TIMEOUT: u64 = 30;
pub const DEFAULT_CONNECTION_TIMEOUT: u64 = 60;
pub const DEFAULT_ACCESS_LOG_FORMAT: &str = "combined";

/// Main configuration structure
///
/// Built once at startup and passed down by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Environment namespace the values were read from
    pub environment: String,
    pub server: ServerSettings,
    pub http: HttpSettings,
    pub https: HttpsSettings,
    pub limits: LimitSettings,
    pub performance: PerformanceSettings,
    pub logging: LoggingSettings,
}

/// Listener and runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    /// Tokio worker threads (runtime default when unset)
    pub workers: Option<usize>,
}

/// Plain HTTP listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub port: u16,
}

/// HTTPS listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpsSettings {
    pub port: u16,
    pub start_server: bool,
    pub tls: TlsSettings,
}

/// PEM certificate chain and private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// Request body bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSettings {
    /// Bytes, 0 disables the limit
    pub max_body_size: u64,
    /// Seconds, 0 disables the deadline
    pub body_read_timeout: u64,
}

/// Connection handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceSettings {
    /// Seconds a connection may stay open, 0 disables the timeout
    pub connection_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: super::DEFAULT_ENVIRONMENT.to_string(),
            server: ServerSettings {
                host: DEFAULT_HOST.to_string(),
                workers: None,
            },
            http: HttpSettings {
                port: DEFAULT_HTTP_PORT,
            },
            https: HttpsSettings {
                port: DEFAULT_HTTPS_PORT,
                start_server: false,
                tls: TlsSettings {
                    key: PathBuf::from(DEFAULT_TLS_KEY),
                    cert: PathBuf::from(DEFAULT_TLS_CERT),
                },
            },
            limits: LimitSettings {
                max_body_size: DEFAULT_MAX_BODY_SIZE,
                body_read_timeout: DEFAULT_BODY_READ_TIMEOUT,
            },
            performance: PerformanceSettings {
                connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            },
            logging: LoggingSettings {
                access_log: true,
                access_log_format: DEFAULT_ACCESS_LOG_FORMAT.to_string(),
                access_log_file: None,
                error_log_file: None,
            },
        }
    }
}

impl LimitSettings {
    pub const fn body_limits(&self) -> BodyLimits {
        BodyLimits {
            max_body_size: self.max_body_size,
            read_timeout: Duration::from_secs(self.body_read_timeout),
        }
    }
}

impl PerformanceSettings {
    /// `None` when connections may stay open indefinitely
    pub const fn connection_timeout(&self) -> Option<Duration> {
        if self.connection_timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.connection_timeout))
        }
    }
}
