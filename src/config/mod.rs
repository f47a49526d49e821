// Configuration module entry point
// Loads the JSON settings file and resolves typed values per environment

mod types;

use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::logger;

// Re-export public types
pub use types::{
    HttpSettings, HttpsSettings, LimitSettings, LoggingSettings, PerformanceSettings,
    ServerSettings, Settings, TlsSettings,
};

/// Default settings file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Variable selecting the environment namespace inside the settings file
pub const ENVIRONMENT_VAR: &str = "API_ENV";
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Dot-path lookups scoped to one environment namespace
///
/// `http.port` in environment `production` reads `production.http.port`.
/// Missing or mistyped values fall back to the caller's default.
struct EnvLookup<'a> {
    tree: &'a config::Config,
    environment: &'a str,
}

impl EnvLookup<'_> {
    fn value<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.optional(key).unwrap_or(default)
    }

    fn optional<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.tree.get::<T>(&format!("{}.{key}", self.environment)) {
            Ok(value) => Some(value),
            Err(config::ConfigError::NotFound(_)) => {
                logger::log_info(&format!(
                    "Config property '{key}' does not exist in environment '{}'",
                    self.environment
                ));
                None
            }
            Err(e) => {
                logger::log_warning(&format!(
                    "Config property '{key}' in environment '{}' is invalid, using default: {e}",
                    self.environment
                ));
                None
            }
        }
    }
}

impl Settings {
    /// Load settings from `config_path` for the environment named by `API_ENV`
    pub fn load(config_path: &str) -> Self {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
        Self::load_from(config_path, &environment)
    }

    /// Load settings for an explicit environment
    ///
    /// Never fails: an unreadable or malformed file is logged and treated as
    /// empty, so every value takes its default.
    pub fn load_from(config_path: &str, environment: &str) -> Self {
        let tree = config::Config::builder()
            .add_source(
                config::File::new(config_path, config::FileFormat::Json).required(false),
            )
            .build()
            .unwrap_or_else(|e| {
                logger::log_error(&format!(
                    "Failed reading config file at path '{config_path}': {e}"
                ));
                config::Config::default()
            });

        Self::from_tree(&tree, environment)
    }

    fn from_tree(tree: &config::Config, environment: &str) -> Self {
        let lookup = EnvLookup { tree, environment };
        let defaults = Self::default();

        Self {
            environment: environment.to_string(),
            server: ServerSettings {
                host: lookup.value("server.host", defaults.server.host),
                workers: lookup.optional("server.workers"),
            },
            http: HttpSettings {
                port: lookup.value("http.port", defaults.http.port),
            },
            https: HttpsSettings {
                port: lookup.value("https.port", defaults.https.port),
                start_server: lookup.value("https.startServer", defaults.https.start_server),
                tls: TlsSettings {
                    key: lookup.value::<PathBuf>("https.tls.key", defaults.https.tls.key),
                    cert: lookup.value::<PathBuf>("https.tls.cert", defaults.https.tls.cert),
                },
            },
            limits: LimitSettings {
                max_body_size: lookup.value("limits.maxBodySize", defaults.limits.max_body_size),
                body_read_timeout: lookup
                    .value("limits.bodyReadTimeout", defaults.limits.body_read_timeout),
            },
            performance: PerformanceSettings {
                connection_timeout: lookup.value(
                    "performance.connectionTimeout",
                    defaults.performance.connection_timeout,
                ),
            },
            logging: LoggingSettings {
                access_log: lookup.value("logging.accessLog", defaults.logging.access_log),
                access_log_format: lookup
                    .value("logging.accessLogFormat", defaults.logging.access_log_format),
                access_log_file: lookup.optional("logging.accessLogFile"),
                error_log_file: lookup.optional("logging.errorLogFile"),
            },
        }
    }

    pub fn http_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.http.port)
            .parse()
            .map_err(|e| format!("Invalid HTTP address: {e}"))
    }

    pub fn https_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.https.port)
            .parse()
            .map_err(|e| format!("Invalid HTTPS address: {e}"))
    }
}
