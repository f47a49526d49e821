//! Logger module
//!
//! Logging helpers for the dispatcher and the server:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging
//! - File-based logging support
//!
//! Every helper works before `init`; it then falls back to stdout/stderr.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use chrono::Local;
use std::net::SocketAddr;

use crate::config::Settings;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(settings: &Settings) -> std::io::Result<()> {
    writer::init(
        settings.logging.access_log_file.as_deref(),
        settings.logging.error_log_file.as_deref(),
    )
}

fn timestamped(level: &str, message: &str) -> String {
    format!("{} [{level}] {message}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
}

fn write_info(message: &str) {
    let line = timestamped("INFO", message);
    match writer::get() {
        Some(w) => w.write_info(&line),
        None => println!("{line}"),
    }
}

fn write_error(level: &str, message: &str) {
    let line = timestamped(level, message);
    match writer::get() {
        Some(w) => w.write_error(&line),
        None => eprintln!("{line}"),
    }
}

pub fn log_info(message: &str) {
    write_info(message);
}

pub fn log_warning(message: &str) {
    write_error("WARN", message);
}

pub fn log_error(message: &str) {
    write_error("ERROR", message);
}

pub fn log_server_start(settings: &Settings, routes: &[&str]) {
    write_info("======================================");
    write_info(&format!("Environment: {}", settings.environment));
    if let Some(workers) = settings.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    write_info(&format!(
        "Max body size: {} bytes, body read timeout: {}s",
        settings.limits.max_body_size, settings.limits.body_read_timeout
    ));
    if let Some(ref path) = settings.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = settings.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info(&format!("Registered resources: /{}", routes.join(", /")));
    write_info("======================================");
}

pub fn log_server_listening(scheme: &str, addr: &SocketAddr) {
    write_info(&format!("{} server listening on {scheme}://{addr}", scheme.to_uppercase()));
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    log_error(&format!("Failed to serve connection: {err}"));
}

/// Write a formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    let line = entry.format(format);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

pub fn log_shutdown(signal: &str) {
    write_info(&format!("{signal} received, no longer accepting connections"));
}
