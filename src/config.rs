//! Command-line configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::admission::ServerConfig;
use crate::backend::AdminClientConfig;
use crate::crd::DEFAULT_CONTROLLER_CLASS;
use crate::retry::RetryConfig;
use crate::telemetry::LogFormat;
use crate::{Error, Result};

/// Value of `--admission-webhook-listen` that disables the webhook
pub const ADMISSION_OFF: &str = "off";

/// Kong developer portal controller
#[derive(Parser, Debug, Clone)]
#[command(name = "portal-controller", version, about, long_about = None)]
pub struct Cli {
    /// Print the KongFile CRD as YAML and exit
    #[arg(long)]
    pub crd: bool,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long, env = "PORTAL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "PORTAL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Kong Admin API base URL
    #[arg(long, env = "PORTAL_KONG_ADMIN_URL", default_value = "http://localhost:8001")]
    pub kong_admin_url: String,

    /// Token sent in the kong-admin-token header
    #[arg(long, env = "PORTAL_KONG_ADMIN_TOKEN")]
    pub kong_admin_token: Option<String>,

    /// Extra header for Admin API requests, as key:value (repeatable)
    #[arg(long = "kong-admin-header")]
    pub kong_admin_headers: Vec<String>,

    /// Kong workspace the portal files live in
    #[arg(long, env = "PORTAL_KONG_WORKSPACE")]
    pub kong_workspace: Option<String>,

    /// Skip verification of the Admin API certificate
    #[arg(long)]
    pub kong_admin_tls_skip_verify: bool,

    /// File holding a PEM CA bundle for the Admin API
    #[arg(long)]
    pub kong_admin_ca_cert_file: Option<PathBuf>,

    /// PEM CA bundle for the Admin API
    #[arg(long)]
    pub kong_admin_ca_cert: Option<String>,

    /// Timeout for every Admin API request, in seconds
    #[arg(long, default_value_t = 10.0)]
    pub proxy_timeout_seconds: f64,

    /// Attempts at reaching the Admin API on startup (0 = forever)
    #[arg(long, default_value_t = 5)]
    pub proxy_init_attempts: u32,

    /// Controller class this instance is responsible for
    #[arg(long, env = "PORTAL_CONTROLLER_CLASS", default_value = DEFAULT_CONTROLLER_CLASS)]
    pub controller_class: String,

    /// Namespace to watch (repeatable, default: all namespaces)
    #[arg(long = "watch-namespace")]
    pub watch_namespaces: Vec<String>,

    /// Address of the health probe server
    #[arg(long, default_value = "0.0.0.0:10254")]
    pub health_probe_bind_address: String,

    /// Address of the admission webhook server, or "off"
    #[arg(long, default_value = ADMISSION_OFF)]
    pub admission_webhook_listen: String,

    /// Path to the admission webhook certificate
    #[arg(long)]
    pub admission_webhook_cert_file: Option<String>,

    /// Path to the admission webhook private key
    #[arg(long)]
    pub admission_webhook_key_file: Option<String>,

    /// Admission webhook certificate, PEM
    #[arg(long, env = "PORTAL_ADMISSION_WEBHOOK_CERT")]
    pub admission_webhook_cert: Option<String>,

    /// Admission webhook private key, PEM
    #[arg(long, env = "PORTAL_ADMISSION_WEBHOOK_KEY")]
    pub admission_webhook_key: Option<String>,
}

impl Cli {
    /// Deadline for every Admin API request
    pub fn proxy_timeout(&self) -> Result<Duration> {
        if !self.proxy_timeout_seconds.is_finite() || self.proxy_timeout_seconds <= 0.0 {
            return Err(Error::config(format!(
                "proxy timeout must be positive, got {}",
                self.proxy_timeout_seconds
            )));
        }
        Ok(Duration::from_secs_f64(self.proxy_timeout_seconds))
    }

    /// Backoff used while waiting for the Admin API on startup
    pub fn init_retry(&self) -> RetryConfig {
        RetryConfig::with_max_attempts(self.proxy_init_attempts)
    }

    /// Connection settings for the Admin API client
    pub fn admin_client_config(&self) -> Result<AdminClientConfig> {
        let headers = self
            .kong_admin_headers
            .iter()
            .map(|h| parse_header(h))
            .collect::<Result<Vec<_>>>()?;

        let ca_cert_pem = match (&self.kong_admin_ca_cert_file, &self.kong_admin_ca_cert) {
            (Some(_), Some(_)) => {
                return Err(Error::config(
                    "only one of --kong-admin-ca-cert-file and --kong-admin-ca-cert may be set",
                ))
            }
            (Some(path), None) => Some(std::fs::read_to_string(path).map_err(|e| {
                Error::config(format!("read CA certificate from {:?}: {}", path, e))
            })?),
            (None, Some(pem)) => Some(pem.clone()),
            (None, None) => None,
        };

        Ok(AdminClientConfig {
            url: self.kong_admin_url.clone(),
            token: self.kong_admin_token.clone(),
            headers,
            workspace: self.kong_workspace.clone(),
            tls_skip_verify: self.kong_admin_tls_skip_verify,
            ca_cert_pem,
            timeout: self.proxy_timeout()?,
        })
    }

    /// Admission server settings, `None` when the webhook is disabled
    pub fn admission_server_config(&self) -> Option<ServerConfig> {
        if self.admission_webhook_listen == ADMISSION_OFF {
            return None;
        }
        Some(ServerConfig {
            listen_addr: self.admission_webhook_listen.clone(),
            cert_path: self.admission_webhook_cert_file.clone(),
            cert: self.admission_webhook_cert.clone(),
            key_path: self.admission_webhook_key_file.clone(),
            key: self.admission_webhook_key.clone(),
        })
    }

    /// Parsed health probe address
    pub fn health_addr(&self) -> Result<SocketAddr> {
        self.health_probe_bind_address.parse().map_err(|e| {
            Error::config(format!(
                "invalid health probe address {:?}: {}",
                self.health_probe_bind_address, e
            ))
        })
    }
}

/// Split a `key:value` header flag
fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::config(format!(
            "invalid header {:?}, expected key:value",
            raw
        ))),
    }
}
