//! Validating admission webhook for KongFiles
//!
//! Malformed KongFiles are rejected before they reach the controller. The
//! webhook never touches the cache or the Admin API.

pub mod handler;
pub mod validator;

pub use handler::{validate_handler, AdmissionError, DENIAL_CODE};
pub use validator::{validate_file, Decision, FileValidator, Validator};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::info;

use crate::{Error, Result};

/// Certificate read when no TLS material is configured
pub const DEFAULT_CERT_PATH: &str = "/admission-webhook/tls.crt";

/// Private key read when no TLS material is configured
pub const DEFAULT_KEY_PATH: &str = "/admission-webhook/tls.key";

/// Shared state for admission handlers
pub struct AdmissionState {
    /// Rules applied to every reviewed object
    pub validator: Arc<dyn Validator>,
}

impl AdmissionState {
    /// Create state around a validator
    pub fn new(validator: Arc<dyn Validator>) -> Self {
        Self { validator }
    }
}

/// Create the admission router
///
/// Reviews are accepted on `/` and `/validate`.
pub fn admission_router(state: Arc<AdmissionState>) -> Router {
    Router::new()
        .route("/", post(validate_handler))
        .route("/validate", post(validate_handler))
        .with_state(state)
}

/// Listener and TLS material for the admission server
///
/// TLS comes from exactly one source: an in-memory pair, a pair of file paths,
/// or nothing at all, in which case the default paths are read.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,
    /// Path to a PEM certificate
    pub cert_path: Option<String>,
    /// PEM certificate
    pub cert: Option<String>,
    /// Path to a PEM private key
    pub key_path: Option<String>,
    /// PEM private key
    pub key: Option<String>,
}

fn set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl ServerConfig {
    /// Resolve the certificate and key PEM bytes
    pub fn key_pair(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        match (
            set(&self.cert_path),
            set(&self.key_path),
            set(&self.cert),
            set(&self.key),
        ) {
            (false, false, true, true) => Ok((
                self.cert.clone().unwrap_or_default().into_bytes(),
                self.key.clone().unwrap_or_default().into_bytes(),
            )),
            (true, true, false, false) => read_key_pair(
                self.cert_path.as_deref().unwrap_or_default(),
                self.key_path.as_deref().unwrap_or_default(),
            ),
            (false, false, false, false) => read_key_pair(DEFAULT_CERT_PATH, DEFAULT_KEY_PATH),
            _ => Err(Error::config(
                "either cert/key files OR cert/key values must be provided, or none",
            )),
        }
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| {
            Error::config(format!(
                "invalid admission webhook listen address {:?}: {}",
                self.listen_addr, e
            ))
        })
    }

    /// Build the rustls configuration for the listener
    pub async fn tls_config(&self) -> Result<RustlsConfig> {
        let (cert, key) = self.key_pair()?;
        RustlsConfig::from_pem(cert, key)
            .await
            .map_err(|e| Error::config(format!("admission webhook TLS config error: {}", e)))
    }
}

fn read_key_pair(cert_path: &str, key_path: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let cert = std::fs::read(cert_path)
        .map_err(|e| Error::config(format!("read cert from file {:?}: {}", cert_path, e)))?;
    let key = std::fs::read(key_path)
        .map_err(|e| Error::config(format!("read key from file {:?}: {}", key_path, e)))?;
    Ok((cert, key))
}

/// Serve admission reviews over TLS until `handle` shuts the server down
pub async fn serve(config: &ServerConfig, state: Arc<AdmissionState>, handle: Handle) -> Result<()> {
    let addr = config.socket_addr()?;
    let tls_config = config.tls_config().await?;

    info!(addr = %addr, "Starting admission webhook server");

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(admission_router(state).into_make_service())
        .await
        .map_err(|e| Error::internal(format!("admission webhook server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_in_memory_pair() {
        let config = ServerConfig {
            cert: some("CERT"),
            key: some("KEY"),
            ..Default::default()
        };
        let (cert, key) = config.key_pair().unwrap();
        assert_eq!(cert, b"CERT");
        assert_eq!(key, b"KEY");
    }

    #[test]
    fn test_file_pair() {
        let dir = std::env::temp_dir().join(format!("portal-admission-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cert_path = dir.join("tls.crt");
        let key_path = dir.join("tls.key");
        std::fs::write(&cert_path, "FILE CERT").unwrap();
        std::fs::write(&key_path, "FILE KEY").unwrap();

        let config = ServerConfig {
            cert_path: some(cert_path.to_str().unwrap()),
            key_path: some(key_path.to_str().unwrap()),
            ..Default::default()
        };
        let (cert, key) = config.key_pair().unwrap();
        assert_eq!(cert, b"FILE CERT");
        assert_eq!(key, b"FILE KEY");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    /// Story: mixing TLS sources is a configuration error
    #[test]
    fn story_mixed_tls_sources_are_rejected() {
        let mixed = [
            ServerConfig {
                cert_path: some("/tmp/tls.crt"),
                key: some("KEY"),
                ..Default::default()
            },
            ServerConfig {
                cert: some("CERT"),
                ..Default::default()
            },
            ServerConfig {
                cert_path: some("/tmp/tls.crt"),
                key_path: some("/tmp/tls.key"),
                cert: some("CERT"),
                key: some("KEY"),
                ..Default::default()
            },
        ];
        for config in mixed {
            let err = config.key_pair().unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(err.to_string().contains("either cert/key files OR cert/key values"));
        }
    }

    #[test]
    fn test_no_material_reads_default_paths() {
        // The default paths only exist inside the webhook's pod
        let err = ServerConfig::default().key_pair().unwrap_err();
        assert!(err.to_string().contains(DEFAULT_CERT_PATH));
    }

    #[test]
    fn test_invalid_listen_address() {
        let config = ServerConfig {
            listen_addr: "not-an-address".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.socket_addr(), Err(Error::Config(_))));

        let config = ServerConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }
}
