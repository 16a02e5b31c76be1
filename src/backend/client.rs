//! reqwest implementation of [`AdminApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::{AdminApi, FileRecord};
use crate::{Error, Result};

/// Header carrying the Admin API token
pub const ADMIN_TOKEN_HEADER: &str = "kong-admin-token";

/// Connection settings for the Admin API
#[derive(Clone, Debug)]
pub struct AdminClientConfig {
    /// Base URL, e.g. `http://localhost:8001`
    pub url: String,
    /// Token sent as `kong-admin-token`
    pub token: Option<String>,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Workspace the files live in, empty for the default workspace
    pub workspace: Option<String>,
    /// Accept any server certificate
    pub tls_skip_verify: bool,
    /// PEM bundle of additional trusted CAs
    pub ca_cert_pem: Option<String>,
    /// Deadline for every request
    pub timeout: Duration,
}

impl Default for AdminClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001".to_string(),
            token: None,
            headers: Vec::new(),
            workspace: None,
            tls_skip_verify: false,
            ca_cert_pem: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the Kong Admin API
#[derive(Clone, Debug)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
    files_url: String,
}

impl AdminClient {
    /// Build a client from its connection settings
    pub fn new(config: &AdminClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(token)
                .map_err(|e| Error::config(format!("invalid admin token: {}", e)))?;
            headers.insert(ADMIN_TOKEN_HEADER, value);
        }
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name {:?}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("invalid value for header {:?}: {}", key, e)))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.tls_skip_verify);
        if let Some(pem) = &config.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| Error::config(format!("invalid admin API CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build admin API client: {}", e)))?;

        let base_url = config.url.trim_end_matches('/').to_string();
        let files_url = match config.workspace.as_deref().filter(|w| !w.is_empty()) {
            Some(ws) => format!("{}/{}/files", base_url, ws),
            None => format!("{}/files", base_url),
        };

        Ok(Self {
            http,
            base_url,
            files_url,
        })
    }

    fn file_url(&self, path: &str) -> String {
        format!("{}/{}", self.files_url, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<&FileRecord>,
    ) -> Result<reqwest::Response> {
        let operation = format!("{} {}", method, url);
        debug!(operation = %operation, "Calling admin API");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(operation)
            } else {
                Error::backend(operation, e.to_string())
            }
        })
    }

    async fn put_file(&self, file: &FileRecord, action: &str) -> Result<FileRecord> {
        let path = required_path(file, action)?;
        let response = self
            .send(Method::PUT, self.file_url(path), Some(file))
            .await?;
        let response = ensure_success(response, "PUT", path).await?;
        decode(response, "PUT", path).await
    }
}

fn required_path<'a>(file: &'a FileRecord, action: &str) -> Result<&'a str> {
    let path = file.path_str();
    if path.is_empty() {
        return Err(Error::invalid_argument(format!(
            "path cannot be empty for {} operation",
            action
        )));
    }
    Ok(path)
}

async fn ensure_success(
    response: reqwest::Response,
    method: &str,
    path: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::backend_status(
        format!("{} /files/{}", method, path),
        status.as_u16(),
        format!("HTTP {}: {}", status, body.trim()),
    ))
}

async fn decode(response: reqwest::Response, method: &str, path: &str) -> Result<FileRecord> {
    response.json().await.map_err(|e| {
        let operation = format!("{} /files/{}", method, path);
        if e.is_timeout() {
            Error::Timeout(operation)
        } else {
            Error::backend(operation, format!("invalid JSON: {}", e))
        }
    })
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn root(&self) -> Result<serde_json::Value> {
        let url = format!("{}/", self.base_url);
        let response = self.send(Method::GET, url, None).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::backend_status("GET /", status.as_u16(), format!("HTTP {}", status)));
        }
        response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout("GET /".to_string())
                } else {
                    Error::backend("GET /", format!("invalid JSON: {}", e))
                }
            })
    }

    async fn create_file(&self, file: &FileRecord) -> Result<FileRecord> {
        self.put_file(file, "create").await
    }

    async fn get_file(&self, file: &FileRecord) -> Result<Option<FileRecord>> {
        let path = required_path(file, "get")?;
        let response = self.send(Method::GET, self.file_url(path), None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "GET", path).await?;
        decode(response, "GET", path).await.map(Some)
    }

    async fn update_file(&self, file: &FileRecord) -> Result<FileRecord> {
        self.put_file(file, "update").await
    }

    async fn delete_file(&self, file: &FileRecord) -> Result<FileRecord> {
        let path = required_path(file, "delete")?;
        let response = self.send(Method::DELETE, self.file_url(path), None).await?;
        // Already gone counts as deleted
        if response.status() != StatusCode::NOT_FOUND {
            ensure_success(response, "DELETE", path).await?;
        }
        Ok(file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::HeaderMap as AxumHeaders;
    use axum::response::{IntoResponse, Json, Response};
    use axum::routing::get;
    use axum::Router;
    use parking_lot::Mutex;

    /// In-process stand-in for the Kong Admin API
    #[derive(Clone, Default)]
    struct FakeKong {
        files: Arc<Mutex<HashMap<String, FileRecord>>>,
        tokens: Arc<Mutex<Vec<String>>>,
    }

    async fn root() -> Json<serde_json::Value> {
        Json(serde_json::json!({
            "version": "3.4.2",
            "configuration": {"database": "off"}
        }))
    }

    async fn put_file(
        State(kong): State<FakeKong>,
        Path(path): Path<String>,
        headers: AxumHeaders,
        Json(mut body): Json<FileRecord>,
    ) -> Json<FileRecord> {
        if let Some(token) = headers.get(ADMIN_TOKEN_HEADER) {
            kong.tokens.lock().push(token.to_str().unwrap().to_string());
        }
        body.id = Some(format!("id-{}", path));
        body.checksum = Some("sum".to_string());
        kong.files.lock().insert(path, body.clone());
        Json(body)
    }

    async fn get_file(State(kong): State<FakeKong>, Path(path): Path<String>) -> Response {
        match kong.files.lock().get(&path) {
            Some(file) => Json(file.clone()).into_response(),
            None => (axum::http::StatusCode::NOT_FOUND, "Not found").into_response(),
        }
    }

    async fn delete_file(State(kong): State<FakeKong>, Path(path): Path<String>) -> Response {
        match kong.files.lock().remove(&path) {
            Some(_) => axum::http::StatusCode::NO_CONTENT.into_response(),
            None => axum::http::StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    /// Answers at once, then stalls halfway through the body
    async fn stalled() -> Response {
        let chunks = futures::stream::unfold(0u8, |step| async move {
            match step {
                0 => Some((Ok::<_, std::io::Error>(&b"{\"path\":"[..]), 1)),
                1 => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Some((Ok(&b"\"late\"}"[..]), 2))
                }
                _ => None,
            }
        });
        (
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            axum::body::Body::from_stream(chunks),
        )
            .into_response()
    }

    async fn start_fake(kong: FakeKong) -> String {
        let app = Router::new()
            .route("/", get(root))
            .route(
                "/files/{*path}",
                get(get_file).put(put_file).delete(delete_file),
            )
            .route(
                "/team-a/files/{*path}",
                get(get_file).put(put_file).delete(delete_file),
            )
            .route("/slow/files/{*path}", get(slow))
            .route("/stalled/files/{*path}", get(stalled))
            .with_state(kong);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(url: &str) -> AdminClient {
        AdminClient::new(&AdminClientConfig {
            url: url.to_string(),
            token: Some("s3cr3t".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    /// Story: a file is created, read back, updated and deleted by path
    #[tokio::test]
    async fn story_file_lifecycle_against_admin_api() {
        let kong = FakeKong::default();
        let url = start_fake(kong.clone()).await;
        let client = client(&url);

        let record = FileRecord::new("content/guides/welcome", "hello");
        let created = client.create_file(&record).await.unwrap();
        assert_eq!(created.id.as_deref(), Some("id-content/guides/welcome"));
        assert_eq!(created.contents.as_deref(), Some("hello"));

        let fetched = client.get_file(&record).await.unwrap().unwrap();
        assert_eq!(fetched.checksum.as_deref(), Some("sum"));

        let updated = client
            .update_file(&FileRecord::new("content/guides/welcome", "hello again"))
            .await
            .unwrap();
        assert_eq!(updated.contents.as_deref(), Some("hello again"));
        assert_eq!(kong.files.lock().len(), 1);

        let deleted = client.delete_file(&record).await.unwrap();
        assert_eq!(deleted, record);
        assert!(client.get_file(&record).await.unwrap().is_none());

        assert!(kong.tokens.lock().iter().all(|t| t == "s3cr3t"));
    }

    /// Story: deleting a file Kong no longer has is not an error
    #[tokio::test]
    async fn story_delete_of_missing_file_succeeds() {
        let url = start_fake(FakeKong::default()).await;
        let record = FileRecord::new("specs/apis/gone.yaml", "");
        assert!(client(&url).delete_file(&record).await.is_ok());
    }

    /// Story: empty paths fail before any request is made
    #[tokio::test]
    async fn story_empty_path_is_invalid_argument() {
        // Nothing listens here; reaching the network would be a backend error
        let client = client("http://127.0.0.1:1");

        let err = client.get_file(&FileRecord::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("get"));

        let err = client.delete_file(&FileRecord::new("", "x")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = client.update_file(&FileRecord::new(" ", "x")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_workspace_prefixes_file_paths() {
        let kong = FakeKong::default();
        let url = start_fake(kong.clone()).await;
        let client = AdminClient::new(&AdminClientConfig {
            url: format!("{}/", url),
            workspace: Some("team-a".to_string()),
            ..Default::default()
        })
        .unwrap();

        client
            .create_file(&FileRecord::new("base/assets/img/logo.png", "png"))
            .await
            .unwrap();
        assert!(kong.files.lock().contains_key("base/assets/img/logo.png"));
    }

    #[tokio::test]
    async fn test_root_document() {
        let url = start_fake(FakeKong::default()).await;
        let root = client(&url).root().await.unwrap();
        assert_eq!(root["configuration"]["database"], "off");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_retryable() {
        let err = client("http://127.0.0.1:1").root().await.unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let url = start_fake(FakeKong::default()).await;
        let client = AdminClient::new(&AdminClientConfig {
            url,
            workspace: Some("slow".to_string()),
            timeout: Duration::from_millis(100),
            ..Default::default()
        })
        .unwrap();

        let err = client
            .get_file(&FileRecord::new("content/a", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        let url = start_fake(FakeKong::default()).await;
        let client = AdminClient::new(&AdminClientConfig {
            url,
            workspace: Some("stalled".to_string()),
            timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();

        let err = client
            .get_file(&FileRecord::new("content/a", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let err = AdminClient::new(&AdminClientConfig {
            headers: vec![("bad header".to_string(), "v".to_string())],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
