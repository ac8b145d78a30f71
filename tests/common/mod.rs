//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use config_compiler::schema::{load_schema, SchemaRegistry};
use config_compiler::secrets::SecretResolver;

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

pub fn fixture_schema() -> SchemaRegistry {
    load_schema(&fixture("schema.toml")).unwrap()
}

/// Values the server-base fixture reads through `env:` references.
pub fn host_env(name: &str) -> Option<String> {
    match name {
        "NEXTCLOUD_LOGLEVEL" => Some("1".to_string()),
        "PASSWORD_SALT" => Some("pepper-and-s4lt".to_string()),
        "SECRET" => Some("very-s3cret-value".to_string()),
        _ => None,
    }
}

pub fn host_resolver() -> SecretResolver {
    SecretResolver::new(Duration::from_secs(2)).with_env_lookup(host_env)
}

/// A request seen by the mock secret backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
}

/// Mock HTTP secret backend on an ephemeral port.
pub struct MockSecretBackend {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockSecretBackend {
    /// Base URL to hand to `HttpSecretStore`.
    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}/v1/", self.addr)).unwrap()
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// Start a mock backend serving `GET /v1/<key>` from `secrets`; unknown keys
/// get a 404. Every response is held back by `delay`.
pub async fn start_secret_backend(secrets: &[(&str, &str)], delay: Duration) -> MockSecretBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let secrets: Arc<HashMap<String, String>> = Arc::new(
        secrets
            .iter()
            .map(|(k, v)| (format!("/v1/{}", k), v.to_string()))
            .collect(),
    );
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let secrets = secrets.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        log.lock().unwrap().push(request.clone());
                        tokio::time::sleep(delay).await;

                        let (status, body) = match secrets.get(&request.path) {
                            Some(value) => ("200 OK", value.clone()),
                            None => ("404 Not Found", String::new()),
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockSecretBackend { addr, seen }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buffer);
    let mut lines = head.split("\r\n");
    let path = lines.next()?.split_whitespace().nth(1)?.to_string();
    let authorization = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_string());
    Some(SeenRequest { path, authorization })
}
