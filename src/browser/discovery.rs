//! DevTools endpoint discovery.
//!
//! A browser started with `--remote-debugging-port` serves
//! `GET /json/version`, which names the browser and its WebSocket URL.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Time allowed for the `/json/version` request.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// VersionInfo
// ============================================================================

/// Reply of `GET /json/version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    /// Browser product and version, e.g. `Chrome/120.0.6099.109`.
    #[serde(rename = "Browser")]
    pub browser: String,

    /// DevTools protocol version, e.g. `1.3`.
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,

    /// Browser user agent.
    #[serde(rename = "User-Agent")]
    pub user_agent: String,

    /// V8 version.
    #[serde(rename = "V8-Version", default)]
    pub v8_version: Option<String>,

    /// WebKit (Blink) version.
    #[serde(rename = "WebKit-Version", default)]
    pub webkit_version: String,

    /// Browser-level WebSocket endpoint.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

// ============================================================================
// Discovery
// ============================================================================

/// Builds the `/json/version` URL for `address`.
///
/// `address` is `host:port`, optionally with an `http://` or `https://`
/// prefix.
///
/// # Errors
///
/// Returns [`Error::Url`] if the address does not form a valid URL.
pub fn version_url(address: &str) -> Result<Url> {
    let base = if address.starts_with("http://") || address.starts_with("https://") {
        address.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", address.trim_end_matches('/'))
    };
    Ok(Url::parse(&format!("{base}/json/version"))?)
}

/// Queries `/json/version` on `address`.
///
/// # Errors
///
/// - [`Error::Http`] if the request fails or the body is not valid JSON
/// - [`Error::Discovery`] if the endpoint answers with a non-2xx status
pub async fn fetch_version(address: &str) -> Result<VersionInfo> {
    let url = version_url(address)?;
    debug!(url = %url, "Querying browser version");

    // DevTools endpoints are local; never route them through a proxy.
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(DISCOVERY_TIMEOUT)
        .build()?;
    let response = client.get(url.clone()).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::discovery(format!(
            "Could not query browser info at {url}: response code was {status}"
        )));
    }

    let info: VersionInfo = response.json().await?;
    debug!(
        browser = %info.browser,
        protocol = %info.protocol_version,
        ws_url = %info.web_socket_debugger_url,
        "Browser discovered"
    );
    Ok(info)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::convert::Infallible;
    use std::net::SocketAddr;

    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};
    use serde_json::json;
    use tokio::task::JoinHandle;

    pub(crate) fn spawn_server(status: StatusCode, body: String) -> (SocketAddr, JoinHandle<()>) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("server addr");
        listener
            .set_nonblocking(true)
            .expect("set nonblocking listener");

        let make_svc = make_service_fn(move |_conn| {
            let body = body.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let body = body.clone();
                    async move {
                        let response = if req.uri().path() == "/json/version" {
                            Response::builder().status(status).body(Body::from(body))
                        } else {
                            Response::builder()
                                .status(StatusCode::NOT_FOUND)
                                .body(Body::empty())
                        };
                        Ok::<_, Infallible>(response.expect("response"))
                    }
                }))
            }
        });

        let server = Server::from_tcp(listener)
            .expect("create server")
            .serve(make_svc);
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        (addr, handle)
    }

    fn chrome_version() -> String {
        json!({
            "Browser": "Chrome/120.0.6099.109",
            "Protocol-Version": "1.3",
            "User-Agent": "Mozilla/5.0 (X11; Linux x86_64) HeadlessChrome/120.0.6099.109",
            "V8-Version": "12.0.267.8",
            "WebKit-Version": "537.36 (@3c7d9b8)",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/b0b8a4fb"
        })
        .to_string()
    }

    #[test]
    fn test_version_url() {
        assert_eq!(
            version_url("localhost:9222").expect("url").as_str(),
            "http://localhost:9222/json/version"
        );
        assert_eq!(
            version_url("http://127.0.0.1:9333/").expect("url").as_str(),
            "http://127.0.0.1:9333/json/version"
        );
    }

    #[tokio::test]
    async fn test_fetch_version() {
        let (addr, server) = spawn_server(StatusCode::OK, chrome_version());

        let info = fetch_version(&addr.to_string()).await.expect("version");
        assert_eq!(info.browser, "Chrome/120.0.6099.109");
        assert_eq!(info.protocol_version, "1.3");
        assert_eq!(info.v8_version.as_deref(), Some("12.0.267.8"));
        assert_eq!(
            info.web_socket_debugger_url,
            "ws://127.0.0.1:9222/devtools/browser/b0b8a4fb"
        );

        server.abort();
    }

    #[tokio::test]
    async fn test_fetch_version_bad_status() {
        let (addr, server) = spawn_server(StatusCode::INTERNAL_SERVER_ERROR, String::new());

        let err = fetch_version(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Discovery { ref message } if message.contains("500")));

        server.abort();
    }

    #[tokio::test]
    async fn test_fetch_version_malformed_body() {
        let (addr, server) = spawn_server(StatusCode::OK, "{\"Browser\": 1}".to_string());

        let err = fetch_version(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));

        server.abort();
    }
}
