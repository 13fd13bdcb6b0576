//! One outbound HTTP request per invocation. A probe never aborts the
//! caller on failure; every transport problem is folded into the
//! returned outcome.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, redirect, Client, Method, RequestBuilder};
use url::Url;

use crate::headers::{is_host_header, split_header};
use crate::tls::TlsOptions;

/// Sentinel for "no usable status line"; evaluates to UNKNOWN.
pub const NO_STATUS: u16 = 0;

/// Everything needed to issue one request.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: String,
    pub method: String,
    pub post_data: Option<String>,
    /// `"Name: Value"` strings; a name equal to `Host` rewrites the
    /// request's virtual host instead of being sent literally.
    pub headers: Vec<String>,
    /// Whole-request timeout in seconds, covering connect, TLS handshake
    /// and body read.
    pub timeout: u64,
    /// Follow redirects, or stop and return the first 3xx as-is.
    pub follow_redirects: bool,
    pub tls: TlsOptions,
}

impl ProbeRequest {
    pub fn get(url: impl Into<String>) -> Self {
        ProbeRequest {
            url: url.into(),
            method: "GET".to_string(),
            post_data: None,
            headers: Vec::new(),
            timeout: 15,
            follow_redirects: false,
            tls: TlsOptions::default(),
        }
    }
}

/// Phase at which a probe failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Parse,
    Build,
    Send,
    Read,
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbePhase::Parse => "parsing URL",
            ProbePhase::Build => "creating request",
            ProbePhase::Send => "making request",
            ProbePhase::Read => "reading body",
        };
        f.write_str(s)
    }
}

/// Result of one probe: a final response or a transport failure.
#[derive(Debug)]
pub enum ProbeOutcome {
    Response(ProbeResponse),
    Failure { phase: ProbePhase, error: String },
}

#[derive(Debug)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: header::HeaderMap,
    pub body: Vec<u8>,
    /// URL the response actually came from, after any followed redirects.
    pub final_url: String,
}

fn failure(phase: ProbePhase, error: impl fmt::Display) -> ProbeOutcome {
    ProbeOutcome::Failure {
        phase,
        error: error.to_string(),
    }
}

/// Issue the request described by `req`. The client (and with it the TLS
/// configuration) is built fresh on every call.
pub async fn probe(req: &ProbeRequest) -> ProbeOutcome {
    let url = match Url::parse(&req.url) {
        Ok(url) => url,
        Err(e) => return failure(ProbePhase::Parse, e),
    };

    let policy = if req.follow_redirects {
        redirect::Policy::limited(10)
    } else {
        redirect::Policy::none()
    };
    let builder = Client::builder()
        .timeout(Duration::from_secs(req.timeout))
        .redirect(policy);
    let builder = match req.tls.apply(builder) {
        Ok(builder) => builder,
        Err(e) => return failure(ProbePhase::Build, e),
    };
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => return failure(ProbePhase::Build, e),
    };

    let method = match Method::from_bytes(req.method.as_bytes()) {
        Ok(method) => method,
        Err(e) => return failure(ProbePhase::Build, e),
    };
    let mut request = client.request(method, url);
    if let Some(data) = &req.post_data {
        request = request.body(data.clone());
    }
    let request = match apply_headers(request, &req.headers) {
        Ok(request) => request,
        Err(e) => return failure(ProbePhase::Build, e),
    };

    let resp = match request.send().await {
        Ok(resp) => resp,
        Err(e) => return failure(ProbePhase::Send, e),
    };
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let final_url = resp.url().to_string();
    let body = match resp.bytes().await {
        Ok(body) => body.to_vec(),
        Err(e) => return failure(ProbePhase::Read, e),
    };

    ProbeOutcome::Response(ProbeResponse {
        status,
        headers,
        body,
        final_url,
    })
}

/// Apply `"Name: Value"` arguments to a request. Last write wins per
/// name; `Host` rewrites the virtual host.
pub fn apply_headers(mut request: RequestBuilder, headers: &[String]) -> Result<RequestBuilder> {
    for raw in headers {
        let (name, value) = split_header(raw)?;
        if is_host_header(name) {
            request = request.header(header::HOST, value);
        } else {
            request = request.header(name, value);
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("SUCCESS"))
            .mount(&server)
            .await;

        let req = ProbeRequest::get(format!("{}/health", server.uri()));
        match probe(&req).await {
            ProbeOutcome::Response(resp) => {
                assert_eq!(resp.status, 200);
                assert_eq!(resp.body, b"SUCCESS");
            }
            ProbeOutcome::Failure { phase, error } => panic!("failed {phase}: {error}"),
        }
    }

    #[tokio::test]
    async fn stop_policy_returns_first_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "https://example.com/"),
            )
            .mount(&server)
            .await;

        let req = ProbeRequest::get(server.uri());
        match probe(&req).await {
            ProbeOutcome::Response(resp) => {
                assert_eq!(resp.status, 301);
                assert_eq!(
                    resp.headers.get("Location").unwrap(),
                    "https://example.com/"
                );
            }
            ProbeOutcome::Failure { phase, error } => panic!("failed {phase}: {error}"),
        }
    }

    #[tokio::test]
    async fn follow_policy_exposes_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut req = ProbeRequest::get(format!("{}/old", server.uri()));
        req.follow_redirects = true;
        match probe(&req).await {
            ProbeOutcome::Response(resp) => {
                assert_eq!(resp.status, 200);
                assert_eq!(resp.final_url, format!("{}/new", server.uri()));
            }
            ProbeOutcome::Failure { phase, error } => panic!("failed {phase}: {error}"),
        }
    }

    #[tokio::test]
    async fn custom_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Token", "secret"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut req = ProbeRequest::get(server.uri());
        req.headers = vec!["X-Token: secret".to_string()];
        match probe(&req).await {
            ProbeOutcome::Response(resp) => assert_eq!(resp.status, 204),
            ProbeOutcome::Failure { phase, error } => panic!("failed {phase}: {error}"),
        }
    }

    #[tokio::test]
    async fn malformed_url_is_a_parse_failure() {
        let req = ProbeRequest::get("not a url");
        match probe(&req).await {
            ProbeOutcome::Failure { phase, .. } => assert_eq!(phase, ProbePhase::Parse),
            ProbeOutcome::Response(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_a_send_failure() {
        // Port 9 (discard) is assumed closed.
        let mut req = ProbeRequest::get("http://127.0.0.1:9/");
        req.timeout = 2;
        match probe(&req).await {
            ProbeOutcome::Failure { phase, .. } => assert_eq!(phase, ProbePhase::Send),
            ProbeOutcome::Response(_) => panic!("expected failure"),
        }
    }
}
