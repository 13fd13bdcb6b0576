//! Single-URL HTTP status/string check: the one-endpoint special case
//! of the evaluation policy, with method and POST body support.

use anyhow::{bail, Result};
use checks_core::eval::{evaluate, EvalPolicy};
use checks_core::probe::{probe, ProbeRequest};
use checks_core::tls::TlsOptions;
use checks_core::{headers, Severity};

pub const CHECK_NAME: &str = "http-check";

#[derive(Debug, Clone)]
pub struct StatusCheck {
    pub url: String,
    /// Empty means status-only evaluation.
    pub search_string: String,
    pub redirect_ok: bool,
    /// Seconds.
    pub timeout: u64,
    pub headers: Vec<String>,
    pub method: String,
    pub post_data: Option<String>,
    pub tls: TlsOptions,
}

impl StatusCheck {
    pub fn new(url: impl Into<String>) -> Self {
        StatusCheck {
            url: url.into(),
            search_string: String::new(),
            redirect_ok: false,
            timeout: 15,
            headers: Vec::new(),
            method: "GET".to_string(),
            post_data: None,
            tls: TlsOptions::default(),
        }
    }

    /// Fail-fast configuration validation, before any traffic is sent.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("--url or CHECK_URL environment variable is required");
        }
        headers::validate_headers(&self.headers)?;
        self.tls.validate()?;
        let has_data = self.post_data.as_deref().is_some_and(|d| !d.is_empty());
        if (self.method == "GET" && has_data) || (self.method == "POST" && !has_data) {
            bail!("malformed POST parameters");
        }
        Ok(())
    }

    /// Probe the URL once and evaluate the response.
    pub async fn execute(&self) -> (Severity, String) {
        let request = ProbeRequest {
            url: self.url.clone(),
            method: self.method.clone(),
            post_data: self.post_data.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            follow_redirects: self.redirect_ok,
            tls: self.tls.clone(),
        };
        let outcome = probe(&request).await;
        let policy = EvalPolicy {
            check_name: CHECK_NAME,
            url: &self.url,
            search_string: &self.search_string,
            redirect_ok: self.redirect_ok,
        };
        evaluate(&policy, &outcome)
    }
}
