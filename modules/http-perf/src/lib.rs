//! HTTP response-time check: one timed request compared against
//! warning/critical duration thresholds, with perfdata output.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use checks_core::probe::apply_headers;
use checks_core::tls::TlsOptions;
use checks_core::{headers, Severity};
use reqwest::{Client, Method};

pub const CHECK_NAME: &str = "http-perf";

#[derive(Debug, Clone)]
pub struct PerfCheck {
    pub url: String,
    /// Seconds.
    pub timeout: u64,
    pub warning: Duration,
    pub critical: Duration,
    /// Render durations in whole milliseconds instead of fractional
    /// seconds.
    pub output_in_ms: bool,
    pub headers: Vec<String>,
    pub method: String,
    pub post_data: Option<String>,
    pub tls: TlsOptions,
}

/// Parse a threshold expressed as seconds or milliseconds, e.g. "1s",
/// "1.5s" or "250ms".
pub fn parse_threshold(s: &str) -> Result<Duration> {
    let (number, scale) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1e-3)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1.0)
    } else {
        bail!("invalid duration {s:?}: expected a value like \"1s\" or \"500ms\"");
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration {s:?}"))?;
    if !value.is_finite() || value < 0.0 {
        bail!("invalid duration {s:?}");
    }
    Ok(Duration::from_secs_f64(value * scale))
}

impl PerfCheck {
    pub fn new(url: impl Into<String>) -> Self {
        PerfCheck {
            url: url.into(),
            timeout: 15,
            warning: Duration::from_secs(1),
            critical: Duration::from_secs(2),
            output_in_ms: false,
            headers: Vec::new(),
            method: "GET".to_string(),
            post_data: None,
            tls: TlsOptions::default(),
        }
    }

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

    /// Time one request end to end. First-byte duration is measured when
    /// the response head arrives; total duration includes the body read.
    pub async fn execute(&self) -> (Severity, String) {
        match self.timed_request().await {
            Ok((first_byte, total)) => self.render(first_byte, total),
            Err(e) => (Severity::Critical, format!("{CHECK_NAME} CRITICAL: request error: {e:#}")),
        }
    }

    async fn timed_request(&self) -> Result<(Duration, Duration)> {
        let builder = Client::builder().timeout(Duration::from_secs(self.timeout));
        let client = self.tls.apply(builder)?.build()?;
        let method = Method::from_bytes(self.method.as_bytes())?;
        let mut request = client.request(method, &self.url);
        if let Some(data) = &self.post_data {
            request = request.body(data.clone());
        }
        let request = apply_headers(request, &self.headers)?;

        let start = Instant::now();
        let resp = request.send().await?;
        let first_byte = start.elapsed();
        resp.bytes().await?;
        let total = start.elapsed();
        Ok((first_byte, total))
    }

    fn render(&self, first_byte: Duration, total: Duration) -> (Severity, String) {
        let (output, perfdata) = if self.output_in_ms {
            (
                format!("{}ms", total.as_millis()),
                format!(
                    "first_byte_duration={}, total_request_duration={}",
                    first_byte.as_millis(),
                    total.as_millis()
                ),
            )
        } else {
            (
                format!("{:.6}s", total.as_secs_f64()),
                format!(
                    "first_byte_duration={:.6}, total_request_duration={:.6}",
                    first_byte.as_secs_f64(),
                    total.as_secs_f64()
                ),
            )
        };
        let severity = if total > self.critical {
            Severity::Critical
        } else if total > self.warning {
            Severity::Warning
        } else {
            Severity::Ok
        };
        (severity, format!("{CHECK_NAME} {severity}: {output} | {perfdata}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn thresholds_parse_seconds_and_milliseconds() {
        assert_eq!(parse_threshold("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_threshold("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_threshold("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_threshold("1000ms").unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn bad_thresholds_are_rejected()  {
        assert!(parse_threshold("fast").is_err());
        assert!(parse_threshold("10").is_err());
        assert!(parse_threshold("-1s").is_err());
        assert!(parse_threshold("1h").is_err());
    }

    #[test]
    fn severity_by_threshold_comparison() {
        let mut check = PerfCheck::new("http://x/");
        check.warning = Duration::from_millis(100);
        check.critical = Duration::from_millis(200);

        let (sev, msg) = check.render(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(sev, Severity::Ok);
        assert!(msg.starts_with("http-perf OK: "));

        let (sev, _) = check.render(Duration::from_millis(10), Duration::from_millis(150));
        assert_eq!(sev, Severity::Warning);

        let (sev, msg) = check.render(Duration::from_millis(10), Duration::from_millis(250));
        assert_eq!(sev, Severity::Critical);
        assert!(msg.contains("total_request_duration="));
    }

    #[test]
    fn millisecond_output_format() {
        let mut check = PerfCheck::new("http://x/");
        check.output_in_ms = true;
        let (_, msg) = check.render(Duration::from_millis(12), Duration::from_millis(34));
        assert!(msg.contains("34ms | first_byte_duration=12, total_request_duration=34"));
    }

    #[tokio::test]
    async fn fast_response_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let mut check = PerfCheck::new(format!("{}/", server.uri()));
        check.warning = Duration::from_secs(30);
        check.critical = Duration::from_secs(60);
        let (sev, msg) = check.execute().await;
        assert_eq!(sev, Severity::Ok);
        assert!(msg.contains(" | first_byte_duration="));
    }

    #[tokio::test]
    async fn slow_response_breaches_thresholds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let mut check = PerfCheck::new(format!("{}/", server.uri()));
        check.warning = Duration::from_millis(1);
        check.critical = Duration::from_millis(2);
        let (sev, _) = check.execute().await;
        assert_eq!(sev, Severity::Critical);
    }

    #[tokio::test]
    async fn transport_failure_is_critical() {
        let mut check = PerfCheck::new("http://127.0.0.1:9/");
        check.timeout = 2;
        let (sev, msg) = check.execute().await;
        assert_eq!(sev, Severity::Critical);
        assert!(msg.contains("request error"));
    }
}
