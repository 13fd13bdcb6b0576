//! Endpoint list resolution: parse descriptors, merge with defaults,
//! validate, and synthesize event names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use checks_core::probe::ProbeRequest;
use checks_core::tls::TlsOptions;
use checks_core::{headers, Severity};

/// Check name prefixed to every output line and used as the namespace
/// tag for synthesized event check names.
pub const CHECK_NAME: &str = "http-endpoints";

/// One HTTP target with its fully merged policy. Immutable once
/// resolution finishes.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub headers: Vec<String>,
    /// Empty means status-only evaluation.
    pub search_string: String,
    pub redirect_ok: bool,
    /// Seconds.
    pub timeout: u64,
    pub mtls_key_file: String,
    pub mtls_cert_file: String,
    pub trusted_ca_file: String,
    pub insecure_skip_verify: bool,
    /// Report through the events API instead of the aggregate severity.
    pub create_event: bool,
    pub entity_name: String,
    pub check_name: String,
    pub handlers: Vec<String>,
    pub events_api: String,
}

/// Global defaults inherited by every field a descriptor leaves unset.
/// Constructed once; the merge never mutates it.
#[derive(Debug, Clone)]
pub struct EndpointDefaults {
    pub url: String,
    pub headers: Vec<String>,
    pub search_string: String,
    pub redirect_ok: bool,
    pub timeout: u64,
    pub mtls_key_file: String,
    pub mtls_cert_file: String,
    pub trusted_ca_file: String,
    pub insecure_skip_verify: bool,
    pub create_event: bool,
    pub entity_name: String,
    pub check_name: String,
    pub handlers: Vec<String>,
    pub events_api: String,
}

impl Default for EndpointDefaults {
    fn default() -> Self {
        EndpointDefaults {
            url: "http://localhost:80/".to_string(),
            headers: Vec::new(),
            search_string: String::new(),
            redirect_ok: false,
            timeout: 15,
            mtls_key_file: String::new(),
            mtls_cert_file: String::new(),
            trusted_ca_file: String::new(),
            insecure_skip_verify: false,
            create_event: false,
            entity_name: String::new(),
            check_name: String::new(),
            handlers: Vec::new(),
            events_api: "http://localhost:3031/events".to_string(),
        }
    }
}

/// One descriptor as written by the user. Every field is optional;
/// absent fields inherit the corresponding default at merge time.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawEndpoint {
    url: Option<String>,
    header: Option<Vec<String>>,
    search_string: Option<String>,
    redirect_ok: Option<bool>,
    timeout: Option<u64>,
    mtls_key_file: Option<String>,
    mtls_cert_file: Option<String>,
    trusted_ca: Option<String>,
    insecure_skip_verify: Option<bool>,
    create_event: Option<bool>,
    event_entity_name: Option<String>,
    event_check_name: Option<String>,
    event_handlers: Option<Vec<String>>,
    events_api: Option<String>,
}

impl RawEndpoint {
    /// Per-field merge: an explicitly set field always wins, an absent
    /// field inherits the default. Lists replace, they do not
    /// concatenate.
    fn merge(self, defaults: &EndpointDefaults) -> Endpoint {
        Endpoint {
            url: self.url.unwrap_or_else(|| defaults.url.clone()),
            headers: self.header.unwrap_or_else(|| defaults.headers.clone()),
            search_string: self
                .search_string
                .unwrap_or_else(|| defaults.search_string.clone()),
            redirect_ok: self.redirect_ok.unwrap_or(defaults.redirect_ok),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            mtls_key_file: self
                .mtls_key_file
                .unwrap_or_else(|| defaults.mtls_key_file.clone()),
            mtls_cert_file: self
                .mtls_cert_file
                .unwrap_or_else(|| defaults.mtls_cert_file.clone()),
            trusted_ca_file: self
                .trusted_ca
                .unwrap_or_else(|| defaults.trusted_ca_file.clone()),
            insecure_skip_verify: self
                .insecure_skip_verify
                .unwrap_or(defaults.insecure_skip_verify),
            create_event: self.create_event.unwrap_or(defaults.create_event),
            entity_name: self
                .event_entity_name
                .unwrap_or_else(|| defaults.entity_name.clone()),
            check_name: self
                .event_check_name
                .unwrap_or_else(|| defaults.check_name.clone()),
            handlers: self
                .event_handlers
                .unwrap_or_else(|| defaults.handlers.clone()),
            events_api: self.events_api.unwrap_or_else(|| defaults.events_api.clone()),
        }
    }
}

/// Configuration problems that abort the whole run before any HTTP
/// traffic is sent.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot parse --endpoints string, please check documented examples")]
    UnparseableList(#[source] serde_json::Error),
    #[error("no endpoints parsed, please check documented examples")]
    NoEndpoints,
    #[error("--endpoints and --endpoints-file are mutually exclusive")]
    ConflictingSources,
    #[error("error reading endpoints file")]
    UnreadableFile(#[source] std::io::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ResolveError {
    /// UNKNOWN for unparseable structure, WARNING for user input
    /// problems.
    pub fn severity(&self) -> Severity {
        match self {
            ResolveError::UnparseableList(_) | ResolveError::NoEndpoints => Severity::Unknown,
            _ => Severity::Warning,
        }
    }
}

/// Resolve the endpoint list from an inline JSON array or a file, merge
/// each descriptor with the defaults and validate the result. With
/// neither source, a single endpoint is synthesized from the defaults
/// alone (single-URL invocation mode).
pub fn resolve(
    inline: Option<&str>,
    file: Option<&Path>,
    defaults: &EndpointDefaults,
) -> Result<Vec<Endpoint>, ResolveError> {
    let raw = match (inline, file) {
        (Some(_), Some(_)) => return Err(ResolveError::ConflictingSources),
        (Some(s), None) => s.to_string(),
        (None, Some(path)) => fs::read_to_string(path).map_err(ResolveError::UnreadableFile)?,
        (None, None) => "[{}]".to_string(),
    };

    let raws: Vec<RawEndpoint> =
        serde_json::from_str(&raw).map_err(ResolveError::UnparseableList)?;
    if raws.is_empty() {
        return Err(ResolveError::NoEndpoints);
    }

    let mut endpoints: Vec<Endpoint> = raws.into_iter().map(|r| r.merge(defaults)).collect();
    for endpoint in &mut endpoints {
        endpoint
            .validate()
            .map_err(|e| ResolveError::Invalid(format!("{e:#}")))?;
        endpoint.fill_event_names();
    }
    Ok(endpoints)
}

impl Endpoint {
    /// Fail-fast validation of the merged configuration. A failure here
    /// means no endpoint is probed at all.
    fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("--url or CHECK_URL environment variable is required");
        }
        headers::validate_headers(&self.headers)?;
        self.tls().validate()?;
        Ok(())
    }

    /// Derive entity and check names for event creation when they were
    /// not configured. Left empty if the URL does not parse; the probe
    /// will surface that as its own CRITICAL result.
    fn fill_event_names(&mut self) {
        let Ok(parsed) = Url::parse(&self.url) else {
            return;
        };
        if self.entity_name.is_empty() {
            self.entity_name = parsed.host_str().unwrap_or_default().to_string();
        }
        if self.check_name.is_empty() {
            self.check_name = format!("http_check-{}", check_name_token(parsed.path()));
        }
    }

    /// TLS policy re-derived from this endpoint's own merged fields,
    /// immediately before its probe.
    pub fn tls(&self) -> TlsOptions {
        TlsOptions {
            trusted_ca_file: path_option(&self.trusted_ca_file),
            insecure_skip_verify: self.insecure_skip_verify,
            mtls_cert_file: path_option(&self.mtls_cert_file),
            mtls_key_file: path_option(&self.mtls_key_file),
        }
    }

    pub fn probe_request(&self) -> ProbeRequest {
        ProbeRequest {
            url: self.url.clone(),
            method: "GET".to_string(),
            post_data: None,
            headers: self.headers.clone(),
            timeout: self.timeout,
            follow_redirects: self.redirect_ok,
            tls: self.tls(),
        }
    }
}

fn path_option(s: &str) -> Option<PathBuf> {
    (!s.is_empty()).then(|| PathBuf::from(s))
}

/// URL path reduced to an identifier: every run of non-alphanumeric
/// characters becomes an underscore; the root path becomes "root_path".
fn check_name_token(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "root_path".to_string();
    }
    let re = Regex::new("[^a-zA-Z0-9]+").expect("static pattern");
    re.replace_all(path, "_").into_owned()
}
