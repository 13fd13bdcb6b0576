//! HTTP JSON check: fetch a document, extract a value with a dot-path
//! query and compare it against an expression.
//!
//! The query is a jq-style path subset: `.status`, `.a.b`, `.items[0].id`.
//! The expression is an operator and a JSON literal, e.g. `== "ready"`,
//! `>= 3`, `!= true`.

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use checks_core::probe::{probe, ProbeOutcome, ProbeRequest};
use checks_core::tls::TlsOptions;
use checks_core::{headers, Severity};

pub const CHECK_NAME: &str = "http-json";

#[derive(Debug, Clone)]
pub struct JsonCheck {
    pub url: String,
    /// Seconds.
    pub timeout: u64,
    pub headers: Vec<String>,
    pub query: String,
    pub expression: String,
    pub method: String,
    pub post_data: Option<String>,
    pub tls: TlsOptions,
}

impl JsonCheck {
    pub fn new(url: impl Into<String>, query: impl Into<String>, expression: impl Into<String>) -> Self {
        JsonCheck {
            url: url.into(),
            timeout: 15,
            headers: Vec::new(),
            query: query.into(),
            expression: expression.into(),
            method: "GET".to_string(),
            post_data: None,
            tls: TlsOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("--url or CHECK_URL environment variable is required");
        }
        if self.query.is_empty() {
            bail!("--query is required");
        }
        if self.expression.is_empty() {
            bail!("--expression is required");
        }
        headers::validate_headers(&self.headers)?;
        self.tls.validate()?;
        let has_data = self.post_data.as_deref().is_some_and(|d| !d.is_empty());
        if (self.method == "GET" && has_data) || (self.method == "POST" && !has_data) {
            bail!("malformed POST parameters");
        }
        Ok(())
    }

    pub async fn execute(&self) -> (Severity, String) {
        let mut request_headers = vec!["Accept: application/json".to_string()];
        request_headers.extend(self.headers.iter().cloned());
        let request = ProbeRequest {
            url: self.url.clone(),
            method: self.method.clone(),
            post_data: self.post_data.clone(),
            headers: request_headers,
            timeout: self.timeout,
            follow_redirects: true,
            tls: self.tls.clone(),
        };

        let body = match probe(&request).await {
            ProbeOutcome::Response(resp) => resp.body,
            ProbeOutcome::Failure { phase, error } => {
                return (
                    Severity::Critical,
                    format!("{CHECK_NAME} CRITICAL: error {phase}: {error}"),
                );
            }
        };

        let document: Value = match serde_json::from_slice(&body) {
            Ok(document) => document,
            Err(e) => {
                return (
                    Severity::Critical,
                    format!("{CHECK_NAME} CRITICAL: could not parse response body as JSON: {e}"),
                );
            }
        };

        let value = match query_value(&document, &self.query) {
            Ok(Some(value)) => value,
            Ok(None) => {
                return (
                    Severity::Critical,
                    format!(
                        "{CHECK_NAME} CRITICAL: No value was returned for query \"{}\"",
                        self.query
                    ),
                );
            }
            Err(e) => {
                return (
                    Severity::Critical,
                    format!(
                        "{CHECK_NAME} CRITICAL: Failed to parse query \"{}\": {e}",
                        self.query
                    ),
                );
            }
        };

        match evaluate_expression(value, &self.expression) {
            Ok(true) => (
                Severity::Ok,
                format!(
                    "{CHECK_NAME} OK: The value {value} found at {} matched with expression \"{}\" and returned true",
                    self.query, self.expression
                ),
            ),
            Ok(false) => (
                Severity::Critical,
                format!(
                    "{CHECK_NAME} CRITICAL: The value {value} found at {} did not match with expression \"{}\" and returned false",
                    self.query, self.expression
                ),
            ),
            Err(e) => (
                Severity::Critical,
                format!("{CHECK_NAME} CRITICAL: error evaluating expression: {e}"),
            ),
        }
    }
}

/// Walk a dot-path query over a document. `Ok(None)` means the path did
/// not match anything.
pub fn query_value<'a>(document: &'a Value, query: &str) -> Result<Option<&'a Value>> {
    let rest = query
        .strip_prefix('.')
        .ok_or_else(|| anyhow!("query must start with '.'"))?;
    let mut value = document;
    if rest.is_empty() {
        return Ok(Some(value));
    }
    for part in rest.split('.') {
        let (name, indexes) = split_indexes(part)?;
        if !name.is_empty() {
            match value.get(name) {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }
        for index in indexes {
            match value.get(index) {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }
    }
    Ok(Some(value))
}

/// Split `items[0][1]` into `("items", [0, 1])`.
fn split_indexes(part: &str) -> Result<(&str, Vec<usize>)> {
    let Some(open) = part.find('[') else {
        return Ok((part, Vec::new()));
    };
    let (name, mut rest) = part.split_at(open);
    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.split_once(']'))
            .ok_or_else(|| anyhow!("malformed index in query segment {part:?}"))?;
        let index: usize = inner
            .0
            .parse()
            .map_err(|_| anyhow!("malformed index in query segment {part:?}"))?;
        indexes.push(index);
        rest = inner.1;
    }
    Ok((name, indexes))
}

/// Evaluate `<op> <json literal>` against an extracted value.
pub fn evaluate_expression(value: &Value, expression: &str) -> Result<bool> {
    let expression = expression.trim();
    let (op, literal) = ["==", "!=", "<=", ">=", "<", ">"]
        .into_iter()
        .find_map(|op| expression.strip_prefix(op).map(|rest| (op, rest.trim())))
        .ok_or_else(|| anyhow!("expression {expression:?} must start with one of == != < <= > >="))?;
    let rhs: Value = serde_json::from_str(literal)
        .map_err(|e| anyhow!("invalid literal {literal:?} in expression: {e}"))?;

    match op {
        "==" => Ok(value == &rhs),
        "!=" => Ok(value != &rhs),
        _ => {
            let ordering = compare(value, &rhs).ok_or_else(|| {
                anyhow!("cannot order {value} against {rhs}; ordering needs two numbers or two strings")
            })?;
            Ok(match op {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                ">=" => ordering != Ordering::Less,
                _ => unreachable!(),
            })
        }
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
