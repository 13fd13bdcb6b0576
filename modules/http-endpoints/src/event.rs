//! Monitoring events for endpoints flagged `create-event`. In dry-run
//! mode the event is rendered into the report; in live mode it is
//! POSTed to the endpoint's events API.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use checks_core::Severity;

use crate::endpoint::Endpoint;

/// Wire format accepted by the events API.
#[derive(Debug, Serialize)]
pub struct Event {
    pub entity: Entity,
    pub check: Check,
}

#[derive(Debug, Serialize)]
pub struct Entity {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub status: u8,
    pub output: String,
    pub handlers: Vec<String>,
}

impl Event {
    pub fn for_endpoint(endpoint: &Endpoint, severity: Severity, output: &str) -> Self {
        Event {
            entity: Entity {
                name: endpoint.entity_name.clone(),
            },
            check: Check {
                name: endpoint.check_name.clone(),
                status: severity.code(),
                output: output.to_string(),
                handlers: endpoint.handlers.clone(),
            },
        }
    }
}

/// Render the event's fields and would-be destination instead of
/// transmitting it.
pub fn render_dry_run(endpoint: &Endpoint, event: &Event) -> String {
    let payload = serde_json::to_string(event).unwrap_or_default();
    format!(
        "URL: {}\n  Entity Name: {}\n  Check Name: {}\n  Check Status: {}\n  Check Output: {}\n  Event API: {}\n  Event Data: {}",
        endpoint.url,
        event.entity.name,
        event.check.name,
        event.check.status,
        event.check.output,
        endpoint.events_api,
        payload,
    )
}

/// POST the event as JSON to the endpoint's events API. Failures here
/// are non-fatal to the run; the caller accumulates them.
pub async fn post(endpoint: &Endpoint, event: &Event) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(endpoint.timeout))
        .build()
        .context("failed to build events API client")?;
    let resp = client
        .post(&endpoint.events_api)
        .json(event)
        .send()
        .await
        .with_context(|| {
            format!(
                "the HTTP request to create event for {} failed",
                endpoint.url
            )
        })?;
    if !resp.status().is_success() {
        bail!(
            "events API {} returned HTTP {} for {}",
            endpoint.events_api,
            resp.status().as_u16(),
            endpoint.url
        );
    }
    Ok(())
}
