//! Sequential fan-out over the resolved endpoint list and aggregation
//! of the per-endpoint severities into one overall result.

use checks_core::eval::{evaluate, EvalPolicy};
use checks_core::probe::probe;
use checks_core::Severity;

use crate::endpoint::{Endpoint, CHECK_NAME};
use crate::event;

/// Run-wide toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Render events instead of POSTing them.
    pub dry_run: bool,
    /// Aside from the overall status, only output failures.
    pub suppress_ok_output: bool,
}

/// Evaluated outcome for one endpoint, in resolver order.
#[derive(Debug)]
pub struct EndpointResult {
    pub endpoint: Endpoint,
    pub severity: Severity,
    pub output: String,
}

/// Final output of one pass: the overall severity, rendered lines, any
/// dry-run event renderings and the accumulated non-fatal errors.
#[derive(Debug)]
pub struct AggregateReport {
    /// Worst severity among endpoints that did not request event
    /// creation. OK when every endpoint delegated to the events sink.
    pub overall: Severity,
    pub lines: Vec<String>,
    pub event_output: Vec<String>,
    pub errors: Vec<String>,
}

impl AggregateReport {
    /// All accumulated non-fatal errors combined into one reportable
    /// value, or `None` if the run was clean.
    pub fn combined_error(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// Probe and evaluate every endpoint in list order. A transport failure
/// on one endpoint is recorded as its CRITICAL result and the pass
/// continues; one unreachable endpoint must not mask the rest.
pub async fn run(endpoints: Vec<Endpoint>, opts: RunOptions) -> AggregateReport {
    let mut results = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let outcome = probe(&endpoint.probe_request()).await;
        let policy = EvalPolicy {
            check_name: CHECK_NAME,
            url: &endpoint.url,
            search_string: &endpoint.search_string,
            redirect_ok: endpoint.redirect_ok,
        };
        let (severity, output) = evaluate(&policy, &outcome);
        results.push(EndpointResult {
            endpoint,
            severity,
            output,
        });
    }

    let mut report = AggregateReport {
        overall: Severity::Ok,
        lines: Vec::new(),
        event_output: Vec::new(),
        errors: Vec::new(),
    };

    for result in &results {
        if result.endpoint.create_event {
            // Health for these endpoints is reported through the emitted
            // event; they never feed the overall severity.
            let ev = event::Event::for_endpoint(&result.endpoint, result.severity, &result.output);
            if opts.dry_run {
                report
                    .event_output
                    .push(event::render_dry_run(&result.endpoint, &ev));
            } else if let Err(e) = event::post(&result.endpoint, &ev).await {
                report.errors.push(format!("{e:#}"));
            }
        } else {
            report.overall = report.overall.max(result.severity);
        }
    }

    for result in &results {
        if result.severity > Severity::Ok || !opts.suppress_ok_output {
            report.lines.push(format!(
                "URL: {} Status: {} Output: {}",
                result.endpoint.url,
                result.severity.code(),
                result.output
            ));
        }
    }

    report
}
