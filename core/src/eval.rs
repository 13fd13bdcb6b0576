//! Status/string evaluation shared by the check family. The rules form
//! an ordered priority list evaluated top to bottom; the first matching
//! rule decides the severity.

use reqwest::header::LOCATION;
use url::Url;

use crate::probe::{ProbeOutcome, ProbeResponse, NO_STATUS};
use crate::Severity;

/// What the evaluation cares about, independent of how the probe ran.
#[derive(Debug, Clone)]
pub struct EvalPolicy<'a> {
    /// Check name prefixed to every message.
    pub check_name: &'a str,
    /// URL that was requested.
    pub url: &'a str,
    /// Literal substring to search the body for; empty means status-only
    /// evaluation.
    pub search_string: &'a str,
    /// Whether a followed redirect counts as success.
    pub redirect_ok: bool,
}

/// Decide a severity and message for one probe outcome.
///
/// Rule order, first match wins:
/// 1. transport failure -> CRITICAL naming the failing phase
/// 2. search string configured -> OK iff the body contains it
/// 3. status >= 400 -> CRITICAL
/// 4. resolved URL differs and redirects allowed -> OK
/// 5. status >= 300 -> WARNING, with the Location target if present
/// 6. no usable status -> UNKNOWN
/// 7. otherwise -> OK
pub fn evaluate(policy: &EvalPolicy<'_>, outcome: &ProbeOutcome) -> (Severity, String) {
    let resp = match outcome {
        ProbeOutcome::Failure { phase, .. } => {
            return (
                Severity::Critical,
                format!("{} CRITICAL: error {}", policy.check_name, phase),
            );
        }
        ProbeOutcome::Response(resp) => resp,
    };

    if !policy.search_string.is_empty() {
        let body = String::from_utf8_lossy(&resp.body);
        return if body.contains(policy.search_string) {
            (
                Severity::Ok,
                format!(
                    "{} OK: found \"{}\" at {}",
                    policy.check_name, policy.search_string, resp.final_url
                ),
            )
        } else {
            (
                Severity::Critical,
                format!(
                    "{} CRITICAL: \"{}\" not found at {}",
                    policy.check_name, policy.search_string, resp.final_url
                ),
            )
        };
    }

    if resp.status >= 400 {
        return (
            Severity::Critical,
            format!(
                "{} CRITICAL: HTTP Status {} for {}",
                policy.check_name, resp.status, policy.url
            ),
        );
    }

    // A followed redirect terminates on a 2xx, so a redirect is detected
    // by comparing the resolved URL against the requested one rather
    // than by status code.
    if policy.redirect_ok && was_redirected(policy.url, resp) {
        return (
            Severity::Ok,
            format!(
                "{} OK: HTTP Status {} for {} (redirect from {})",
                policy.check_name, resp.status, resp.final_url, policy.url
            ),
        );
    }

    if resp.status >= 300 {
        let extra = resp
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|loc| format!(" (redirects to {loc})"))
            .unwrap_or_default();
        return (
            Severity::Warning,
            format!(
                "{} WARNING: HTTP Status {} for {}{}",
                policy.check_name, resp.status, policy.url, extra
            ),
        );
    }

    if resp.status == NO_STATUS {
        return (
            Severity::Unknown,
            format!(
                "{} UNKNOWN: HTTP Status {} for {}",
                policy.check_name, resp.status, policy.url
            ),
        );
    }

    (
        Severity::Ok,
        format!(
            "{} OK: HTTP Status {} for {}",
            policy.check_name, resp.status, policy.url
        ),
    )
}

fn was_redirected(requested: &str, resp: &ProbeResponse) -> bool {
    // Compare in normalized form; "http://host" and "http://host/" are
    // the same target.
    match Url::parse(requested) {
        Ok(url) => url.as_str() != resp.final_url,
        Err(_) => requested != resp.final_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbePhase;
    use reqwest::header::HeaderMap;

    fn policy<'a>(url: &'a str, search: &'a str, redirect_ok: bool) -> EvalPolicy<'a> {
        EvalPolicy {
            check_name: "http-check",
            url,
            search_string: search,
            redirect_ok,
        }
    }

    fn response(status: u16, body: &str, final_url: &str) -> ProbeOutcome {
        ProbeOutcome::Response(ProbeResponse {
            status,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
            final_url: final_url.to_string(),
        })
    }

    #[test]
    fn transport_failure_is_critical_and_names_the_phase() {
        let outcome = ProbeOutcome::Failure {
            phase: ProbePhase::Send,
            error: "connection refused".into(),
        };
        let (sev, msg) = evaluate(&policy("http://x/", "", false), &outcome);
        assert_eq!(sev, Severity::Critical);
        assert!(msg.contains("error making request"));
    }

    #[test]
    fn search_string_found_is_ok_regardless_of_status() {
        let outcome = response(500, "it was a SUCCESS after all", "http://x/");
        let (sev, msg) = evaluate(&policy("http://x/", "SUCCESS", false), &outcome);
        assert_eq!(sev, Severity::Ok);
        assert!(msg.contains("found \"SUCCESS\""));
    }

    #[test]
    fn search_string_missing_is_critical() {
        let outcome = response(200, "SUCCESS", "http://x/");
        let (sev, msg) = evaluate(&policy("http://x/", "FAILURE", false), &outcome);
        assert_eq!(sev, Severity::Critical);
        assert!(msg.contains("\"FAILURE\" not found"));
    }

    #[test]
    fn status_policy_without_search_string() {
        let p = policy("http://x/", "", false);
        let (sev, _) = evaluate(&p, &response(200, "", "http://x/"));
        assert_eq!(sev, Severity::Ok);
        let (sev, _) = evaluate(&p, &response(301, "", "http://x/"));
        assert_eq!(sev, Severity::Warning);
        let (sev, _) = evaluate(&p, &response(400, "", "http://x/"));
        assert_eq!(sev, Severity::Critical);
        let (sev, _) = evaluate(&p, &response(500, "", "http://x/"));
        assert_eq!(sev, Severity::Critical);
    }

    #[test]
    fn stopped_redirect_reports_location() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "https://elsewhere/".parse().unwrap());
        let outcome = ProbeOutcome::Response(ProbeResponse {
            status: 301,
            headers,
            body: Vec::new(),
            final_url: "http://x/".into(),
        });
        let (sev, msg) = evaluate(&policy("http://x/", "", false), &outcome);
        assert_eq!(sev, Severity::Warning);
        assert!(msg.contains("(redirects to https://elsewhere/)"));
    }

    #[test]
    fn followed_redirect_is_ok_and_names_both_urls() {
        let outcome = response(200, "", "http://x/new");
        let (sev, msg) = evaluate(&policy("http://x/old", "", true), &outcome);
        assert_eq!(sev, Severity::Ok);
        assert!(msg.contains("http://x/new"));
        assert!(msg.contains("(redirect from http://x/old)"));
    }

    #[test]
    fn unchanged_url_with_redirect_ok_is_plain_ok() {
        let outcome = response(200, "", "http://x/");
        let (sev, msg) = evaluate(&policy("http://x/", "", true), &outcome);
        assert_eq!(sev, Severity::Ok);
        assert!(!msg.contains("redirect from"));
    }

    #[test]
    fn sentinel_status_is_unknown() {
        let outcome = response(NO_STATUS, "", "http://x/");
        let (sev, msg) = evaluate(&policy("http://x/", "", false), &outcome);
        assert_eq!(sev, Severity::Unknown);
        assert!(msg.contains("UNKNOWN"));
    }
}
