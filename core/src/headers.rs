//! Parsing for `"Name: Value"` header arguments shared by every check.

use anyhow::{bail, Result};

/// Split a header argument on the first colon, trimming whitespace from
/// both the name and the value.
pub fn split_header(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) => Ok((name.trim(), value.trim())),
        None => bail!(
            "--header {:?} value malformed should be \"Header-Name: Header Value\"",
            raw
        ),
    }
}

/// Validate a list of header arguments without applying them.
pub fn validate_headers(headers: &[String]) -> Result<()> {
    for header in headers {
        split_header(header)?;
    }
    Ok(())
}

/// True when the header name selects the request's virtual host instead
/// of being sent literally.
pub fn is_host_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon() {
        let (name, value) = split_header("X-Token: abc:def").unwrap();
        assert_eq!(name, "X-Token");
        assert_eq!(value, "abc:def");
    }

    #[test]
    fn trims_whitespace() {
        let (name, value) = split_header("  Accept :  text/html ").unwrap();
        assert_eq!(name, "Accept");
        assert_eq!(value, "text/html");
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(split_header("not-a-header").is_err());
        assert!(validate_headers(&["A: 1".into(), "broken".into()]).is_err());
    }

    #[test]
    fn host_detection_is_case_insensitive() {
        assert!(is_host_header("Host"));
        assert!(is_host_header("HOST"));
        assert!(!is_host_header("X-Host"));
    }
}
