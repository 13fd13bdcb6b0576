use std::fmt;

/// Check outcome severity. Declaration order matches the numeric codes
/// shared by the whole check family, so `max` picks the worst result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Severity {
    /// Numeric code as exposed in output lines, events and the process
    /// exit status.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
            Severity::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_protocol() {
        assert_eq!(Severity::Ok.code(), 0);
        assert_eq!(Severity::Warning.code(), 1);
        assert_eq!(Severity::Critical.code(), 2);
        assert_eq!(Severity::Unknown.code(), 3);
    }

    #[test]
    fn max_picks_worst() {
        assert_eq!(Severity::Ok.max(Severity::Critical), Severity::Critical);
        assert_eq!(Severity::Critical.max(Severity::Unknown), Severity::Unknown);
        assert!(Severity::Warning > Severity::Ok);
    }

    #[test]
    fn display_names() {
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Unknown.to_string(), "UNKNOWN");
    }
}
