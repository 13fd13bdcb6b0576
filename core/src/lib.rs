//! Shared building blocks for the HTTP check family: severity codes,
//! header parsing, TLS policy, the single-request probe and the
//! status/string evaluation rules.

pub mod eval;
pub mod headers;
pub mod probe;
pub mod severity;
pub mod tls;

pub use severity::Severity;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
