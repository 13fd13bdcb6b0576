//! HTTP status/string check for many endpoints in one pass.
//!
//! A declarative endpoint list (inline JSON or a file) is resolved
//! against global defaults, each endpoint is probed and evaluated in
//! list order, and the individual severities are aggregated into one
//! overall result. Endpoints flagged `create-event` report through a
//! monitoring events API instead of the aggregate.

pub mod endpoint;
pub mod event;
pub mod runner;

pub use endpoint::{resolve, Endpoint, EndpointDefaults, ResolveError, CHECK_NAME};
pub use runner::{run, AggregateReport, EndpointResult, RunOptions};
