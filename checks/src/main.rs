use clap::{Parser, Subcommand};
#[cfg(any(
    feature = "endpoints",
    feature = "status",
    feature = "perf",
    feature = "json",
    feature = "get"
))]
use clap::Args;
use std::path::PathBuf;

use checks_core::Severity;
#[cfg(any(
    feature = "endpoints",
    feature = "status",
    feature = "perf",
    feature = "json",
    feature = "get"
))]
use checks_core::tls::TlsOptions;
#[cfg(feature = "get")]
use checks_core::{headers, probe};

#[cfg(feature = "endpoints")]
mod config;

#[cfg(any(
    feature = "endpoints",
    feature = "status",
    feature = "perf",
    feature = "json",
    feature = "get"
))]
#[derive(Debug, Args)]
struct RequestArgs {
    /// URL to test
    #[arg(short = 'u', long, env = "CHECK_URL", default_value = "http://localhost:80/")]
    url: String,
    /// Additional header(s) to send in check request ("Name: Value")
    #[arg(short = 'H', long = "header")]
    header: Vec<String>,
    /// Request timeout in seconds
    #[arg(short = 'T', long, default_value_t = 15)]
    timeout: u64,
    /// TLS CA certificate bundle in PEM format
    #[arg(short = 't', long)]
    trusted_ca_file: Option<PathBuf>,
    /// Skip TLS certificate verification (not recommended!)
    #[arg(short = 'i', long, default_value_t = false)]
    insecure_skip_verify: bool,
    /// Key file for mutual TLS auth in PEM format
    #[arg(short = 'K', long)]
    mtls_key_file: Option<PathBuf>,
    /// Certificate file for mutual TLS auth in PEM format
    #[arg(short = 'C', long)]
    mtls_cert_file: Option<PathBuf>,
}

#[cfg(any(
    feature = "endpoints",
    feature = "status",
    feature = "perf",
    feature = "json",
    feature = "get"
))]
impl RequestArgs {
    fn tls(&self) -> TlsOptions {
        TlsOptions {
            trusted_ca_file: self.trusted_ca_file.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
            mtls_cert_file: self.mtls_cert_file.clone(),
            mtls_key_file: self.mtls_key_file.clone(),
        }
    }
}

#[cfg(any(feature = "status", feature = "perf", feature = "json"))]
#[derive(Debug, Args)]
struct BodyArgs {
    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,
    /// Data to send via POST method
    #[arg(short = 'p', long = "post-data")]
    post_data: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "checks", version, about = "HTTP(S) monitoring checks")]
struct Cli {
    /// Optional defaults file (YAML). If omitted, loads ./checks.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// HTTP status/string check for multiple endpoints
    #[cfg(feature = "endpoints")]
    Endpoints {
        /// JSON array of endpoint descriptors
        #[arg(short = 'e', long)]
        endpoints: Option<String>,
        /// File containing the JSON array of endpoint descriptors
        #[arg(long, value_name = "FILE")]
        endpoints_file: Option<PathBuf>,
        /// Do not create events; output the events that would have been created
        #[arg(short = 'n', long, default_value_t = false)]
        dry_run: bool,
        /// Aside from overall status, only output failures
        #[arg(short = 'S', long, default_value_t = false)]
        suppress_ok_output: bool,
        /// String to search for; if not provided do status check only
        #[arg(short = 's', long, env = "CHECK_SEARCH_STRING", default_value = "")]
        search_string: String,
        /// Allow redirects
        #[arg(short = 'r', long, default_value_t = false)]
        redirect_ok: bool,
        /// Create an event per endpoint instead of aggregating
        #[arg(long, default_value_t = false)]
        create_event: bool,
        /// Entity name to use in generated events
        #[arg(long, default_value = "")]
        event_entity_name: String,
        /// Check name to use in generated events
        #[arg(long, default_value = "")]
        event_check_name: String,
        /// Comma separated list of handlers to use in generated events
        #[arg(long, value_delimiter = ',')]
        event_handlers: Vec<String>,
        /// Events API endpoint used when generating events
        #[arg(long, default_value = "http://localhost:3031/events")]
        events_api: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Single-URL HTTP status/string check
    #[cfg(feature = "status")]
    Status {
        /// String to search for; if not provided do status check only
        #[arg(short = 's', long, env = "CHECK_SEARCH_STRING", default_value = "")]
        search_string: String,
        /// Allow redirects
        #[arg(short = 'r', long, default_value_t = false)]
        redirect_ok: bool,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// HTTP response time check with warning/critical thresholds
    #[cfg(feature = "perf")]
    Perf {
        /// Warning threshold, seconds or milliseconds (1s = 1000ms)
        #[arg(short = 'w', long, default_value = "1s")]
        warning: String,
        /// Critical threshold, seconds or milliseconds (1s = 1000ms)
        #[arg(short = 'c', long, default_value = "2s")]
        critical: String,
        /// Provide output in milliseconds (default: seconds)
        #[arg(short = 'm', long, default_value_t = false)]
        output_in_ms: bool,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// HTTP JSON query/expression check
    #[cfg(feature = "json")]
    Json {
        /// Query as a dot path (e.g. .status or .items[0].id)
        #[arg(short = 'q', long, default_value = "")]
        query: String,
        /// Expression for comparing the query result (e.g. '== "ready"')
        #[arg(short = 'e', long, default_value = "")]
        expression: String,
        #[command(flatten)]
        body: BodyArgs,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Perform a GET and print the response body
    #[cfg(feature = "get")]
    Get {
        #[command(flatten)]
        request: RequestArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    let severity = dispatch(cli);
    std::process::exit(i32::from(severity.code()));
}

#[cfg(any(
    feature = "endpoints",
    feature = "status",
    feature = "perf",
    feature = "json",
    feature = "get"
))]
fn runtime() -> Result<tokio::runtime::Runtime, Severity> {
    tokio::runtime::Runtime::new().map_err(|e| {
        println!("UNKNOWN: failed to start runtime: {e}");
        Severity::Unknown
    })
}

fn dispatch(cli: Cli) -> Severity {
    #[cfg(feature = "endpoints")]
    let loaded_cfg = config::load_config(cli.config.as_deref());
    match cli.command {
        Commands::Version => {
            println!(
                "checks {} (core {})",
                env!("CARGO_PKG_VERSION"),
                checks_core::version()
            );
            Severity::Ok
        }
        #[cfg(feature = "endpoints")]
        Commands::Endpoints {
            endpoints,
            endpoints_file,
            dry_run,
            suppress_ok_output,
            mut search_string,
            mut redirect_ok,
            create_event,
            event_entity_name,
            event_check_name,
            event_handlers,
            mut events_api,
            request,
        } => {
            use http_endpoints::{resolve, EndpointDefaults, RunOptions, CHECK_NAME};

            let mut url = request.url.clone();
            let mut headers = request.header.clone();
            let mut timeout = request.timeout;
            if let Some(cfg) = loaded_cfg.as_ref().and_then(|c| c.endpoints.as_ref()) {
                if let Some(u) = &cfg.url { url = u.clone(); }
                if let Some(s) = &cfg.search_string { search_string = s.clone(); }
                if let Some(r) = cfg.redirect_ok { redirect_ok = r; }
                if let Some(t) = cfg.timeout { timeout = t; }
                if let Some(h) = &cfg.header { headers = h.clone(); }
                if let Some(api) = &cfg.events_api { events_api = api.clone(); }
            }

            let path_string = |p: &Option<PathBuf>| {
                p.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
            };
            let defaults = EndpointDefaults {
                url,
                headers,
                search_string,
                redirect_ok,
                timeout,
                mtls_key_file: path_string(&request.mtls_key_file),
                mtls_cert_file: path_string(&request.mtls_cert_file),
                trusted_ca_file: path_string(&request.trusted_ca_file),
                insecure_skip_verify: request.insecure_skip_verify,
                create_event,
                entity_name: event_entity_name,
                check_name: event_check_name,
                handlers: event_handlers,
                events_api,
            };

            let resolved = match resolve(
                endpoints.as_deref(),
                endpoints_file.as_deref(),
                &defaults,
            ) {
                Ok(resolved) => resolved,
                Err(e) => {
                    println!("{} {}: {}", CHECK_NAME, e.severity(), e);
                    return e.severity();
                }
            };

            let rt = match runtime() {
                Ok(rt) => rt,
                Err(sev) => return sev,
            };
            let opts = RunOptions {
                dry_run,
                suppress_ok_output,
            };
            let report = rt.block_on(http_endpoints::run(resolved, opts));

            if opts.dry_run {
                println!("\nDry-run:: Events requested:");
                for rendered in &report.event_output {
                    println!("{rendered}");
                }
                println!("\nDry-run:: Normal Output:");
            }
            for line in &report.lines {
                println!("{line}");
            }
            if let Some(error) = report.combined_error() {
                eprintln!("{error}");
            }
            report.overall
        }
        #[cfg(feature = "status")]
        Commands::Status {
            search_string,
            redirect_ok,
            body,
            request,
        } => {
            let mut check = http_status::StatusCheck::new(request.url.clone());
            check.search_string = search_string;
            check.redirect_ok = redirect_ok;
            check.timeout = request.timeout;
            check.headers = request.header.clone();
            check.method = body.method;
            check.post_data = body.post_data;
            check.tls = request.tls();
            if let Err(e) = check.validate() {
                println!("{} WARNING: {e:#}", http_status::CHECK_NAME);
                return Severity::Warning;
            }
            let rt = match runtime() {
                Ok(rt) => rt,
                Err(sev) => return sev,
            };
            let (severity, message) = rt.block_on(check.execute());
            println!("{message}");
            severity
        }
        #[cfg(feature = "perf")]
        Commands::Perf {
            warning,
            critical,
            output_in_ms,
            body,
            request,
        } => {
            let warning = match http_perf::parse_threshold(&warning) {
                Ok(warning) => warning,
                Err(e) => {
                    println!("{} CRITICAL: {e:#}", http_perf::CHECK_NAME);
                    return Severity::Critical;
                }
            };
            let critical = match http_perf::parse_threshold(&critical) {
                Ok(critical) => critical,
                Err(e) => {
                    println!("{} CRITICAL: {e:#}", http_perf::CHECK_NAME);
                    return Severity::Critical;
                }
            };
            let mut check = http_perf::PerfCheck::new(request.url.clone());
            check.timeout = request.timeout;
            check.warning = warning;
            check.critical = critical;
            check.output_in_ms = output_in_ms;
            check.headers = request.header.clone();
            check.method = body.method;
            check.post_data = body.post_data;
            check.tls = request.tls();
            if let Err(e) = check.validate() {
                println!("{} WARNING: {e:#}", http_perf::CHECK_NAME);
                return Severity::Warning;
            }
            let rt = match runtime() {
                Ok(rt) => rt,
                Err(sev) => return sev,
            };
            let (severity, message) = rt.block_on(check.execute());
            println!("{message}");
            severity
        }
        #[cfg(feature = "json")]
        Commands::Json {
            query,
            expression,
            body,
            request,
        } => {
            let mut check = http_json::JsonCheck::new(request.url.clone(), query, expression);
            check.timeout = request.timeout;
            check.headers = request.header.clone();
            check.method = body.method;
            check.post_data = body.post_data;
            check.tls = request.tls();
            if let Err(e) = check.validate() {
                println!("{} WARNING: {e:#}", http_json::CHECK_NAME);
                return Severity::Warning;
            }
            let rt = match runtime() {
                Ok(rt) => rt,
                Err(sev) => return sev,
            };
            let (severity, message) = rt.block_on(check.execute());
            println!("{message}");
            severity
        }
        #[cfg(feature = "get")]
        Commands::Get { request } => {
            if request.url.is_empty() {
                println!("http-get WARNING: --url or CHECK_URL environment variable is required");
                return Severity::Warning;
            }
            if let Err(e) = headers::validate_headers(&request.header) {
                println!("http-get WARNING: {e:#}");
                return Severity::Warning;
            }
            let tls = request.tls();
            if let Err(e) = tls.validate() {
                println!("http-get WARNING: {e:#}");
                return Severity::Warning;
            }
            let probe_request = probe::ProbeRequest {
                url: request.url.clone(),
                method: "GET".to_string(),
                post_data: None,
                headers: request.header.clone(),
                timeout: request.timeout,
                follow_redirects: true,
                tls,
            };
            let rt = match runtime() {
                Ok(rt) => rt,
                Err(sev) => return sev,
            };
            match rt.block_on(probe::probe(&probe_request)) {
                probe::ProbeOutcome::Response(resp) => {
                    use std::io::Write;
                    let _ = std::io::stdout().write_all(&resp.body);
                    Severity::Ok
                }
                probe::ProbeOutcome::Failure { phase, error } => {
                    println!("http-get CRITICAL: error {phase}: {error}");
                    Severity::Critical
                }
            }
        }
    }
}
