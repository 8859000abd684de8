//! CLI for nsidenum.

mod output;

use clap::Parser;
use nsidenum_core::types::{
    DEFAULT_BASE_PORT, DEFAULT_DEST_PORT, DEFAULT_PATH_COUNT, DEFAULT_QUERY_CLASS,
    DEFAULT_QUERY_NAME, DEFAULT_QUERY_TYPE, DEFAULT_TIMEOUT_MS,
};
use nsidenum_core::{AddressFamily, EnumerationRequest, QuerySpec};
use output::OutputMode;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Enumerate the DNS servers behind an anycast address using NSID (RFC 5001).
#[derive(Parser, Debug)]
#[command(name = "nsidenum")]
#[command(version)]
#[command(about = "Enumerate the DNS servers behind an anycast address using NSID")]
pub struct Args {
    /// Target DNS resolver, IP address or hostname.
    #[arg(required = true)]
    pub target: String,

    /// The DNS name to query for.
    #[arg(short = 'n', long, default_value = DEFAULT_QUERY_NAME)]
    pub qname: String,

    /// The DNS query type to use.
    #[arg(short = 't', long, default_value = DEFAULT_QUERY_TYPE)]
    pub qtype: String,

    /// The DNS query class to use.
    #[arg(short = 'c', long, default_value = DEFAULT_QUERY_CLASS)]
    pub qclass: String,

    /// Milliseconds to wait for each DNS response.
    #[arg(short = 'T', long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// Base UDP source port; path N uses base + N.
    #[arg(short = 's', long, default_value_t = DEFAULT_BASE_PORT)]
    pub sport: u16,

    /// UDP destination port.
    #[arg(short = 'd', long, default_value_t = DEFAULT_DEST_PORT)]
    pub dport: u16,

    /// Number of paths (source ports) to enumerate.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PATH_COUNT)]
    pub paths: u16,

    /// Preset for a CHAOS TXT id.server. query with NSID.
    #[arg(long = "id-server")]
    pub id_server: bool,

    /// Force IPv4.
    #[arg(short = '4', long = "ipv4")]
    pub ipv4: bool,

    /// Force IPv6.
    #[arg(short = '6', long = "ipv6")]
    pub ipv6: bool,

    /// Print only the identifiers, one per line.
    #[arg(short, long)]
    pub quiet: bool,

    /// Log every probe.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the results as JSON.
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Convert CLI args to an EnumerationRequest.
    fn to_request(&self) -> Result<EnumerationRequest, String> {
        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".into());
        }
        if self.timeout < 1 || self.timeout > u16::MAX as u64 {
            return Err("Timeout must be a number between 1 and 65535".into());
        }

        let family = AddressFamily::from_flags(self.ipv4, self.ipv6).map_err(|e| e.to_string())?;

        let query = if self.id_server {
            QuerySpec::id_server()
        } else {
            QuerySpec::from_mnemonics(&self.qname, &self.qtype, &self.qclass)
                .map_err(|e| e.to_string())?
        };

        let request = EnumerationRequest {
            target: self.target.clone(),
            family,
            query,
            dest_port: self.dport,
            base_port: self.sport,
            path_count: self.paths,
            timeout: Duration::from_millis(self.timeout),
        };
        request.validate().map_err(|e| e.to_string())?;

        Ok(request)
    }

    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Numbered
        }
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet || self.json {
            "warn"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for results.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let request = match args.to_request() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.id_server && !args.quiet {
        tracing::warn!("Using --id-server overrides --qname, --qclass and --qtype");
    }

    let results = match nsidenum_core::enumerate(&request).await {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    match output::write_results(&results, args.output_mode(), &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to write results: {}", e);
            ExitCode::FAILURE
        }
    }
}
