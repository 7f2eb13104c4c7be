use crate::types::ProbeStrategy;
use clap::Parser;
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("GIT_BRANCH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser, Debug, Clone)]
#[command(
    name = "wpfinder",
    version,
    long_version = LONG_VERSION,
    about = "Bulk server banner, WordPress and redirect reconnaissance",
    long_about = "WpFinder resolves a list of domains to their IP addresses and probes each one over HTTP,\nreporting the Server header, whether the site runs WordPress and where it redirects."
)]
pub struct Args {
    /// CSV file with one domain per row (or domain,ip,fronted rows with --sf)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Target domain(s) to probe
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: Vec<String>,

    /// Number of concurrent workers
    #[arg(short = 't', long = "threads", allow_negative_numbers = true)]
    pub threads: Option<i64>,

    /// Output file (CSV unless --json is given)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Input is a subdomain table (domain,ip,fronted); fronted rows are skipped
    #[arg(long = "sf")]
    pub subdomain_table: bool,

    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,

    /// Output in CSV format
    #[arg(long = "csv", conflicts_with = "json")]
    pub csv: bool,

    /// Sort results by domain and IP before writing them
    #[arg(long = "sort")]
    pub sort: bool,

    /// Probe by host name or directly by resolved address
    #[arg(long = "probe-by", value_enum)]
    pub probe_by: Option<ProbeStrategy>,

    /// Per-request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long = "insecure")]
    pub insecure: bool,

    /// DNS nameserver(s) to use instead of the system resolver
    #[arg(long = "nameserver", value_name = "IP:PORT")]
    pub nameservers: Vec<String>,

    /// Silent mode (only output results)
    #[arg(long = "silent")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

impl Args {
    /// Domains are piped in on stdin
    pub fn use_stdin(&self) -> bool {
        self.domain.is_empty() && self.file.is_none() && !atty::is(atty::Stream::Stdin)
    }
}
