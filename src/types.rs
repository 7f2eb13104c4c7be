// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Marker rendered for any field whose value could not be determined.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize,
    pub channel_capacity: usize,
    pub resolution: ResolutionMode,
    pub strategy: ProbeStrategy,
    pub http: HttpConfig,
    pub resolver: ResolverConfig,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 1,
            channel_capacity: 64,
            resolution: ResolutionMode::Dns,
            strategy: ProbeStrategy::ByAddress,
            http: HttpConfig::default(),
            resolver: ResolverConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// How candidate IPs are found for a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Live hostname lookup.
    Dns,
    /// Precomputed domain/IP/fronted table read from the input file.
    Table,
}

impl ResolutionMode {
    /// The probe strategy that naturally pairs with this resolution mode.
    pub fn default_strategy(self) -> ProbeStrategy {
        match self {
            ResolutionMode::Dns => ProbeStrategy::ByAddress,
            ResolutionMode::Table => ProbeStrategy::ByHost,
        }
    }
}

/// Where HTTP probes are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProbeStrategy {
    /// `http://<domain>/`, then `https://<domain>/`.
    #[value(name = "host")]
    ByHost,
    /// The candidate IP on port 80, then 443, with the domain as `Host`.
    #[value(name = "address")]
    ByAddress,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("WpFinder/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub timeout: Duration,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "8.8.4.4:53".to_string(),
                "1.1.1.1:53".to_string(),
                "1.0.0.1:53".to_string(),
            ],
            use_system_resolver: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub sort: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// One row of the precomputed resolution table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpBinding {
    pub domain: String,
    pub ip: String,
    pub fronted: bool,
}

/// Redirect state of a response whose headers were fetched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Redirect {
    None,
    To(String),
}

/// Outcome of probing one (domain, IP) pair, or a sentinel for a domain
/// without candidates. `None` in any field means "not available".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbeResult {
    pub domain: String,
    pub ip: Option<String>,
    pub server: Option<String>,
    pub platform: Option<bool>,
    pub redirect: Option<Redirect>,
}

impl ProbeResult {
    /// No candidate IP was found for the domain.
    pub fn unresolved(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ip: None,
            server: None,
            platform: None,
            redirect: None,
        }
    }

    /// The IP is known but no headers could be fetched over either protocol.
    pub fn unreachable(domain: &str, ip: &str) -> Self {
        Self {
            ip: Some(ip.to_string()),
            ..Self::unresolved(domain)
        }
    }

    /// Headers were fetched but the body could not be.
    pub fn headers_only(domain: &str, ip: &str, server: String) -> Self {
        Self {
            server: Some(server),
            ..Self::unreachable(domain, ip)
        }
    }

    pub fn complete(domain: &str, ip: &str, server: String, platform: bool, redirect: Redirect) -> Self {
        Self {
            domain: domain.to_string(),
            ip: Some(ip.to_string()),
            server: Some(server),
            platform: Some(platform),
            redirect: Some(redirect),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.ip.is_none()
    }

    pub fn to_row(&self) -> ProbeRow {
        ProbeRow::from(self)
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = self.to_row();
        write!(
            f,
            "{}; {}; {}; {}; {}",
            row.domain, row.ip, row.header, row.wp, row.redirect
        )
    }
}

/// Rendered view of a `ProbeResult`, with the column names sinks expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRow {
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "IP Addr")]
    pub ip: String,
    #[serde(rename = "Header")]
    pub header: String,
    #[serde(rename = "WP")]
    pub wp: String,
    #[serde(rename = "Redirect")]
    pub redirect: String,
}

impl ProbeRow {
    pub const COLUMNS: [&'static str; 5] = ["Domain", "IP Addr", "Header", "WP", "Redirect"];
}

impl From<&ProbeResult> for ProbeRow {
    fn from(result: &ProbeResult) -> Self {
        let or_na = |value: Option<&String>| {
            value.cloned().unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };

        Self {
            domain: result.domain.clone(),
            ip: or_na(result.ip.as_ref()),
            header: or_na(result.server.as_ref()),
            wp: match result.platform {
                Some(true) => "Yes".to_string(),
                Some(false) => "No".to_string(),
                None => NOT_AVAILABLE.to_string(),
            },
            redirect: match &result.redirect {
                Some(Redirect::To(url)) => url.clone(),
                Some(Redirect::None) => "No".to_string(),
                None => NOT_AVAILABLE.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub domains: usize,
    pub results: usize,
    pub unresolved: usize,
    pub unreachable: usize,
    pub headers_only: usize,
    pub duration: Duration,
    pub started_at: String,
}

impl RunStats {
    pub fn record(&mut self, result: &ProbeResult) {
        self.results += 1;
        if result.ip.is_none() {
            self.unresolved += 1;
        } else if result.server.is_none() {
            self.unreachable += 1;
        } else if result.platform.is_none() {
            self.headers_only += 1;
        }
    }

    pub fn merge(&mut self, other: RunStats) {
        self.domains += other.domains;
        self.results += other.results;
        self.unresolved += other.unresolved;
        self.unreachable += other.unreachable;
        self.headers_only += other.headers_only;
    }
}

#[derive(Debug, Error)]
pub enum WpFinderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Input error: {0}")]
    InputError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl WpFinderError {
    /// Errors that must abort the run before any worker starts.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            WpFinderError::ConfigError(_) | WpFinderError::InputError(_) | WpFinderError::CsvError(_)
        )
    }
}
