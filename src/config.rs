use crate::cli::Args;
use crate::error::{ErrorContext, Result};
use crate::types::{Config, OutputFormat, ResolutionMode, WpFinderError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Partial settings from one configuration layer (file, environment or CLI).
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub threads: Option<i64>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub insecure: Option<bool>,
    pub nameservers: Option<Vec<String>>,
    pub use_system_resolver: Option<bool>,
    pub channel_capacity: Option<usize>,
}

/// Builds the run configuration: defaults, then the config file, then the
/// environment, then command line flags.
pub fn load_config(args: &Args) -> Result<Config> {
    let mut settings = match args.config_path.as_deref() {
        Some(path) => read_config_file(path)?,
        None => Settings::default(),
    };

    apply_env_overrides(&mut settings, |key| env::var(key).ok())?;
    apply_args(&mut settings, args);

    let config = build_config(settings, args)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn read_config_file(path: &str) -> Result<Settings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;

    toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))
}

pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(threads) = lookup("WPFINDER_THREADS") {
        let threads = threads
            .trim()
            .parse::<i64>()
            .with_context(|| "Invalid WPFINDER_THREADS".to_string())?;
        settings.threads = Some(threads);
    }
    if let Some(timeout) = lookup("WPFINDER_TIMEOUT") {
        let timeout = timeout
            .trim()
            .parse::<u64>()
            .with_context(|| "Invalid WPFINDER_TIMEOUT".to_string())?;
        settings.timeout_secs = Some(timeout);
    }
    if let Some(user_agent) = lookup("WPFINDER_USER_AGENT") {
        settings.user_agent = Some(user_agent);
    }
    if let Some(proxy) = lookup("WPFINDER_PROXY") {
        settings.proxy = Some(proxy);
    }
    Ok(())
}

fn apply_args(settings: &mut Settings, args: &Args) {
    if args.threads.is_some() {
        settings.threads = args.threads;
    }
    if args.timeout.is_some() {
        settings.timeout_secs = args.timeout;
    }
    if args.insecure {
        settings.insecure = Some(true);
    }
    if !args.nameservers.is_empty() {
        settings.nameservers = Some(args.nameservers.clone());
        settings.use_system_resolver = Some(false);
    }
}

pub fn build_config(settings: Settings, args: &Args) -> Result<Config> {
    let mut config = Config::default();

    let threads = settings.threads.unwrap_or(1);
    if threads <= 0 {
        return Err(WpFinderError::ConfigError(
            "the number of threads must be greater than 0".to_string(),
        ));
    }
    config.concurrency = usize::try_from(threads)
        .with_context(|| format!("Invalid number of threads {}", threads))?;

    if let Some(capacity) = settings.channel_capacity {
        config.channel_capacity = capacity;
    }

    config.resolution = if args.subdomain_table {
        ResolutionMode::Table
    } else {
        ResolutionMode::Dns
    };
    config.strategy = args
        .probe_by
        .unwrap_or_else(|| config.resolution.default_strategy());

    if let Some(secs) = settings.timeout_secs {
        config.http.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = settings.connect_timeout_secs {
        config.http.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(user_agent) = settings.user_agent {
        config.http.user_agent = user_agent;
    }
    config.http.proxy = settings.proxy;
    config.http.accept_invalid_certs = settings.insecure.unwrap_or(false);

    if let Some(nameservers) = settings.nameservers {
        config.resolver.nameservers = nameservers;
        config.resolver.use_system_resolver = false;
    }
    if let Some(use_system) = settings.use_system_resolver {
        config.resolver.use_system_resolver = use_system;
    }
    config.resolver.timeout = config.http.timeout.min(config.resolver.timeout);

    config.output.file = args.output_file.clone();
    config.output.sort = args.sort;
    config.output.format = if args.json {
        OutputFormat::Json
    } else if args.csv || args.output_file.is_some() {
        OutputFormat::Csv
    } else {
        OutputFormat::Text
    };

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.concurrency == 0 {
        return Err(WpFinderError::ConfigError(
            "the number of threads must be greater than 0".to_string(),
        ));
    }
    if config.http.timeout.as_secs() == 0 {
        return Err(WpFinderError::ConfigError("timeout must be greater than 0".to_string()));
    }
    if config.channel_capacity == 0 {
        return Err(WpFinderError::ConfigError(
            "channel capacity must be greater than 0".to_string(),
        ));
    }
    if !config.resolver.use_system_resolver {
        if config.resolver.nameservers.is_empty() {
            return Err(WpFinderError::ConfigError("no nameservers configured".to_string()));
        }
        for ns in &config.resolver.nameservers {
            SocketAddr::from_str(ns)
                .with_context(|| format!("Invalid nameserver address {}", ns))?;
        }
    }
    Ok(())
}
