// src/session.rs
use crate::types::{HttpConfig, ProbeStrategy, WpFinderError};
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};

/// Redirect hops a body fetch may follow before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// HTTP clients shared by every worker for the whole run.
#[derive(Clone)]
pub struct Session {
    /// Never follows redirects, so `Location` stays visible. Also used for
    /// requests pinned to an IP, whose redirects are followed by hand.
    pub direct_client: Client,
    /// Follows redirects to classify the final page.
    pub body_client: Client,
}

impl Session {
    pub fn new(config: &HttpConfig, strategy: ProbeStrategy) -> Result<Self, WpFinderError> {
        // An IP literal never matches the certificate's name.
        let accept_invalid_certs =
            config.accept_invalid_certs || strategy == ProbeStrategy::ByAddress;

        let direct_client = Self::builder(config, accept_invalid_certs)?
            .redirect(Policy::none())
            .build()
            .map_err(|e| WpFinderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let body_client = Self::builder(config, accept_invalid_certs)?
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| WpFinderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            direct_client,
            body_client,
        })
    }

    fn builder(config: &HttpConfig, accept_invalid_certs: bool) -> Result<ClientBuilder, WpFinderError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .pool_max_idle_per_host(2);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| WpFinderError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }
}
