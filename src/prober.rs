// src/prober.rs
use crate::session::{Session, MAX_REDIRECTS};
use crate::types::{ProbeStrategy, WpFinderError};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, HOST, LOCATION};
use reqwest::{Client, Response};
use std::fmt;
use std::net::IpAddr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request over a single protocol. Any response, whatever its
/// status, is a success; only transport failures and timeouts are errors.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Header-only request (`HEAD`).
    async fn head(&self, scheme: Scheme, domain: &str, ip: &str) -> Result<HeaderMap, WpFinderError>;

    /// Full `GET`, returning the response body.
    async fn get(&self, scheme: Scheme, domain: &str, ip: &str) -> Result<Vec<u8>, WpFinderError>;
}

/// Fetches headers over http, falling back once to https.
pub async fn fetch_headers(prober: &dyn Prober, domain: &str, ip: &str) -> Result<HeaderMap, WpFinderError> {
    match prober.head(Scheme::Http, domain, ip).await {
        Ok(headers) => Ok(headers),
        Err(e) => {
            debug!("HEAD over http failed for {} ({}): {}, retrying over https", domain, ip, e);
            prober.head(Scheme::Https, domain, ip).await
        }
    }
}

/// Fetches the body over http, falling back once to https. Independent of
/// whichever protocol served the headers.
pub async fn fetch_body(prober: &dyn Prober, domain: &str, ip: &str) -> Result<Vec<u8>, WpFinderError> {
    match prober.get(Scheme::Http, domain, ip).await {
        Ok(body) => Ok(body),
        Err(e) => {
            debug!("GET over http failed for {} ({}): {}, retrying over https", domain, ip, e);
            prober.get(Scheme::Https, domain, ip).await
        }
    }
}

/// `Prober` backed by real HTTP requests.
pub struct HttpProber {
    session: Session,
    strategy: ProbeStrategy,
    http_port: u16,
    https_port: u16,
}

impl HttpProber {
    pub fn new(session: Session, strategy: ProbeStrategy) -> Self {
        Self {
            session,
            strategy,
            http_port: Scheme::Http.default_port(),
            https_port: Scheme::Https.default_port(),
        }
    }

    /// Ports used by `ProbeStrategy::ByAddress` instead of 80 and 443.
    pub fn with_ports(mut self, http_port: u16, https_port: u16) -> Self {
        self.http_port = http_port;
        self.https_port = https_port;
        self
    }

    fn port(&self, scheme: Scheme) -> u16 {
        match scheme {
            Scheme::Http => self.http_port,
            Scheme::Https => self.https_port,
        }
    }

    /// URL for one probe, plus the `Host` header when it differs from the URL host.
    pub fn target(&self, scheme: Scheme, domain: &str, ip: &str) -> Result<(Url, Option<HeaderValue>), WpFinderError> {
        match self.strategy {
            ProbeStrategy::ByHost => {
                let url = Url::parse(&format!("{}://{}/", scheme, domain))
                    .map_err(|e| WpFinderError::NetworkError(format!("Invalid URL for {}: {}", domain, e)))?;
                Ok((url, None))
            }
            ProbeStrategy::ByAddress => {
                let addr: IpAddr = ip
                    .parse()
                    .map_err(|e| WpFinderError::NetworkError(format!("Invalid IP address {}: {}", ip, e)))?;
                let host = match addr {
                    IpAddr::V4(v4) => v4.to_string(),
                    IpAddr::V6(v6) => format!("[{}]", v6),
                };
                let url = Url::parse(&format!("{}://{}:{}/", scheme, host, self.port(scheme)))
                    .map_err(|e| WpFinderError::NetworkError(format!("Invalid URL for {}: {}", ip, e)))?;
                let host_header = HeaderValue::from_str(domain)
                    .map_err(|e| WpFinderError::NetworkError(format!("Invalid host {}: {}", domain, e)))?;
                Ok((url, Some(host_header)))
            }
        }
    }
}

async fn send(client: &Client, url: &Url, host: Option<&HeaderValue>) -> Result<Response, WpFinderError> {
    let mut request = client.get(url.clone());
    if let Some(host) = host {
        request = request.header(HOST, host.clone());
    }
    request.send().await.map_err(|e| network_error(url, e))
}

async fn read_body(url: &Url, response: Response) -> Result<Vec<u8>, WpFinderError> {
    debug!("GET {} -> {}", url, response.status());
    let body = response.bytes().await.map_err(|e| network_error(url, e))?;
    Ok(body.to_vec())
}

/// Absolute target of a redirect response, if it has a usable `Location`.
fn redirect_location(url: &Url, response: &Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    url.join(location).ok()
}

fn network_error(url: &Url, e: reqwest::Error) -> WpFinderError {
    if e.is_timeout() {
        WpFinderError::TimeoutError(format!("{}: {}", url, e))
    } else {
        WpFinderError::NetworkError(format!("{}: {}", url, e))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn head(&self, scheme: Scheme, domain: &str, ip: &str) -> Result<HeaderMap, WpFinderError> {
        let (url, host) = self.target(scheme, domain, ip)?;

        let mut request = self.session.direct_client.head(url.clone());
        if let Some(host) = host {
            request = request.header(HOST, host);
        }

        let response = request.send().await.map_err(|e| network_error(&url, e))?;
        debug!("HEAD {} -> {}", url, response.status());
        Ok(response.headers().clone())
    }

    async fn get(&self, scheme: Scheme, domain: &str, ip: &str) -> Result<Vec<u8>, WpFinderError> {
        let (mut url, host) = self.target(scheme, domain, ip)?;

        let Some(host) = host else {
            let response = send(&self.session.body_client, &url, None).await?;
            return read_body(&url, response).await;
        };

        // Pinned to an IP: the `Host` header applies only while the
        // redirects stay on that address.
        for _ in 0..=MAX_REDIRECTS {
            let response = send(&self.session.direct_client, &url, Some(&host)).await?;
            let Some(next) = redirect_location(&url, &response) else {
                return read_body(&url, response).await;
            };
            debug!("GET {} -> {}, following to {}", url, response.status(), next);

            if next.host_str() != url.host_str() {
                let response = send(&self.session.body_client, &next, None).await?;
                return read_body(&next, response).await;
            }
            url = next;
        }

        Err(WpFinderError::NetworkError(format!(
            "{}: more than {} redirects",
            url, MAX_REDIRECTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpConfig;
    use std::sync::Mutex;

    /// Fails on every scheme listed in `down`, recording each attempt.
    struct FlakyProber {
        down: Vec<Scheme>,
        attempts: Mutex<Vec<(&'static str, Scheme)>>,
    }

    impl FlakyProber {
        fn new(down: Vec<Scheme>) -> Self {
            Self {
                down,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<(&'static str, Scheme)> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prober for FlakyProber {
        async fn head(&self, scheme: Scheme, _domain: &str, _ip: &str) -> Result<HeaderMap, WpFinderError> {
            self.attempts.lock().unwrap().push(("HEAD", scheme));
            if self.down.contains(&scheme) {
                return Err(WpFinderError::NetworkError("connection refused".to_string()));
            }
            Ok(HeaderMap::new())
        }

        async fn get(&self, scheme: Scheme, _domain: &str, _ip: &str) -> Result<Vec<u8>, WpFinderError> {
            self.attempts.lock().unwrap().push(("GET", scheme));
            if self.down.contains(&scheme) {
                return Err(WpFinderError::TimeoutError("timed out".to_string()));
            }
            Ok(scheme.as_str().as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn test_no_fallback_when_http_succeeds() {
        let prober = FlakyProber::new(vec![]);
        fetch_headers(&prober, "a.com", "1.1.1.1").await.unwrap();
        let body = fetch_body(&prober, "a.com", "1.1.1.1").await.unwrap();

        assert_eq!(body, b"http");
        assert_eq!(prober.attempts(), vec![("HEAD", Scheme::Http), ("GET", Scheme::Http)]);
    }

    #[tokio::test]
    async fn test_single_https_fallback() {
        let prober = FlakyProber::new(vec![Scheme::Http]);
        fetch_headers(&prober, "a.com", "1.1.1.1").await.unwrap();
        let body = fetch_body(&prober, "a.com", "1.1.1.1").await.unwrap();

        assert_eq!(body, b"https");
        assert_eq!(
            prober.attempts(),
            vec![
                ("HEAD", Scheme::Http),
                ("HEAD", Scheme::Https),
                ("GET", Scheme::Http),
                ("GET", Scheme::Https),
            ]
        );
    }

    #[tokio::test]
    async fn test_both_protocols_down_is_final() {
        let prober = FlakyProber::new(vec![Scheme::Http, Scheme::Https]);
        assert!(fetch_headers(&prober, "a.com", "1.1.1.1").await.is_err());
        assert!(fetch_body(&prober, "a.com", "1.1.1.1").await.is_err());
        assert_eq!(prober.attempts().len(), 4);
    }

    fn prober(strategy: ProbeStrategy) -> HttpProber {
        let session = Session::new(&HttpConfig::default(), strategy).unwrap();
        HttpProber::new(session, strategy)
    }

    #[test]
    fn test_target_by_host() {
        let (url, host) = prober(ProbeStrategy::ByHost)
            .target(Scheme::Https, "example.com", "10.0.0.1")
            .unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
        assert!(host.is_none());
    }

    #[test]
    fn test_target_by_address() {
        let p = prober(ProbeStrategy::ByAddress);

        let (url, host) = p.target(Scheme::Http, "example.com", "10.0.0.1").unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.1"));
        assert_eq!(url.port_or_known_default(), Some(80));
        assert_eq!(host.unwrap(), "example.com");

        let (url, _) = p.target(Scheme::Https, "example.com", "2001:db8::1").unwrap();
        assert_eq!(url.host_str(), Some("[2001:db8::1]"));
        assert_eq!(url.port_or_known_default(), Some(443));

        assert!(p.target(Scheme::Http, "example.com", "not-an-ip").is_err());
    }

    #[test]
    fn test_target_with_custom_ports() {
        let p = prober(ProbeStrategy::ByAddress).with_ports(8080, 8443);

        let (url, _) = p.target(Scheme::Http, "example.com", "10.0.0.1").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:8080/");
        let (url, _) = p.target(Scheme::Https, "example.com", "10.0.0.1").unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.1:8443/");
    }
}
