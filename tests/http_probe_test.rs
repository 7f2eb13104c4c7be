use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use wpfinder::engine::probe_ip;
use wpfinder::prober::{fetch_body, fetch_headers, HttpProber};
use wpfinder::resolver::TableResolver;
use wpfinder::session::Session;
use wpfinder::types::{HttpConfig, IpBinding, ProbeStrategy, Redirect};
use wpfinder::{Config, ProbeResult, WpFinderEngine};

fn http_config() -> HttpConfig {
    HttpConfig {
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..HttpConfig::default()
    }
}

fn host_prober() -> HttpProber {
    let session = Session::new(&http_config(), ProbeStrategy::ByHost).unwrap();
    HttpProber::new(session, ProbeStrategy::ByHost)
}

/// Pins requests to the mock server's address, whatever the domain.
fn address_prober(port: u16) -> HttpProber {
    let session = Session::new(&http_config(), ProbeStrategy::ByAddress).unwrap();
    HttpProber::new(session, ProbeStrategy::ByAddress).with_ports(port, port)
}

/// An address nothing listens on.
fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_probe_wordpress_site_with_redirect() {
    let mut server = mockito::Server::new_async().await;
    let head = server
        .mock("HEAD", "/")
        .with_status(301)
        .with_header("server", "nginx/1.25")
        .with_header("location", "https://new.example.com")
        .create_async()
        .await;
    let get = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html><link href=\"/wp-content/themes/x/style.css\"></html>")
        .create_async()
        .await;

    let domain = server.host_with_port();
    let result = probe_ip(&host_prober(), &domain, "10.0.0.1").await;

    head.assert_async().await;
    get.assert_async().await;
    assert_eq!(
        result,
        ProbeResult::complete(
            &domain,
            "10.0.0.1",
            "nginx/1.25".to_string(),
            true,
            Redirect::To("https://new.example.com".to_string()),
        )
    );
}

#[tokio::test]
async fn test_error_status_still_counts_as_headers() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("HEAD", "/")
        .with_status(503)
        .with_header("server", "cloudflare")
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let domain = server.host_with_port();
    let result = probe_ip(&host_prober(), &domain, "10.0.0.1").await;

    assert_eq!(result.server.as_deref(), Some("cloudflare"));
    assert_eq!(result.platform, Some(false));
    assert_eq!(result.redirect, Some(Redirect::None));
}

#[tokio::test]
async fn test_unreachable_host_keeps_ip() {
    let domain = closed_address();
    let prober = host_prober();

    assert!(fetch_headers(&prober, &domain, "10.0.0.1").await.is_err());
    let result = probe_ip(&prober, &domain, "10.0.0.1").await;
    assert_eq!(result, ProbeResult::unreachable(&domain, "10.0.0.1"));
    assert_eq!(result.to_string(), format!("{}; 10.0.0.1; N/A; N/A; N/A", domain));
}

#[tokio::test]
async fn test_engine_table_mode_against_live_server() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("HEAD", "/")
        .with_status(200)
        .with_header("server", "Apache")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<script src=\"/wp-includes/js/wp-emoji.js\"></script>")
        .expect(1)
        .create_async()
        .await;

    let domain = server.host_with_port();
    let config = Config {
        concurrency: 2,
        strategy: ProbeStrategy::ByHost,
        http: http_config(),
        ..Config::default()
    };
    let resolver = TableResolver::new(vec![
        IpBinding {
            domain: domain.clone(),
            ip: "10.0.0.1".to_string(),
            fronted: false,
        },
        IpBinding {
            domain: domain.clone(),
            ip: "10.0.0.2".to_string(),
            fronted: true,
        },
    ]);
    let session = Session::new(&config.http, config.strategy).unwrap();
    let prober = HttpProber::new(session, config.strategy);
    let engine = WpFinderEngine::new(config, Arc::new(resolver), Arc::new(prober)).unwrap();

    let (results, stats) = engine.run(vec![domain.clone()]).await.unwrap();

    assert_eq!(stats.results, 1);
    assert_eq!(
        results[0].to_string(),
        format!("{}; 10.0.0.1; Apache; Yes; No", domain)
    );
}

#[tokio::test]
async fn test_pinned_redirect_to_other_host_drops_host_header() {
    let mut server = mockito::Server::new_async().await;
    let port = server.socket_address().port();
    let landing = format!("http://localhost:{}/landing", port);

    let head = server
        .mock("HEAD", "/")
        .match_header("host", "a.test")
        .with_status(301)
        .with_header("server", "nginx")
        .with_header("location", &landing)
        .create_async()
        .await;
    let pinned = server
        .mock("GET", "/")
        .match_header("host", "a.test")
        .with_status(301)
        .with_header("location", &landing)
        .expect(1)
        .create_async()
        .await;
    let followed = server
        .mock("GET", "/landing")
        .match_header("host", format!("localhost:{}", port).as_str())
        .with_status(200)
        .with_body("<link rel=\"stylesheet\" href=\"/wp-content/themes/x/style.css\">")
        .expect(1)
        .create_async()
        .await;

    let result = probe_ip(&address_prober(port), "a.test", "127.0.0.1").await;

    head.assert_async().await;
    pinned.assert_async().await;
    followed.assert_async().await;
    assert_eq!(
        result,
        ProbeResult::complete("a.test", "127.0.0.1", "nginx".to_string(), true, Redirect::To(landing))
    );
}

#[tokio::test]
async fn test_pinned_redirect_on_same_address_keeps_host_header() {
    let mut server = mockito::Server::new_async().await;
    let port = server.socket_address().port();

    server
        .mock("GET", "/")
        .match_header("host", "a.test")
        .with_status(302)
        .with_header("location", "/home")
        .create_async()
        .await;
    let home = server
        .mock("GET", "/home")
        .match_header("host", "a.test")
        .with_status(200)
        .with_body("<script src=\"/wp-includes/js/wp-emoji.js\"></script>")
        .expect(1)
        .create_async()
        .await;

    let body = fetch_body(&address_prober(port), "a.test", "127.0.0.1").await.unwrap();

    home.assert_async().await;
    assert!(String::from_utf8(body).unwrap().contains("wp-includes"));
}
