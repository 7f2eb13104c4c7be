use crate::classifier;
use crate::prober::{fetch_body, fetch_headers, HttpProber, Prober};
use crate::resolver::{create_resolver, IpResolver};
use crate::session::Session;
use crate::types::{Config, IpBinding, ProbeResult, RunStats, WpFinderError};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

type DomainQueue = Arc<Mutex<mpsc::Receiver<String>>>;

/// Fixed-size pool of workers that resolve, probe and classify domains.
pub struct WpFinderEngine {
    config: Arc<Config>,
    resolver: Arc<dyn IpResolver>,
    prober: Arc<dyn Prober>,
}

/// Results of a started run. `results` closes once every worker is done;
/// `completion` then yields the run statistics.
pub struct ResultStream {
    pub results: mpsc::Receiver<ProbeResult>,
    pub completion: JoinHandle<RunStats>,
}

impl ResultStream {
    /// Drains every result into memory and waits for the pool to finish.
    pub async fn collect(mut self) -> Result<(Vec<ProbeResult>, RunStats), WpFinderError> {
        let mut results = Vec::new();
        while let Some(result) = self.results.recv().await {
            results.push(result);
        }
        let stats = self.completion.await?;
        Ok((results, stats))
    }
}

impl WpFinderEngine {
    pub fn new(
        config: Config,
        resolver: Arc<dyn IpResolver>,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, WpFinderError> {
        if config.concurrency == 0 {
            return Err(WpFinderError::ConfigError(
                "the number of threads must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            config: Arc::new(config),
            resolver,
            prober,
        })
    }

    /// Wires the real HTTP prober and the resolver selected by the configuration.
    pub fn from_config(config: Config, bindings: Vec<IpBinding>) -> Result<Self, WpFinderError> {
        let session = Session::new(&config.http, config.strategy)?;
        let prober = Arc::new(HttpProber::new(session, config.strategy));
        let resolver = create_resolver(&config, bindings)?;

        info!(
            "Using {} resolution, probing by {:?} with {} workers",
            resolver.name(),
            config.strategy,
            config.concurrency
        );

        Self::new(config, resolver, prober)
    }

    /// Queues every domain, starts the workers and returns the result stream.
    /// The caller must keep draining `results`: the channel is bounded.
    pub async fn start(&self, domains: Vec<String>) -> ResultStream {
        let started = Instant::now();
        let started_at = chrono::Local::now().to_rfc3339();
        info!("Starting probe of {} domains", domains.len());

        // Fill and close the queue before any worker runs. Capacity matches
        // the domain count, so `try_send` never sees a full queue.
        let (queue_tx, queue_rx) = mpsc::channel(domains.len().max(1));
        for domain in domains {
            if let Err(e) = queue_tx.try_send(domain) {
                error!("Could not queue domain: {}", e);
            }
        }
        drop(queue_tx);
        let queue: DomainQueue = Arc::new(Mutex::new(queue_rx));

        let (result_tx, result_rx) = mpsc::channel(self.config.channel_capacity);

        let workers: Vec<JoinHandle<RunStats>> = (0..self.config.concurrency)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    queue.clone(),
                    self.resolver.clone(),
                    self.prober.clone(),
                    result_tx.clone(),
                ))
            })
            .collect();

        let completion = tokio::spawn(async move {
            let mut stats = RunStats {
                started_at,
                ..RunStats::default()
            };

            for outcome in join_all(workers).await {
                match outcome {
                    Ok(worker_stats) => stats.merge(worker_stats),
                    Err(e) => error!("Worker terminated abnormally: {}", e),
                }
            }

            // Last sender: closing it tells the sink no more results are coming.
            drop(result_tx);
            stats.duration = started.elapsed();
            stats
        });

        ResultStream {
            results: result_rx,
            completion,
        }
    }

    /// Runs the whole pipeline and gathers every result.
    pub async fn run(&self, domains: Vec<String>) -> Result<(Vec<ProbeResult>, RunStats), WpFinderError> {
        self.start(domains).await.collect().await
    }
}

async fn worker(
    id: usize,
    queue: DomainQueue,
    resolver: Arc<dyn IpResolver>,
    prober: Arc<dyn Prober>,
    results: mpsc::Sender<ProbeResult>,
) -> RunStats {
    let mut stats = RunStats::default();

    loop {
        let next = queue.lock().await.recv().await;
        let Some(domain) = next else {
            break;
        };
        stats.domains += 1;

        let ips = resolver.resolve(&domain).await;
        if ips.is_empty() {
            debug!("[worker {}] no candidate IPs for {}", id, domain);
            let result = ProbeResult::unresolved(&domain);
            stats.record(&result);
            if results.send(result).await.is_err() {
                warn!("[worker {}] result stream closed, stopping", id);
                break;
            }
            continue;
        }

        for ip in &ips {
            let result = probe_ip(prober.as_ref(), &domain, ip).await;
            stats.record(&result);
            if results.send(result).await.is_err() {
                warn!("[worker {}] result stream closed, stopping", id);
                return stats;
            }
        }
    }

    debug!("[worker {}] queue exhausted after {} domains", id, stats.domains);
    stats
}

/// Probes one candidate IP of a domain. Failures never escape: they are
/// folded into the fields of the returned result.
pub async fn probe_ip(prober: &dyn Prober, domain: &str, ip: &str) -> ProbeResult {
    let headers = match fetch_headers(prober, domain, ip).await {
        Ok(headers) => headers,
        Err(e) => {
            debug!("No headers for {} ({}): {}", domain, ip, e);
            return ProbeResult::unreachable(domain, ip);
        }
    };
    let server = classifier::server_banner(&headers);

    let body = match fetch_body(prober, domain, ip).await {
        Ok(body) => body,
        Err(e) => {
            debug!("No body for {} ({}): {}", domain, ip, e);
            return ProbeResult::headers_only(domain, ip, server);
        }
    };

    ProbeResult::complete(
        domain,
        ip,
        server,
        classifier::is_platform(&body),
        classifier::redirect_target(&headers),
    )
}
