use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::process;
use wpfinder::engine::ResultStream;
use wpfinder::output::OutputManager;
use wpfinder::{config, input, Args, WpFinderEngine};

const BANNER: &str = r#"
 _      __     _______           __
| | /| / /__  / __/  _/__  ___  / /__ ____
| |/ |/ / _ \/ _/_/ // _ \/ _ \/ / -_) __/
|__/|__/ .__/_/ /___/_//_/\_,_/_/\__/_/
      /_/
   Server banner, WordPress & redirect recon
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.silent {
        log::LevelFilter::Warn
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if !args.silent {
        eprintln!("{}", BANNER);
    }

    // Everything that can fail on bad configuration happens before the first worker starts.
    let config = config::load_config(&args).unwrap_or_else(|e| fail(e));
    let input = input::load_input(&args, config.resolution).unwrap_or_else(|e| fail(e));
    let output = OutputManager::open(config.output.clone()).unwrap_or_else(|e| fail(e));
    let engine = WpFinderEngine::from_config(config, input.bindings).unwrap_or_else(|e| fail(e));

    let ResultStream { results, completion } = engine.start(input.domains).await;
    let written = output.consume(results).await;
    let stats = completion.await?;

    let written = written.map_err(|e| anyhow::anyhow!("Writing results failed: {}", e))?;

    info!(
        "Probe completed (started {}): {} results for {} domains ({} unresolved, {} unreachable, {} without body) in {:.2}s",
        stats.started_at,
        written,
        stats.domains,
        stats.unresolved,
        stats.unreachable,
        stats.headers_only,
        stats.duration.as_secs_f64()
    );

    Ok(())
}

fn fail(e: wpfinder::WpFinderError) -> ! {
    error!("{}", e);
    process::exit(1);
}
