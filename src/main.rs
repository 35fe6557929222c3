//! `substrate` - operational CLI for the resilience and persistence substrate.
//!
//! ```text
//! substrate [--config substrate.toml] probe <url> [--dependency web-fetch] [--count N]
//! substrate [--config substrate.toml] write <path> '<json>'
//! substrate check-config <path>
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use skill_substrate::config::{load_config, load_or_default};
use skill_substrate::lifecycle::{signals, Shutdown};
use skill_substrate::observability::{logging, metrics};
use skill_substrate::Substrate;

#[derive(Parser)]
#[command(name = "substrate")]
#[command(about = "Circuit breakers, retries and atomic writes for automation skills", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a URL repeatedly through the dependency's breaker and the retry policy
    Probe {
        url: String,

        /// Dependency name the breaker is keyed by
        #[arg(short, long, default_value = "web-fetch")]
        dependency: String,

        /// Stop after this many probes (runs until Ctrl-C otherwise)
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Delay between probes in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Atomically write a JSON document to a file
    Write { path: PathBuf, json: String },
    /// Validate a config file and print the effective settings
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::CheckConfig { path } => load_config(path)?,
        _ => load_or_default(cli.config.as_deref())?,
    };
    logging::init_logging(&config.observability);
    tracing::debug!(config = ?config, "Configuration loaded");

    let substrate = Substrate::from_config(&config);

    match cli.command {
        Commands::CheckConfig { .. } => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Probe { url, dependency, count, interval_ms } => {
            if config.observability.metrics_enabled {
                metrics::init_metrics(config.observability.metrics_address.parse()?);
            }
            let shutdown = Shutdown::new();
            tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));
            probe(&substrate, &url, &dependency, count, Duration::from_millis(interval_ms), &shutdown).await?;
        }
        Commands::Write { path, json } => {
            let value: serde_json::Value = serde_json::from_str(&json)?;
            substrate.writer().write_durable(&path, &value).await?;
            tracing::info!(path = %path.display(), "Write settled");
        }
    }

    Ok(())
}

async fn probe(
    substrate: &Substrate,
    url: &str,
    dependency: &str,
    count: Option<u64>,
    interval: Duration,
    shutdown: &Shutdown,
) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let mut stop = shutdown.subscribe();
    let mut ticker = tokio::time::interval(interval);
    let mut sent = 0u64;

    tracing::info!(url = %url, dependency = %dependency, "Probe starting");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.recv() => break,
        }

        let result = substrate.guarded_call(dependency, || fetch(&client, url)).await;
        sent += 1;

        let status = substrate.breakers().get(dependency).status();
        match result {
            Ok(code) => tracing::info!(
                status = code,
                breaker = %status.state,
                failures = status.failures,
                "Probe succeeded"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                breaker = %status.state,
                failures = status.failures,
                "Probe failed"
            ),
        }

        if count.is_some_and(|c| sent >= c) {
            break;
        }
    }

    println!("{}", serde_json::to_string_pretty(&substrate.breakers().all_status())?);
    Ok(())
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<u16, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if status.is_success() {
        Ok(status.as_u16())
    } else {
        Err(format!("HTTP {}", status))
    }
}
