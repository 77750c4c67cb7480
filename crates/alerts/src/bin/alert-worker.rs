//! alert-worker — runs the alert decision engine over analysis cycles.
//!
//! Reads newline-delimited JSON from a file or stdin; every line is one
//! cycle of analysis (exchange → market → family → indicator → instances).

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use sigwatch_alerts::AlertEngine;
use sigwatch_core::config::load_dotenv;
use sigwatch_core::{Analysis, AppConfig};

// ── CLI ─────────────────────────────────────────────────────────────

/// Alert worker — classifies indicator analysis and dispatches alerts.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, env = "SIGWATCH_CONFIG", default_value = "config/sigwatch.yml")]
    config: String,

    /// NDJSON analysis input, `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,

    /// Send a test notification on every enabled channel and exit.
    #[arg(long)]
    test_channels: bool,

    /// Emit logs as JSON.
    #[arg(long, env = "SIGWATCH_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = AppConfig::from_file(&cli.config)?;
    info!(path = %cli.config, "loaded config");
    config.log_summary();

    let mut engine = AlertEngine::from_config(&config);
    if engine.dispatcher().is_empty() {
        tracing::warn!("No notifiers enabled, alerts will only be logged");
    }

    if cli.test_channels {
        let results = engine.dispatcher().test_all().await;
        let failed = results.iter().filter(|r| !r.success).count();
        info!(sent = results.len(), failed, "channel test finished");
        if failed > 0 {
            anyhow::bail!("{failed} channel(s) failed the test notification");
        }
        return Ok(());
    }

    if cli.input == "-" {
        let reader = BufReader::new(tokio::io::stdin());
        run(&mut engine, reader).await?;
    } else {
        let file = tokio::fs::File::open(&cli.input).await?;
        run(&mut engine, BufReader::new(file)).await?;
    }

    info!("alert-worker exited cleanly");
    Ok(())
}

/// Process cycles until input ends or ctrl-c.
async fn run<R>(engine: &mut AlertEngine, reader: R) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    info!("alert-worker starting");
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping");
                break;
            }
        };
        let Some(line) = line else { break };
        line_no += 1;

        if line.trim().is_empty() {
            continue;
        }

        let analysis = match Analysis::from_json(&line) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping unparseable analysis line");
                continue;
            }
        };

        let report = engine.run_cycle(analysis).await;
        tracing::debug!(
            line = line_no,
            cycle_id = %report.cycle_id,
            fragments = report.fragments,
            "cycle processed"
        );
    }

    Ok(())
}
