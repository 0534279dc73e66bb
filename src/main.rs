//! vaultload CLI - load generator for AppRole login and transit encryption.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;

use vaultload::cli::*;
use vaultload::client::TransitClient;
use vaultload::codec;
use vaultload::config::{init_logging, Config};
use vaultload::error::{Error, Result};
use vaultload::metrics::RunMetrics;
use vaultload::runner::{LoadRunner, RunReport};
use vaultload::scenario::{Credentials, VirtualUser};
use vaultload::types::VuId;
use vaultload::util;
use vaultload::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified, then overlay the environment and flags
    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };
    config.apply_env();
    cli.apply_logging(&mut config.logging);

    if !config.logging.color {
        colored::control::set_override(false);
    }

    // Initialize logging
    init_logging(&config.logging)?;

    // Dispatch command
    match cli.command {
        Commands::Run(args) => run_load(args, config).await,
        Commands::Once(args) => run_once(args, config).await,
        Commands::Codec(args) => run_codec(args),
        Commands::Config(args) => run_config(args),
        Commands::Completions(args) => run_completions(args),
    }
}

fn print_banner(title: &str) {
    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_cyan()
    );
    println!("{}", format!("║     {title:<37}║").bright_cyan());
    println!(
        "{}",
        format!("║     Version {VERSION:<29}║").bright_cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_cyan()
    );
    println!();
}

fn credentials(config: &Config) -> Result<Credentials> {
    config.validate_credentials()?;
    Ok(Credentials::new(
        config.vault.role_id.clone().unwrap_or_default(),
        config.vault.secret_id.clone().unwrap_or_default(),
    ))
}

/// Run a load test
async fn run_load(args: RunArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;
    let credentials = credentials(&config)?;

    if !args.json {
        print_banner("VAULTLOAD RUN");
        println!("{} Target:        {}", "→".cyan(), config.vault.addr);
        println!("{} Transit key:   {}", "→".cyan(), config.vault.transit_key);
        if let Some(ref ns) = config.vault.namespace {
            println!("{} Namespace:     {}", "→".cyan(), ns);
        }
        println!("{} Virtual users: {}", "→".cyan(), config.load.vus);
        println!(
            "{} Duration:      {}",
            "→".cyan(),
            util::format_duration(config.load.duration)
        );
        println!();
    }

    let client = Arc::new(TransitClient::new(&config.vault)?);
    let runner = LoadRunner::new(&config, client, credentials)?;

    // Metrics endpoint
    #[cfg(feature = "metrics")]
    let metrics_server = if config.metrics.enabled {
        Some(start_metrics_server(&config, runner.metrics())?)
    } else {
        None
    };

    // Setup shutdown signal
    let shutdown_tx = runner.shutdown_handle();
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    // Progress bar
    let pb = if args.quiet || args.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(config.load.duration.as_secs().max(1));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}s {msg}")
                .map_err(|e| Error::Internal(e.to_string()))?
                .progress_chars("█▓░"),
        );
        pb
    };

    let metrics = runner.metrics();
    let run = runner.run();
    tokio::pin!(run);
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.tick().await;

    let report = loop {
        tokio::select! {
            report = &mut run => break report?,
            _ = tick.tick() => {
                let snap = metrics.snapshot();
                pb.inc(1);
                pb.set_message(format!(
                    "iter={} fail={} vus={}",
                    snap.iterations,
                    snap.total_failures(),
                    snap.vus_active
                ));
            }
        }
    };
    pb.finish_and_clear();

    #[cfg(feature = "metrics")]
    if let Some((server, handle)) = metrics_server {
        server.stop();
        if tokio::time::timeout(server.shutdown_timeout(), handle)
            .await
            .is_err()
        {
            tracing::warn!("Metrics server did not stop in time");
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::Internal(format!("Failed to serialize report: {e}")))?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    if args.fail_on_errors && !report.exit_ok() {
        return Err(Error::Other(anyhow!(
            "run recorded {} failed calls and {} failed checks",
            report.counters.total_failures(),
            report.counters.checks_failed
        )));
    }

    Ok(())
}

#[cfg(feature = "metrics")]
fn start_metrics_server(
    config: &Config,
    metrics: Arc<RunMetrics>,
) -> Result<(
    Arc<vaultload::metrics::MetricsHttpServer>,
    tokio::task::JoinHandle<()>,
)> {
    use vaultload::metrics::{HttpServerConfig, MetricsHttpServer};

    let bind_addr = config.metrics.http_bind.parse().map_err(|e| {
        Error::InvalidConfig(format!(
            "Invalid metrics bind address {}: {e}",
            config.metrics.http_bind
        ))
    })?;

    let server = Arc::new(MetricsHttpServer::new(
        HttpServerConfig {
            bind_addr,
            ..Default::default()
        },
        metrics,
    ));

    let server_clone = Arc::clone(&server);
    let handle = tokio::spawn(async move {
        if let Err(e) = server_clone.start().await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok((server, handle))
}

fn print_report(report: &RunReport) {
    println!("{}", "Summary:".bright_white().bold());
    println!("{}", report.summary_table());
    println!();
    println!("{}", "Operations:".bright_white().bold());
    println!("{}", report.operations_table());
    println!();

    if report.exit_ok() {
        println!("{} All checks passed.", "✓".green());
    } else {
        println!(
            "{} {} failed calls, {} failed checks.",
            "✗".red(),
            report.counters.total_failures(),
            report.counters.checks_failed
        );
    }
}

/// Run a single iteration as a smoke test
async fn run_once(args: OnceArgs, mut config: Config) -> Result<()> {
    args.target.apply(&mut config);
    if let Some(payload_len) = args.payload_len {
        config.load.payload_len = payload_len;
    }
    config.validate()?;
    let credentials = credentials(&config)?;

    let client = Arc::new(TransitClient::new(&config.vault)?);
    let metrics = Arc::new(RunMetrics::new()?);
    let mut vu = VirtualUser::new(VuId(1), client, Arc::new(credentials), Arc::clone(&metrics))
        .with_payload_len(config.load.payload_len);

    let outcome = vu.iterate().await;

    if args.json {
        let json = serde_json::json!({
            "outcome": outcome,
            "counters": metrics.snapshot(),
        });
        println!("{json}");
    } else {
        let icon = if outcome.is_success() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("{icon} {outcome}");
        for op in vaultload::types::Operation::ALL {
            if let Some(latency) = metrics.latency(op) {
                println!("  {:<8} {}", op.to_string().dimmed(), latency.as_human_readable());
            }
        }
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(Error::Other(anyhow!("iteration did not pass: {outcome}")))
    }
}

/// Encode or decode base64
fn run_codec(args: CodecArgs) -> Result<()> {
    match args.command {
        CodecCommands::Encode { input } => {
            println!("{}", codec::encode(input.as_bytes()));
        }
        CodecCommands::Decode { input } => {
            println!("{}", codec::decode_utf8(input.trim())?);
        }
    }
    Ok(())
}

/// Show example configuration
fn run_config(args: ConfigArgs) -> Result<()> {
    let config = Config::example();

    if let Some(ref path) = args.output {
        config.save(path)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            Path::new(path).display()
        );
    } else {
        let output = toml::to_string_pretty(&config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        println!("{output}");
    }

    Ok(())
}

/// Generate shell completions
fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
    };

    generate(shell, &mut cmd, name, &mut std::io::stdout());

    Ok(())
}
