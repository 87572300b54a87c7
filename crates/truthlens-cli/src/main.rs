mod config_file;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use truthlens_core::{
    proxy::{self, ProxyState},
    render_analysis, Analysis, Orchestrator, OutputFormat, Session, Severity, Tier, TIERS,
};

use config_file::FileConfig;

#[derive(Parser, Debug)]
#[command(
    name = "truthlens",
    author,
    version,
    about = "Claim fact-checking assistant and provider relay"
)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fact-check a single claim (reads stdin when no claim is given)
    Check {
        claim: Vec<String>,
        /// Emit the analysis as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Check claims line by line from stdin, throttled by the cooldown
    Repl {
        #[arg(long)]
        json: bool,
    },
    /// Run only the local tone heuristics
    Heuristics {
        claim: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the score tiers
    Tiers,
    /// Serve the search and analyze relays over HTTP
    Serve {
        /// Socket address to bind (default 127.0.0.1:8888)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Check { claim, json } => check(&file, claim, json).await?,
        Commands::Repl { json } => repl(&file, json).await?,
        Commands::Heuristics { claim, json } => heuristics(&file, claim, json)?,
        Commands::Tiers => list_tiers(),
        Commands::Serve { bind } => serve(&file, bind).await?,
    }
    Ok(())
}

fn build_session(file: &FileConfig) -> Result<Session> {
    let settings = file.settings()?;
    let orchestrator =
        Orchestrator::from_settings_with(&settings, file.scorer()?, file.trusted_domains())
            .context("failed to configure providers")?;
    Ok(Session::new(orchestrator, file.cooldown()?))
}

async fn check(file: &FileConfig, claim: Vec<String>, json: bool) -> Result<()> {
    let input = claim_or_stdin(claim)?;
    let mut session = build_session(file)?;
    match session.submit(&input, Instant::now()).await {
        Ok(analysis) => print_analysis(&analysis, json),
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            std::process::exit(1);
        }
    }
}

async fn repl(file: &FileConfig, json: bool) -> Result<()> {
    let mut session = build_session(file)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match session.submit(&line, Instant::now()).await {
            Ok(analysis) => print_analysis(&analysis, json)?,
            Err(err) => eprintln!("{}", err.to_string().red()),
        }
    }
    Ok(())
}

fn heuristics(file: &FileConfig, claim: Vec<String>, json: bool) -> Result<()> {
    let input = claim_or_stdin(claim)?;
    let report = file.scorer()?.analyze(input.trim());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Heuristic score: {}", report.score);
    for flag in report.flags {
        let message = match flag.severity {
            Severity::Good => flag.message.green(),
            Severity::Warn => flag.message.yellow(),
            Severity::Bad => flag.message.red(),
        };
        println!("- {message}");
    }
    Ok(())
}

fn list_tiers() {
    for tier in TIERS.iter() {
        println!(
            "{min:>3}+ {label:<18} {desc}",
            min = tier.min_score,
            label = paint(tier, tier.label),
            desc = tier.description
        );
    }
}

async fn serve(file: &FileConfig, bind: Option<String>) -> Result<()> {
    let settings = file.settings()?;
    let state = ProxyState::from_settings(&settings)?.with_analyze_model(file.analyze_model());
    let app = proxy::router(state);

    let bind = bind.unwrap_or_else(|| file.bind());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, "relay listening");
    println!("Serving relays on http://{local_addr}/api/search and /api/analyze");
    if !settings.search.has_key() || !settings.verdict.has_key() {
        println!(
            "{}",
            "Warning: a provider secret is missing; affected relays will answer 500.".yellow()
        );
    }
    axum::serve(listener, app).await?;
    Ok(())
}

fn print_analysis(analysis: &Analysis, json: bool) -> Result<()> {
    if json {
        println!("{}", render_analysis(analysis, OutputFormat::Json)?);
        return Ok(());
    }
    println!(
        "{} {}",
        paint(&analysis.tier, analysis.tier.label).bold(),
        format!("[{}/100]", analysis.score()).dimmed()
    );
    print!("{}", render_analysis(analysis, OutputFormat::Human)?);
    Ok(())
}

fn paint(tier: &Tier, text: &str) -> colored::ColoredString {
    match hex_rgb(tier.color) {
        Some((r, g, b)) => text.truecolor(r, g, b),
        None => text.normal(),
    }
}

fn hex_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn claim_or_stdin(claim: Vec<String>) -> Result<String> {
    if !claim.is_empty() {
        return Ok(claim.join(" "));
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read claim from stdin")?;
    Ok(input)
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
