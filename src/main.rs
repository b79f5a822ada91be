use std::error::Error;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use ai_llm_service::telemetry;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use contextor::{
    AnalysisMode, AnalysisRequest, Analyzer, IndicatifProgress, NoopProgress, OutputFormat,
    Progress,
};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate an AI technical report for a public GitHub repository.
#[derive(Debug, Parser)]
#[command(name = "repo-report", version, about)]
struct Cli {
    /// Repository URL, e.g. https://github.com/owner/name
    url: String,

    /// Focus of the report.
    #[arg(long, value_enum, default_value_t = ModeArg::Full)]
    mode: ModeArg,

    /// Larger file budgets and more thorough reasoning.
    #[arg(long)]
    deep: bool,

    /// Answer shape requested from the model (defaults to REPORT_FORMAT).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// GitHub token for higher rate limits.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Debug logs for the pipeline crates.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Architecture,
    Risks,
}

impl From<ModeArg> for AnalysisMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Full => AnalysisMode::Full,
            ModeArg::Architecture => AnalysisMode::Architecture,
            ModeArg::Risks => AnalysisMode::Risks,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Sections,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Sections => OutputFormat::Sections,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // Optional .env next to the binary's working directory.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        telemetry::env_filter_with_level("info", Level::DEBUG)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry::layer())
        .try_init()?;

    let analyzer = Analyzer::from_env(cli.github_token.clone(), None)?;
    let request = AnalysisRequest {
        repo_url: cli.url.clone(),
        mode: cli.mode.into(),
        deep_reasoning: cli.deep,
        format: cli.format.map(Into::into),
    };

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling analysis");
            on_ctrl_c.cancel();
        }
    });

    let progress: Box<dyn Progress> = if io::stderr().is_terminal() {
        Box::new(IndicatifProgress::spinner())
    } else {
        Box::new(NoopProgress)
    };

    match analyzer.analyze(&request, progress.as_ref(), &cancel).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            Ok(ExitCode::FAILURE)
        }
    }
}
