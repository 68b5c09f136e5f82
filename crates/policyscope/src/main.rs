use anyhow::Result;
use clap::{Parser, Subcommand};
use policyscope::analyze::{AnalyzerConfig, OpenAiCompatClient};
use policyscope::pipeline::{run_pipeline, PipelineConfig};
use policyscope::{links, LocalFetcher};
use policyscope::{normalize_input_url, FetchBackend, FetchRequest};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "policyscope")]
#[command(about = "Scrape a privacy policy and grade it with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch a page, extract its privacy policy, analyze and grade it (prints JSON).
    Analyze(AnalyzeCmd),
    /// Find the privacy-policy link on a page (prints JSON).
    FindLink(FindLinkCmd),
    /// Print version info.
    Version,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// Page or policy URL (scheme defaults to https://).
    url: String,
    /// API key for the analysis service.
    #[arg(long, env = "POLICYSCOPE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// OpenAI-compatible base URL.
    #[arg(long, env = "POLICYSCOPE_BASE_URL")]
    base_url: Option<String>,
    /// Model name.
    #[arg(long, env = "POLICYSCOPE_MODEL")]
    model: Option<String>,
    /// Page fetch timeout in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    fetch_timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct FindLinkCmd {
    /// Page URL to scan for a policy link (scheme defaults to https://).
    url: String,
    /// Page fetch timeout in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    fetch_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(cmd) => run_analyze(cmd).await,
        Commands::FindLink(cmd) => run_find_link(cmd).await,
        Commands::Version => {
            println!("policyscope {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_analyze(cmd: AnalyzeCmd) -> Result<()> {
    // Env fills the gaps (OPENAI_API_KEY fallback included); flags win.
    let env_cfg = AnalyzerConfig::from_env();
    let analyzer_cfg = AnalyzerConfig {
        api_key: cmd.api_key.or(env_cfg.api_key),
        base_url: cmd.base_url.unwrap_or(env_cfg.base_url),
        model: cmd.model.unwrap_or(env_cfg.model),
        ..AnalyzerConfig::default()
    };

    let fetcher = LocalFetcher::new()?;
    let analyzer = OpenAiCompatClient::new(reqwest::Client::new(), analyzer_cfg);
    let cfg = PipelineConfig {
        fetch_timeout_ms: cmd.fetch_timeout_ms,
        ..PipelineConfig::default()
    };

    let result = run_pipeline(&fetcher, &analyzer, &cfg, &cmd.url).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_find_link(cmd: FindLinkCmd) -> Result<()> {
    let url = normalize_input_url(&cmd.url)?;
    let fetcher = LocalFetcher::new()?;
    let req = FetchRequest {
        url: url.clone(),
        timeout_ms: Some(cmd.fetch_timeout_ms),
        max_bytes: Some(5_000_000),
        headers: BTreeMap::new(),
    };
    let page = fetcher.fetch(&req).await?;
    let link = links::find_policy_link(&page.text_lossy(), &page.final_url);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "url": url,
            "policy_link": link,
            "candidates": links::candidate_policy_paths(&page.final_url),
        }))?
    );
    Ok(())
}
