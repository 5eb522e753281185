use std::sync::Arc;

use ai_client::OpenAi;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use citywatch_common::{AnomalyReport, Config};
use citywatch_scout::catalog::Catalog;
use citywatch_scout::collector::SearchCollector;
use citywatch_scout::driver::{PacingPolicy, SweepDriver};
use citywatch_scout::extractor::LlmReportExtractor;
use citywatch_scout::geocoder::NominatimGeocoder;
use citywatch_scout::pipeline::Pipeline;
use citywatch_scout::searcher::SerperSearcher;
use citywatch_scout::session::{InMemorySessionStore, SessionIdentity};

#[derive(Parser)]
#[command(
    name = "citywatch-scout",
    about = "Sweep city news for anomalies and emit structured reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep the catalog forever (default).
    Run,
    /// Sweep the catalog once and exit.
    Once,
    /// Print the report wire JSON Schema and exit.
    Schema,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("citywatch=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn build_driver(config: &Config) -> Result<SweepDriver> {
    let stage_timeout = config.stage_timeout();

    let mut model = OpenAi::new(&config.openai_api_key, &config.llm_model);
    if let Some(url) = &config.llm_base_url {
        model = model.with_base_url(url);
    }
    if let Some(timeout) = stage_timeout {
        model = model.with_timeout(timeout);
    }

    let searcher = SerperSearcher::new(&config.serper_api_key)?
        .with_max_results(config.search_results_per_query);
    let geocoder = NominatimGeocoder::new(&config.nominatim_url)?;

    let collector = SearchCollector::new(Arc::new(searcher))
        .with_max_queries(config.search_queries_per_task)
        .with_word_limit(config.evidence_word_limit);
    let extractor = LlmReportExtractor::new(Arc::new(model), Arc::new(geocoder));

    let pipeline = Pipeline::builder()
        .collector(Arc::new(collector))
        .extractor(Arc::new(extractor))
        .stage_timeout(stage_timeout)
        .build();

    Ok(SweepDriver::builder()
        .pipeline(pipeline)
        .sessions(Arc::new(InMemorySessionStore::new()))
        .identity(SessionIdentity::new(
            &config.app_name,
            &config.user_id,
            &config.session_id,
        ))
        .catalog(Catalog::builtin(&config.city_name))
        .pacing(PacingPolicy::new(config.task_interval(), config.pass_interval()))
        .build())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Schema) = cli.command {
        println!("{}", serde_json::to_string_pretty(&AnomalyReport::wire_schema())?);
        return Ok(());
    }

    init_tracing()?;
    info!("CityWatch Scout starting...");

    let config = Config::from_env()?;
    config.log_redacted();
    let driver = build_driver(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Once => {
            let stats = driver.run_pass().await;
            info!("{stats}");
        }
        _ => {
            tokio::select! {
                _ = driver.run_forever() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, stopping sweep");
                }
            }
        }
    }

    Ok(())
}
