use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use wikiorg::harvest::{self, harvest_universities};
use wikiorg::llm::{ChatClient, LlmExtractor, LlmMatcher};
use wikiorg::report;
use wikiorg::search::WikidataSearch;
use wikiorg::source::SparqlClient;
use wikiorg::{Config, CrawlOptions, Discovery, HierarchyCrawler, ReconciliationEngine};

/// Wikidata tools: find missing divisions of a university, or harvest universities.
#[derive(Parser, Debug)]
#[command(name = "wikiorg", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a university's hierarchy and reconcile it against extracted units.
    Discover {
        /// Wikidata ID of the university (e.g. Q49210).
        university_qid: String,

        /// Chat model to use instead of `llm.model`.
        #[arg(long = "llm")]
        llm_model: Option<String>,

        /// University website, passed to the extractor as a reference.
        #[arg(long)]
        website: Option<String>,
    },
    /// Fetch every university of a country to JSON.
    Harvest {
        /// Wikidata ID of the country.
        #[arg(long, default_value = harvest::DEFAULT_COUNTRY)]
        country: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.wikiorg.log_level.as_str()),
    )
    .init();

    match cli.command {
        Command::Discover {
            university_qid,
            llm_model,
            website,
        } => {
            if let Some(model) = llm_model {
                config.override_model(model)?;
            }
            run_discover(&config, &university_qid, website.as_deref()).await?;
        }
        Command::Harvest { country } => {
            run_harvest(&config, &country).await?;
        }
    }

    Ok(())
}

async fn run_discover(config: &Config, qid: &str, website: Option<&str>) -> Result<()> {
    let api_key = config.llm_api_key()?;
    log::info!("Using model {}", config.llm.model);

    let source = Arc::new(SparqlClient::from_config(config)?);
    let crawler = HierarchyCrawler::new(source, CrawlOptions::from_config(config));

    let matcher = LlmMatcher::new(ChatClient::from_config(config, api_key.clone())?);
    let extractor = LlmExtractor::new(
        ChatClient::from_config(config, api_key)?,
        config.llm.extract_max_tokens,
    );
    let engine = ReconciliationEngine::new(Arc::new(matcher))
        .with_search(Arc::new(WikidataSearch::from_config(config)?));

    let discovery = Discovery::new(crawler, Arc::new(extractor), engine);

    let abort = discovery.crawler().abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping crawl");
            abort.store(true, Ordering::SeqCst);
        }
    });

    let report = discovery.run(qid, website).await?;
    for warning in &report.warnings {
        log::warn!("{}", warning);
    }

    let rows = report.rows();
    println!("University: {} ({})\n", report.root.label, report.root.id);
    print!("{}", report::render_diff_table(&rows));
    println!("\n{}", report.summary());

    let out_dir = config.output_dir();
    std::fs::create_dir_all(out_dir)?;
    let csv_path = out_dir.join(format!("reconciliation_{}.csv", report.root.id));
    let json_path = out_dir.join(format!("hierarchy_{}.json", report.root.id));
    report::write_diff_csv(&csv_path, &rows)?;
    report::write_edges_json(&json_path, report.graph.edges())?;

    println!("Wrote {} and {}", csv_path.display(), json_path.display());
    Ok(())
}

async fn run_harvest(config: &Config, country: &str) -> Result<()> {
    let client = SparqlClient::from_config(config)?;
    let universities = harvest_universities(&client, country, &config.wikiorg.language).await?;

    let out_dir = config.output_dir();
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("universities_{}.json", country));
    report::write_universities_json(&path, &universities)?;

    for u in &universities {
        println!(
            "{:<12} {}  {}",
            u.id,
            u.label,
            u.website.as_deref().unwrap_or("-")
        );
    }
    println!("\nWrote {} entries to {}", universities.len(), path.display());
    Ok(())
}
