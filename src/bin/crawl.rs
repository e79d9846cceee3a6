//! Crawl CLI: print the hierarchy below a Wikidata entity and save its edge list.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use wikiorg::{report, source::SparqlClient, Config, CrawlOptions, HierarchyCrawler};

/// Breadth-first crawl of an organizational hierarchy.
#[derive(Parser, Debug)]
#[command(name = "crawl")]
struct Args {
    /// Root entity ID (e.g. Q49210).
    root_qid: String,

    /// Where to write the edge list.
    #[arg(long, default_value = "hierarchy.json")]
    output: PathBuf,

    /// Query all predicate pairs of a node concurrently.
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;

    let mut options = CrawlOptions::from_config(&config);
    options.concurrent_pairs |= args.concurrent;

    let source = Arc::new(SparqlClient::from_config(&config)?);
    let crawler = HierarchyCrawler::new(source, options);

    let abort = crawler.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.store(true, Ordering::SeqCst);
        }
    });

    let start = Instant::now();
    let graph = crawler.crawl(&args.root_qid).await?;
    let elapsed = start.elapsed();

    report::write_edges_json(&args.output, graph.edges())?;

    print!("{}", report::render_tree(&graph));
    println!(
        "\nTotal subordinate entities: {} ({} edges, {:.1}s)",
        graph.descendant_ids(graph.root_id()).len(),
        graph.edges().len(),
        elapsed.as_secs_f64()
    );

    Ok(())
}
