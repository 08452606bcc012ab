use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ingest::{IngestConfig, SceneBuild, SceneGraphBuilder, count_by_collection};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod http;

use http::SceneFetcher;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build an offshore scene from a payload and summarize it")]
struct Args {
    /// Payload location: a path under the asset root or an http(s) URL
    payload: String,

    /// Directory or http(s) base that relative URLs resolve against
    #[arg(long)]
    asset_root: Option<String>,

    /// JSON ingest config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let asset_root = args
        .asset_root
        .unwrap_or_else(|| env::var("SCENE_ASSET_ROOT").unwrap_or_else(|_| ".".to_string()));
    let config = match args
        .config
        .or_else(|| env::var("SCENE_CONFIG").ok().map(PathBuf::from))
    {
        Some(path) => IngestConfig::load(&path)?,
        None => IngestConfig::default(),
    };

    info!(root = %asset_root, payload = %args.payload, "building scene");
    let fetcher = Arc::new(SceneFetcher::from_root(&asset_root));
    let mut builder = SceneGraphBuilder::new(fetcher, config).with_progress(|message, percent| {
        info!(percent = format!("{percent:.0}%"), "{message}");
    });
    let build = builder.build_from_url(&args.payload).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&build))?);
    } else {
        print_summary(&build);
    }
    Ok(())
}

fn summary_json(build: &SceneBuild) -> serde_json::Value {
    let built: serde_json::Map<String, serde_json::Value> = count_by_collection(build)
        .into_iter()
        .map(|(c, n)| (c.as_str().to_string(), json!(n)))
        .collect();
    let skipped: Vec<_> = build
        .skipped
        .iter()
        .map(|s| {
            json!({
                "collection": s.collection.as_str(),
                "id": s.id,
                "reason": s.reason.to_string(),
            })
        })
        .collect();
    let failed: Vec<_> = build
        .failed
        .iter()
        .map(|f| json!({ "collection": f.collection.as_str(), "id": f.id, "error": f.error }))
        .collect();
    let quarantined: Vec<_> = build
        .quarantined
        .iter()
        .map(|q| json!({ "collection": q.collection.as_str(), "id": q.id, "reason": q.reason }))
        .collect();
    let counters: serde_json::Map<String, serde_json::Value> = build
        .metrics
        .snapshot()
        .counters
        .into_iter()
        .map(|(k, v)| (k, json!(v)))
        .collect();
    json!({
        "entities": build.world.len(),
        "built": built,
        "skipped": skipped,
        "failed": failed,
        "quarantined": quarantined,
        "counters": counters,
    })
}

fn print_summary(build: &SceneBuild) {
    println!("scene: {} entities", build.world.len());
    for (collection, n) in count_by_collection(build) {
        println!("  {:<14} {n}", collection.as_str());
    }
    if !build.skipped.is_empty() {
        println!("skipped:");
        for s in &build.skipped {
            println!("  {}/{}: {}", s.collection, s.id, s.reason);
        }
    }
    if !build.failed.is_empty() {
        println!("failed:");
        for f in &build.failed {
            println!("  {}/{}: {}", f.collection, f.id, f.error);
        }
    }
    if !build.quarantined.is_empty() {
        println!("quarantined:");
        for q in &build.quarantined {
            println!("  {}/{}: {}", q.collection, q.id, q.reason);
        }
    }
    if let Some(total) = build.metrics.timing("build.total") {
        println!("took {} ms", total.sum);
    }
}
