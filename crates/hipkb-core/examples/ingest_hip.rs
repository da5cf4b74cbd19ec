//! Basic usage example - ingest local .hip files and print parameter stats

use hipkb_library::{HipKbApi, HipSource, HipSourceSpec, IngestConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: ingest_hip <scene.hip> [more.hip ...]");
        std::process::exit(2);
    }

    let mut api = HipKbApi::open(IngestConfig::from_env())?;

    let specs: Vec<HipSourceSpec> = paths
        .iter()
        .map(|p| HipSourceSpec::new(p.clone(), HipSource::Community))
        .collect();

    let progress = |done: usize, total: usize, id: &str| {
        println!("[{done}/{total}] {id}");
    };
    let summary = api.ingest_batch(&specs, Some(&progress)).await?;

    println!(
        "parsed {} archives ({} failed, {} skipped), {} snapshots",
        summary.parsed, summary.failed, summary.skipped, summary.snapshot_rows
    );

    // Show aggregates for every node type we just saw.
    let mut node_types: Vec<String> = Vec::new();
    for entry in api.cache().manifest().entries.values() {
        if let Ok(bytes) = std::fs::read(&entry.local_path) {
            if let Ok(scene) = api.parse(&bytes) {
                for node in &scene.nodes {
                    if !node_types.contains(&node.node_type) {
                        node_types.push(node.node_type.clone());
                    }
                }
            }
        }
    }

    for node_type in node_types {
        for stat in api.stats(&node_type, None)? {
            println!(
                "{node_type}.{}: n={} range=[{:.4}, {:.4}] mean={:.4} modified={}",
                stat.param_name,
                stat.sample_count,
                stat.usage_range.0,
                stat.usage_range.1,
                stat.mean,
                stat.modified_count
            );
        }
    }

    Ok(())
}
