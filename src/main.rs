use std::env;

use anyhow::{bail, Context};
use log::{info, warn};

use network_morphism::{
    builder::GraphBuilder, config::TransformConfig, specs::GraphSpec, transform::Transformer,
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(graph_path) = args.next() else {
        bail!("usage: morph <graph.json> [config.json]");
    };

    let config = match args.next() {
        Some(path) => TransformConfig::from_path(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => TransformConfig::default(),
    };

    let seed = match env::var("SEED") {
        Ok(seed) => seed.parse::<u64>().context("SEED must be an unsigned integer")?,
        Err(_) => rand::random::<u64>(),
    };
    let allow_skip_connections = env::var("NO_SKIP").is_err();

    let spec = GraphSpec::from_path(&graph_path)
        .with_context(|| format!("failed to load graph from {graph_path}"))?;
    let graph = GraphBuilder::new().build(&spec)?;
    info!("loaded {graph_path} with seed {seed}\n{graph}");

    let mut transformer = Transformer::seeded(config, seed)?;
    let neighbours = transformer.transform(&graph, allow_skip_connections)?;

    let requested = transformer.config().n_neighbours;
    if neighbours.len() < requested {
        warn!("only {} of {requested} neighbour(s) generated", neighbours.len());
    }

    let specs: Vec<GraphSpec> = neighbours.iter().map(|g| g.to_spec()).collect();
    println!("{}", serde_json::to_string_pretty(&specs)?);

    Ok(())
}
