use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use super::Operator;
use crate::{config::TransformConfig, graph::Graph, Result};

/// Generates up to `config.n_neighbours` neighbour graphs of `graph`.
///
/// Runs at most `2 * n_neighbours` attempts. Each attempt clones the parent, applies a uniformly
/// sampled operator and keeps the outcome if there is one and it fits in `max_model_size`.
///
/// # Arguments
/// * `graph` - The parent graph, never modified.
/// * `allow_skip_connections` - Whether skip connections may be added.
/// * `config` - The transform configuration.
/// * `rng` - The random source every sampling decision is drawn from.
///
/// # Returns
/// The neighbours, possibly fewer than requested, or an error if a copy of the parent could not
/// be allocated. Partial results are discarded in that case.
pub fn transform<R: Rng>(
    graph: &Graph,
    allow_skip_connections: bool,
    config: &TransformConfig,
    rng: &mut R,
) -> Result<Vec<Graph>> {
    let n_neighbours = config.n_neighbours;
    let attempts = n_neighbours.saturating_mul(2);
    let mut graphs = Vec::new();

    for attempt in 0..attempts {
        if graphs.len() >= n_neighbours {
            break;
        }

        let op = Operator::sample(allow_skip_connections, rng);
        let candidate = graph.try_clone()?;

        match op.apply(candidate, config, rng)? {
            Some(g) if g.size() <= config.max_model_size => {
                debug!("attempt {attempt}: {op} kept, {} parameters", g.size());
                graphs.push(g);
            }
            Some(g) => debug!(
                "attempt {attempt}: {op} dropped, {} parameters exceed {}",
                g.size(),
                config.max_model_size
            ),
            None => debug!("attempt {attempt}: {op} produced nothing"),
        }
    }

    info!(
        "generated {} of {n_neighbours} neighbour(s) in at most {attempts} attempt(s)",
        graphs.len()
    );

    Ok(graphs)
}

/// Transforms several parents in parallel.
///
/// Each parent gets its own `StdRng` seeded with `seed + i`, so the output only depends on the
/// inputs and not on how the work is scheduled.
///
/// # Returns
/// The neighbours of every parent, in the same order as `parents`.
pub fn transform_many(
    parents: &[Graph],
    allow_skip_connections: bool,
    config: &TransformConfig,
    seed: u64,
) -> Result<Vec<Vec<Graph>>> {
    parents
        .par_iter()
        .enumerate()
        .map(|(i, parent)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            transform(parent, allow_skip_connections, config, &mut rng)
        })
        .collect()
}

/// A validated configuration bound to its random source.
#[derive(Debug)]
pub struct Transformer<R: Rng> {
    config: TransformConfig,
    rng: R,
}

impl Transformer<StdRng> {
    /// Creates a new `Transformer` with a seeded `StdRng`.
    pub fn seeded(config: TransformConfig, seed: u64) -> Result<Self> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Transformer<R> {
    /// Creates a new `Transformer`.
    ///
    /// # Returns
    /// An `InvalidConfig` error if `config` does not pass validation.
    pub fn new(config: TransformConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Generates the neighbours of `graph`, see [`transform`].
    pub fn transform(&mut self, graph: &Graph, allow_skip_connections: bool) -> Result<Vec<Graph>> {
        transform(graph, allow_skip_connections, &self.config, &mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layers::{Layer, NDim, Shape},
        MorphErr,
    };

    fn small() -> Graph {
        Graph::sequential(
            Shape::from([10]),
            NDim::One,
            [Layer::dense(64), Layer::relu(), Layer::dense(1)],
        )
        .unwrap()
    }

    #[test]
    fn parent_is_untouched() {
        let graph = small();
        let size = graph.size();
        let mut transformer = Transformer::seeded(TransformConfig::default(), 7).unwrap();

        let neighbours = transformer.transform(&graph, true).unwrap();

        assert!(!neighbours.is_empty());
        assert_eq!(graph.size(), size);
        assert_eq!(graph.main_chain(), [0, 1, 2]);
    }

    #[test]
    fn respects_neighbour_count() {
        let config = TransformConfig {
            n_neighbours: 3,
            ..Default::default()
        };
        let mut transformer = Transformer::seeded(config, 1).unwrap();

        let neighbours = transformer.transform(&small(), true).unwrap();
        assert!(neighbours.len() <= 3);
    }

    #[test]
    fn size_cap_filters_everything() {
        let graph = small();
        let config = TransformConfig {
            max_model_size: graph.size() - 1,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(5);

        assert!(transform(&graph, true, &config, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = TransformConfig {
            n_neighbours: 0,
            ..Default::default()
        };

        assert!(matches!(
            Transformer::seeded(config, 0),
            Err(MorphErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn same_seed_same_neighbours() {
        let parents = [small(), small()];
        let config = TransformConfig::default();

        let a = transform_many(&parents, true, &config, 99).unwrap();
        let b = transform_many(&parents, true, &config, 99).unwrap();

        assert_eq!(a.len(), 2);
        for (x, y) in a.iter().flatten().zip(b.iter().flatten()) {
            assert_eq!(x.to_spec(), y.to_spec());
        }
    }
}
