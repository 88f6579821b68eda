use std::fmt::{self, Display};

use log::debug;
use rand::{seq::IndexedRandom, Rng};

use crate::{
    config::TransformConfig,
    graph::{Graph, SkipConnection, SkipKind},
    layers::{create_layer, LayerDescriptor, LayerKind, NDim, Shape},
    Layer, Result,
};

/// A structural operator producing a neighbour graph out of a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Deepen,
    Widen,
    SkipConnect,
}

impl Operator {
    /// Uniformly samples an operator.
    ///
    /// # Arguments
    /// * `allow_skip_connections` - Whether `SkipConnect` may be sampled.
    /// * `rng` - The random source.
    pub fn sample<R: Rng>(allow_skip_connections: bool, rng: &mut R) -> Self {
        let n = if allow_skip_connections { 3 } else { 2 };

        match rng.random_range(0..n) {
            0 => Operator::Deepen,
            1 => Operator::Widen,
            _ => Operator::SkipConnect,
        }
    }

    /// Applies this operator to a graph the caller already owns.
    ///
    /// # Returns
    /// The mutated graph, `None` if the operator could not produce a candidate, or an error if
    /// something beyond a local structural failure happened.
    pub fn apply<R: Rng>(
        self,
        graph: Graph,
        config: &TransformConfig,
        rng: &mut R,
    ) -> Result<Option<Graph>> {
        match self {
            Operator::Deepen => to_deeper_graph(graph, config, rng),
            Operator::Widen => to_wider_graph(graph, rng),
            Operator::SkipConnect => to_skip_connection_graph(graph, rng),
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Deepen => write!(f, "deepen"),
            Operator::Widen => write!(f, "widen"),
            Operator::SkipConnect => write!(f, "skip-connect"),
        }
    }
}

/// Doubles the width of a uniformly sampled widenable layer.
///
/// # Returns
/// The widened graph, or the graph unchanged when no layer is eligible.
pub fn to_wider_graph<R: Rng>(mut graph: Graph, rng: &mut R) -> Result<Option<Graph>> {
    let ids = graph.wide_layer_ids();
    let Some(&layer_id) = ids.choose(rng) else {
        return Ok(Some(graph));
    };

    let n_add = graph.layer(layer_id).and_then(|l| l.units()).unwrap_or(0);
    let res = graph.to_wider_model(layer_id, n_add);
    Ok(recover(Operator::Widen, res)?.map(|_| graph))
}

/// Inserts a new layer after a uniformly sampled deep-eligible layer.
///
/// # Returns
/// The deepened graph, or `None` when the graph already holds `max_layers` eligible layers or
/// none at all.
pub fn to_deeper_graph<R: Rng>(
    mut graph: Graph,
    config: &TransformConfig,
    rng: &mut R,
) -> Result<Option<Graph>> {
    let ids = graph.deep_layer_ids();
    if ids.len() >= config.max_layers {
        return Ok(None);
    }

    let Some(&layer_id) = ids.choose(rng) else {
        return Ok(None);
    };

    let new_layer = {
        let Some(layer) = graph.layer(layer_id) else {
            return Ok(None);
        };
        let input_shape = recover(Operator::Deepen, graph.merged_output_shape(layer_id))?;
        let Some(input_shape) = input_shape else {
            return Ok(None);
        };

        recover(
            Operator::Deepen,
            create_new_layer(layer, &input_shape, graph.n_dim(), config, rng),
        )?
    };

    let Some(new_layer) = new_layer else {
        return Ok(None);
    };

    let res = graph.to_deeper_model(layer_id, new_layer);
    Ok(recover(Operator::Deepen, res)?.map(|_| graph))
}

/// Adds a uniformly sampled skip connection among all the valid ones.
///
/// # Returns
/// The connected graph, or the graph unchanged when no connection is valid.
pub fn to_skip_connection_graph<R: Rng>(mut graph: Graph, rng: &mut R) -> Result<Option<Graph>> {
    let connections = valid_connections(&graph);
    let Some(&skip) = connections.choose(rng) else {
        return Ok(Some(graph));
    };

    let res = graph.add_skip_connection(skip);
    Ok(recover(Operator::SkipConnect, res)?.map(|_| graph))
}

/// Enumerates every skip connection that may be added to the graph.
///
/// Pairs follow main chain order among `skip_connection_layer_ids`, additive connections first.
/// Connections the graph already holds, or that it would reject, are left out.
pub fn valid_connections(graph: &Graph) -> Vec<SkipConnection> {
    let ids = graph.skip_connection_layer_ids();
    let mut connections = Vec::new();

    for kind in SkipKind::ALL {
        for (i, &source) in ids.iter().enumerate() {
            for &sink in &ids[i + 1..] {
                let skip = SkipConnection::new(source, sink, kind);
                if graph.check_skip(&skip).is_ok() {
                    connections.push(skip);
                }
            }
        }
    }

    connections
}

/// Synthesizes a layer to insert after `layer`, sampling its kind according to `layer`'s role.
///
/// After an activation comes a dense or dropout layer, after a dropout comes a dense layer or an
/// activation, anything else may be followed by any of the three.
///
/// # Arguments
/// * `layer` - The layer the new one will follow.
/// * `input_shape` - The shape the new layer will receive.
/// * `n_dim` - The spatial dimensionality of the network.
/// * `config` - The transform configuration.
/// * `rng` - The random source.
pub fn create_new_layer<R: Rng>(
    layer: &LayerDescriptor,
    input_shape: &Shape,
    n_dim: NDim,
    config: &TransformConfig,
    rng: &mut R,
) -> Result<Layer> {
    let candidates: &[LayerKind] = match layer.kind() {
        LayerKind::ReLU => &[LayerKind::Dense, LayerKind::Dropout],
        LayerKind::Dropout => &[LayerKind::Dense, LayerKind::ReLU],
        _ => &[LayerKind::Dense, LayerKind::Dropout, LayerKind::ReLU],
    };

    // candidates is never empty
    let kind = candidates.choose(rng).copied().unwrap_or(LayerKind::Dense);
    create_layer(kind, input_shape, n_dim, config, rng)
}

/// Turns a recoverable error into "no candidate", letting every other error through.
fn recover<T>(op: Operator, res: Result<T>) -> Result<Option<T>> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_recoverable() => {
            debug!("{op} yielded no candidate: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn chain(layers: Vec<Layer>) -> Graph {
        Graph::sequential(Shape::from([10]), NDim::One, layers).unwrap()
    }

    #[test]
    fn wider_doubles_width() {
        let mut rng = StdRng::seed_from_u64(42);
        let graph = chain(vec![Layer::dense(64), Layer::relu(), Layer::dense(1)]);

        let wider = to_wider_graph(graph, &mut rng).unwrap().unwrap();

        assert_eq!(wider.layer(0).unwrap().units(), Some(128));
        assert_eq!(wider.layer(2).unwrap().input_shape(), &Shape::from([128]));
    }

    #[test]
    fn wider_leaves_graph_unchanged_without_candidates() {
        let mut rng = StdRng::seed_from_u64(42);
        let graph = chain(vec![Layer::dense(1)]);
        let size = graph.size();

        let same = to_wider_graph(graph, &mut rng).unwrap().unwrap();
        assert_eq!(same.size(), size);
    }

    #[test]
    fn deeper_respects_depth_cap() {
        let mut rng = StdRng::seed_from_u64(42);
        let graph = chain(vec![Layer::dense(64), Layer::relu(), Layer::dense(1)]);
        let config = TransformConfig {
            max_layers: 2,
            ..Default::default()
        };

        assert!(to_deeper_graph(graph, &config, &mut rng).unwrap().is_none());
    }

    #[test]
    fn deeper_adds_one_layer() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = TransformConfig::default();

        for _ in 0..16 {
            let graph = chain(vec![Layer::dense(64), Layer::relu(), Layer::dense(1)]);
            let deeper = to_deeper_graph(graph, &config, &mut rng).unwrap().unwrap();

            assert_eq!(deeper.main_chain().len(), 4);
            deeper.validate().unwrap();
        }
    }

    #[test]
    fn deeper_without_eligible_layers() {
        let mut rng = StdRng::seed_from_u64(42);
        let graph = chain(vec![Layer::dense(1)]);
        let config = TransformConfig::default();

        assert!(to_deeper_graph(graph, &config, &mut rng).unwrap().is_none());
    }

    #[test]
    fn new_layer_candidates_follow_role() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = TransformConfig::default();
        let shape = Shape::from([8]);
        let relu = LayerDescriptor::new(Layer::relu(), shape.clone()).unwrap();
        let dropout =
            LayerDescriptor::new(Layer::dropout(0.5, NDim::One), shape.clone()).unwrap();

        for _ in 0..32 {
            let after_relu = create_new_layer(&relu, &shape, NDim::One, &config, &mut rng).unwrap();
            assert_ne!(after_relu.kind(), LayerKind::ReLU);

            let after_dropout =
                create_new_layer(&dropout, &shape, NDim::One, &config, &mut rng).unwrap();
            assert_ne!(after_dropout.kind(), LayerKind::Dropout);
        }
    }

    #[test]
    fn connections_skip_existing_ones() {
        let mut graph = chain(vec![
            Layer::dense(16),
            Layer::relu(),
            Layer::dense(16),
            Layer::dense(1),
        ]);

        let before = valid_connections(&graph);
        assert_eq!(
            before,
            [
                SkipConnection::new(0, 1, SkipKind::Add),
                SkipConnection::new(0, 1, SkipKind::Concat),
            ]
        );

        graph.to_add_skip_model(0, 1).unwrap();
        assert_eq!(
            valid_connections(&graph),
            [SkipConnection::new(0, 1, SkipKind::Concat)]
        );
    }

    #[test]
    fn skip_connect_without_candidates_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(42);
        let graph = chain(vec![Layer::dense(64), Layer::relu(), Layer::dense(1)]);

        let same = to_skip_connection_graph(graph, &mut rng).unwrap().unwrap();
        assert!(same.skips().is_empty());
    }
}
