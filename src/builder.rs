use log::debug;

use crate::{
    graph::{Graph, SkipConnection, SkipKind},
    layers::{Layer, NDim, Shape},
    specs::{GraphSpec, LayerSpec},
    MorphErr, Result,
};

/// Builds `Graph`s given a specification.
#[derive(Debug, Default)]
pub struct GraphBuilder;

impl GraphBuilder {
    /// Creates a new `GraphBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Graph` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the graph.
    ///
    /// # Returns
    /// The graph or an error if the spec is invalid or its shapes don't line up.
    pub fn build(&self, spec: &GraphSpec) -> Result<Graph> {
        if spec.layers.is_empty() {
            return Err(MorphErr::InvalidConfig(
                "graph must have at least one layer".into(),
            ));
        }

        let n_dim = NDim::try_from(spec.n_dim)?;
        let layers = spec
            .layers
            .iter()
            .map(|ls| self.resolve_layer(*ls, n_dim))
            .collect::<Result<Vec<_>>>()?;
        let mut graph = Graph::sequential(Shape::new(spec.input_shape.clone()), n_dim, layers)?;

        // builder layers are chained in order, so positions and ids coincide
        for (i, skip) in spec.skips.iter().enumerate() {
            if skip.source >= spec.layers.len() || skip.sink >= spec.layers.len() {
                return Err(MorphErr::InvalidConfig(format!(
                    "skip {i}: ends ({}, {}) out of range for {} layers",
                    skip.source,
                    skip.sink,
                    spec.layers.len()
                )));
            }

            let connection = SkipConnection::new(skip.source, skip.sink, skip.kind);
            match (skip.projection, skip.kind) {
                (false, _) => graph.add_skip_connection(connection)?,
                (true, SkipKind::Add) => graph.add_projected_skip(connection)?,
                (true, SkipKind::Concat) => {
                    return Err(MorphErr::InvalidConfig(format!(
                        "skip {i}: only additive skips carry a projection"
                    )));
                }
            }
        }

        debug!(
            "built graph with {} layer(s) and {} skip(s)",
            graph.n_layers(),
            graph.skips().len()
        );

        Ok(graph)
    }

    fn resolve_layer(&self, spec: LayerSpec, n_dim: NDim) -> Result<Layer> {
        let layer = match spec {
            LayerSpec::Dense { units } => Layer::dense(units),
            LayerSpec::Relu => Layer::relu(),
            LayerSpec::Dropout { rate } => {
                if !(0.0..1.0).contains(&rate) {
                    return Err(MorphErr::InvalidConfig(format!(
                        "dropout rate ({rate}) must be within [0, 1)"
                    )));
                }
                Layer::dropout(rate, n_dim)
            }
            LayerSpec::BatchNorm => Layer::batch_norm(n_dim),
            LayerSpec::Pooling { kernel_size } => Layer::pooling(kernel_size, n_dim),
            LayerSpec::Flatten => Layer::flatten(),
        };

        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::SkipSpec;

    fn spec() -> GraphSpec {
        GraphSpec {
            input_shape: vec![10],
            n_dim: 1,
            layers: vec![
                LayerSpec::Dense { units: 64 },
                LayerSpec::Relu,
                LayerSpec::Dense { units: 32 },
                LayerSpec::Relu,
                LayerSpec::Dense { units: 1 },
            ],
            skips: vec![SkipSpec {
                source: 0,
                sink: 2,
                kind: SkipKind::Add,
                projection: true,
            }],
        }
    }

    #[test]
    fn builds_layers_and_skips() {
        let graph = GraphBuilder::new().build(&spec()).unwrap();

        assert_eq!(graph.main_chain(), [0, 1, 2, 3, 4]);
        assert_eq!(graph.skips().len(), 1);
        assert!(graph
            .projection(&SkipConnection::new(0, 2, SkipKind::Add))
            .is_some());
        graph.validate().unwrap();
    }

    #[test]
    fn spec_survives_export() {
        let spec = spec();
        let graph = GraphBuilder::new().build(&spec).unwrap();
        assert_eq!(graph.to_spec(), spec);
    }

    #[test]
    fn export_follows_chain_order() {
        let mut graph = GraphBuilder::new().build(&spec()).unwrap();
        graph.to_deeper_model(0, Layer::relu()).unwrap();

        let exported = graph.to_spec();
        assert_eq!(exported.layers[1], LayerSpec::Relu);
        assert_eq!(exported.layers.len(), 6);
        assert_eq!(exported.skips[0].source, 0);
        assert_eq!(exported.skips[0].sink, 3);

        let rebuilt = GraphBuilder::new().build(&exported).unwrap();
        assert_eq!(rebuilt.size(), graph.size());
    }

    #[test]
    fn rejects_invalid_specs() {
        let builder = GraphBuilder::new();

        let empty = GraphSpec {
            layers: vec![],
            ..spec()
        };
        assert!(matches!(builder.build(&empty), Err(MorphErr::InvalidConfig(_))));

        let bad_dim = GraphSpec { n_dim: 4, ..spec() };
        assert!(matches!(builder.build(&bad_dim), Err(MorphErr::InvalidConfig(_))));

        let out_of_range = GraphSpec {
            skips: vec![SkipSpec {
                source: 0,
                sink: 9,
                kind: SkipKind::Concat,
                projection: false,
            }],
            ..spec()
        };
        assert!(matches!(
            builder.build(&out_of_range),
            Err(MorphErr::InvalidConfig(_))
        ));

        let backwards = GraphSpec {
            skips: vec![SkipSpec {
                source: 2,
                sink: 0,
                kind: SkipKind::Add,
                projection: false,
            }],
            ..spec()
        };
        assert!(matches!(
            builder.build(&backwards),
            Err(MorphErr::IncompatibleSkip { .. })
        ));

        let projected_concat = GraphSpec {
            skips: vec![SkipSpec {
                source: 0,
                sink: 2,
                kind: SkipKind::Concat,
                projection: true,
            }],
            ..spec()
        };
        assert!(matches!(
            builder.build(&projected_concat),
            Err(MorphErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_dropout_rate_out_of_range() {
        let builder = GraphBuilder::new();

        for rate in [5.0, 1.0, -0.1] {
            let mut spec = spec();
            spec.layers.insert(2, LayerSpec::Dropout { rate });
            spec.skips.clear();

            assert!(matches!(builder.build(&spec), Err(MorphErr::InvalidConfig(_))));
        }
    }

    #[test]
    fn rejects_oversized_layers() {
        let spec = GraphSpec {
            input_shape: vec![1 << 33],
            n_dim: 1,
            layers: vec![LayerSpec::Dense { units: 1 << 33 }, LayerSpec::Dense { units: 1 }],
            skips: vec![],
        };

        assert!(GraphBuilder::new().build(&spec).is_err());
    }

    #[test]
    fn outlived_projection_survives_rebuild() {
        let builder = GraphBuilder::new();
        let mut graph = builder.build(&spec()).unwrap();
        let skip = SkipConnection::new(0, 2, SkipKind::Add);

        // the sink now matches the source width, the projection stays
        graph.to_wider_model(2, 32).unwrap();
        let exported = graph.to_spec();
        assert!(exported.skips[0].projection);

        let rebuilt = builder.build(&exported).unwrap();
        assert_eq!(rebuilt.size(), graph.size());

        let original = graph.layer(graph.projection(&skip).unwrap()).unwrap();
        let restored = rebuilt.layer(rebuilt.projection(&skip).unwrap()).unwrap();
        assert_eq!(restored, original);
        rebuilt.validate().unwrap();
    }
}
