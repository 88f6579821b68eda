use network_morphism::{
    builder::GraphBuilder, specs::GraphSpec, Graph, Layer, MorphErr, NDim, Shape,
    SkipConnection, SkipKind,
};

fn conv_like() -> Graph {
    Graph::sequential(
        Shape::from([32, 8]),
        NDim::One,
        [
            Layer::dense(16),
            Layer::batch_norm(NDim::One),
            Layer::relu(),
            Layer::dense(16),
            Layer::relu(),
            Layer::pooling(2, NDim::One),
            Layer::flatten(),
            Layer::dense(10),
        ],
    )
    .unwrap()
}

#[test]
fn clone_keeps_size_and_is_independent() {
    let graph = conv_like();
    let mut copy = graph.try_clone().unwrap();
    assert_eq!(copy.size(), graph.size());

    copy.to_wider_model(0, 8).unwrap();
    copy.to_concat_skip_model(0, 3).unwrap();

    assert_ne!(copy.size(), graph.size());
    assert!(graph.skips().is_empty());
    assert_eq!(graph.layer(0).unwrap().units(), Some(16));
}

#[test]
fn widening_grows_consumers_by_the_added_units() {
    let mut graph = conv_like();
    let before: Vec<_> = (1..4)
        .map(|id| graph.layer(id).unwrap().input_shape().last().unwrap())
        .collect();

    graph.to_wider_model(0, 5).unwrap();

    for (id, width) in (1..4).zip(before) {
        let shape = graph.layer(id).unwrap().input_shape();
        assert_eq!(shape.last(), Some(width + 5));
        assert_eq!(shape.leading(), &[32]);
    }
    graph.validate().unwrap();
}

#[test]
fn pooling_and_flatten_shapes() {
    let graph = conv_like();

    assert_eq!(graph.layer(5).unwrap().output_shape(), &Shape::from([16, 16]));
    assert_eq!(graph.layer(6).unwrap().output_shape(), &Shape::from([256]));
    assert_eq!(graph.output_shape().unwrap(), Shape::from([10]));

    assert_eq!(graph.skip_connection_layer_ids(), [0, 1, 2, 3, 4]);
    assert_eq!(graph.wide_layer_ids(), [0]);
}

#[test]
fn concat_then_widen_source() {
    let mut graph = conv_like();
    graph.to_concat_skip_model(1, 3).unwrap();
    assert_eq!(graph.merged_output_shape(3).unwrap(), Shape::from([32, 32]));

    graph.to_wider_model(0, 16).unwrap();

    assert_eq!(graph.merged_output_shape(3).unwrap(), Shape::from([32, 48]));
    assert_eq!(graph.layer(4).unwrap().input_shape(), &Shape::from([32, 48]));
    graph.validate().unwrap();
}

#[test]
fn failed_operations_leave_the_graph_untouched() {
    let mut graph = conv_like();
    let size = graph.size();
    let chain = graph.main_chain();

    assert!(matches!(
        graph.to_wider_model(7, 4),
        Err(MorphErr::InvalidOperation { .. })
    ));
    assert!(matches!(
        graph.to_deeper_model(6, Layer::pooling(2, NDim::One)),
        Err(MorphErr::InvalidOperation { .. })
    ));
    assert!(matches!(
        graph.add_skip_connection(SkipConnection::new(3, 0, SkipKind::Add)),
        Err(MorphErr::IncompatibleSkip { .. })
    ));

    assert_eq!(graph.size(), size);
    assert_eq!(graph.main_chain(), chain);
    graph.validate().unwrap();
}

#[test]
fn json_spec_to_graph_and_back() {
    let json = r#"{
        "input_shape": [12],
        "layers": [
            { "dense": { "units": 24 } },
            "relu",
            { "dense": { "units": 48 } },
            { "dropout": { "rate": 0.25 } },
            { "dense": { "units": 3 } }
        ],
        "skips": [
            { "source": 0, "sink": 2, "kind": "add", "projection": true },
            { "source": 1, "sink": 3, "kind": "concat" }
        ]
    }"#;

    let spec: GraphSpec = serde_json::from_str(json).unwrap();
    let graph = GraphBuilder::new().build(&spec).unwrap();

    let add = SkipConnection::new(0, 2, SkipKind::Add);
    let pid = graph.projection(&add).unwrap();
    assert_eq!(graph.layer(pid).unwrap().output_shape(), &Shape::from([48]));
    assert_eq!(graph.layer(4).unwrap().input_shape(), &Shape::from([72]));
    graph.validate().unwrap();

    let exported = serde_json::to_string(&graph.to_spec()).unwrap();
    let reparsed: GraphSpec = serde_json::from_str(&exported).unwrap();
    assert_eq!(reparsed, spec);
}

#[test]
fn widened_sink_keeps_its_projection_through_export() {
    let mut graph = Graph::sequential(
        Shape::from([10]),
        NDim::One,
        [
            Layer::dense(64),
            Layer::relu(),
            Layer::dense(32),
            Layer::relu(),
            Layer::dense(1),
        ],
    )
    .unwrap();
    graph.to_add_skip_model(0, 2).unwrap();
    graph.to_wider_model(2, 32).unwrap();

    let json = serde_json::to_string(&graph.to_spec()).unwrap();
    let spec: GraphSpec = serde_json::from_str(&json).unwrap();
    let rebuilt = GraphBuilder::new().build(&spec).unwrap();

    let skip = SkipConnection::new(0, 2, SkipKind::Add);
    assert_eq!(rebuilt.size(), graph.size());
    assert_eq!(
        rebuilt.layer(rebuilt.projection(&skip).unwrap()),
        graph.layer(graph.projection(&skip).unwrap())
    );
}

#[test]
fn oversized_spec_is_rejected() {
    let json = r#"{
        "input_shape": [8589934592],
        "layers": [{ "dense": { "units": 8589934592 } }, { "dense": { "units": 1 } }]
    }"#;

    let spec: GraphSpec = serde_json::from_str(json).unwrap();
    assert!(GraphBuilder::new().build(&spec).is_err());
}
